//! Provider traits for the external AI services
//!
//! Every model is treated as an opaque text-in/text-out service:
//! - `ChatProvider`: chat completions for document answers (Groq)
//! - `VisionProvider`: text recognition from images (Gemini)
//! - `TextGenerator`: single-prompt generation for video summaries (Gemini)

use async_trait::async_trait;

use crate::error::Result;

/// A system + user message exchange with fixed sampling parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Chat-completion endpoint
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send the exchange and return the first choice's text.
    ///
    /// `Ok(None)` means the endpoint answered successfully but produced no choices.
    async fn complete(&self, request: &ChatRequest) -> Result<Option<String>>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Multimodal model used as OCR
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Run `instruction` against an image and return the model's raw text
    async fn extract_text(&self, image: &[u8], mime_type: &str, instruction: &str) -> Result<String>;
}

/// Prompt-to-text generation
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}
