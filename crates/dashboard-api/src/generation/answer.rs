//! Document answers from selected context

use std::sync::Arc;

use super::prompt::{answer_prompt, ANSWER_SYSTEM_PROMPT, NO_ANSWER};
use crate::error::Result;
use crate::providers::{ChatProvider, ChatRequest};

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 1024;

/// Turns context + question into an answer via the chat provider
pub struct AnswerService {
    chat: Arc<dyn ChatProvider>,
    temperature: f32,
    max_tokens: u32,
}

impl AnswerService {
    pub fn new(chat: Arc<dyn ChatProvider>) -> Self {
        Self {
            chat,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        }
    }

    /// Override sampling parameters
    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub async fn answer(&self, context: &str, question: &str) -> Result<String> {
        let request = ChatRequest {
            system: ANSWER_SYSTEM_PROMPT.to_string(),
            user: answer_prompt(context, question),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        tracing::debug!(
            "Asking {} ({} context chars)",
            self.chat.name(),
            context.len()
        );

        let answer = self.chat.complete(&request).await?;
        Ok(answer.unwrap_or_else(|| NO_ANSWER.to_string()))
    }
}
