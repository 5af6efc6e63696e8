//! External AI service clients

pub mod gemini;
pub mod groq;
pub mod llm;

pub use gemini::GeminiClient;
pub use groq::GroqClient;
pub use llm::{ChatProvider, ChatRequest, TextGenerator, VisionProvider};
