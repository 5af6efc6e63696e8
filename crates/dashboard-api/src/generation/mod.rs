//! Answer generation and prompt templates

pub mod answer;
pub mod prompt;

pub use answer::AnswerService;
