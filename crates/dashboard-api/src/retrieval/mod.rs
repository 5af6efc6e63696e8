//! Chunk selection for document questions

pub mod relevance;

pub use relevance::{RelevanceSelector, ScoredChunk, CONTEXT_SEPARATOR};
