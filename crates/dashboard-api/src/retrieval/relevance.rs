//! Keyword-overlap chunk ranking

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::types::Chunk;

/// Words ignored when turning a question into keywords
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "can", "shall", "to",
    "of", "in", "for", "on", "with", "at", "by", "from", "as", "into", "about", "between",
    "through", "after", "before", "during", "without", "and", "but", "or", "not", "no", "so",
    "if", "then", "than", "that", "this", "it", "its", "what", "which", "who", "whom", "how",
    "when", "where", "why",
];

/// Separator placed between selected chunks in the LLM context
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

fn stop_words() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// A chunk with its keyword score
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: usize,
}

/// Picks the top-K chunks by keyword frequency
#[derive(Debug, Clone, Copy)]
pub struct RelevanceSelector {
    top_k: usize,
}

impl RelevanceSelector {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Lower-case, strip punctuation, drop short words and stop words
    pub fn keywords(question: &str) -> Vec<String> {
        let cleaned: String = question
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
            .collect();

        cleaned
            .split_whitespace()
            .filter(|w| w.chars().count() > 2 && !stop_words().contains(w))
            .map(str::to_string)
            .collect()
    }

    /// Rank `chunks` (in document order) against the question and keep the best K.
    ///
    /// Ties keep document order. A question without keywords selects the first K chunks.
    pub fn select(&self, chunks: Vec<Chunk>, question: &str) -> Vec<ScoredChunk> {
        let keywords = Self::keywords(question);

        if keywords.is_empty() {
            return chunks
                .into_iter()
                .take(self.top_k)
                .map(|chunk| ScoredChunk { chunk, score: 0 })
                .collect();
        }

        let mut scored: Vec<ScoredChunk> = chunks
            .into_iter()
            .map(|chunk| {
                let score = score_text(&chunk.content, &keywords);
                ScoredChunk { chunk, score }
            })
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| b.score.cmp(&a.score));
        scored.truncate(self.top_k);
        scored
    }

    /// Join selected chunk contents into the LLM context
    pub fn build_context(selected: &[ScoredChunk]) -> String {
        selected
            .iter()
            .map(|s| s.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR)
    }
}

impl Default for RelevanceSelector {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Sum of non-overlapping, case-insensitive occurrences of each keyword
fn score_text(text: &str, keywords: &[String]) -> usize {
    let lower = text.to_lowercase();
    keywords.iter().map(|k| lower.matches(k.as_str()).count()).sum()
}
