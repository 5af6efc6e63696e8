//! Fixed-size overlapping text windows

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};

/// Splits text into windows of `chunk_size` characters, each starting
/// `chunk_size - overlap` characters after the previous one
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    /// Window size in characters
    chunk_size: usize,
    /// Characters shared by consecutive windows
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker; the overlap must be smaller than the window
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk size must be positive".to_string()));
        }
        if overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, chunk_size
            )));
        }

        Ok(Self { chunk_size, overlap })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split text into ordered windows. Empty text gives no windows.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        // Byte offset of every char boundary, plus the end of the string
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = boundaries.len() - 1;

        let step = self.chunk_size - self.overlap;
        let mut chunks = Vec::with_capacity(self.expected_count(char_count));
        let mut start = 0;

        while start < char_count {
            let end = (start + self.chunk_size).min(char_count);
            chunks.push(text[boundaries[start]..boundaries[end]].to_string());

            if end == char_count {
                break;
            }
            start += step;
        }

        chunks
    }

    /// Number of windows `chunk` produces for a text of `char_count` characters
    pub fn expected_count(&self, char_count: usize) -> usize {
        if char_count == 0 {
            0
        } else if char_count <= self.chunk_size {
            1
        } else {
            let step = self.chunk_size - self.overlap;
            (char_count - self.overlap).div_ceil(step)
        }
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}
