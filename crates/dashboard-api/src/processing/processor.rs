//! Extract → chunk → persist for one document
//!
//! The handler is idempotent: a document that is gone or no longer `processing` is left
//! untouched, and storing chunks replaces whatever an earlier partial run left behind.

use std::sync::Arc;
use uuid::Uuid;

use super::job_queue::ProcessingStage;
use crate::error::Result;
use crate::ingestion::{ExtractorRegistry, TextChunker};
use crate::storage::Database;
use crate::types::{Chunk, DocumentStatus};

/// What a processing run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Chunks stored and document marked `ready`
    Ready { chunk_count: usize },
    /// Document marked `error`
    Failed { reason: String },
    /// Nothing to do
    Skipped { reason: String },
}

/// Runs the document lifecycle transition
pub struct DocumentProcessor {
    database: Arc<Database>,
    extractors: Arc<ExtractorRegistry>,
    chunker: TextChunker,
}

impl DocumentProcessor {
    pub fn new(
        database: Arc<Database>,
        extractors: Arc<ExtractorRegistry>,
        chunker: TextChunker,
    ) -> Self {
        Self {
            database,
            extractors,
            chunker,
        }
    }

    /// Process a document, reporting stages through `on_stage`.
    ///
    /// Extraction problems end as `ProcessOutcome::Failed`; only storage errors are returned
    /// as `Err`.
    pub async fn process(
        &self,
        document_id: Uuid,
        on_stage: impl Fn(ProcessingStage),
    ) -> Result<ProcessOutcome> {
        let doc = match self.database.get_document(document_id)? {
            Some(doc) => doc,
            None => {
                return Ok(ProcessOutcome::Skipped {
                    reason: "document no longer exists".to_string(),
                })
            }
        };

        if doc.status != DocumentStatus::Processing {
            return Ok(ProcessOutcome::Skipped {
                reason: format!("document is already {}", doc.status.as_str()),
            });
        }

        on_stage(ProcessingStage::Extracting);
        let text = match self.extractors.extract_file(&doc.file_path, doc.file_type).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("[{}] Extraction failed for {}: {}", doc.id, doc.filename, e);
                return self.fail(document_id, e.to_string());
            }
        };

        if text.trim().is_empty() {
            tracing::warn!("[{}] No text extracted from {}", doc.id, doc.filename);
            return self.fail(document_id, "no text could be extracted".to_string());
        }

        on_stage(ProcessingStage::Chunking);
        let chunks: Vec<Chunk> = self
            .chunker
            .chunk(&text)
            .into_iter()
            .enumerate()
            .map(|(i, content)| Chunk::new(document_id, i as u32, content))
            .collect();

        on_stage(ProcessingStage::Storing);
        let chunk_count = chunks.len();
        if !self.database.store_chunks_and_mark_ready(document_id, &chunks)? {
            return Ok(ProcessOutcome::Skipped {
                reason: "document changed while processing".to_string(),
            });
        }

        tracing::info!(
            "[{}] Document {} processed: {} chunks created",
            doc.id,
            doc.filename,
            chunk_count
        );
        Ok(ProcessOutcome::Ready { chunk_count })
    }

    fn fail(&self, document_id: Uuid, reason: String) -> Result<ProcessOutcome> {
        if self.database.mark_document_failed(document_id)? {
            Ok(ProcessOutcome::Failed { reason })
        } else {
            Ok(ProcessOutcome::Skipped {
                reason: "document changed while processing".to_string(),
            })
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }
}
