//! Job queue for background document processing
//!
//! Jobs travel over a bounded tokio channel. Delivery is at-least-once: documents left in
//! `processing` by a previous run are submitted again at startup, and the handler is
//! idempotent. A document already queued or running is never submitted twice.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Processing stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    Queued,
    Extracting,
    Chunking,
    Storing,
    Complete,
    Failed,
    Skipped,
}

/// Job status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl JobStatus {
    /// Queued or running
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

/// Why a job was submitted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobTrigger {
    /// Fresh upload
    Upload,
    /// Left in `processing` by a previous run
    Recovery,
    /// Manual retry of a failed document
    Retry,
}

/// A unit of work: process one document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingJob {
    pub document_id: Uuid,
    pub trigger: JobTrigger,
}

impl ProcessingJob {
    pub fn new(document_id: Uuid, trigger: JobTrigger) -> Self {
        Self {
            document_id,
            trigger,
        }
    }
}

/// Progress information for a document's latest job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgress {
    pub document_id: Uuid,
    pub trigger: JobTrigger,
    pub status: JobStatus,
    pub stage: ProcessingStage,
    /// Chunks stored on success
    pub chunk_count: Option<usize>,
    pub error: Option<String>,
    /// Times this document has been submitted since startup
    pub attempts: u32,
    /// Follow-up run requested while this one was running
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerun: Option<JobTrigger>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl JobProgress {
    pub fn new(job: &ProcessingJob) -> Self {
        let now = chrono::Utc::now();
        Self {
            document_id: job.document_id,
            trigger: job.trigger,
            status: JobStatus::Pending,
            stage: ProcessingStage::Queued,
            chunk_count: None,
            error: None,
            attempts: 1,
            rerun: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reset for a new submission, keeping the attempt history
    fn resubmit(&mut self, job: &ProcessingJob) {
        let attempts = self.attempts + 1;
        *self = Self::new(job);
        self.attempts = attempts;
    }
}

/// Queue statistics
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub queue_size: usize,
    pub worker_count: usize,
    pub pending_jobs: usize,
    pub processing_jobs: usize,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
}

/// How long finished entries stay visible by default
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Job queue with per-document progress tracking
pub struct JobQueue {
    /// Latest job per document
    jobs: Arc<DashMap<Uuid, JobProgress>>,
    /// Channel for sending jobs to the worker
    sender: mpsc::Sender<ProcessingJob>,
    /// Number of documents processed concurrently
    worker_count: usize,
    /// Jobs submitted but not yet picked up
    queue_size: Arc<AtomicUsize>,
    /// Finished entries older than this are dropped
    retention: Duration,
}

impl JobQueue {
    /// Create a new job queue and the receiving end for the worker
    pub fn new(worker_count: usize, capacity: usize) -> (Self, mpsc::Receiver<ProcessingJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));

        let queue = Self {
            jobs: Arc::new(DashMap::new()),
            sender,
            worker_count,
            queue_size: Arc::new(AtomicUsize::new(0)),
            retention: DEFAULT_RETENTION,
        };

        (queue, receiver)
    }

    /// Keep finished entries for `retention` instead of the default hour
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Submit a job.
    ///
    /// Returns `Ok(false)` without sending anything when the document already has a job
    /// queued or running. A submission against a running job is remembered and handed back
    /// by [`JobQueue::take_rerun`] once that job finishes.
    pub async fn submit(&self, job: ProcessingJob) -> Result<bool> {
        let document_id = job.document_id;

        // Must run before taking an entry lock below
        self.cleanup_finished();

        match self.jobs.entry(document_id) {
            Entry::Occupied(mut entry) => {
                let progress = entry.get_mut();
                if progress.status == JobStatus::Processing {
                    tracing::info!(
                        "Document {} is being processed, will run again once finished",
                        document_id
                    );
                    progress.rerun = Some(job.trigger);
                    return Ok(false);
                }
                if progress.status.is_active() {
                    tracing::info!(
                        "Document {} already has an active job, not resubmitting",
                        document_id
                    );
                    return Ok(false);
                }
                entry.get_mut().resubmit(&job);
            }
            Entry::Vacant(entry) => {
                entry.insert(JobProgress::new(&job));
            }
        }

        self.queue_size.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = self.sender.send(job).await {
            tracing::error!("Failed to submit job for document {}: {}", document_id, e);
            self.queue_size.fetch_sub(1, Ordering::SeqCst);
            self.fail(document_id, "processing queue closed");
            return Err(Error::internal("Processing queue is closed"));
        }

        tracing::debug!("Queued document {} ({:?})", document_id, job.trigger);
        Ok(true)
    }

    /// Mark a job as picked up by the worker
    pub fn start(&self, document_id: Uuid) {
        self.queue_size
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok();
        self.update(document_id, |p| {
            p.status = JobStatus::Processing;
        });
    }

    /// Update the stage of a running job
    pub fn update_stage(&self, document_id: Uuid, stage: ProcessingStage) {
        self.update(document_id, |p| p.stage = stage);
    }

    /// Record success
    pub fn complete(&self, document_id: Uuid, chunk_count: usize) {
        self.update(document_id, |p| {
            p.status = JobStatus::Complete;
            p.stage = ProcessingStage::Complete;
            p.chunk_count = Some(chunk_count);
        });
    }

    /// Record a job that had nothing to do
    pub fn skip(&self, document_id: Uuid, reason: &str) {
        self.update(document_id, |p| {
            p.status = JobStatus::Complete;
            p.stage = ProcessingStage::Skipped;
            p.error = Some(reason.to_string());
        });
    }

    /// Record failure
    pub fn fail(&self, document_id: Uuid, error: &str) {
        self.update(document_id, |p| {
            p.status = JobStatus::Failed;
            p.stage = ProcessingStage::Failed;
            p.error = Some(error.to_string());
        });
    }

    fn update(&self, document_id: Uuid, apply: impl FnOnce(&mut JobProgress)) {
        if let Some(mut progress) = self.jobs.get_mut(&document_id) {
            apply(&mut progress);
            progress.updated_at = chrono::Utc::now();
        }
    }

    /// Follow-up job requested while the document's last job was running, if any
    pub fn take_rerun(&self, document_id: Uuid) -> Option<ProcessingJob> {
        let mut progress = self.jobs.get_mut(&document_id)?;
        if progress.status.is_active() {
            return None;
        }
        progress
            .rerun
            .take()
            .map(|trigger| ProcessingJob::new(document_id, trigger))
    }

    /// Drop finished entries not updated within the retention window.
    ///
    /// Queued and running jobs, and finished ones with a pending rerun, are kept.
    pub fn cleanup_finished(&self) -> usize {
        let Ok(retention) = chrono::Duration::from_std(self.retention) else {
            return 0;
        };
        let cutoff = chrono::Utc::now() - retention;

        let mut removed = 0;
        self.jobs.retain(|_, p| {
            let keep = p.status.is_active() || p.rerun.is_some() || p.updated_at > cutoff;
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            tracing::debug!("Dropped {} finished job entries", removed);
        }
        removed
    }

    /// Forget a document (after deletion)
    pub fn forget(&self, document_id: Uuid) {
        self.jobs.remove(&document_id);
    }

    /// Get progress for a document
    pub fn get_progress(&self, document_id: Uuid) -> Option<JobProgress> {
        self.jobs.get(&document_id).map(|p| p.clone())
    }

    /// Whether the document has a job queued or running
    pub fn is_active(&self, document_id: Uuid) -> bool {
        self.jobs
            .get(&document_id)
            .map(|p| p.status.is_active())
            .unwrap_or(false)
    }

    /// All tracked jobs, most recently updated first
    pub fn list_jobs(&self) -> Vec<JobProgress> {
        let mut jobs: Vec<JobProgress> = self.jobs.iter().map(|e| e.value().clone()).collect();
        jobs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        jobs
    }

    /// Get queue statistics
    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            queue_size: self.queue_size.load(Ordering::SeqCst),
            worker_count: self.worker_count,
            pending_jobs: 0,
            processing_jobs: 0,
            completed_jobs: 0,
            failed_jobs: 0,
        };

        for entry in self.jobs.iter() {
            match entry.status {
                JobStatus::Pending => stats.pending_jobs += 1,
                JobStatus::Processing => stats.processing_jobs += 1,
                JobStatus::Complete => stats.completed_jobs += 1,
                JobStatus::Failed => stats.failed_jobs += 1,
            }
        }

        stats
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }
}
