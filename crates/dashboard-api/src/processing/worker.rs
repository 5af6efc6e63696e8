//! Background worker for processing documents

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::timeout;

use super::job_queue::{JobQueue, JobTrigger, ProcessingJob};
use super::processor::{DocumentProcessor, ProcessOutcome};
use crate::error::Result;
use crate::storage::Database;
use crate::types::DocumentStatus;

/// Drains the job channel with bounded parallelism
pub struct ProcessingWorker {
    processor: Arc<DocumentProcessor>,
    job_queue: Arc<JobQueue>,
    parallel_documents: usize,
    document_timeout: Duration,
}

impl ProcessingWorker {
    pub fn new(
        processor: Arc<DocumentProcessor>,
        job_queue: Arc<JobQueue>,
        document_timeout: Duration,
    ) -> Self {
        let parallel_documents = job_queue.worker_count().max(1);

        tracing::info!(
            "Worker configured: {} parallel documents, {}s timeout",
            parallel_documents,
            document_timeout.as_secs()
        );

        Self {
            processor,
            job_queue,
            parallel_documents,
            document_timeout,
        }
    }

    /// Start processing jobs from the queue. Returns when every sender is gone.
    pub async fn run(self, mut receiver: mpsc::Receiver<ProcessingJob>) {
        tracing::info!("Processing worker started");
        let semaphore = Arc::new(Semaphore::new(self.parallel_documents));

        while let Some(job) = receiver.recv().await {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let processor = self.processor.clone();
            let job_queue = self.job_queue.clone();
            let document_timeout = self.document_timeout;

            tokio::spawn(async move {
                let document_id = job.document_id;
                Self::handle(processor, job_queue.clone(), job, document_timeout).await;
                drop(permit);

                if let Some(rerun) = job_queue.take_rerun(document_id) {
                    tracing::info!("[{}] Running again ({:?})", document_id, rerun.trigger);
                    if let Err(e) = job_queue.submit(rerun).await {
                        tracing::error!("[{}] Failed to resubmit: {}", document_id, e);
                    }
                }
            });
        }

        tracing::info!("Processing worker stopped");
    }

    async fn handle(
        processor: Arc<DocumentProcessor>,
        job_queue: Arc<JobQueue>,
        job: ProcessingJob,
        document_timeout: Duration,
    ) {
        let document_id = job.document_id;
        tracing::info!("[{}] Processing document ({:?})", document_id, job.trigger);
        job_queue.start(document_id);

        let start_time = std::time::Instant::now();
        let stages = job_queue.clone();
        let run = processor.process(document_id, move |stage| {
            stages.update_stage(document_id, stage)
        });

        match timeout(document_timeout, run).await {
            Ok(Ok(ProcessOutcome::Ready { chunk_count })) => {
                job_queue.complete(document_id, chunk_count);
                tracing::info!(
                    "[{}] Ready in {:.1}s",
                    document_id,
                    start_time.elapsed().as_secs_f64()
                );
            }
            Ok(Ok(ProcessOutcome::Failed { reason })) => {
                job_queue.fail(document_id, &reason);
            }
            Ok(Ok(ProcessOutcome::Skipped { reason })) => {
                tracing::info!("[{}] Skipped: {}", document_id, reason);
                job_queue.skip(document_id, &reason);
            }
            Ok(Err(e)) => {
                tracing::error!("[{}] Processing failed: {}", document_id, e);
                Self::mark_failed(processor.database(), document_id);
                job_queue.fail(document_id, &e.to_string());
            }
            Err(_) => {
                tracing::error!(
                    "[{}] TIMEOUT after {}s, marking document as error",
                    document_id,
                    document_timeout.as_secs()
                );
                Self::mark_failed(processor.database(), document_id);
                job_queue.fail(
                    document_id,
                    &format!("Processing timeout after {}s", document_timeout.as_secs()),
                );
            }
        }
    }

    fn mark_failed(database: &Database, document_id: uuid::Uuid) {
        if let Err(e) = database.mark_document_failed(document_id) {
            tracing::error!("[{}] Failed to record error status: {}", document_id, e);
        }
    }

    /// Submit every document left in `processing` by a previous run
    pub async fn requeue_unfinished(database: &Database, job_queue: &JobQueue) -> Result<usize> {
        let pending = database.list_documents_by_status(DocumentStatus::Processing)?;
        let mut queued = 0;

        for doc in pending {
            if job_queue
                .submit(ProcessingJob::new(doc.id, JobTrigger::Recovery))
                .await?
            {
                queued += 1;
            }
        }

        if queued > 0 {
            tracing::info!("Re-queued {} unfinished documents", queued);
        }
        Ok(queued)
    }
}
