//! Background document processing

pub mod job_queue;
pub mod processor;
pub mod worker;

pub use job_queue::{
    JobProgress, JobQueue, JobStatus, JobTrigger, ProcessingJob, ProcessingStage, QueueStats,
};
pub use processor::{DocumentProcessor, ProcessOutcome};
pub use worker::ProcessingWorker;
