//! Application state for the dashboard server

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::seed_admin;
use crate::config::DashboardConfig;
use crate::error::Result;
use crate::generation::AnswerService;
use crate::ingestion::{ExtractorRegistry, TextChunker};
use crate::processing::{DocumentProcessor, JobQueue, ProcessingWorker};
use crate::providers::{
    ChatProvider, GeminiClient, GroqClient, TextGenerator, VisionProvider,
};
use crate::retrieval::RelevanceSelector;
use crate::storage::{Database, FileStore};
use crate::youtube::{SummaryService, VideoSource, YouTubeClient};

/// External services the state is wired to
#[derive(Clone)]
pub struct Providers {
    /// Document answers
    pub chat: Arc<dyn ChatProvider>,
    /// Image OCR
    pub vision: Arc<dyn VisionProvider>,
    /// Video study notes
    pub generator: Arc<dyn TextGenerator>,
    /// Video titles and captions
    pub videos: Arc<dyn VideoSource>,
}

impl Providers {
    /// HTTP clients built from configuration
    pub fn from_config(config: &DashboardConfig) -> Result<Self> {
        let gemini = Arc::new(GeminiClient::new(&config.gemini)?);

        Ok(Self {
            chat: Arc::new(GroqClient::new(&config.groq)?),
            vision: gemini.clone(),
            generator: gemini,
            videos: Arc::new(YouTubeClient::new(&config.youtube)?),
        })
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: DashboardConfig,
    /// Users, documents, chunks, summaries, quotas
    database: Arc<Database>,
    /// Uploaded files
    files: FileStore,
    /// Job queue for document processing
    job_queue: Arc<JobQueue>,
    /// Chunk ranking for questions
    selector: RelevanceSelector,
    /// Question answering
    answers: AnswerService,
    /// Video summaries
    summaries: SummaryService,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Create application state with the configured database and HTTP providers
    pub async fn new(config: DashboardConfig) -> Result<Self> {
        tracing::info!("Initializing dashboard application state...");

        let database = Arc::new(Database::new(&config.storage.database_path)?);
        tracing::info!("Database opened at {}", config.storage.database_path.display());

        let providers = Providers::from_config(&config)?;
        if config.groq.api_key.is_none() {
            tracing::warn!("GROQ_API_KEY not set; document questions will fail");
        }
        if config.gemini.api_key.is_none() {
            tracing::warn!("GEMINI_API_KEY not set; image OCR and video summaries will fail");
        }

        Self::from_parts(config, database, providers).await
    }

    /// Assemble state from an open database and explicit providers.
    ///
    /// Seeds the admin account, starts the processing worker and re-queues documents a
    /// previous run left in `processing`.
    pub async fn from_parts(
        config: DashboardConfig,
        database: Arc<Database>,
        providers: Providers,
    ) -> Result<Self> {
        config.validate()?;
        seed_admin(&database, &config.auth)?;

        tokio::fs::create_dir_all(&config.storage.upload_dir).await?;
        let files = FileStore::new(config.storage.upload_dir.clone());

        let chunker = TextChunker::from_config(&config.chunking)?;
        let extractors = Arc::new(ExtractorRegistry::new(providers.vision.clone()));
        let processor = Arc::new(DocumentProcessor::new(database.clone(), extractors, chunker));

        let worker_count = config.processing.worker_count();
        let (job_queue, receiver) =
            JobQueue::new(worker_count, config.processing.queue_capacity);
        let job_queue = Arc::new(job_queue.with_retention(Duration::from_secs(
            config.processing.job_retention_secs,
        )));

        let worker = ProcessingWorker::new(
            processor,
            job_queue.clone(),
            Duration::from_secs(config.processing.document_timeout_secs),
        );
        tokio::spawn(worker.run(receiver));
        tracing::info!("Processing worker spawned with {} slots", worker_count);

        ProcessingWorker::requeue_unfinished(&database, &job_queue).await?;

        let answers = AnswerService::new(providers.chat.clone())
            .with_sampling(config.groq.temperature, config.groq.max_tokens);
        let summaries = SummaryService::new(
            database.clone(),
            providers.videos.clone(),
            providers.generator.clone(),
            config.quotas.daily_summaries,
            config.youtube.max_transcript_chars,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                selector: RelevanceSelector::new(config.retrieval.top_k),
                config,
                database,
                files,
                job_queue,
                answers,
                summaries,
                ready: RwLock::new(true),
            }),
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.inner.database
    }

    pub fn files(&self) -> &FileStore {
        &self.inner.files
    }

    pub fn job_queue(&self) -> &Arc<JobQueue> {
        &self.inner.job_queue
    }

    pub fn selector(&self) -> &RelevanceSelector {
        &self.inner.selector
    }

    pub fn answers(&self) -> &AnswerService {
        &self.inner.answers
    }

    pub fn summaries(&self) -> &SummaryService {
        &self.inner.summaries
    }

    /// Check if ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
