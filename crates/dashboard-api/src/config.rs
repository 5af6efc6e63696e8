//! Configuration for the dashboard backend

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DashboardConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Database and upload locations
    pub storage: StorageConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Chunk selection for document Q&A
    pub retrieval: RetrievalConfig,
    /// Groq chat-completion configuration (document answers)
    pub groq: GroqConfig,
    /// Gemini configuration (image OCR and video summaries)
    pub gemini: GeminiConfig,
    /// YouTube metadata/transcript endpoints
    pub youtube: YoutubeConfig,
    /// Per-user daily quotas
    pub quotas: QuotaConfig,
    /// Admin bootstrap
    pub auth: AuthConfig,
    /// Background processing
    pub processing: ProcessingConfig,
}

impl DashboardConfig {
    /// Load configuration: optional TOML file from `DASHBOARD_CONFIG`, then environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("DASHBOARD_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("HOST") {
            self.server.host = host;
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Ok(path) = std::env::var("DATABASE_PATH") {
            self.storage.database_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("UPLOAD_DIR") {
            self.storage.upload_dir = PathBuf::from(dir);
        }
        if let Ok(key) = std::env::var("GROQ_API_KEY") {
            self.groq.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            self.gemini.api_key = Some(key);
        }
        if let Ok(email) = std::env::var("ADMIN_EMAIL") {
            self.auth.admin_email = email;
        }
        if let Ok(token) = std::env::var("ADMIN_TOKEN") {
            self.auth.admin_token = Some(token);
        }
        if let Ok(password) = std::env::var("ADMIN_PASSWORD") {
            self.auth.admin_password = Some(password);
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be positive".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be positive".to_string()));
        }
        if self.processing.workers == Some(0) {
            return Err(Error::Config("processing.workers must be positive".to_string()));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Maximum accepted upload size in bytes (default: 10MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            max_upload_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Root directory for uploaded files (one subdirectory per user)
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dashboard-api");

        Self {
            database_path: data_dir.join("dashboard.db"),
            upload_dir: data_dir.join("uploads"),
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive windows in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Chunk selection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks sent to the LLM as context
    pub top_k: usize,
    /// Maximum question length in characters
    pub max_question_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_question_chars: 500,
        }
    }
}

/// Groq (OpenAI-compatible) chat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroqConfig {
    /// API base URL
    pub base_url: String,
    /// Chat model
    pub model: String,
    /// API key (usually from GROQ_API_KEY)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens in the answer
    pub max_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key: None,
            temperature: 0.3,
            max_tokens: 1024,
            timeout_secs: 60,
        }
    }
}

/// Gemini configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// Generative Language API base URL
    pub base_url: String,
    /// Multimodal model used for OCR and summaries
    pub model: String,
    /// API key (usually from GEMINI_API_KEY)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

/// YouTube endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeConfig {
    /// oEmbed proxy used for titles
    pub noembed_url: String,
    /// Caption track endpoint
    pub timedtext_url: String,
    /// Caption language
    pub language: String,
    /// Transcripts longer than this are truncated before summarization
    pub max_transcript_chars: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            noembed_url: "https://noembed.com".to_string(),
            timedtext_url: "https://www.youtube.com".to_string(),
            language: "en".to_string(),
            max_transcript_chars: 30_000,
            timeout_secs: 30,
        }
    }
}

/// Per-user daily quotas
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Video summaries per user per UTC day
    pub daily_summaries: u32,
    /// Document questions per user per UTC day (None = unlimited)
    pub daily_questions: Option<u32>,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_summaries: 10,
            daily_questions: None,
        }
    }
}

/// Admin bootstrap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Email of the seeded admin account
    pub admin_email: String,
    /// Display name of the seeded admin account
    pub admin_name: String,
    /// API token of the seeded admin (generated at first start when absent)
    #[serde(skip_serializing)]
    pub admin_token: Option<String>,
    /// Password of the seeded admin; without one the admin signs in with the token only
    #[serde(skip_serializing)]
    pub admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_email: "admin@dashboard.com".to_string(),
            admin_name: "Admin".to_string(),
            admin_token: None,
            admin_password: None,
        }
    }
}

/// Background processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of documents processed concurrently (default: CPU count, max 4)
    pub workers: Option<usize>,
    /// Job channel capacity
    pub queue_capacity: usize,
    /// Timeout for processing a single document in seconds
    pub document_timeout_secs: u64,
    /// How long finished job progress stays visible in seconds
    pub job_retention_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: None,
            queue_capacity: 1000,
            document_timeout_secs: 300, // 5 minutes
            job_retention_secs: 3600,
        }
    }
}

impl ProcessingConfig {
    /// Effective worker count
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| num_cpus::get().min(4)).max(1)
    }
}
