//! dashboard-api: backend for a role-based admin dashboard
//!
//! Approved users upload documents (PDF, TXT, DOCX, images) that are extracted, chunked and
//! stored in the background, then ask questions answered from the most relevant chunks. They
//! can also turn YouTube videos into study notes under a per-user daily quota. Administrators
//! approve accounts and see everything.

pub mod auth;
pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod types;
pub mod youtube;

pub use config::DashboardConfig;
pub use error::{Error, Result};
pub use server::{router, state::AppState, DashboardServer};
pub use types::{
    document::{Chunk, Document, DocumentStatus, DocumentType},
    user::{Role, User, UserStatus},
};
