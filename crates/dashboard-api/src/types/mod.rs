//! Core types for users, documents, chunks and summaries

pub mod document;
pub mod summary;
pub mod user;

pub use document::{Chunk, Document, DocumentDetails, DocumentStatus, DocumentType, ImageFormat};
pub use summary::{SummaryStats, TopUser, VideoSummary};
pub use user::{Role, User, UserStats, UserStatus};

use serde::Serialize;

/// A record joined with its owner's name and email (admin listings)
#[derive(Debug, Clone, Serialize)]
pub struct WithOwner<T> {
    #[serde(flatten)]
    pub item: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
}

impl<T> WithOwner<T> {
    /// Wrap a record without owner details
    pub fn bare(item: T) -> Self {
        Self {
            item,
            user_name: None,
            user_email: None,
        }
    }
}
