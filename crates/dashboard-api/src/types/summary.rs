//! YouTube video summaries

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A stored study-notes summary of a video
#[derive(Debug, Clone, Serialize)]
pub struct VideoSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub youtube_url: String,
    pub video_id: String,
    pub video_title: String,
    pub thumbnail_url: String,
    pub summary_text: String,
    pub created_at: DateTime<Utc>,
}

/// Per-user summary count for the admin leaderboard
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TopUser {
    pub name: String,
    pub email: String,
    pub summary_count: usize,
}

/// Admin usage statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub total_summaries: usize,
    pub today_summaries: usize,
    pub top_users: Vec<TopUser>,
}
