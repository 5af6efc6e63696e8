//! Video summarization with per-user daily quota

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::source::VideoSource;
use super::video::extract_video_id;
use crate::error::{Error, Result};
use crate::generation::prompt::summary_prompt;
use crate::providers::TextGenerator;
use crate::storage::{Database, QuotaDecision, QuotaKind};
use crate::types::{SummaryStats, User, VideoSummary};

/// Marker appended to transcripts cut for length
pub const TRUNCATION_MARKER: &str = "\n\n[Transcript truncated for processing]";

/// A stored summary and the caller's remaining quota for today
#[derive(Debug, Clone, Serialize)]
pub struct SummaryCreated {
    pub summary: VideoSummary,
    pub remaining: u32,
}

/// Fetches captions, asks the generator for study notes, stores the result
pub struct SummaryService {
    database: Arc<Database>,
    videos: Arc<dyn VideoSource>,
    generator: Arc<dyn TextGenerator>,
    daily_limit: u32,
    max_transcript_chars: usize,
}

impl SummaryService {
    pub fn new(
        database: Arc<Database>,
        videos: Arc<dyn VideoSource>,
        generator: Arc<dyn TextGenerator>,
        daily_limit: u32,
        max_transcript_chars: usize,
    ) -> Self {
        Self {
            database,
            videos,
            generator,
            daily_limit,
            max_transcript_chars,
        }
    }

    /// Summarize a video for `user`.
    ///
    /// One unit of the daily quota is reserved up front and given back if anything after
    /// the reservation fails.
    pub async fn summarize(&self, user: &User, youtube_url: &str) -> Result<SummaryCreated> {
        let youtube_url = youtube_url.trim();
        if youtube_url.is_empty() {
            return Err(Error::validation("YouTube URL is required"));
        }

        let video_id = extract_video_id(youtube_url).ok_or_else(|| {
            Error::validation(
                "Invalid YouTube URL. Please provide a valid youtube.com or youtu.be link.",
            )
        })?;

        let today = Utc::now().date_naive();
        let remaining = match self.database.try_consume_quota(
            user.id,
            QuotaKind::Summary,
            today,
            self.daily_limit,
        )? {
            QuotaDecision::Granted { remaining } => remaining,
            QuotaDecision::Exhausted => {
                return Err(Error::RateLimited {
                    message: format!(
                        "Daily limit reached ({} summaries/day). Try again tomorrow.",
                        self.daily_limit
                    ),
                    remaining: 0,
                })
            }
        };

        match self.create(user.id, youtube_url, &video_id).await {
            Ok(summary) => Ok(SummaryCreated { summary, remaining }),
            Err(e) => {
                self.refund(user.id, today);
                Err(e)
            }
        }
    }

    async fn create(&self, user_id: Uuid, youtube_url: &str, video_id: &str) -> Result<VideoSummary> {
        let meta = self.videos.metadata(video_id).await;
        let transcript = self.videos.transcript(video_id).await?;
        let transcript = truncate_transcript(&transcript, self.max_transcript_chars);

        tracing::info!(
            "Summarizing video {} ({} transcript chars)",
            video_id,
            transcript.len()
        );
        let notes = self.generator.generate(&summary_prompt(&transcript)).await?;

        let summary = VideoSummary {
            id: Uuid::new_v4(),
            user_id,
            youtube_url: youtube_url.to_string(),
            video_id: video_id.to_string(),
            summary_text: format!("### Title: {}\n\n{}", meta.title, notes.trim()),
            video_title: meta.title,
            thumbnail_url: meta.thumbnail_url,
            created_at: Utc::now(),
        };
        self.database.insert_summary(&summary)?;

        Ok(summary)
    }

    fn refund(&self, user_id: Uuid, day: NaiveDate) {
        if let Err(e) = self.database.release_quota(user_id, QuotaKind::Summary, day) {
            tracing::error!("Failed to release summary quota for {}: {}", user_id, e);
        }
    }

    /// Admin totals, "today" being the current UTC day
    pub fn stats(&self) -> Result<SummaryStats> {
        let day_start = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc())
            .ok_or_else(|| Error::internal("invalid day start"))?;
        self.database.summary_stats(day_start)
    }
}

/// Cut a transcript to `max_chars` characters and mark the cut
pub fn truncate_transcript(transcript: &str, max_chars: usize) -> String {
    match transcript.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &transcript[..cut], TRUNCATION_MARKER),
        None => transcript.to_string(),
    }
}
