//! YouTube study-notes summarizer

pub mod service;
pub mod source;
pub mod video;

pub use service::{SummaryCreated, SummaryService};
pub use source::{VideoSource, YouTubeClient};
pub use video::{extract_video_id, VideoMetadata};
