//! YouTube URL parsing and video metadata

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Title used when the oEmbed lookup fails
pub const UNTITLED_VIDEO: &str = "Untitled Video";

fn id_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"youtube\.com/watch\?v=([a-zA-Z0-9_-]{11})",
            r"youtu\.be/([a-zA-Z0-9_-]{11})",
            r"youtube\.com/embed/([a-zA-Z0-9_-]{11})",
            r"youtube\.com/shorts/([a-zA-Z0-9_-]{11})",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Pull the 11-character video id out of a watch, short-link, embed or shorts URL
pub fn extract_video_id(url: &str) -> Option<String> {
    id_patterns()
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Standard thumbnail location for a video
pub fn thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{}/hqdefault.jpg", video_id)
}

/// Title and thumbnail of a video
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoMetadata {
    pub title: String,
    pub thumbnail_url: String,
}

impl VideoMetadata {
    pub fn new(video_id: &str, title: Option<String>) -> Self {
        Self {
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNTITLED_VIDEO.to_string()),
            thumbnail_url: thumbnail_url(video_id),
        }
    }
}
