//! Video metadata and caption retrieval

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::video::VideoMetadata;
use crate::config::YoutubeConfig;
use crate::error::{Error, Result};

/// Message returned when a video has no usable captions
pub const NO_TRANSCRIPT: &str =
    "No captions/transcript available for this video. The video may not have subtitles enabled.";

/// Where video details come from
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Title and thumbnail. Never fails; unknown titles become "Untitled Video".
    async fn metadata(&self, video_id: &str) -> VideoMetadata;

    /// Caption text joined with spaces. `Error::Unprocessable` when none is available.
    async fn transcript(&self, video_id: &str) -> Result<String>;
}

/// noembed.com for titles, YouTube timedtext for captions
pub struct YouTubeClient {
    http: Client,
    noembed_url: String,
    timedtext_url: String,
    language: String,
}

#[derive(Deserialize)]
struct OEmbedResponse {
    #[serde(default)]
    title: Option<String>,
}

impl YouTubeClient {
    pub fn new(config: &YoutubeConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("dashboard-api/youtube")
            .build()?;

        Ok(Self {
            http,
            noembed_url: config.noembed_url.trim_end_matches('/').to_string(),
            timedtext_url: config.timedtext_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
        })
    }

    async fn fetch_title(&self, video_id: &str) -> Result<Option<String>> {
        let watch_url = format!("https://www.youtube.com/watch?v={}", video_id);
        let response: OEmbedResponse = self
            .http
            .get(format!("{}/embed", self.noembed_url))
            .query(&[("url", watch_url.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.title)
    }

    async fn fetch_captions(&self, video_id: &str) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/api/timedtext", self.timedtext_url))
            .query(&[("lang", self.language.as_str()), ("v", video_id)])
            .send()
            .await?
            .error_for_status()?;

        let xml = response.text().await?;
        Ok(parse_timedtext(&xml))
    }
}

#[async_trait]
impl VideoSource for YouTubeClient {
    async fn metadata(&self, video_id: &str) -> VideoMetadata {
        let title = match self.fetch_title(video_id).await {
            Ok(title) => title,
            Err(e) => {
                tracing::warn!("Title lookup failed for {}: {}", video_id, e);
                None
            }
        };
        VideoMetadata::new(video_id, title)
    }

    async fn transcript(&self, video_id: &str) -> Result<String> {
        match self.fetch_captions(video_id).await {
            Ok(text) if !text.trim().is_empty() => Ok(text),
            Ok(_) => Err(Error::Unprocessable(NO_TRANSCRIPT.to_string())),
            Err(e) => {
                tracing::warn!("Caption fetch failed for {}: {}", video_id, e);
                Err(Error::Unprocessable(NO_TRANSCRIPT.to_string()))
            }
        }
    }
}

/// Join the `<text>` elements of a timedtext document
pub fn parse_timedtext(xml: &str) -> String {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut segments = Vec::new();
    let mut in_text_element = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                in_text_element = e.local_name().as_ref() == b"text";
            }
            Ok(Event::Text(e)) => {
                if in_text_element {
                    if let Ok(text) = e.unescape() {
                        // Caption text is HTML-escaped inside the XML escaping
                        let decoded = quick_xml::escape::unescape(&text)
                            .map(|t| t.into_owned())
                            .unwrap_or_else(|_| text.to_string());
                        let line = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
                        if !line.is_empty() {
                            segments.push(line);
                        }
                    }
                }
            }
            Ok(Event::End(_)) => in_text_element = false,
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!("Stopped reading timedtext at {}: {}", reader.buffer_position(), e);
                break;
            }
            _ => {}
        }
    }

    segments.join(" ")
}
