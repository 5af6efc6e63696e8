//! Gemini generateContent client for image OCR and video summaries

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::llm::{TextGenerator, VisionProvider};
use crate::config::GeminiConfig;
use crate::error::{Error, Result};

/// Gemini client via the Generative Language API (API key auth)
pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("dashboard-api/gemini")
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    async fn generate_content(&self, parts: Vec<Part<'_>>) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Config("GEMINI_API_KEY is not configured".to_string()))?;

        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
        };

        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::upstream(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Gemini API error ({}): {}", status, body);

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(Error::UpstreamRateLimited(
                    "AI rate limit reached. Please try again in a moment.".to_string(),
                ));
            }
            return Err(Error::upstream(format!("Gemini generation failed ({})", status)));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream(format!("Failed to parse Gemini response: {}", e)))?;

        let text: String = generated
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::upstream("No text in Gemini response"));
        }

        Ok(text)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
struct InlineData<'a> {
    #[serde(rename = "mimeType")]
    mime_type: &'a str,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl VisionProvider for GeminiClient {
    async fn extract_text(&self, image: &[u8], mime_type: &str, instruction: &str) -> Result<String> {
        let parts = vec![
            Part::Text { text: instruction },
            Part::InlineData {
                inline_data: InlineData {
                    mime_type,
                    data: BASE64.encode(image),
                },
            },
        ];
        self.generate_content(parts).await
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_content(vec![Part::Text { text: prompt }]).await
    }
}
