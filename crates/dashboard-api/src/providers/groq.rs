//! Groq chat completions (OpenAI-compatible API)

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::llm::{ChatProvider, ChatRequest};
use crate::config::GroqConfig;
use crate::error::{Error, Result};

/// Client for `POST {base_url}/chat/completions`
pub struct GroqClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GroqClient {
    pub fn new(config: &GroqConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("dashboard-api/groq")
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatProvider for GroqClient {
    async fn complete(&self, request: &ChatRequest) -> Result<Option<String>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Config("GROQ_API_KEY is not configured".to_string()))?;

        let body = CompletionRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &request.system,
                },
                Message {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Groq request failed: {}", e);
                Error::upstream("Failed to get answer from AI. Please try again.")
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Groq API error ({}): {}", status, body);

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(Error::UpstreamRateLimited(
                    "Rate limit reached. Please try again in a moment.".to_string(),
                ));
            }
            return Err(Error::upstream("Failed to get answer from AI. Please try again."));
        }

        let completion: CompletionResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Groq response: {}", e);
            Error::upstream("Failed to get answer from AI. Please try again.")
        })?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.is_empty()))
    }

    fn name(&self) -> &str {
        "groq"
    }
}
