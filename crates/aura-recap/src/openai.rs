//! Chat-completions client for recap generation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RecapError, Result};
use crate::{RecapGenerator, RecapRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct RecapConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Upper bound on the whole request.
    pub timeout: Duration,
}

impl RecapConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponseRaw {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Clone)]
pub struct OpenAiRecapGenerator {
    http_client: Client,
    config: RecapConfig,
}

impl OpenAiRecapGenerator {
    pub fn new(config: RecapConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(RecapError::Config("API key is empty".into()));
        }

        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RecapError::Config(e.to_string()))?;

        Ok(Self { http_client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl RecapGenerator for OpenAiRecapGenerator {
    async fn generate(&self, request: &RecapRequest) -> Result<String> {
        let start = Instant::now();

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: request.prompt(),
            }],
            temperature: 0.9,
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Recap request failed");
                RecapError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "Recap API error");
            return Err(RecapError::Api(format!("{}: {}", status, error_text)));
        }

        let raw: ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| RecapError::Parse(e.to_string()))?;
        let recap = first_content(raw)?;

        debug!(
            model = %self.config.model,
            duration_ms = start.elapsed().as_millis(),
            "Recap generated"
        );
        Ok(recap)
    }
}

fn first_content(raw: ChatResponseRaw) -> Result<String> {
    raw.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| RecapError::Api("empty completion".into()))
}
