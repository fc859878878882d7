//! Claude Messages API client.
//!
//! Single-shot completions only: one user message in, concatenated text out.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::generator::TextGenerator;

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Whole documents come back in one response.
const MAX_TOKENS: u32 = 8192;

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

pub struct LlmClient {
    api_key: String,
    api_base: String,
    model: String,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            api_base: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// Simple single-turn text completion.
    pub async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let messages = [Message {
            role: "user".to_string(),
            content: prompt.to_string(),
        }];
        let body = serde_json::json!({
            "model": &self.model,
            "max_tokens": MAX_TOKENS,
            "system": system,
            "messages": messages,
        });

        let resp = self
            .http
            .post(format!("{}/v1/messages", self.api_base))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Failed to call Claude API")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Claude API error {status}: {body}");
        }

        let resp = resp
            .json::<ApiResponse>()
            .await
            .context("Failed to parse Claude response")?;

        if let Some(usage) = &resp.usage {
            tracing::debug!(
                model = %self.model,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                stop_reason = resp.stop_reason.as_deref().unwrap_or("-"),
                "Completion finished"
            );
        }
        if resp.stop_reason.as_deref() == Some("max_tokens") {
            tracing::warn!(model = %self.model, "Completion truncated at max_tokens");
        }

        Ok(resp
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join(""))
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate_text(&self, system: &str, prompt: &str) -> Result<String> {
        self.complete(system, prompt).await
    }
}
