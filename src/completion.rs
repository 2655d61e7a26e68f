//! Text-completion backends.
//!
//! The engine only needs `complete(prompt) -> text`. Production uses
//! `HttpCompletionClient`; unit tests use `ScriptedCompletionClient`.

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::config::CompletionConfig;
use crate::error::CompletionError;

#[async_trait]
pub trait TextCompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// Client for a `generateContent`-style REST endpoint.
pub struct HttpCompletionClient {
    config: CompletionConfig,
    client: reqwest::Client,
}

impl HttpCompletionClient {
    pub fn new(config: CompletionConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { config, client })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl TextCompletionClient for HttpCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });

        debug!(model = %self.config.model, prompt_len = prompt.len(), "sending completion request");

        let response = self
            .client
            .post(self.url())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(self.config.timeout)
                } else {
                    CompletionError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CompletionError::Status(status.as_u16()));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CompletionError::Http(format!("invalid response body: {e}")))?;

        extract_text(&payload).ok_or(CompletionError::EmptyResponse)
    }
}

/// Pull `candidates[0].content.parts[0].text` out of a response body.
pub fn extract_text(payload: &serde_json::Value) -> Option<String> {
    payload
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
        .map(str::to_string)
        .filter(|text| !text.trim().is_empty())
}

#[cfg(test)]
pub use scripted::ScriptedCompletionClient;
