use anyhow::{anyhow, Result};
use serde::Serialize;
use tracing::debug;

use super::types::*;

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

pub(crate) struct OpenAiClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
            base_url: OPENAI_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// POST a JSON body, surfacing non-success statuses with the error body.
    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(anyhow!("OpenAI API error ({status}): {body}"));
        }
        Ok(response)
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        debug!(model = %request.model, "OpenAI chat request");
        let response = self.post_json("/chat/completions", request).await?;
        Ok(response.json().await?)
    }

    /// Run a schema-constrained completion and return the raw JSON string.
    pub async fn structured_output(&self, request: &StructuredRequest) -> Result<String> {
        debug!(model = %request.model, "OpenAI structured output request");
        let parsed: ChatResponse = self
            .post_json("/chat/completions", request)
            .await?
            .json()
            .await?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("No content in OpenAI structured response"))
    }

    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let mut rows = self.embed_batch(model, &[text.to_string()]).await?;
        rows.pop()
            .ok_or_else(|| anyhow!("No embedding in OpenAI response"))
    }

    pub async fn embed_batch(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(model = %model, count = texts.len(), "OpenAI embedding request");

        let body = serde_json::json!({
            "model": model,
            "input": texts,
        });
        let parsed: EmbeddingResponse = self.post_json("/embeddings", &body).await?.json().await?;

        if parsed.data.len() != texts.len() {
            return Err(anyhow!(
                "Embedding count mismatch: sent {}, got {}",
                texts.len(),
                parsed.data.len()
            ));
        }

        // The API does not guarantee input order.
        let mut rows = parsed.data;
        rows.sort_by_key(|r| r.index);
        Ok(rows.into_iter().map(|r| r.embedding).collect())
    }
}
