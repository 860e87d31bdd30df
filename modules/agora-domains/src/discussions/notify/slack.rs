use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use agora_core::deps::AnnounceBackend;

/// Slack incoming webhook announcement backend.
pub struct SlackWebhook {
    webhook_url: String,
    http: reqwest::Client,
}

impl SlackWebhook {
    pub fn new(webhook_url: String, http: reqwest::Client) -> Self {
        Self { webhook_url, http }
    }
}

#[async_trait]
impl AnnounceBackend for SlackWebhook {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn send(&self, message: &str) -> anyhow::Result<()> {
        let payload = json!({
            "text": message,
            "unfurl_links": false,
        });

        let resp = self
            .http
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Slack webhook returned non-success");
            anyhow::bail!("Slack webhook returned {status}");
        }

        Ok(())
    }
}
