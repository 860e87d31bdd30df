use anyhow::Result;

/// Application configuration loaded from environment variables.
/// Contains only secrets and env-specific values; thresholds, models,
/// and seed sources live in the TOML FileConfig.
///
/// Provider keys are optional on purpose: a missing key means the pipeline
/// runs in degraded mode (heuristic scores, singleton clusters), not that
/// startup fails.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Database
    pub database_url: String,

    // AI / LLM
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub anthropic_api_key: Option<String>,

    // Announcements
    pub slack_webhook_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")?,
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            openai_base_url: std::env::var("OPENAI_BASE_URL").ok(),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            slack_webhook_url: std::env::var("SLACK_WEBHOOK_URL").ok(),
        };

        config.log_keys();
        Ok(config)
    }

    fn log_keys(&self) {
        fn preview(val: &str) -> String {
            let n = val.len().min(5);
            format!("{}...({} chars)", &val[..n], val.len())
        }
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => preview(v),
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  OPENAI_API_KEY: {}", preview_opt(&self.openai_api_key));
        tracing::info!("  OPENAI_BASE_URL: {}", preview_opt(&self.openai_base_url));
        tracing::info!(
            "  ANTHROPIC_API_KEY: {}",
            preview_opt(&self.anthropic_api_key)
        );
        tracing::info!(
            "  SLACK_WEBHOOK_URL: {}",
            preview_opt(&self.slack_webhook_url)
        );
    }
}
