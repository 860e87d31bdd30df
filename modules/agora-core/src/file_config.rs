use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// TOML-backed configuration loaded from disk.
/// Secrets (API keys, DB URL) stay as env vars.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub pipeline: PipelineConfig,
    pub clustering: ClusteringConfig,
    pub auto_publish: AutoPublishConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub sources: Vec<SeedSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Minutes a fresh topic sits before it becomes eligible for scoring.
    pub hold_minutes: i64,
    /// Max topics advanced per hold-window sweep.
    pub sweep_batch_size: i64,
    /// Max items accepted from a single source fetch.
    pub max_articles_per_fetch: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusteringConfig {
    /// Cosine similarity at which two articles land in the same cluster.
    pub similarity_threshold: f64,
    /// Cosine similarity at which a candidate topic is "the same story"
    /// as a recent topic.
    pub topic_dedup_threshold: f64,
    /// Cosine similarity against recent discussion titles at publish time.
    pub discussion_dedup_threshold: f64,
    /// Articles scoring at or above this are excluded from clustering.
    pub sensationalism_cutoff: f64,
    /// Max unclaimed articles pulled into one clustering pass.
    pub batch_size: i64,
    /// Max ANN candidates examined per dedup check.
    pub candidate_limit: i64,
    /// Days of topic/discussion history consulted for dedup.
    pub dedup_window_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutoPublishConfig {
    pub enabled: bool,
    /// Reputation at which a non-wire source counts as an anchor.
    pub min_reputation: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    pub scoring: String,
    pub statements: String,
    pub embedding: String,
}

/// Source registry entry applied idempotently by `seed-sources`.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedSource {
    pub name: String,
    pub url: String,
    #[serde(default = "default_source_type")]
    pub source_type: String,
    #[serde(default = "default_reputation")]
    pub reputation_score: f64,
    #[serde(default)]
    pub political_leaning: Option<f64>,
    #[serde(default = "default_geo_scope")]
    pub geo_scope: String,
}

fn default_source_type() -> String {
    "rss".to_string()
}

fn default_reputation() -> f64 {
    0.5
}

fn default_geo_scope() -> String {
    "global".to_string()
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [pipeline]
        hold_minutes = 60
        sweep_batch_size = 25
        max_articles_per_fetch = 50

        [clustering]
        similarity_threshold = 0.7
        topic_dedup_threshold = 0.85
        discussion_dedup_threshold = 0.80
        sensationalism_cutoff = 0.7
        batch_size = 200
        candidate_limit = 50
        dedup_window_days = 30

        [auto_publish]
        enabled = true
        min_reputation = 0.85

        [models]
        scoring = "gpt-4o-mini"
        statements = "gpt-4o-mini"
        embedding = "text-embedding-3-small"

        [[sources]]
        name = "Example Wire"
        url = "https://wire.example.com/feed.xml"
        source_type = "wire"
        reputation_score = 0.9

        [[sources]]
        name = "Example Paper"
        url = "https://paper.example.com/rss"
    "#;

    #[test]
    fn parses_sample() {
        let config: FileConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.pipeline.hold_minutes, 60);
        assert_eq!(config.clustering.topic_dedup_threshold, 0.85);
        assert_eq!(config.sources.len(), 2);
    }

    #[test]
    fn seed_source_defaults() {
        let config: FileConfig = toml::from_str(SAMPLE).unwrap();
        let paper = &config.sources[1];
        assert_eq!(paper.source_type, "rss");
        assert_eq!(paper.reputation_score, 0.5);
        assert_eq!(paper.geo_scope, "global");
        assert!(paper.political_leaning.is_none());
    }

    #[test]
    fn rejects_unknown_top_level_keys() {
        let bad = format!("{SAMPLE}\n[surprise]\nx = 1\n");
        assert!(toml::from_str::<FileConfig>(&bad).is_err());
    }
}
