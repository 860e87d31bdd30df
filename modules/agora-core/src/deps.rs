use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::fetch::ArticleFetcher;
use crate::file_config::FileConfig;
use crate::types::{SeedStatement, TopicScores};

/// Dyn-compatible embedding seam.
///
/// `Ok(None)` means the provider is unconfigured or unavailable right now;
/// consumers degrade (singleton clusters, skipped dedup) instead of failing
/// the batch. `Err` is reserved for bugs, not provider downtime.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Option<Vec<Vec<f32>>>>;

    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>> {
        let batch = self.embed_batch(&[text.to_string()]).await?;
        Ok(batch.and_then(|mut vectors| vectors.pop()))
    }
}

/// Embedding service used when no provider is configured.
pub struct DisabledEmbedder;

#[async_trait]
impl EmbeddingService for DisabledEmbedder {
    async fn embed_batch(&self, _texts: &[String]) -> Result<Option<Vec<Vec<f32>>>> {
        Ok(None)
    }
}

/// Text pair handed to the article scoring pass.
#[derive(Debug, Clone)]
pub struct ArticleText {
    pub title: String,
    pub summary: String,
}

/// Scoring seam. The pipeline only ever sees this interface; the heuristic
/// and the LLM-backed provider both live behind it. Callers supply their
/// own fallback when a call errors.
#[async_trait]
pub trait ScoringProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Sensationalism per article, 0-1, same order as the input. `None`
    /// entries mean the provider could not score that article; the caller
    /// falls back per entry.
    async fn score_articles(&self, articles: &[ArticleText]) -> Result<Vec<Option<f64>>>;

    /// Civic/quality/audience scores for one topic, driven by a short list
    /// of representative article titles.
    async fn score_topic(&self, titles: &[String]) -> Result<TopicScores>;

    /// Initial discussion prompts for one topic.
    async fn seed_statements(&self, title: &str, description: &str)
        -> Result<Vec<SeedStatement>>;
}

/// Post-commit announcement hook. Failures are logged by the caller and
/// never affect the publish transaction.
#[async_trait]
pub trait AnnounceBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send(&self, message: &str) -> Result<()>;
}

/// Central dependency container passed through the pipeline. Constructed
/// once by the process entry point; no global state.
#[derive(Clone)]
pub struct PipelineDeps {
    pub db_pool: PgPool,
    pub http_client: reqwest::Client,
    pub fetcher: Arc<dyn ArticleFetcher>,
    pub embeddings: Arc<dyn EmbeddingService>,
    pub scorer: Arc<dyn ScoringProvider>,
    pub announcers: Vec<Arc<dyn AnnounceBackend>>,
    pub config: AppConfig,
    pub file_config: Arc<FileConfig>,
}

impl PipelineDeps {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db_pool: PgPool,
        http_client: reqwest::Client,
        fetcher: Arc<dyn ArticleFetcher>,
        embeddings: Arc<dyn EmbeddingService>,
        scorer: Arc<dyn ScoringProvider>,
        announcers: Vec<Arc<dyn AnnounceBackend>>,
        config: AppConfig,
        file_config: Arc<FileConfig>,
    ) -> Self {
        Self {
            db_pool,
            http_client,
            fetcher,
            embeddings,
            scorer,
            announcers,
            config,
            file_config,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db_pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_embedder_returns_none() {
        let embedder = DisabledEmbedder;
        let batch = embedder
            .embed_batch(&["anything".to_string()])
            .await
            .unwrap();
        assert!(batch.is_none());
        assert!(embedder.embed("anything").await.unwrap().is_none());
    }
}
