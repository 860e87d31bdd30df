// Test mocks for the pipeline.
//
// Three mocks matching the three trait boundaries:
// - MockFetcher (ArticleFetcher) — HashMap-based URL→drafts
// - FixedEmbedder (EmbeddingService) — deterministic hash-based vectors
// - StaticScorer (ScoringProvider) — canned scores and statements
//
// Plus a CollectingAnnouncer that records sent messages, draft/config
// builders, and `test_pool` for tests that need a real Postgres.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use agora_core::deps::{AnnounceBackend, ArticleText, EmbeddingService, ScoringProvider};
use agora_core::error::{IngestError, IngestResult};
use agora_core::file_config::{
    AutoPublishConfig, ClusteringConfig, FileConfig, ModelsConfig, PipelineConfig,
};
use agora_core::types::{SeedStatement, SourceType, TopicScores};
use agora_core::{AppConfig, ArticleDraft, ArticleFetcher, PipelineDeps};

// ---------------------------------------------------------------------------
// Test constants
// ---------------------------------------------------------------------------

/// Embedding dimension for test vectors; matches the schema's vector(1536).
pub const TEST_EMBEDDING_DIM: usize = 1536;

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// HashMap-based article fetcher. Returns `Err` for unregistered URLs.
/// Builder pattern: `.on_url()`, `.failing()`.
pub struct MockFetcher {
    pages: HashMap<String, Vec<ArticleDraft>>,
    failures: HashSet<String>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            failures: HashSet::new(),
        }
    }

    pub fn on_url(mut self, url: &str, drafts: Vec<ArticleDraft>) -> Self {
        self.pages.insert(url.to_string(), drafts);
        self
    }

    /// Make every fetch of this URL fail, as an unreachable host would.
    pub fn failing(mut self, url: &str) -> Self {
        self.failures.insert(url.to_string());
        self
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleFetcher for MockFetcher {
    async fn fetch(
        &self,
        url: &str,
        _source_type: SourceType,
        max_items: usize,
    ) -> IngestResult<Vec<ArticleDraft>> {
        if self.failures.contains(url) {
            return Err(IngestError::Parse(format!(
                "MockFetcher: forced failure for {url}"
            )));
        }
        let mut drafts = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| IngestError::Parse(format!("MockFetcher: no drafts registered for {url}")))?;
        drafts.truncate(max_items);
        Ok(drafts)
    }
}

// ---------------------------------------------------------------------------
// FixedEmbedder
// ---------------------------------------------------------------------------

/// Deterministic embedder for testing. Registered texts get exact vectors;
/// unmatched texts get a unique hash-based vector (low similarity to
/// everything else).
pub struct FixedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    dimension: usize,
}

impl FixedEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            vectors: HashMap::new(),
            dimension,
        }
    }

    /// Register a text→vector mapping for controlled similarity.
    pub fn on_text(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    /// Generate a deterministic hash-based vector for unmatched text.
    fn hash_vector(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        let mut vec = vec![0.0f32; self.dimension];
        let mut state = seed;
        for v in vec.iter_mut() {
            // Simple LCG PRNG
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            *v = ((state >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0;
        }
        // Normalize to unit vector
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vec.iter_mut() {
                *v /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl EmbeddingService for FixedEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Option<Vec<Vec<f32>>>> {
        Ok(Some(
            texts
                .iter()
                .map(|t| {
                    self.vectors
                        .get(t.as_str())
                        .cloned()
                        .unwrap_or_else(|| self.hash_vector(t))
                })
                .collect(),
        ))
    }
}

/// Basis vector helper: all zeros except 1.0 at `axis`. Two drafts sharing
/// an axis are identical to the clusterer; different axes are orthogonal.
pub fn axis_vector(axis: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; TEST_EMBEDDING_DIM];
    v[axis] = 1.0;
    v
}

// ---------------------------------------------------------------------------
// StaticScorer
// ---------------------------------------------------------------------------

/// Canned scoring provider. Every article gets the same score, every topic
/// the same `TopicScores`, every statement request the same list.
/// `.failing()` makes every call return `Err` to exercise fallbacks.
pub struct StaticScorer {
    article_score: Option<f64>,
    topic_scores: TopicScores,
    statements: Vec<SeedStatement>,
    fail: bool,
}

impl StaticScorer {
    pub fn new() -> Self {
        Self {
            article_score: Some(0.2),
            topic_scores: TopicScores::neutral(),
            statements: Vec::new(),
            fail: false,
        }
    }

    pub fn with_article_score(mut self, score: f64) -> Self {
        self.article_score = Some(score);
        self
    }

    /// Decline to score articles (`None` per entry), forcing the heuristic
    /// fallback path.
    pub fn declining(mut self) -> Self {
        self.article_score = None;
        self
    }

    pub fn with_topic_scores(mut self, scores: TopicScores) -> Self {
        self.topic_scores = scores;
        self
    }

    pub fn with_statements(mut self, statements: Vec<SeedStatement>) -> Self {
        self.statements = statements;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl Default for StaticScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScoringProvider for StaticScorer {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn score_articles(&self, articles: &[ArticleText]) -> Result<Vec<Option<f64>>> {
        if self.fail {
            bail!("StaticScorer: forced failure");
        }
        Ok(vec![self.article_score; articles.len()])
    }

    async fn score_topic(&self, _titles: &[String]) -> Result<TopicScores> {
        if self.fail {
            bail!("StaticScorer: forced failure");
        }
        Ok(self.topic_scores.clone())
    }

    async fn seed_statements(
        &self,
        _title: &str,
        _description: &str,
    ) -> Result<Vec<SeedStatement>> {
        if self.fail {
            bail!("StaticScorer: forced failure");
        }
        Ok(self.statements.clone())
    }
}

// ---------------------------------------------------------------------------
// CollectingAnnouncer
// ---------------------------------------------------------------------------

/// Announcement backend that records every message it is handed.
pub struct CollectingAnnouncer {
    messages: Mutex<Vec<String>>,
}

impl CollectingAnnouncer {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Default for CollectingAnnouncer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnnounceBackend for CollectingAnnouncer {
    fn name(&self) -> &'static str {
        "collecting"
    }

    async fn send(&self, message: &str) -> Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Create an ArticleDraft with sensible filler around an id and title.
pub fn draft(external_id: &str, title: &str) -> ArticleDraft {
    ArticleDraft {
        external_id: external_id.to_string(),
        title: title.to_string(),
        summary: format!("Summary of {title}."),
        url: format!("https://news.example.com/{external_id}"),
        published_at: Some(Utc::now()),
    }
}

/// FileConfig with the thresholds the tests assume. Auto-publish starts
/// disabled; tests that exercise it flip the flag on their own copy.
pub fn test_file_config() -> FileConfig {
    FileConfig {
        pipeline: PipelineConfig {
            hold_minutes: 60,
            sweep_batch_size: 25,
            max_articles_per_fetch: 50,
        },
        clustering: ClusteringConfig {
            similarity_threshold: 0.7,
            topic_dedup_threshold: 0.85,
            discussion_dedup_threshold: 0.80,
            sensationalism_cutoff: 0.7,
            batch_size: 200,
            candidate_limit: 50,
            dedup_window_days: 30,
        },
        auto_publish: AutoPublishConfig {
            enabled: false,
            min_reputation: 0.85,
        },
        models: ModelsConfig {
            scoring: "test-scoring".to_string(),
            statements: "test-statements".to_string(),
            embedding: "test-embedding".to_string(),
        },
        sources: Vec::new(),
    }
}

pub fn test_app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".to_string(),
        openai_api_key: None,
        openai_base_url: None,
        anthropic_api_key: None,
        slack_webhook_url: None,
    }
}

/// PipelineDeps wired entirely to mocks. Fields are public; tests swap in
/// their own fetcher, embedder, scorer, or announcers as needed.
pub fn test_deps(pool: PgPool) -> PipelineDeps {
    PipelineDeps::new(
        pool,
        reqwest::Client::new(),
        Arc::new(MockFetcher::new()),
        Arc::new(FixedEmbedder::new(TEST_EMBEDDING_DIM)),
        Arc::new(StaticScorer::new()),
        Vec::new(),
        test_app_config(),
        Arc::new(test_file_config()),
    )
}

/// Connect to the database named by `DATABASE_TEST_URL` and run the
/// migrations. Returns `None` when the variable is not set, which the
/// integration tests treat as "skip".
pub async fn test_pool() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("connect to DATABASE_TEST_URL");
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    Some(pool)
}

// ---------------------------------------------------------------------------
// Mock self-tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine_similarity;

    #[tokio::test]
    async fn mock_fetcher_returns_registered_drafts() {
        let fetcher = MockFetcher::new().on_url(
            "https://news.example.com/feed",
            vec![draft("a-1", "First"), draft("a-2", "Second")],
        );
        let drafts = fetcher
            .fetch("https://news.example.com/feed", SourceType::Rss, 10)
            .await
            .unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].external_id, "a-1");
    }

    #[tokio::test]
    async fn mock_fetcher_honors_max_items() {
        let fetcher = MockFetcher::new().on_url(
            "https://news.example.com/feed",
            vec![draft("a-1", "First"), draft("a-2", "Second")],
        );
        let drafts = fetcher
            .fetch("https://news.example.com/feed", SourceType::Rss, 1)
            .await
            .unwrap();
        assert_eq!(drafts.len(), 1);
    }

    #[tokio::test]
    async fn mock_fetcher_errors_for_unknown_and_forced() {
        let fetcher = MockFetcher::new().failing("https://down.example.com/feed");
        assert!(fetcher
            .fetch("https://unknown.example.com/feed", SourceType::Rss, 10)
            .await
            .is_err());
        assert!(fetcher
            .fetch("https://down.example.com/feed", SourceType::Rss, 10)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn fixed_embedder_is_deterministic_and_distinct() {
        let embedder = FixedEmbedder::new(TEST_EMBEDDING_DIM);
        let texts = vec!["alpha".to_string(), "beta".to_string(), "alpha".to_string()];
        let vectors = embedder.embed_batch(&texts).await.unwrap().unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0], vectors[2]);
        let cross = cosine_similarity(&vectors[0], &vectors[1]);
        assert!(cross.abs() < 0.3, "unrelated texts too similar: {cross}");
    }

    #[tokio::test]
    async fn fixed_embedder_prefers_registered_vectors() {
        let embedder =
            FixedEmbedder::new(TEST_EMBEDDING_DIM).on_text("pinned", axis_vector(0));
        let vectors = embedder
            .embed_batch(&["pinned".to_string()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vectors[0], axis_vector(0));
    }

    #[tokio::test]
    async fn static_scorer_failing_errors_everywhere() {
        let scorer = StaticScorer::new().failing();
        assert!(scorer.score_articles(&[]).await.is_err());
        assert!(scorer.score_topic(&[]).await.is_err());
        assert!(scorer.seed_statements("t", "d").await.is_err());
    }

    #[tokio::test]
    async fn collecting_announcer_records_messages() {
        let announcer = CollectingAnnouncer::new();
        announcer.send("hello").await.unwrap();
        announcer.send("world").await.unwrap();
        assert_eq!(announcer.messages(), vec!["hello", "world"]);
    }
}
