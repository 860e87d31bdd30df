use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::IngestResult;
use crate::types::SourceType;

/// Normalized article as it comes off a feed, before persistence.
#[derive(Debug, Clone)]
pub struct ArticleDraft {
    /// Dedup key within the source (entry id, falling back to the link).
    pub external_id: String,
    pub title: String,
    pub summary: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Fetch seam for the ingestion adapter. One call per source; a failure
/// here is the caller's signal to bump the source's error counter.
///
/// Implementations must return either a complete list of well-formed
/// drafts or an error, never a partial page.
#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        source_type: SourceType,
        max_items: usize,
    ) -> IngestResult<Vec<ArticleDraft>>;
}
