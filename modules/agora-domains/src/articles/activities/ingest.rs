use std::collections::HashSet;

use anyhow::Result;
use tracing::{info, warn};
use uuid::Uuid;

use agora_core::fetch::ArticleDraft;
use agora_core::PipelineDeps;

use crate::articles::Article;
use crate::query_helpers::is_wrapped_unique_violation;
use crate::sources::Source;

/// Outcome of one ingestion pass.
#[derive(Debug, Default)]
pub struct IngestStats {
    pub sources_polled: usize,
    pub sources_failed: usize,
    pub articles_inserted: usize,
}

/// Fetch every active source independently and store what is new. A
/// failing source gets its error counter bumped (disabling itself after
/// enough consecutive failures) and never blocks the rest of the batch.
pub async fn fetch_all_sources(deps: &PipelineDeps) -> Result<IngestStats> {
    let sources = Source::find_active(deps.pool()).await?;
    let max_items = deps.file_config.pipeline.max_articles_per_fetch;
    let mut stats = IngestStats::default();

    for source in &sources {
        stats.sources_polled += 1;
        match deps
            .fetcher
            .fetch(&source.url, source.source_type(), max_items)
            .await
        {
            Ok(drafts) => {
                let inserted = store_drafts(source.id, &drafts, deps).await?;
                Source::record_fetch_success(source.id, deps.pool()).await?;
                if inserted > 0 {
                    info!(source = %source.name, inserted, "stored new articles");
                }
                stats.articles_inserted += inserted;
            }
            Err(e) => {
                stats.sources_failed += 1;
                let disabled = Source::record_fetch_failure(source.id, deps.pool()).await?;
                if disabled {
                    warn!(source = %source.name, error = %e, "source disabled after repeated failures");
                } else {
                    warn!(source = %source.name, error = %e, "source fetch failed");
                }
            }
        }
    }

    info!(
        polled = stats.sources_polled,
        failed = stats.sources_failed,
        inserted = stats.articles_inserted,
        "ingestion pass complete"
    );
    Ok(stats)
}

/// Store the drafts this source has not produced before. The batch insert
/// races with other processes on `(source_id, external_id)`; a uniqueness
/// violation falls back to item-by-item inserts, keeping whatever subset
/// commits.
pub async fn store_drafts(
    source_id: Uuid,
    drafts: &[ArticleDraft],
    deps: &PipelineDeps,
) -> Result<usize> {
    if drafts.is_empty() {
        return Ok(0);
    }

    let ids: Vec<String> = drafts.iter().map(|d| d.external_id.clone()).collect();
    let seen = Article::existing_external_ids(source_id, &ids, deps.pool()).await?;

    // Also drop duplicate ids within the page itself, keeping the first.
    let mut kept: HashSet<&str> = HashSet::new();
    let fresh: Vec<ArticleDraft> = drafts
        .iter()
        .filter(|d| !seen.contains(&d.external_id) && kept.insert(d.external_id.as_str()))
        .cloned()
        .collect();
    if fresh.is_empty() {
        return Ok(0);
    }

    match Article::insert_batch(source_id, &fresh, deps.pool()).await {
        Ok(rows) => Ok(rows.len()),
        Err(e) if is_wrapped_unique_violation(&e) => {
            warn!(%source_id, "concurrent insert detected, retrying item by item");
            let mut inserted = 0;
            for draft in &fresh {
                if Article::insert_ignore(source_id, draft, deps.pool())
                    .await?
                    .is_some()
                {
                    inserted += 1;
                }
            }
            Ok(inserted)
        }
        Err(e) => Err(e),
    }
}
