use std::fmt;

use anyhow::Result;
use tracing::info;

use agora_core::types::TopicStatus;
use agora_core::PipelineDeps;

use crate::articles::activities::{fetch_all_sources, score_unscored_articles, IngestStats};
use crate::topics::activities::{
    auto_publish_eligible, cluster_unclaimed_articles, process_held_topics, ClusterStats,
};
use crate::topics::Topic;

/// Stats from one full pipeline run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub ingest: IngestStats,
    pub articles_scored: usize,
    pub clustering: ClusterStats,
    pub topics_advanced: usize,
    pub topics_auto_published: usize,
    pub topics_pending_review: i64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sources_polled={} sources_failed={} articles_inserted={} articles_scored={} \
             articles_considered={} topics_created={} topics_extended={} topics_advanced={} \
             topics_auto_published={} topics_pending_review={}",
            self.ingest.sources_polled,
            self.ingest.sources_failed,
            self.ingest.articles_inserted,
            self.articles_scored,
            self.clustering.articles_considered,
            self.clustering.topics_created,
            self.clustering.topics_extended,
            self.topics_advanced,
            self.topics_auto_published,
            self.topics_pending_review,
        )
    }
}

/// One end-to-end pipeline pass: ingest, score, cluster, advance elapsed
/// holds, auto-publish. Each phase reads its own work off the database,
/// so a crashed run resumes wherever the data was left.
pub async fn run_pipeline(deps: &PipelineDeps, hold_minutes: i64) -> Result<RunSummary> {
    let pipeline = &deps.file_config.pipeline;
    let mut summary = RunSummary::default();

    // Phase 1: Poll every active source for new articles
    summary.ingest = fetch_all_sources(deps).await?;

    // Phase 2: Sensationalism scores for unscored articles
    summary.articles_scored = score_unscored_articles(deps).await?;

    // Phase 3: Cluster unclaimed articles into topics
    summary.clustering = cluster_unclaimed_articles(deps, hold_minutes).await?;

    // Phase 4: Advance topics whose hold window has elapsed
    summary.topics_advanced = process_held_topics(deps, pipeline.sweep_batch_size).await?;

    // Phase 5: Publish well-corroborated low-risk topics without a reviewer
    summary.topics_auto_published = auto_publish_eligible(deps).await?;

    summary.topics_pending_review =
        Topic::count_by_status(TopicStatus::PendingReview, deps.pool()).await?;

    info!("Pipeline run complete. {summary}");
    Ok(summary)
}

/// Sweep pass for schedulers that run between full pipeline runs: only
/// the hold-window advancement and auto-publish phases. Returns how many
/// topics advanced to review.
pub async fn process_held(deps: &PipelineDeps, batch_size: i64) -> Result<usize> {
    let advanced = process_held_topics(deps, batch_size).await?;
    let published = auto_publish_eligible(deps).await?;
    info!(advanced, published, "Sweep complete");
    Ok(advanced)
}
