use anyhow::Result;
use tracing::{error, info};

use agora_core::PipelineDeps;

use crate::discussions::activities::publish::publish_topic;
use crate::topics::Topic;

/// Reviewer recorded on automatically published topics.
pub const AUTO_REVIEWER: &str = "auto-publish";

/// Candidates examined per sweep.
const AUTO_PUBLISH_BATCH: i64 = 50;

/// Publish review-queue topics that clear the corroboration bar: at least
/// one anchor source (wire, or reputation at or above the configured
/// minimum) plus a second independent source, and no risk flag. Idempotent;
/// a topic that already gained a discussion is skipped by the candidate
/// query, and concurrent publishes resolve inside `publish_topic`.
pub async fn auto_publish_eligible(deps: &PipelineDeps) -> Result<usize> {
    if !deps.file_config.auto_publish.enabled {
        return Ok(0);
    }
    let min_reputation = deps.file_config.auto_publish.min_reputation;

    let candidates = Topic::find_auto_publish_candidates(AUTO_PUBLISH_BATCH, deps.pool()).await?;
    let mut published = 0;

    for topic in &candidates {
        let corroboration = Topic::corroboration(topic.id, min_reputation, deps.pool()).await?;
        if !corroboration.has_anchor || corroboration.distinct_sources < 2 {
            continue;
        }

        match publish_topic(topic.id, AUTO_REVIEWER, deps).await {
            Ok(outcome) if outcome.newly_published => {
                info!(
                    topic_id = %topic.id,
                    slug = %outcome.discussion.slug,
                    sources = corroboration.distinct_sources,
                    "auto-published topic"
                );
                published += 1;
            }
            // Raced with another publisher or merged into a live discussion.
            Ok(_) => {}
            Err(e) => {
                error!(topic_id = %topic.id, error = %e, "auto-publish failed");
            }
        }
    }

    if published > 0 {
        info!(published, "auto-publish sweep complete");
    }
    Ok(published)
}
