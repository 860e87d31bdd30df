use anyhow::Result;
use tracing::{error, info, warn};

use agora_core::types::TopicScores;
use agora_core::PipelineDeps;

use crate::articles::Article;
use crate::scoring::heuristic::default_seed_statements;
use crate::topics::Topic;

/// Representative titles fed to the topic scoring prompt.
const TITLES_PER_TOPIC: i64 = 5;

/// Score topics whose hold window has elapsed and move them to
/// `pending_review`, oldest first. Each topic runs in its own failure
/// boundary; provider failures degrade to neutral scores and default
/// statements so the topic still reaches the review queue.
pub async fn process_held_topics(deps: &PipelineDeps, batch_size: i64) -> Result<usize> {
    let held = Topic::find_held_elapsed(batch_size, deps.pool()).await?;
    if held.is_empty() {
        return Ok(0);
    }

    let mut advanced = 0;
    for topic in &held {
        match advance_one(topic, deps).await {
            Ok(true) => advanced += 1,
            // Another process advanced this topic first.
            Ok(false) => {}
            Err(e) => {
                error!(topic_id = %topic.id, error = %e, "failed to advance held topic");
            }
        }
    }

    info!(advanced, held = held.len(), "hold-window sweep complete");
    Ok(advanced)
}

async fn advance_one(topic: &Topic, deps: &PipelineDeps) -> Result<bool> {
    let titles = Article::titles_for_topic(topic.id, TITLES_PER_TOPIC, deps.pool()).await?;

    let scores = match deps.scorer.score_topic(&titles).await {
        Ok(scores) => scores,
        Err(e) => {
            warn!(
                topic_id = %topic.id,
                provider = deps.scorer.name(),
                error = %e,
                "topic scoring failed, using neutral scores"
            );
            TopicScores::neutral()
        }
    };

    let statements = match deps
        .scorer
        .seed_statements(&topic.title, &topic.description)
        .await
    {
        Ok(statements) if !statements.is_empty() => statements,
        Ok(_) => default_seed_statements(&topic.title),
        Err(e) => {
            warn!(
                topic_id = %topic.id,
                provider = deps.scorer.name(),
                error = %e,
                "seed statement generation failed, using defaults"
            );
            default_seed_statements(&topic.title)
        }
    };

    let updated = Topic::advance_to_review(topic.id, &scores, &statements, deps.pool()).await?;
    Ok(updated.is_some())
}
