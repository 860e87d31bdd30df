use anyhow::{anyhow, bail, Result};
use tracing::info;
use uuid::Uuid;

use agora_core::types::{SeedStatement, TopicStatus};
use agora_core::PipelineDeps;

use crate::topics::Topic;

/// Manual review approval, `pending_review -> approved`. The transition
/// table is checked here and enforced again by the guarded UPDATE.
pub async fn approve_topic(topic_id: Uuid, reviewer: &str, deps: &PipelineDeps) -> Result<Topic> {
    let topic = Topic::find_by_id(topic_id, deps.pool())
        .await?
        .ok_or_else(|| anyhow!("topic {topic_id} not found"))?;
    if !topic.status().can_transition_to(TopicStatus::Approved) {
        bail!(
            "topic {topic_id} cannot be approved from status {}",
            topic.status()
        );
    }

    let approved = Topic::approve(topic_id, reviewer, deps.pool())
        .await?
        .ok_or_else(|| anyhow!("topic {topic_id} was updated concurrently"))?;
    info!(%topic_id, reviewer, "topic approved");
    Ok(approved)
}

/// Terminal rejection from any non-terminal status.
pub async fn discard_topic(topic_id: Uuid, reviewer: &str, deps: &PipelineDeps) -> Result<Topic> {
    let topic = Topic::find_by_id(topic_id, deps.pool())
        .await?
        .ok_or_else(|| anyhow!("topic {topic_id} not found"))?;
    if !topic.status().can_transition_to(TopicStatus::Discarded) {
        bail!(
            "topic {topic_id} cannot be discarded from status {}",
            topic.status()
        );
    }

    let discarded = Topic::discard(topic_id, reviewer, deps.pool())
        .await?
        .ok_or_else(|| anyhow!("topic {topic_id} was updated concurrently"))?;
    info!(%topic_id, reviewer, "topic discarded");
    Ok(discarded)
}

/// Fold one topic into another: move its article links, append its unseen
/// seed statements, and mark it `merged` with a back-reference. One
/// transaction; the source row is claimed first so a concurrent sweep
/// cannot publish it mid-merge.
pub async fn merge_topics(
    source_id: Uuid,
    target_id: Uuid,
    reviewer: &str,
    deps: &PipelineDeps,
) -> Result<Topic> {
    if source_id == target_id {
        bail!("cannot merge a topic into itself");
    }
    let pool = deps.pool();

    let source = Topic::find_by_id(source_id, pool)
        .await?
        .ok_or_else(|| anyhow!("topic {source_id} not found"))?;
    let target = Topic::find_by_id(target_id, pool)
        .await?
        .ok_or_else(|| anyhow!("topic {target_id} not found"))?;

    if !source.status().can_transition_to(TopicStatus::Merged) {
        bail!(
            "topic {source_id} cannot be merged from status {}",
            source.status()
        );
    }
    if matches!(target.status(), TopicStatus::Merged | TopicStatus::Discarded) {
        bail!("cannot merge into a {} topic", target.status());
    }

    let mut tx = pool.begin().await?;

    let claimed = sqlx::query_as::<_, Topic>(
        r#"
        UPDATE topics SET
            status = 'merged',
            merged_into_id = $2,
            reviewed_by = $3,
            reviewed_at = now(),
            updated_at = now()
        WHERE id = $1 AND status IN ('pending_review', 'approved')
        RETURNING *
        "#,
    )
    .bind(source_id)
    .bind(target_id)
    .bind(reviewer)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(claimed) = claimed else {
        bail!("topic {source_id} was updated concurrently");
    };

    // Move article links across, skipping ones the target already has.
    sqlx::query(
        r#"
        INSERT INTO topic_articles (topic_id, article_id)
        SELECT $1, article_id FROM topic_articles WHERE topic_id = $2
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(target_id)
    .bind(source_id)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM topic_articles WHERE topic_id = $1")
        .bind(source_id)
        .execute(&mut *tx)
        .await?;

    // Append the source's statements the target does not already carry.
    let target_row = sqlx::query_as::<_, Topic>("SELECT * FROM topics WHERE id = $1 FOR UPDATE")
        .bind(target_id)
        .fetch_one(&mut *tx)
        .await?;
    let mut statements = target_row.seed_statement_entries();
    let mut next_position = statements.iter().map(|s| s.position + 1).max().unwrap_or(0);
    for statement in claimed.seed_statement_entries() {
        if statements.iter().any(|s| s.content == statement.content) {
            continue;
        }
        statements.push(SeedStatement {
            content: statement.content,
            position: next_position,
        });
        next_position += 1;
    }
    sqlx::query("UPDATE topics SET seed_statements = $2, updated_at = now() WHERE id = $1")
        .bind(target_id)
        .bind(serde_json::to_value(&statements)?)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        UPDATE topics SET
            source_count = (
                SELECT COUNT(DISTINCT a.source_id)
                FROM articles a
                JOIN topic_articles ta ON ta.article_id = a.id
                WHERE ta.topic_id = topics.id
            ),
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(target_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(source = %source_id, target = %target_id, reviewer, "topics merged");

    Topic::find_by_id(target_id, pool)
        .await?
        .ok_or_else(|| anyhow!("merge target {target_id} not found after merge"))
}
