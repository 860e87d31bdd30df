use anyhow::anyhow;
use rand::Rng;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use agora_core::error::{PublishError, PublishResult};
use agora_core::types::{SeedStatement, TopicStatus};
use agora_core::PipelineDeps;

use crate::articles::Article;
use crate::discussions::Discussion;
use crate::query_helpers::violates_constraint;
use crate::similarity::cosine_similarity;
use crate::topics::Topic;

/// Slug derivation attempts before the publish fails.
const SLUG_ATTEMPTS: u32 = 3;
/// Base slug length cap.
const SLUG_MAX_CHARS: usize = 80;

#[derive(Debug)]
pub struct PublishOutcome {
    pub discussion: Discussion,
    /// False when the call resolved to a discussion that already existed,
    /// through idempotence, a duplicate title, or a lost race.
    pub newly_published: bool,
}

/// Publish one topic as a discussion with its seed statements.
///
/// Idempotent: a topic that already has a discussion returns it untouched.
/// A recent discussion with a near-identical title absorbs the topic
/// instead (marked `merged`). Otherwise the discussion, its provenance
/// links, the pre-approved statements, and the topic's `published` stamp
/// all commit in one transaction; a slug collision rolls back and retries
/// with a random suffix. Announcements run after commit and never fail
/// the publish.
pub async fn publish_topic(
    topic_id: Uuid,
    reviewer: &str,
    deps: &PipelineDeps,
) -> PublishResult<PublishOutcome> {
    let pool = deps.pool();

    let topic = Topic::find_by_id(topic_id, pool)
        .await?
        .ok_or_else(|| anyhow!("topic {topic_id} not found"))?;

    if let Some(discussion_id) = topic.discussion_id {
        let existing = Discussion::find_by_id(discussion_id, pool)
            .await?
            .ok_or_else(|| anyhow!("discussion {discussion_id} missing for topic {topic_id}"))?;
        return Ok(PublishOutcome {
            discussion: existing,
            newly_published: false,
        });
    }

    let status = topic.status();
    if !matches!(status, TopicStatus::PendingReview | TopicStatus::Approved) {
        return Err(PublishError::InvalidStatus(topic_id, status));
    }

    // A live discussion already covering this story absorbs the topic.
    if let Some(existing) = find_duplicate_discussion(&topic, deps).await? {
        if merge_into_discussion(&topic, &existing, reviewer, pool).await? {
            info!(
                %topic_id,
                discussion_id = %existing.id,
                slug = %existing.slug,
                "topic folded into existing discussion"
            );
            return Ok(PublishOutcome {
                discussion: existing,
                newly_published: false,
            });
        }
        return resolve_concurrent(topic_id, pool).await;
    }

    let geo_scopes = Article::source_geo_scopes_for_topic(topic.id, pool).await?;
    let (geo_scope, country) = majority_scope(&geo_scopes);
    let statements = topic.seed_statement_entries();

    for attempt in 0..SLUG_ATTEMPTS {
        let slug = if attempt == 0 {
            slugify(&topic.title)
        } else {
            format!("{}-{}", slugify(&topic.title), random_suffix())
        };

        match try_publish_once(
            &topic,
            &slug,
            &geo_scope,
            country.as_deref(),
            &statements,
            reviewer,
            pool,
        )
        .await
        {
            Ok(Some(discussion)) => {
                info!(
                    %topic_id,
                    discussion_id = %discussion.id,
                    slug = %discussion.slug,
                    statements = statements.len(),
                    "topic published"
                );
                announce(&discussion, deps).await;
                return Ok(PublishOutcome {
                    discussion,
                    newly_published: true,
                });
            }
            Ok(None) => return resolve_concurrent(topic_id, pool).await,
            Err(PublishError::Db(e)) if violates_constraint(&e, "discussions_slug_key") => {
                warn!(%topic_id, slug, "slug taken, retrying with suffix");
                continue;
            }
            Err(e) => return Err(e),
        }
    }

    Err(PublishError::SlugExhausted {
        title: topic.title,
        attempts: SLUG_ATTEMPTS,
    })
}

/// One atomic publish attempt. Returns None when the guarded topic claim
/// finds the topic already taken by another process; the whole attempt
/// rolls back in that case.
async fn try_publish_once(
    topic: &Topic,
    slug: &str,
    geo_scope: &str,
    country: Option<&str>,
    statements: &[SeedStatement],
    reviewer: &str,
    pool: &PgPool,
) -> PublishResult<Option<Discussion>> {
    let mut tx = pool.begin().await?;

    let discussion = sqlx::query_as::<_, Discussion>(
        r#"
        INSERT INTO discussions (slug, title, description, geo_scope, country, topic_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(slug)
    .bind(&topic.title)
    .bind(&topic.description)
    .bind(geo_scope)
    .bind(country)
    .bind(topic.id)
    .fetch_one(&mut *tx)
    .await?;

    let claimed = sqlx::query_scalar::<_, Uuid>(
        r#"
        UPDATE topics SET
            status = 'published',
            discussion_id = $2,
            reviewed_by = $3,
            reviewed_at = now(),
            updated_at = now()
        WHERE id = $1
          AND status IN ('pending_review', 'approved')
          AND discussion_id IS NULL
        RETURNING id
        "#,
    )
    .bind(topic.id)
    .bind(discussion.id)
    .bind(reviewer)
    .fetch_optional(&mut *tx)
    .await?;
    if claimed.is_none() {
        tx.rollback().await?;
        return Ok(None);
    }

    sqlx::query(
        r#"
        INSERT INTO discussion_articles (discussion_id, article_id)
        SELECT $1, article_id FROM topic_articles WHERE topic_id = $2
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(discussion.id)
    .bind(topic.id)
    .execute(&mut *tx)
    .await?;

    for statement in statements {
        sqlx::query(
            r#"
            INSERT INTO statements (discussion_id, content, position, approved)
            VALUES ($1, $2, $3, TRUE)
            "#,
        )
        .bind(discussion.id)
        .bind(&statement.content)
        .bind(statement.position)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(Some(discussion))
}

/// Compare the topic title against recent discussion titles; above the
/// threshold the story already has a live conversation. Skipped entirely
/// when no embedder is configured.
async fn find_duplicate_discussion(
    topic: &Topic,
    deps: &PipelineDeps,
) -> PublishResult<Option<Discussion>> {
    let clustering = &deps.file_config.clustering;
    let recent = Discussion::find_recent(clustering.dedup_window_days, deps.pool()).await?;
    if recent.is_empty() {
        return Ok(None);
    }

    let mut texts: Vec<String> = Vec::with_capacity(recent.len() + 1);
    texts.push(topic.title.clone());
    texts.extend(recent.iter().map(|d| d.title.clone()));

    let Some(vectors) = deps.embeddings.embed_batch(&texts).await? else {
        return Ok(None);
    };
    if vectors.len() != texts.len() {
        return Ok(None);
    }

    let topic_vector = &vectors[0];
    for (discussion, vector) in recent.iter().zip(&vectors[1..]) {
        let similarity = cosine_similarity(topic_vector, vector);
        if similarity >= clustering.discussion_dedup_threshold {
            return Ok(Some(discussion.clone()));
        }
    }
    Ok(None)
}

/// Fold the topic into an already-published discussion: provenance links
/// move over and the topic is marked `merged` pointing at the
/// discussion's topic when it has one. Returns false on a lost claim.
async fn merge_into_discussion(
    topic: &Topic,
    discussion: &Discussion,
    reviewer: &str,
    pool: &PgPool,
) -> PublishResult<bool> {
    let mut tx = pool.begin().await?;

    let claimed = sqlx::query_scalar::<_, Uuid>(
        r#"
        UPDATE topics SET
            status = 'merged',
            merged_into_id = $2,
            reviewed_by = $3,
            reviewed_at = now(),
            updated_at = now()
        WHERE id = $1 AND status IN ('pending_review', 'approved')
        RETURNING id
        "#,
    )
    .bind(topic.id)
    .bind(discussion.topic_id)
    .bind(reviewer)
    .fetch_optional(&mut *tx)
    .await?;
    if claimed.is_none() {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO discussion_articles (discussion_id, article_id)
        SELECT $1, article_id FROM topic_articles WHERE topic_id = $2
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(discussion.id)
    .bind(topic.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// The topic changed under us. If another process published it, hand back
/// that discussion; anything else is a real conflict.
async fn resolve_concurrent(topic_id: Uuid, pool: &PgPool) -> PublishResult<PublishOutcome> {
    let reloaded = Topic::find_by_id(topic_id, pool)
        .await?
        .ok_or_else(|| anyhow!("topic {topic_id} not found"))?;
    if let Some(discussion_id) = reloaded.discussion_id {
        let existing = Discussion::find_by_id(discussion_id, pool)
            .await?
            .ok_or_else(|| anyhow!("discussion {discussion_id} missing for topic {topic_id}"))?;
        return Ok(PublishOutcome {
            discussion: existing,
            newly_published: false,
        });
    }
    Err(PublishError::Other(anyhow!(
        "topic {topic_id} was updated concurrently"
    )))
}

/// Post-commit announcements. Failures are logged per backend and never
/// unwind the publish.
async fn announce(discussion: &Discussion, deps: &PipelineDeps) {
    if deps.announcers.is_empty() {
        return;
    }
    let message = format!(
        "New discussion published: {} ({})",
        discussion.title, discussion.slug
    );
    for backend in &deps.announcers {
        if let Err(e) = backend.send(&message).await {
            warn!(backend = backend.name(), error = %e, "announce failed");
        }
    }
}

/// Lowercase, alphanumeric runs joined by single hyphens, capped without
/// a trailing hyphen. Titles with nothing usable fall back to
/// "discussion".
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_hyphen = true;
    for c in title.chars() {
        if c.is_alphanumeric() {
            for lc in c.to_lowercase() {
                slug.push(lc);
            }
            last_hyphen = false;
        } else if !last_hyphen {
            slug.push('-');
            last_hyphen = true;
        }
    }

    let mut slug: String = slug.chars().take(SLUG_MAX_CHARS).collect();
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        "discussion".to_string()
    } else {
        slug
    }
}

fn random_suffix() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..4)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Majority vote among non-global source scopes; global only when nothing
/// more specific exists. Ties take the lexicographically first code so
/// reruns stay stable.
pub fn majority_scope(scopes: &[String]) -> (String, Option<String>) {
    let mut counts: std::collections::BTreeMap<&str, usize> = std::collections::BTreeMap::new();
    for scope in scopes {
        let s = scope.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("global") {
            continue;
        }
        *counts.entry(s).or_insert(0) += 1;
    }

    let mut winner: Option<(&str, usize)> = None;
    for (scope, count) in &counts {
        match winner {
            Some((_, best)) if *count <= best => {}
            _ => winner = Some((scope, *count)),
        }
    }

    match winner {
        Some((code, _)) => ("country".to_string(), Some(code.to_string())),
        None => ("global".to_string(), None),
    }
}
