use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use pgvector::Vector;
use sqlx::PgPool;
use uuid::Uuid;

use agora_core::types::{SeedStatement, TopicScores, TopicStatus};

/// A clustered news story moving through the review lifecycle. `status` is
/// stored as text; use [`Topic::status`] for the typed view. Every status
/// transition is a guarded UPDATE so concurrent sweeps cannot double-fire.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Topic {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub embedding: Option<Vector>,
    pub status: String,
    pub hold_until: DateTime<Utc>,
    pub civic_score: Option<f64>,
    pub quality_score: Option<f64>,
    pub audience_score: Option<f64>,
    pub risk_flag: bool,
    pub primary_topic: Option<String>,
    pub canonical_tags: Vec<String>,
    pub seed_statements: serde_json::Value,
    pub source_count: i32,
    pub discussion_id: Option<Uuid>,
    pub merged_into_id: Option<Uuid>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Nearest recent topic above the dedup threshold.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TopicMatch {
    pub id: Uuid,
    pub similarity: f64,
}

/// Source spread behind a topic, for the auto-publish predicate.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Corroboration {
    pub distinct_sources: i64,
    pub has_anchor: bool,
}

impl Topic {
    pub fn status(&self) -> TopicStatus {
        TopicStatus::parse(&self.status).unwrap_or(TopicStatus::Pending)
    }

    /// Parsed view of the stored seed statements. Malformed JSON reads as
    /// an empty set rather than failing the row.
    pub fn seed_statement_entries(&self) -> Vec<SeedStatement> {
        serde_json::from_value(self.seed_statements.clone()).unwrap_or_default()
    }

    pub async fn create(
        title: &str,
        description: &str,
        embedding: Option<&Vector>,
        hold_minutes: i64,
        pool: &PgPool,
    ) -> Result<Self> {
        let hold_until = Utc::now() + Duration::minutes(hold_minutes);
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO topics (title, description, embedding, hold_until)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(title)
        .bind(description)
        .bind(embedding)
        .bind(hold_until)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM topics WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Attach articles to this topic, ignoring links that already exist.
    pub async fn link_articles(topic_id: Uuid, article_ids: &[Uuid], pool: &PgPool) -> Result<()> {
        if article_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            INSERT INTO topic_articles (topic_id, article_id)
            SELECT $1, unnest($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(topic_id)
        .bind(article_ids)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Recount distinct sources across linked articles.
    pub async fn refresh_source_count(topic_id: Uuid, pool: &PgPool) -> Result<i32> {
        let count = sqlx::query_scalar::<_, i32>(
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
            RETURNING source_count
            "#,
        )
        .bind(topic_id)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    /// First recent topic whose embedding sits within the similarity
    /// threshold, scanning the nearest candidates first. Discarded topics
    /// never match.
    pub async fn find_similar_recent(
        embedding: &Vector,
        threshold: f64,
        window_days: i64,
        candidate_limit: i64,
        pool: &PgPool,
    ) -> Result<Option<TopicMatch>> {
        let cutoff = Utc::now() - Duration::days(window_days);
        sqlx::query_as::<_, TopicMatch>(
            r#"
            WITH candidates AS MATERIALIZED (
                SELECT id, (embedding <=> $1) AS distance
                FROM topics
                WHERE embedding IS NOT NULL
                  AND created_at > $2
                  AND status IN ('pending', 'pending_review', 'approved', 'published', 'merged')
                ORDER BY embedding <=> $1
                LIMIT $3
            )
            SELECT id, (1.0 - distance)::float8 AS similarity
            FROM candidates
            WHERE distance <= $4
            LIMIT 1
            "#,
        )
        .bind(embedding)
        .bind(cutoff)
        .bind(candidate_limit)
        .bind(1.0 - threshold)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Pending topics whose hold window has elapsed, oldest created first.
    pub async fn find_held_elapsed(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM topics
            WHERE status = 'pending' AND hold_until <= now()
            ORDER BY created_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Store scores and seed statements and move `pending -> pending_review`.
    /// Returns None when another process advanced the topic first.
    pub async fn advance_to_review(
        id: Uuid,
        scores: &TopicScores,
        seed_statements: &[SeedStatement],
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let statements_json = serde_json::to_value(seed_statements)?;
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE topics SET
                status = 'pending_review',
                civic_score = $2,
                quality_score = $3,
                audience_score = $4,
                risk_flag = $5,
                primary_topic = $6,
                canonical_tags = $7,
                seed_statements = $8,
                updated_at = now()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(scores.civic_score)
        .bind(scores.quality_score)
        .bind(scores.audience_score)
        .bind(scores.risk_flag)
        .bind(&scores.primary_topic)
        .bind(&scores.canonical_tags)
        .bind(statements_json)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Guarded `pending_review -> approved`.
    pub async fn approve(id: Uuid, reviewer: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE topics SET
                status = 'approved',
                reviewed_by = $2,
                reviewed_at = now(),
                updated_at = now()
            WHERE id = $1 AND status = 'pending_review'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(reviewer)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Guarded transition to `discarded` from any non-terminal status.
    pub async fn discard(id: Uuid, reviewer: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE topics SET
                status = 'discarded',
                reviewed_by = $2,
                reviewed_at = now(),
                updated_at = now()
            WHERE id = $1 AND status IN ('pending', 'pending_review', 'approved')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(reviewer)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Unflagged review-queue topics without a discussion, oldest first.
    pub async fn find_auto_publish_candidates(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM topics
            WHERE status = 'pending_review'
              AND NOT risk_flag
              AND discussion_id IS NULL
            ORDER BY created_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Distinct-source count and anchor presence across linked articles.
    /// An anchor is a wire source or one at or above `min_reputation`.
    pub async fn corroboration(
        topic_id: Uuid,
        min_reputation: f64,
        pool: &PgPool,
    ) -> Result<Corroboration> {
        sqlx::query_as::<_, Corroboration>(
            r#"
            SELECT
                COUNT(DISTINCT s.id) AS distinct_sources,
                COALESCE(BOOL_OR(s.source_type = 'wire' OR s.reputation_score >= $2), FALSE) AS has_anchor
            FROM sources s
            JOIN articles a ON a.source_id = s.id
            JOIN topic_articles ta ON ta.article_id = a.id
            WHERE ta.topic_id = $1
            "#,
        )
        .bind(topic_id)
        .bind(min_reputation)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn count_by_status(status: TopicStatus, pool: &PgPool) -> Result<i64> {
        let row = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM topics WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }
}
