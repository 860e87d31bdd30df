use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::PgPool;
use uuid::Uuid;

use agora_core::fetch::ArticleDraft;

/// A normalized news item. `embedding` and `sensationalism_score` start NULL
/// and are filled by the scoring and clustering passes.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Article {
    pub id: Uuid,
    pub source_id: Uuid,
    pub external_id: String,
    pub title: String,
    pub summary: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub sensationalism_score: Option<f64>,
    pub embedding: Option<Vector>,
}

impl Article {
    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM articles WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// External ids among `external_ids` that this source already has rows
    /// for. Used to skip already-seen feed items before insertion.
    pub async fn existing_external_ids(
        source_id: Uuid,
        external_ids: &[String],
        pool: &PgPool,
    ) -> Result<HashSet<String>> {
        if external_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT external_id FROM articles WHERE source_id = $1 AND external_id = ANY($2)",
        )
        .bind(source_id)
        .bind(external_ids)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// Multi-row insert. Fails on a `(source_id, external_id)` collision;
    /// the ingest activity catches that and falls back to `insert_ignore`
    /// item by item.
    pub async fn insert_batch(
        source_id: Uuid,
        drafts: &[ArticleDraft],
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = sqlx::QueryBuilder::new(
            "INSERT INTO articles (source_id, external_id, title, summary, url, published_at) ",
        );
        qb.push_values(drafts, |mut row, draft| {
            row.push_bind(source_id)
                .push_bind(&draft.external_id)
                .push_bind(&draft.title)
                .push_bind(&draft.summary)
                .push_bind(&draft.url)
                .push_bind(draft.published_at);
        });
        qb.push(" RETURNING *");
        qb.build_query_as::<Self>()
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// Single-row insert that ignores a `(source_id, external_id)` collision.
    /// Returns None when another process got there first.
    pub async fn insert_ignore(
        source_id: Uuid,
        draft: &ArticleDraft,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO articles (source_id, external_id, title, summary, url, published_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_id, external_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(source_id)
        .bind(&draft.external_id)
        .bind(&draft.title)
        .bind(&draft.summary)
        .bind(&draft.url)
        .bind(draft.published_at)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Articles with no sensationalism score yet, oldest first.
    pub async fn find_unscored(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM articles WHERE sensationalism_score IS NULL ORDER BY fetched_at LIMIT $1",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Scored, low-sensationalism articles not yet linked to any topic,
    /// oldest first. This is the clustering input; unscored articles stay
    /// out until the scoring pass reaches them.
    pub async fn find_unclaimed_for_clustering(
        max_sensationalism: f64,
        limit: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT a.* FROM articles a
            LEFT JOIN topic_articles ta ON ta.article_id = a.id
            WHERE ta.article_id IS NULL
              AND a.sensationalism_score IS NOT NULL
              AND a.sensationalism_score < $1
            ORDER BY a.fetched_at
            LIMIT $2
            "#,
        )
        .bind(max_sensationalism)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn set_sensationalism(id: Uuid, score: f64, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE articles SET sensationalism_score = $2 WHERE id = $1")
            .bind(id)
            .bind(score)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_embedding(id: Uuid, embedding: &Vector, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE articles SET embedding = $2 WHERE id = $1")
            .bind(id)
            .bind(embedding)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Titles of a topic's linked articles, newest publication first. Feeds
    /// the topic scoring prompt.
    pub async fn titles_for_topic(topic_id: Uuid, limit: i64, pool: &PgPool) -> Result<Vec<String>> {
        let rows = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT a.title FROM articles a
            JOIN topic_articles ta ON ta.article_id = a.id
            WHERE ta.topic_id = $1
            ORDER BY a.published_at DESC NULLS LAST
            LIMIT $2
            "#,
        )
        .bind(topic_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// Geo scopes of the sources behind a topic's linked articles, one entry
    /// per article. Feeds the publish-time majority vote.
    pub async fn source_geo_scopes_for_topic(topic_id: Uuid, pool: &PgPool) -> Result<Vec<String>> {
        let rows = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT s.geo_scope FROM sources s
            JOIN articles a ON a.source_id = s.id
            JOIN topic_articles ta ON ta.article_id = a.id
            WHERE ta.topic_id = $1
            "#,
        )
        .bind(topic_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}
