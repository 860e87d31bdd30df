use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// A published conversation. Rows are created only by the publisher and
/// are the downstream product's trigger to open voting.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Discussion {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub geo_scope: String,
    pub country: Option<String>,
    pub topic_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Discussion {
    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM discussions WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_slug(slug: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM discussions WHERE slug = $1")
            .bind(slug)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Discussions created within the window, newest first. Feeds the
    /// publish-time duplicate check.
    pub async fn find_recent(window_days: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let cutoff = Utc::now() - Duration::days(window_days);
        sqlx::query_as::<_, Self>(
            "SELECT * FROM discussions WHERE created_at > $1 ORDER BY created_at DESC",
        )
        .bind(cutoff)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
