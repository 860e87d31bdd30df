use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// A votable statement inside a discussion. Seed statements arrive
/// pre-approved; participant statements (out of scope here) would not.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Statement {
    pub id: Uuid,
    pub discussion_id: Uuid,
    pub content: String,
    pub position: i32,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

impl Statement {
    pub async fn find_for_discussion(discussion_id: Uuid, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM statements WHERE discussion_id = $1 ORDER BY position",
        )
        .bind(discussion_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
