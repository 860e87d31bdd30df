use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use agora_core::file_config::SeedSource;
use agora_core::types::SourceType;

/// Consecutive fetch failures at which a source disables itself.
pub const MAX_CONSECUTIVE_FAILURES: i32 = 5;

/// A content source in the registry. Health fields are mutated only by the
/// ingestion pass; reactivation is an explicit operator action.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Source {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub source_type: String,
    pub reputation_score: f64,
    pub political_leaning: Option<f64>,
    pub geo_scope: String,
    pub is_active: bool,
    pub fetch_error_count: i32,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Source {
    pub fn source_type(&self) -> SourceType {
        SourceType::from_str_loose(&self.source_type)
    }

    pub async fn create(
        name: &str,
        url: &str,
        source_type: SourceType,
        reputation_score: f64,
        geo_scope: &str,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO sources (name, url, source_type, reputation_score, geo_scope)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(url)
        .bind(source_type.as_str())
        .bind(reputation_score)
        .bind(geo_scope)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM sources WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_active(pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM sources WHERE is_active ORDER BY name")
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// Reset the failure counter and stamp a successful fetch.
    pub async fn record_fetch_success(id: Uuid, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sources
            SET fetch_error_count = 0, last_fetched_at = now(), updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Bump the failure counter; the source disables itself on the fifth
    /// consecutive failure. Returns true when this call disabled it.
    pub async fn record_fetch_failure(id: Uuid, pool: &PgPool) -> Result<bool> {
        let still_active = sqlx::query_scalar::<_, bool>(
            r#"
            UPDATE sources
            SET fetch_error_count = fetch_error_count + 1,
                is_active = fetch_error_count + 1 < $2,
                updated_at = now()
            WHERE id = $1
            RETURNING is_active
            "#,
        )
        .bind(id)
        .bind(MAX_CONSECUTIVE_FAILURES)
        .fetch_one(pool)
        .await?;
        Ok(!still_active)
    }

    /// Operator re-enable. Resets the failure counter.
    pub async fn reactivate(id: Uuid, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sources
            SET is_active = TRUE, fetch_error_count = 0, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Idempotent upsert keyed on the source URL, used by config seeding.
    pub async fn upsert_seed(seed: &SeedSource, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO sources (name, url, source_type, reputation_score, political_leaning, geo_scope)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (url) DO UPDATE SET
                name = EXCLUDED.name,
                source_type = EXCLUDED.source_type,
                reputation_score = EXCLUDED.reputation_score,
                political_leaning = EXCLUDED.political_leaning,
                geo_scope = EXCLUDED.geo_scope,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(&seed.name)
        .bind(&seed.url)
        .bind(&seed.source_type)
        .bind(seed.reputation_score)
        .bind(seed.political_leaning)
        .bind(&seed.geo_scope)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }
}
