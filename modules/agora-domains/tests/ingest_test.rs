//! Integration tests for source polling and article storage.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.
//!
//! The test database is shared, so every test works on sources it created
//! itself and asserts on those rows only.

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use agora_core::file_config::SeedSource;
use agora_core::types::SourceType;
use agora_domains::articles::activities::fetch_all_sources;
use agora_domains::articles::activities::ingest::store_drafts;
use agora_domains::sources::activities::seed_sources;
use agora_domains::sources::models::source::MAX_CONSECUTIVE_FAILURES;
use agora_domains::sources::Source;
use agora_domains::testing::{draft, test_deps, test_file_config, test_pool, MockFetcher};

async fn seeded_source(pool: &PgPool) -> Source {
    let tag = Uuid::new_v4();
    Source::create(
        &format!("source-{tag}"),
        &format!("https://{tag}.example.com/feed"),
        SourceType::Rss,
        0.5,
        "global",
        pool,
    )
    .await
    .unwrap()
}

async fn article_count(source_id: Uuid, pool: &PgPool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM articles WHERE source_id = $1")
        .bind(source_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

// =========================================================================
// Polling
// =========================================================================

#[tokio::test]
async fn fetch_all_sources_stores_new_articles_once() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let source = seeded_source(&pool).await;

    let mut deps = test_deps(pool.clone());
    deps.fetcher = Arc::new(MockFetcher::new().on_url(
        &source.url,
        vec![draft("a-1", "First story"), draft("a-2", "Second story")],
    ));

    fetch_all_sources(&deps).await.unwrap();
    assert_eq!(article_count(source.id, &pool).await, 2);

    // Second pass sees the same feed again and stores nothing new.
    fetch_all_sources(&deps).await.unwrap();
    assert_eq!(article_count(source.id, &pool).await, 2);

    let reloaded = Source::find_by_id(source.id, &pool).await.unwrap().unwrap();
    assert!(reloaded.last_fetched_at.is_some());
}

#[tokio::test]
async fn failing_source_does_not_block_others() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let good = seeded_source(&pool).await;
    let bad = seeded_source(&pool).await;

    let mut deps = test_deps(pool.clone());
    deps.fetcher = Arc::new(
        MockFetcher::new()
            .on_url(&good.url, vec![draft("g-1", "Good story")])
            .failing(&bad.url),
    );

    fetch_all_sources(&deps).await.unwrap();

    assert_eq!(article_count(good.id, &pool).await, 1);
    assert_eq!(article_count(bad.id, &pool).await, 0);

    let bad = Source::find_by_id(bad.id, &pool).await.unwrap().unwrap();
    assert!(bad.fetch_error_count >= 1);
    assert!(bad.last_fetched_at.is_none());
}

// =========================================================================
// Source health
// =========================================================================

#[tokio::test]
async fn repeated_failures_disable_source_until_reactivated() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let source = seeded_source(&pool).await;

    let mut disabled = false;
    for _ in 0..MAX_CONSECUTIVE_FAILURES {
        disabled = Source::record_fetch_failure(source.id, &pool).await.unwrap();
    }
    assert!(disabled);

    let reloaded = Source::find_by_id(source.id, &pool).await.unwrap().unwrap();
    assert!(!reloaded.is_active);
    assert!(reloaded.fetch_error_count >= MAX_CONSECUTIVE_FAILURES);

    Source::reactivate(source.id, &pool).await.unwrap();
    let reloaded = Source::find_by_id(source.id, &pool).await.unwrap().unwrap();
    assert!(reloaded.is_active);
}

// =========================================================================
// Draft storage
// =========================================================================

#[tokio::test]
async fn store_drafts_skips_known_and_in_page_duplicates() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let source = seeded_source(&pool).await;
    let deps = test_deps(pool.clone());

    let first = store_drafts(
        source.id,
        &[draft("a-1", "One"), draft("a-2", "Two")],
        &deps,
    )
    .await
    .unwrap();
    assert_eq!(first, 2);

    // Page overlap plus an in-page duplicate: only the genuinely new id lands.
    let second = store_drafts(
        source.id,
        &[
            draft("a-2", "Two again"),
            draft("a-3", "Three"),
            draft("a-3", "Three duplicate"),
        ],
        &deps,
    )
    .await
    .unwrap();
    assert_eq!(second, 1);
    assert_eq!(article_count(source.id, &pool).await, 3);
}

// =========================================================================
// Config seeding
// =========================================================================

#[tokio::test]
async fn seed_sources_upserts_by_url() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let tag = Uuid::new_v4();
    let url = format!("https://{tag}.example.com/feed.xml");

    let seed = SeedSource {
        name: format!("Seeded {tag}"),
        url: url.clone(),
        source_type: "wire".to_string(),
        reputation_score: 0.9,
        political_leaning: Some(-0.1),
        geo_scope: "de".to_string(),
    };

    let mut config = test_file_config();
    config.sources = vec![seed.clone()];
    let mut deps = test_deps(pool.clone());
    deps.file_config = Arc::new(config);

    let applied = seed_sources(&deps).await.unwrap();
    assert_eq!(applied, 1);

    let created = sqlx::query_as::<_, Source>("SELECT * FROM sources WHERE url = $1")
        .bind(&url)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(created.source_type(), SourceType::Wire);
    assert_eq!(created.reputation_score, 0.9);

    // Re-seeding the same URL updates in place instead of duplicating.
    let mut updated_seed = seed;
    updated_seed.reputation_score = 0.4;
    let mut config = test_file_config();
    config.sources = vec![updated_seed];
    deps.file_config = Arc::new(config);

    seed_sources(&deps).await.unwrap();
    let rows = sqlx::query_as::<_, Source>("SELECT * FROM sources WHERE url = $1")
        .bind(&url)
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].reputation_score, 0.4);
    assert_eq!(rows[0].id, created.id);
}
