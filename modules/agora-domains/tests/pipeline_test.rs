//! End-to-end test of a full pipeline run against a live database.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use std::sync::Arc;

use uuid::Uuid;

use agora_core::types::{SourceType, TopicStatus};
use agora_domains::pipeline::{process_held, run_pipeline};
use agora_domains::sources::Source;
use agora_domains::testing::{draft, test_deps, test_pool, MockFetcher};
use agora_domains::topics::Topic;

#[tokio::test]
async fn run_pipeline_carries_articles_to_the_review_queue() {
    let Some(pool) = test_pool().await else {
        return;
    };

    // Settle rows left by earlier runs so this run's work fits inside the
    // scoring, clustering and sweep batches: park unscored articles above
    // the sensationalism cutoff and stale held topics out of the sweep.
    sqlx::query("UPDATE articles SET sensationalism_score = 1.0 WHERE sensationalism_score IS NULL")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "UPDATE topics SET status = 'discarded', updated_at = now()
         WHERE status = 'pending' AND hold_until <= now()",
    )
    .execute(&pool)
    .await
    .unwrap();

    let tag = Uuid::new_v4();
    let source = Source::create(
        &format!("source-{tag}"),
        &format!("https://{tag}.example.com/feed"),
        SourceType::Rss,
        0.5,
        "global",
        &pool,
    )
    .await
    .unwrap();

    let title = format!("Water treatment upgrade approved {tag}");
    let mut deps = test_deps(pool.clone());
    deps.fetcher = Arc::new(MockFetcher::new().on_url(
        &source.url,
        vec![draft("wire-1", &title), draft("rss-7", &title)],
    ));

    let summary = run_pipeline(&deps, 0).await.unwrap();

    assert_eq!(summary.ingest.articles_inserted, 2);
    assert_eq!(summary.articles_scored, 2);
    assert_eq!(summary.clustering.articles_considered, 2);
    assert_eq!(summary.clustering.topics_created, 1);
    assert_eq!(summary.clustering.topics_extended, 0);
    assert_eq!(summary.topics_advanced, 1);
    assert_eq!(summary.topics_auto_published, 0);
    assert!(summary.topics_pending_review >= 1);

    // Both articles were stored, scored and claimed by one topic.
    let scores = sqlx::query_scalar::<_, Option<f64>>(
        "SELECT sensationalism_score FROM articles WHERE source_id = $1",
    )
    .bind(source.id)
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(scores.len(), 2);
    assert!(scores.iter().all(|s| *s == Some(0.2)));

    let topic_id = sqlx::query_scalar::<_, Uuid>(
        "SELECT DISTINCT ta.topic_id FROM topic_articles ta
         JOIN articles a ON a.id = ta.article_id
         WHERE a.source_id = $1",
    )
    .bind(source.id)
    .fetch_one(&pool)
    .await
    .unwrap();

    // With a zero-minute hold the same run advanced the topic to review.
    let topic = Topic::find_by_id(topic_id, &pool).await.unwrap().unwrap();
    assert_eq!(topic.status(), TopicStatus::PendingReview);
    assert_eq!(topic.title, title);
    assert_eq!(topic.source_count, 1);
    assert_eq!(topic.civic_score, Some(0.5));
    assert_eq!(topic.seed_statement_entries().len(), 3);

    // Nothing held remains, so a follow-up sweep is a no-op.
    assert_eq!(process_held(&deps, 100).await.unwrap(), 0);
}
