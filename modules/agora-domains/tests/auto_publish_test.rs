//! Integration test for the unattended publish sweep.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use agora_core::types::{SeedStatement, SourceType, TopicScores, TopicStatus};
use agora_domains::articles::Article;
use agora_domains::sources::Source;
use agora_domains::testing::{draft, test_deps, test_file_config, test_pool};
use agora_domains::topics::activities::auto_publish::{auto_publish_eligible, AUTO_REVIEWER};
use agora_domains::topics::Topic;

async fn source(source_type: SourceType, reputation: f64, pool: &PgPool) -> Source {
    let tag = Uuid::new_v4();
    Source::create(
        &format!("source-{tag}"),
        &format!("https://{tag}.example.com/feed"),
        source_type,
        reputation,
        "global",
        pool,
    )
    .await
    .unwrap()
}

async fn review_topic(
    title: &str,
    sources: &[&Source],
    scores: &TopicScores,
    pool: &PgPool,
) -> Topic {
    let topic = Topic::create(title, "", None, 60, pool).await.unwrap();
    for source in sources {
        let rows = Article::insert_batch(
            source.id,
            &[draft(&format!("ext-{}", Uuid::new_v4()), title)],
            pool,
        )
        .await
        .unwrap();
        Topic::link_articles(topic.id, &[rows[0].id], pool).await.unwrap();
    }
    Topic::refresh_source_count(topic.id, pool).await.unwrap();
    let statements = [SeedStatement {
        content: format!("{title} matters to me."),
        position: 0,
    }];
    Topic::advance_to_review(topic.id, scores, &statements, pool)
        .await
        .unwrap()
        .unwrap()
}

async fn status_of(id: Uuid, pool: &PgPool) -> TopicStatus {
    Topic::find_by_id(id, pool).await.unwrap().unwrap().status()
}

#[tokio::test]
async fn auto_publish_takes_corroborated_low_risk_topics_only() {
    let Some(pool) = test_pool().await else {
        return;
    };

    // The sweep examines the oldest candidates first; park review-queue
    // rows left over from earlier runs so this run's topics make the batch.
    sqlx::query(
        "UPDATE topics SET status = 'discarded', updated_at = now()
         WHERE status = 'pending_review' AND discussion_id IS NULL",
    )
    .execute(&pool)
    .await
    .unwrap();

    let wire = source(SourceType::Wire, 0.6, &pool).await;
    let paper = source(SourceType::Rss, 0.5, &pool).await;
    let tabloid = source(SourceType::Rss, 0.3, &pool).await;

    let tag = Uuid::new_v4();
    let corroborated = review_topic(
        &format!("Rail strike called off {tag}"),
        &[&wire, &paper],
        &TopicScores::neutral(),
        &pool,
    )
    .await;
    let single_source = review_topic(
        &format!("Mystery lights over harbor {tag}"),
        &[&tabloid],
        &TopicScores::neutral(),
        &pool,
    )
    .await;
    let risky = review_topic(
        &format!("Charges filed in fraud case {tag}"),
        &[&wire, &paper],
        &TopicScores {
            risk_flag: true,
            ..TopicScores::neutral()
        },
        &pool,
    )
    .await;

    let mut deps = test_deps(pool.clone());
    let mut config = test_file_config();
    config.auto_publish.enabled = true;
    deps.file_config = Arc::new(config);

    let published = auto_publish_eligible(&deps).await.unwrap();
    assert!(published >= 1);

    let topic = Topic::find_by_id(corroborated.id, &pool).await.unwrap().unwrap();
    assert_eq!(topic.status(), TopicStatus::Published);
    assert_eq!(topic.reviewed_by.as_deref(), Some(AUTO_REVIEWER));
    assert!(topic.discussion_id.is_some());

    assert_eq!(status_of(single_source.id, &pool).await, TopicStatus::PendingReview);
    assert_eq!(status_of(risky.id, &pool).await, TopicStatus::PendingReview);

    // A second sweep finds nothing new for these topics.
    auto_publish_eligible(&deps).await.unwrap();
    assert_eq!(status_of(single_source.id, &pool).await, TopicStatus::PendingReview);
}

#[tokio::test]
async fn auto_publish_is_a_no_op_when_disabled() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let deps = test_deps(pool.clone());
    assert_eq!(auto_publish_eligible(&deps).await.unwrap(), 0);
}
