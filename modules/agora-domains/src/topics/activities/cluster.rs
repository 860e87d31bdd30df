use anyhow::Result;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use tracing::{info, warn};

use agora_core::PipelineDeps;

use crate::articles::Article;
use crate::similarity::{centroid, cosine_similarity};
use crate::topics::Topic;

/// Outcome of one clustering pass.
#[derive(Debug, Default)]
pub struct ClusterStats {
    pub articles_considered: usize,
    pub topics_created: usize,
    pub topics_extended: usize,
}

/// Group unclaimed low-sensationalism articles into topic candidates.
/// Clusters matching a recent topic attach to it; the rest become new
/// `pending` topics holding until `hold_minutes` from now. Without
/// embeddings every article degrades to a singleton cluster.
pub async fn cluster_unclaimed_articles(
    deps: &PipelineDeps,
    hold_minutes: i64,
) -> Result<ClusterStats> {
    let clustering = &deps.file_config.clustering;
    let articles = Article::find_unclaimed_for_clustering(
        clustering.sensationalism_cutoff,
        clustering.batch_size,
        deps.pool(),
    )
    .await?;

    let mut stats = ClusterStats {
        articles_considered: articles.len(),
        ..Default::default()
    };
    if articles.is_empty() {
        return Ok(stats);
    }

    let texts: Vec<String> = articles
        .iter()
        .map(|a| format!("{}\n{}", a.title, a.summary))
        .collect();

    let embeddings = match deps.embeddings.embed_batch(&texts).await? {
        Some(vectors) if vectors.len() == articles.len() => Some(vectors),
        Some(vectors) => {
            warn!(
                expected = articles.len(),
                got = vectors.len(),
                "embedding count mismatch, degrading to singleton clusters"
            );
            None
        }
        None => None,
    };

    if let Some(vectors) = &embeddings {
        for (article, vector) in articles.iter().zip(vectors) {
            Article::set_embedding(article.id, &Vector::from(vector.clone()), deps.pool()).await?;
        }
    }

    let clusters: Vec<Vec<usize>> = match &embeddings {
        Some(vectors) => cluster_embeddings(vectors, 1.0 - clustering.similarity_threshold),
        None => (0..articles.len()).map(|i| vec![i]).collect(),
    };

    let published: Vec<Option<DateTime<Utc>>> = articles.iter().map(|a| a.published_at).collect();

    for members in &clusters {
        let member_ids: Vec<_> = members.iter().map(|&i| articles[i].id).collect();

        let cluster_centroid = embeddings.as_ref().and_then(|vectors| {
            let member_vectors: Vec<&[f32]> =
                members.iter().map(|&i| vectors[i].as_slice()).collect();
            centroid(&member_vectors).map(Vector::from)
        });

        // Same story as a recent topic: extend it instead of creating one.
        if let Some(vector) = &cluster_centroid {
            if let Some(existing) = Topic::find_similar_recent(
                vector,
                clustering.topic_dedup_threshold,
                clustering.dedup_window_days,
                clustering.candidate_limit,
                deps.pool(),
            )
            .await?
            {
                Topic::link_articles(existing.id, &member_ids, deps.pool()).await?;
                Topic::refresh_source_count(existing.id, deps.pool()).await?;
                info!(
                    topic_id = %existing.id,
                    similarity = existing.similarity,
                    articles = member_ids.len(),
                    "attached cluster to existing topic"
                );
                stats.topics_extended += 1;
                continue;
            }
        }

        let rep = &articles[representative_index(&published, members)];
        let topic = Topic::create(
            &rep.title,
            &rep.summary,
            cluster_centroid.as_ref(),
            hold_minutes,
            deps.pool(),
        )
        .await?;
        Topic::link_articles(topic.id, &member_ids, deps.pool()).await?;
        Topic::refresh_source_count(topic.id, deps.pool()).await?;
        info!(
            topic_id = %topic.id,
            title = %topic.title,
            articles = member_ids.len(),
            "created topic"
        );
        stats.topics_created += 1;
    }

    info!(
        considered = stats.articles_considered,
        created = stats.topics_created,
        extended = stats.topics_extended,
        "clustering pass complete"
    );
    Ok(stats)
}

/// Average-linkage agglomerative clustering over cosine distance. Merges
/// the closest pair while its linkage distance stays at or below `cutoff`.
/// Ties keep the first lowest-index pair, so a fixed input yields fixed
/// clusters. Returned clusters are sorted by their smallest member index.
pub fn cluster_embeddings(embeddings: &[Vec<f32>], cutoff: f64) -> Vec<Vec<usize>> {
    let n = embeddings.len();
    let mut clusters: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
    if n < 2 {
        return clusters;
    }

    let mut dist = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = 1.0 - cosine_similarity(&embeddings[i], &embeddings[j]);
            dist[i][j] = d;
            dist[j][i] = d;
        }
    }

    loop {
        let mut best: Option<(usize, usize, f64)> = None;
        for a in 0..clusters.len() {
            for b in (a + 1)..clusters.len() {
                let d = average_linkage(&clusters[a], &clusters[b], &dist);
                if best.is_none_or(|(_, _, best_d)| d < best_d) {
                    best = Some((a, b, d));
                }
            }
        }
        match best {
            Some((a, b, d)) if d <= cutoff => {
                let absorbed = clusters.remove(b);
                clusters[a].extend(absorbed);
            }
            _ => break,
        }
    }

    for cluster in &mut clusters {
        cluster.sort_unstable();
    }
    clusters.sort_by_key(|c| c[0]);
    clusters
}

fn average_linkage(a: &[usize], b: &[usize], dist: &[Vec<f64>]) -> f64 {
    let mut total = 0.0;
    for &i in a {
        for &j in b {
            total += dist[i][j];
        }
    }
    total / (a.len() * b.len()) as f64
}

/// Member with the newest publication time names the topic; ties keep the
/// earliest member.
fn representative_index(published: &[Option<DateTime<Utc>>], members: &[usize]) -> usize {
    let mut best = members[0];
    for &i in &members[1..] {
        if published[i] > published[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn similar_pair_merges_distant_stays_apart() {
        let embeddings = vec![
            vec![1.0, 0.0],
            vec![0.995, 0.1],
            vec![0.0, 1.0],
        ];
        let clusters = cluster_embeddings(&embeddings, 0.3);
        assert_eq!(clusters, vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn identical_vectors_all_merge() {
        let embeddings = vec![vec![0.5, 0.5]; 3];
        let clusters = cluster_embeddings(&embeddings, 0.3);
        assert_eq!(clusters, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn orthogonal_vectors_stay_singletons() {
        let embeddings = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let clusters = cluster_embeddings(&embeddings, 0.3);
        assert_eq!(clusters, vec![vec![0], vec![1]]);
    }

    #[test]
    fn single_input_is_one_cluster() {
        let clusters = cluster_embeddings(&[vec![1.0, 0.0]], 0.3);
        assert_eq!(clusters, vec![vec![0]]);
    }

    #[test]
    fn empty_input_is_empty() {
        let clusters = cluster_embeddings(&[], 0.3);
        assert!(clusters.is_empty());
    }

    #[test]
    fn boundary_distance_still_merges() {
        // cos = 0.0 between orthogonal vectors, distance exactly 1.0.
        let embeddings = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let clusters = cluster_embeddings(&embeddings, 1.0);
        assert_eq!(clusters, vec![vec![0, 1]]);
    }

    #[test]
    fn representative_prefers_newest_then_earliest_index() {
        let now = Utc::now();
        let published = vec![
            Some(now - Duration::hours(3)),
            Some(now),
            Some(now),
            None,
        ];
        assert_eq!(representative_index(&published, &[0, 1, 2, 3]), 1);
        assert_eq!(representative_index(&published, &[0, 3]), 0);
        assert_eq!(representative_index(&published, &[3]), 3);
    }
}
