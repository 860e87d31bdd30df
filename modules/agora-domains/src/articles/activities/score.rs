use anyhow::Result;
use tracing::{info, warn};

use agora_core::deps::ArticleText;
use agora_core::PipelineDeps;

use crate::articles::Article;
use crate::scoring::heuristic::sensationalism_score;

/// Articles scored per pass.
const SCORE_BATCH: i64 = 500;

/// Assign a sensationalism score to every article that does not have one
/// yet. The configured provider scores the batch in one call; any article
/// it fails to cover falls back to the deterministic heuristic, so the
/// pass always completes.
pub async fn score_unscored_articles(deps: &PipelineDeps) -> Result<usize> {
    let articles = Article::find_unscored(SCORE_BATCH, deps.pool()).await?;
    if articles.is_empty() {
        return Ok(0);
    }

    let texts: Vec<ArticleText> = articles
        .iter()
        .map(|a| ArticleText {
            title: a.title.clone(),
            summary: a.summary.clone(),
        })
        .collect();

    let provider_scores = match deps.scorer.score_articles(&texts).await {
        Ok(scores) if scores.len() == texts.len() => scores,
        Ok(scores) => {
            warn!(
                provider = deps.scorer.name(),
                expected = texts.len(),
                got = scores.len(),
                "provider returned a mismatched score count, using heuristic"
            );
            vec![None; texts.len()]
        }
        Err(e) => {
            warn!(
                provider = deps.scorer.name(),
                error = %e,
                "article scoring failed, using heuristic"
            );
            vec![None; texts.len()]
        }
    };

    let mut scored = 0;
    for (article, provider_score) in articles.iter().zip(provider_scores) {
        let score = provider_score
            .unwrap_or_else(|| sensationalism_score(&article.title, &article.summary))
            .clamp(0.0, 1.0);
        Article::set_sensationalism(article.id, score, deps.pool()).await?;
        scored += 1;
    }

    info!(scored, "article scoring pass complete");
    Ok(scored)
}
