use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use agora_core::deps::{ArticleText, ScoringProvider};
use agora_core::types::{SeedStatement, TopicScores};
use ai_client::{Claude, OpenAi, StructuredOutput};

use super::heuristic::default_seed_statements;

const ARTICLE_SYSTEM_PROMPT: &str = "You rate news items for sensationalism. For each \
numbered item, return a score from 0.0 (sober, factual) to 1.0 (pure clickbait). \
Return one row per index; omit an index only if the item is unjudgeable.";

const TOPIC_SYSTEM_PROMPT: &str = "You assess a news story for public deliberation. \
Given representative headlines of one story, return: civic_score (how much the story \
concerns public decisions), quality_score (substance of the reporting), audience_score \
(breadth of who is affected), each 0.0 to 1.0; risk_flag true for stories likely to \
invite harassment or rest on unverifiable claims; primary_topic as one short lowercase \
category; canonical_tags as 2 to 6 short lowercase tags.";

const STATEMENTS_SYSTEM_PROMPT: &str = "You open a public deliberation about a news \
story. Write 3 to 5 short, neutral statements a participant can agree or disagree \
with. Statements, not questions; no hashtags, no headlines.";

/// Characters of summary quoted per article in the scoring prompt.
const PROMPT_SUMMARY_CHARS: usize = 300;

/// Which hosted model family backs the scorer.
#[derive(Clone)]
pub enum LlmBackend {
    OpenAi(Arc<OpenAi>),
    Claude(Arc<Claude>),
}

impl LlmBackend {
    /// The Claude client carries its model from construction; the per-call
    /// model only applies to the OpenAI path.
    async fn extract<T: StructuredOutput>(
        &self,
        model: &str,
        system: &str,
        user: &str,
    ) -> Result<T> {
        match self {
            LlmBackend::OpenAi(ai) => ai.extract(model, system, user).await,
            LlmBackend::Claude(ai) => ai.extract(system, user).await,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ArticleScoreRow {
    /// Zero-based index into the submitted batch.
    index: usize,
    /// 0-1, higher = more clickbait.
    score: f64,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ArticleScoresResponse {
    scores: Vec<ArticleScoreRow>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct TopicScoresResponse {
    civic_score: f64,
    quality_score: f64,
    audience_score: f64,
    risk_flag: bool,
    primary_topic: String,
    canonical_tags: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SeedStatementsResponse {
    statements: Vec<String>,
}

/// Provider backed by a hosted model. Every call is one structured-output
/// extraction; malformed or partial responses degrade instead of failing
/// where a safe default exists.
pub struct LlmScorer {
    backend: LlmBackend,
    scoring_model: String,
    statements_model: String,
}

impl LlmScorer {
    pub fn new(
        backend: LlmBackend,
        scoring_model: impl Into<String>,
        statements_model: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            scoring_model: scoring_model.into(),
            statements_model: statements_model.into(),
        }
    }
}

#[async_trait]
impl ScoringProvider for LlmScorer {
    fn name(&self) -> &'static str {
        match self.backend {
            LlmBackend::OpenAi(_) => "openai",
            LlmBackend::Claude(_) => "claude",
        }
    }

    async fn score_articles(&self, articles: &[ArticleText]) -> Result<Vec<Option<f64>>> {
        if articles.is_empty() {
            return Ok(Vec::new());
        }

        let mut lines = Vec::with_capacity(articles.len());
        for (i, article) in articles.iter().enumerate() {
            lines.push(format!(
                "{i}. {}: {}",
                article.title,
                head_chars(&article.summary, PROMPT_SUMMARY_CHARS)
            ));
        }
        let user = lines.join("\n");

        let response: ArticleScoresResponse = self
            .backend
            .extract(&self.scoring_model, ARTICLE_SYSTEM_PROMPT, &user)
            .await?;

        Ok(spread_scores(response.scores, articles.len()))
    }

    async fn score_topic(&self, titles: &[String]) -> Result<TopicScores> {
        let user = format!(
            "Headlines:\n{}",
            titles
                .iter()
                .map(|t| format!("- {t}"))
                .collect::<Vec<_>>()
                .join("\n")
        );

        let response: TopicScoresResponse = self
            .backend
            .extract(&self.scoring_model, TOPIC_SYSTEM_PROMPT, &user)
            .await?;

        let primary_topic = response.primary_topic.trim().to_lowercase();
        Ok(TopicScores {
            civic_score: response.civic_score.clamp(0.0, 1.0),
            quality_score: response.quality_score.clamp(0.0, 1.0),
            audience_score: response.audience_score.clamp(0.0, 1.0),
            risk_flag: response.risk_flag,
            primary_topic: if primary_topic.is_empty() {
                "general".to_string()
            } else {
                primary_topic
            },
            canonical_tags: response
                .canonical_tags
                .into_iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        })
    }

    async fn seed_statements(&self, title: &str, description: &str) -> Result<Vec<SeedStatement>> {
        let user = format!("Story: {title}\n\n{description}");

        let response: SeedStatementsResponse = self
            .backend
            .extract(&self.statements_model, STATEMENTS_SYSTEM_PROMPT, &user)
            .await?;

        let statements = to_seed_statements(response.statements);
        if statements.len() < 3 {
            return Ok(default_seed_statements(title));
        }
        Ok(statements)
    }
}

/// Place indexed rows into a dense per-article vector. Out-of-range rows
/// are dropped; unmentioned indices stay `None` for the heuristic fallback.
fn spread_scores(rows: Vec<ArticleScoreRow>, len: usize) -> Vec<Option<f64>> {
    let mut scores: Vec<Option<f64>> = vec![None; len];
    for row in rows {
        if row.index < len {
            scores[row.index] = Some(row.score.clamp(0.0, 1.0));
        }
    }
    scores
}

fn to_seed_statements(raw: Vec<String>) -> Vec<SeedStatement> {
    raw.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(5)
        .enumerate()
        .map(|(i, content)| SeedStatement {
            content,
            position: i as i32,
        })
        .collect()
}

fn head_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
