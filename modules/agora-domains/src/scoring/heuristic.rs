use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;

use agora_core::deps::{ArticleText, ScoringProvider};
use agora_core::types::{SeedStatement, TopicScores};

/// Phrases that mark a headline as engagement bait.
const CLICKBAIT_PHRASES: &[&str] = &[
    "you won't believe",
    "you wont believe",
    "what happened next",
    "will shock you",
    "shocking",
    "jaw-dropping",
    "mind-blowing",
    "the real reason",
    "doctors hate",
    "this one trick",
    "one weird trick",
    "goes viral",
    "breaks the internet",
    "you need to know",
    "must see",
];

/// Deterministic sensationalism estimate in [0, 1], higher = more clickbait.
/// Always available; a configured provider's score replaces it per article.
pub fn sensationalism_score(title: &str, summary: &str) -> f64 {
    let text = format!("{title} {summary}");
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }

    // ALL-CAPS words of three letters or more.
    let caps = words
        .iter()
        .filter(|w| {
            let letters: Vec<char> = w.chars().filter(|c| c.is_alphabetic()).collect();
            letters.len() >= 3 && letters.iter().all(|c| c.is_uppercase())
        })
        .count();
    let caps_part = (caps as f64 / words.len() as f64 * 1.5).min(0.6);

    let punch = text.chars().filter(|c| *c == '!' || *c == '?').count();
    let punch_part = (punch as f64 / words.len() as f64 * 0.5).min(0.3);

    let lower = text.to_lowercase();
    let phrase_hits = CLICKBAIT_PHRASES
        .iter()
        .filter(|p| lower.contains(*p))
        .count();
    let phrase_part = (phrase_hits as f64 * 0.25).min(0.5);

    let listicle =
        Regex::new(r"(?i)\b\d+\s+(\w+\s+)?(things|ways|reasons|facts|tips|secrets|times|signs)\b")
            .expect("valid regex");
    let listicle_part = if listicle.is_match(title) { 0.3 } else { 0.0 };

    (caps_part + punch_part + phrase_part + listicle_part).clamp(0.0, 1.0)
}

/// Fallback seed statements derived from the topic title, used whenever no
/// provider-written set is available. Wording is fixed so review queues
/// stay predictable.
pub fn default_seed_statements(title: &str) -> Vec<SeedStatement> {
    vec![
        SeedStatement {
            content: format!(
                "The developments described in \"{title}\" will affect me or my community."
            ),
            position: 0,
        },
        SeedStatement {
            content: "The coverage of this story so far has been accurate and fair.".to_string(),
            position: 1,
        },
        SeedStatement {
            content: "Public institutions should respond to this issue with concrete action."
                .to_string(),
            position: 2,
        },
    ]
}

/// Provider used when no LLM is configured. Articles get the heuristic,
/// topics get neutral scores, statements get the default set.
pub struct HeuristicProvider;

#[async_trait]
impl ScoringProvider for HeuristicProvider {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn score_articles(&self, articles: &[ArticleText]) -> Result<Vec<Option<f64>>> {
        Ok(articles
            .iter()
            .map(|a| Some(sensationalism_score(&a.title, &a.summary)))
            .collect())
    }

    async fn score_topic(&self, _titles: &[String]) -> Result<TopicScores> {
        Ok(TopicScores::neutral())
    }

    async fn seed_statements(
        &self,
        title: &str,
        _description: &str,
    ) -> Result<Vec<SeedStatement>> {
        Ok(default_seed_statements(title))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_headline_scores_low() {
        let score = sensationalism_score(
            "Council approves transit budget",
            "The measure passed 7-2 after a two-hour session.",
        );
        assert!(score < 0.2, "got {score}");
    }

    #[test]
    fn clickbait_scores_high() {
        let score = sensationalism_score(
            "10 SHOCKING Ways You Won't Believe What Happened Next!!!",
            "",
        );
        assert!(score > 0.7, "got {score}");
    }

    #[test]
    fn all_caps_alone_stays_below_cutoff() {
        let score = sensationalism_score("BREAKING NEWS TONIGHT", "");
        assert!(score > 0.3, "got {score}");
        assert!(score < 0.7, "got {score}");
    }

    #[test]
    fn listicle_pattern_detected() {
        let with = sensationalism_score("7 ways to save on energy bills", "");
        let without = sensationalism_score("Seven ways to save on energy bills", "");
        assert!(with > without);
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(sensationalism_score("", ""), 0.0);
    }

    #[test]
    fn default_statements_are_positioned() {
        let statements = default_seed_statements("Port strike enters third week");
        assert_eq!(statements.len(), 3);
        for (i, s) in statements.iter().enumerate() {
            assert_eq!(s.position, i as i32);
        }
        assert!(statements[0].content.contains("Port strike enters third week"));
    }

    #[tokio::test]
    async fn heuristic_provider_scores_every_article() {
        let articles = vec![
            ArticleText {
                title: "Council approves transit budget".to_string(),
                summary: String::new(),
            },
            ArticleText {
                title: "You Won't Believe This One Weird Trick!!!".to_string(),
                summary: String::new(),
            },
        ];
        let scores = HeuristicProvider.score_articles(&articles).await.unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|s| s.is_some()));
        assert!(scores[1].unwrap() > scores[0].unwrap());
    }
}
