use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Fetch strategy for a source. `Wire` fetches like `Rss` but marks the
/// source as agency-grade for the auto-publish predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Rss,
    Api,
    Wire,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Rss => "rss",
            SourceType::Api => "api",
            SourceType::Wire => "wire",
        }
    }

    /// Parse a stored value, defaulting to `Rss` for anything unknown.
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "api" => SourceType::Api,
            "wire" => SourceType::Wire,
            _ => SourceType::Rss,
        }
    }

    /// Whether the source is read as an RSS/Atom feed.
    pub fn is_feed(&self) -> bool {
        matches!(self, SourceType::Rss | SourceType::Wire)
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Review/publish lifecycle of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    Pending,
    PendingReview,
    Approved,
    Published,
    Merged,
    Discarded,
}

impl TopicStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicStatus::Pending => "pending",
            TopicStatus::PendingReview => "pending_review",
            TopicStatus::Approved => "approved",
            TopicStatus::Published => "published",
            TopicStatus::Merged => "merged",
            TopicStatus::Discarded => "discarded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(TopicStatus::Pending),
            "pending_review" => Some(TopicStatus::PendingReview),
            "approved" => Some(TopicStatus::Approved),
            "published" => Some(TopicStatus::Published),
            "merged" => Some(TopicStatus::Merged),
            "discarded" => Some(TopicStatus::Discarded),
            _ => None,
        }
    }

    /// No automated transition may leave a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TopicStatus::Published | TopicStatus::Merged | TopicStatus::Discarded
        )
    }

    /// The full transition table. Guarded SQL updates enforce the same
    /// rules a second time at the row level.
    pub fn can_transition_to(&self, next: TopicStatus) -> bool {
        use TopicStatus::*;
        match (self, next) {
            (Pending, PendingReview) => true,
            (PendingReview, Approved) => true,
            (PendingReview, Published) => true,
            (PendingReview, Merged) => true,
            (Approved, Published) => true,
            (Approved, Merged) => true,
            (Pending | PendingReview | Approved, Discarded) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for TopicStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scores assigned to a topic when it leaves the hold window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicScores {
    pub civic_score: f64,
    pub quality_score: f64,
    pub audience_score: f64,
    pub risk_flag: bool,
    pub primary_topic: String,
    pub canonical_tags: Vec<String>,
}

impl TopicScores {
    /// Fallback when the scoring provider fails: neutral midpoints and a
    /// generic category, so review gating always has usable values.
    pub fn neutral() -> Self {
        Self {
            civic_score: 0.5,
            quality_score: 0.5,
            audience_score: 0.5,
            risk_flag: false,
            primary_topic: "general".to_string(),
            canonical_tags: Vec::new(),
        }
    }
}

/// Pre-approved conversation prompt carried on a topic and copied onto the
/// discussion at publish time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SeedStatement {
    pub content: String,
    pub position: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_round_trip() {
        for t in [SourceType::Rss, SourceType::Api, SourceType::Wire] {
            assert_eq!(SourceType::from_str_loose(t.as_str()), t);
        }
        assert_eq!(SourceType::from_str_loose("unknown"), SourceType::Rss);
        assert!(SourceType::Wire.is_feed());
        assert!(!SourceType::Api.is_feed());
    }

    #[test]
    fn status_round_trip() {
        for s in [
            TopicStatus::Pending,
            TopicStatus::PendingReview,
            TopicStatus::Approved,
            TopicStatus::Published,
            TopicStatus::Merged,
            TopicStatus::Discarded,
        ] {
            assert_eq!(TopicStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(TopicStatus::parse("garbage"), None);
    }

    #[test]
    fn terminal_statuses_accept_nothing() {
        use TopicStatus::*;
        for terminal in [Published, Merged, Discarded] {
            for next in [Pending, PendingReview, Approved, Published, Merged, Discarded] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn lifecycle_edges() {
        use TopicStatus::*;
        assert!(Pending.can_transition_to(PendingReview));
        assert!(PendingReview.can_transition_to(Published));
        assert!(PendingReview.can_transition_to(Approved));
        assert!(Approved.can_transition_to(Published));
        assert!(PendingReview.can_transition_to(Merged));
        assert!(Approved.can_transition_to(Merged));
        assert!(Pending.can_transition_to(Discarded));
        assert!(!Pending.can_transition_to(Published));
        assert!(!Pending.can_transition_to(Approved));
        assert!(!Pending.can_transition_to(Merged));
    }

    #[test]
    fn neutral_scores_are_midpoint() {
        let scores = TopicScores::neutral();
        assert_eq!(scores.civic_score, 0.5);
        assert_eq!(scores.primary_topic, "general");
        assert!(!scores.risk_flag);
    }
}
