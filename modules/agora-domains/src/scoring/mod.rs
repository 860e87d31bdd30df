pub mod heuristic;
pub mod llm;

pub use heuristic::HeuristicProvider;
pub use llm::{LlmBackend, LlmScorer};
