pub mod ingest;
pub mod score;

pub use ingest::{fetch_all_sources, IngestStats};
pub use score::score_unscored_articles;
