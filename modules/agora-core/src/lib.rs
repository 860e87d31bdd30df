pub mod config;
pub mod deps;
pub mod error;
pub mod fetch;
pub mod file_config;
pub mod types;

pub use config::AppConfig;
pub use deps::{
    AnnounceBackend, DisabledEmbedder, EmbeddingService, PipelineDeps, ScoringProvider,
};
pub use error::{IngestError, IngestResult, PublishError, PublishResult};
pub use fetch::{ArticleDraft, ArticleFetcher};
pub use file_config::{load_config, FileConfig};
pub use types::*;
