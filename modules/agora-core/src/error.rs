//! Typed errors for the two boundaries callers branch on: per-source
//! ingestion and topic publishing. Everything else flows as `anyhow`.

use thiserror::Error;
use uuid::Uuid;

use crate::types::TopicStatus;

/// Errors raised while fetching one source. Always handled per source;
/// never aborts the batch.
#[derive(Debug, Error)]
pub enum IngestError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response was not a parseable feed or API page
    #[error("parse error: {0}")]
    Parse(String),

    /// Upstream answered with a non-success status
    #[error("upstream returned {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type IngestResult<T> = Result<T, IngestError>;

/// Errors raised while publishing one approved topic.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Topic is not in a publishable status
    #[error("topic {0} cannot be published from status {1}")]
    InvalidStatus(Uuid, TopicStatus),

    /// Every slug attempt collided
    #[error("no unique slug for {title:?} after {attempts} attempts")]
    SlugExhausted { title: String, attempts: u32 },

    /// Non-slug constraint violation or other database failure
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type PublishResult<T> = Result<T, PublishError>;
