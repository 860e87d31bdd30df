//! Thin clients for the two model vendors the pipeline can talk to.
//!
//! `OpenAi` covers any OpenAI-compatible endpoint (chat, JSON-schema structured
//! output, embeddings); `Claude` covers the Anthropic messages API (chat,
//! structured output via forced tool use). No agent loop, no streaming.

pub mod claude;
pub mod openai;

pub use claude::Claude;
pub use openai::{OpenAi, StructuredOutput};
