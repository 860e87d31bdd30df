pub mod articles;
pub mod discussions;
pub mod pipeline;
pub mod query_helpers;
pub mod scoring;
pub mod similarity;
pub mod sources;
pub mod testing;
pub mod topics;
