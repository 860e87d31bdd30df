pub mod activities;
pub mod fetch;
pub mod models;

pub use fetch::FeedFetcher;
pub use models::article::Article;
