pub mod activities;
pub mod models;
pub mod notify;

pub use models::discussion::Discussion;
pub use models::statement::Statement;
