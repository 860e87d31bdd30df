pub mod seed;

pub use seed::seed_sources;
