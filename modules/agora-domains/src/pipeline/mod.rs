pub mod run;

pub use run::{process_held, run_pipeline, RunSummary};
