pub mod auto_publish;
pub mod cluster;
pub mod process_held;
pub mod review;

pub use auto_publish::auto_publish_eligible;
pub use cluster::{cluster_unclaimed_articles, ClusterStats};
pub use process_held::process_held_topics;
pub use review::{approve_topic, discard_topic, merge_topics};
