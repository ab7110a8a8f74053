pub mod hash;
pub mod store;

pub use hash::{compute_hash, normalize_topic, topic_hash};
pub use store::DesignCache;
