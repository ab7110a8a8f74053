use sha2::{Digest, Sha256};

pub fn compute_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// Cache keys are derived from the case-folded, trimmed topic so that
/// "Space Exploration" and " space exploration " share an entry.
pub fn normalize_topic(topic: &str) -> String {
    topic.trim().to_lowercase()
}

pub fn topic_hash(topic: &str) -> String {
    compute_hash(&normalize_topic(topic))
}
