use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use tokio::fs;

use crate::cache::hash::{normalize_topic, topic_hash};
use crate::design::DesignRecord;

/// File-backed design cache. One JSON file per normalized topic, named by
/// the topic hash, so concurrent requests for different topics never touch
/// the same file. Same-topic races are last-writer-wins.
#[derive(Clone, Debug)]
pub struct DesignCache {
    base_dir: PathBuf,
}

impl DesignCache {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    fn entry_path(&self, topic: &str) -> PathBuf {
        self.base_dir.join(format!("design-{}.json", topic_hash(topic)))
    }

    /// Returns the cached design for a topic, or `None`. Read failures are
    /// logged and degrade to a miss; the caller regenerates.
    pub async fn lookup(&self, topic: &str) -> Option<DesignRecord> {
        let path = self.entry_path(topic);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(?path, %err, "failed to read cache entry");
                return None;
            }
        };
        let record: DesignRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(?path, %err, "invalid cache entry");
                return None;
            }
        };
        // Hash collisions are detected, not trusted: the stored topic must
        // textually match the requested one.
        if normalize_topic(&record.topic) != normalize_topic(topic) {
            tracing::warn!(topic, stored = %record.topic, "cache key collision, treating as miss");
            return None;
        }
        tracing::info!(topic, "design cache hit");
        Some(record)
    }

    /// Best-effort write: caching is an optimization, so failures are logged
    /// and never surfaced to the caller.
    pub async fn store(&self, design: &DesignRecord) {
        let mut entry = design.clone();
        entry.cached_at = Some(Utc::now().to_rfc3339());
        let path = self.entry_path(&entry.topic);
        if let Err(err) = self.write_entry(&path, &entry).await {
            tracing::warn!(?path, %err, "failed to write cache entry");
        } else {
            tracing::info!(topic = %entry.topic, "cached design");
        }
    }

    async fn write_entry(&self, path: &PathBuf, entry: &DesignRecord) -> Result<()> {
        fs::create_dir_all(&self.base_dir).await?;
        let payload = serde_json::to_vec_pretty(entry)?;
        fs::write(path, payload).await?;
        Ok(())
    }

    /// Removes every cached design. Returns the number of entries deleted.
    pub async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        let mut dir = match fs::read_dir(&self.base_dir).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_design(topic: &str) -> DesignRecord {
        DesignRecord {
            id: "design-1".to_string(),
            topic: topic.to_string(),
            image_url: "https://example.com/design.png".to_string(),
            prompt: "prompt".to_string(),
            created_at: Utc::now().to_rfc3339(),
            provider: Some("stability-ai".to_string()),
            cached_at: None,
        }
    }

    #[tokio::test]
    async fn store_then_lookup_round_trips() {
        let dir = tempdir().unwrap();
        let cache = DesignCache::new(dir.path().to_path_buf());
        cache.store(&sample_design("Space Exploration")).await;

        let hit = cache.lookup("Space Exploration").await.unwrap();
        assert_eq!(hit.id, "design-1");
        assert!(hit.cached_at.is_some());
    }

    #[tokio::test]
    async fn lookup_normalizes_topic() {
        let dir = tempdir().unwrap();
        let cache = DesignCache::new(dir.path().to_path_buf());
        cache.store(&sample_design("Space Exploration")).await;

        assert!(cache.lookup("  space exploration ").await.is_some());
    }

    #[tokio::test]
    async fn colliding_entry_with_other_topic_is_a_miss() {
        let dir = tempdir().unwrap();
        let cache = DesignCache::new(dir.path().to_path_buf());

        // Forge an entry under topic A's key that claims to be topic B.
        let mut forged = sample_design("other topic");
        forged.cached_at = Some(Utc::now().to_rfc3339());
        let path = cache.entry_path("topic a");
        fs::create_dir_all(dir.path()).await.unwrap();
        fs::write(&path, serde_json::to_vec(&forged).unwrap())
            .await
            .unwrap();

        assert!(cache.lookup("topic a").await.is_none());
    }

    #[tokio::test]
    async fn clear_removes_all_entries() {
        let dir = tempdir().unwrap();
        let cache = DesignCache::new(dir.path().to_path_buf());
        cache.store(&sample_design("one")).await;
        cache.store(&sample_design("two")).await;

        assert_eq!(cache.clear().await.unwrap(), 2);
        assert!(cache.lookup("one").await.is_none());
    }

    #[tokio::test]
    async fn clear_on_missing_dir_is_a_noop() {
        let dir = tempdir().unwrap();
        let cache = DesignCache::new(dir.path().join("never-created"));
        assert_eq!(cache.clear().await.unwrap(), 0);
    }
}
