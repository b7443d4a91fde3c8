use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

/// Minimal key-value surface shared by the durable attempt store and the
/// ephemeral session store.
///
/// All writes are total overwrites and all operations are idempotent;
/// callers accept last-write-wins races instead of taking locks.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    /// Keys currently present under `prefix`. Used by the session sweeper.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// In-memory backend, used for the ephemeral session store and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_remove_round_trip() {
        let store = MemoryStore::new();

        store.put("a", "1").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("1".to_string()));

        store.put("a", "2").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("2".to_string()));

        store.remove("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn prefix_listing_only_matches_prefix() {
        let store = MemoryStore::new();
        store.put("sessionStart:a", "1").await.unwrap();
        store.put("sessionStart:b", "2").await.unwrap();
        store.put("identity:a", "x").await.unwrap();

        let mut keys = store.keys_with_prefix("sessionStart:").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["sessionStart:a", "sessionStart:b"]);
    }
}
