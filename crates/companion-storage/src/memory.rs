//! In-memory store.

use crate::{DurableStore, StorageResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory store. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Whether the store holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> StorageResult<HashMap<String, Value>> {
        let data = self.data.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| data.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, entries: HashMap<String, Value>) -> StorageResult<()> {
        self.data.write().await.extend(entries);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> StorageResult<()> {
        let mut data = self.data.write().await;
        for key in keys {
            data.remove(*key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty().await);

        let mut entries = HashMap::new();
        entries.insert("a".to_string(), json!(1));
        entries.insert("b".to_string(), json!([1, 2, 3]));
        store.set(entries).await.unwrap();

        // Only present keys are returned
        let got = store.get(&["a", "b", "c"]).await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got["a"], json!(1));
        assert_eq!(got["b"], json!([1, 2, 3]));

        // Set merges rather than replaces
        store.set_one("a", json!(2)).await.unwrap();
        assert_eq!(store.len().await, 2);
        assert_eq!(store.get_one("a").await.unwrap(), Some(json!(2)));

        store.remove(&["a", "missing"]).await.unwrap();
        assert_eq!(store.get_one("a").await.unwrap(), None);
        assert_eq!(store.len().await, 1);
    }
}
