//! Storage trait definitions.

use crate::StorageResult;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Durable key-value store shared process-wide.
///
/// Mirrors the host's local storage area: values are JSON, reads take a set of
/// keys and return only the ones present, writes merge a mapping into the store.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Read the given keys. Absent keys are missing from the returned map.
    async fn get(&self, keys: &[&str]) -> StorageResult<HashMap<String, Value>>;

    /// Merge the given entries into the store.
    async fn set(&self, entries: HashMap<String, Value>) -> StorageResult<()>;

    /// Remove the given keys. Removing an absent key is not an error.
    async fn remove(&self, keys: &[&str]) -> StorageResult<()>;

    /// Read a single key.
    async fn get_one(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.get(&[key]).await?.remove(key))
    }

    /// Write a single key.
    async fn set_one(&self, key: &str, value: Value) -> StorageResult<()> {
        let mut entries = HashMap::with_capacity(1);
        entries.insert(key.to_string(), value);
        self.set(entries).await
    }
}
