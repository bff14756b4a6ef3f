//! JSON file backed store.

use crate::{DurableStore, StorageError, StorageResult};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Durable store persisted as a single JSON object on disk.
///
/// Every write rewrites the whole object through a temp file and a rename, so
/// readers never observe a half-written file. An internal mutex serializes
/// read-modify-write cycles within the process.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (or lazily create) a store at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> StorageResult<Map<String, Value>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            other => Err(StorageError::Encoding(format!(
                "store root must be a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }

    async fn persist(&self, map: &Map<String, Value>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_vec_pretty(map)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        debug!(path = %self.path.display(), keys = map.len(), "Persisted store");
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl DurableStore for JsonFileStore {
    async fn get(&self, keys: &[&str]) -> StorageResult<HashMap<String, Value>> {
        let mut map = self.load().await?;
        Ok(keys
            .iter()
            .filter_map(|key| map.remove(*key).map(|v| (key.to_string(), v)))
            .collect())
    }

    async fn set(&self, entries: HashMap<String, Value>) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;
        map.extend(entries);
        self.persist(&map).await
    }

    async fn remove(&self, keys: &[&str]) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;
        let before = map.len();
        for key in keys {
            map.remove(*key);
        }
        if map.len() == before {
            return Ok(());
        }
        self.persist(&map).await
    }
}
