//! Durable storage abstraction for the companion background process.
//!
//! This crate provides the key-value store the vault and the admission
//! controller persist into:
//! - **JSON file**: `JsonFileStore`, the production store that survives restarts
//! - **Memory**: `MemoryStore`, for tests and ephemeral sessions

mod file;
mod keys;
mod memory;
mod traits;

pub use file::JsonFileStore;
pub use keys::StorageKeys;
pub use memory::MemoryStore;
pub use traits::DurableStore;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend unavailable or refused the operation
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
