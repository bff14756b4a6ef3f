//! Credential protection for the companion background process.
//!
//! The API credential is encrypted at rest with AES-256-GCM under a key
//! derived (PBKDF2-HMAC-SHA256) from the installation identity. Values
//! written before encryption existed stay readable:
//! - **Tagged envelopes** (`{"version": 1|2, "payload": ...}`) are the
//!   steady-state format
//! - **Untagged strings** are classified by shape once, then migrated to an
//!   encrypted envelope

mod cipher;
mod envelope;
mod identity;
mod key;
mod vault;

pub use cipher::{looks_encrypted, IV_SIZE, MIN_ENCRYPTED_LEN, TAG_SIZE};
pub use envelope::StoredSecret;
pub use identity::{FileIdentity, IdentityProvider, StaticIdentity};
pub use key::{DerivedKey, KeyProvider, KEY_SIZE, PBKDF2_ITERATIONS};
pub use vault::{DecryptOutcome, SecretVault};

use companion_storage::StorageError;
use thiserror::Error;

/// Error type for vault operations.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Installation identity unavailable; the secret is inaccessible for this call
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    /// Authenticated encryption or encoding failed; nothing was written
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Decryption failed. Absorbed by `SecretVault::decrypt`, only visible
    /// through `DecryptOutcome::Failed`.
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Caller supplied an unusable value
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stored envelope carries a version this build does not understand
    #[error("Unsupported secret envelope version: {0}")]
    UnsupportedVersion(u64),

    /// Underlying store failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;
