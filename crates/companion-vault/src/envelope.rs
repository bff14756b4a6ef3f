//! Tagged storage representation of the API credential.

use crate::{VaultError, VaultResult};
use companion_storage::StorageError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize)]
struct SecretEnvelope {
    version: u64,
    payload: String,
}

/// The credential as found in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredSecret {
    /// `{"version": 1, "payload": <plaintext>}`
    Plaintext(String),
    /// `{"version": 2, "payload": <base64(iv || ciphertext || tag)>}`
    Encrypted(String),
    /// Bare string written before envelopes existed. Its shape decides
    /// whether it is plaintext or ciphertext.
    Untagged(String),
}

impl StoredSecret {
    /// Envelope version for plaintext payloads.
    pub const PLAINTEXT_VERSION: u64 = 1;
    /// Envelope version for AES-256-GCM payloads.
    pub const ENCRYPTED_VERSION: u64 = 2;

    /// Parse a raw store value.
    pub fn from_value(value: Value) -> VaultResult<Self> {
        if let Value::String(raw) = value {
            return Ok(Self::Untagged(raw));
        }

        let envelope: SecretEnvelope =
            serde_json::from_value(value).map_err(|e| VaultError::Storage(StorageError::Json(e)))?;

        match envelope.version {
            Self::PLAINTEXT_VERSION => Ok(Self::Plaintext(envelope.payload)),
            Self::ENCRYPTED_VERSION => Ok(Self::Encrypted(envelope.payload)),
            other => Err(VaultError::UnsupportedVersion(other)),
        }
    }

    /// Render as a store value.
    pub fn to_value(&self) -> Value {
        let (version, payload) = match self {
            Self::Plaintext(p) => (Self::PLAINTEXT_VERSION, p),
            Self::Encrypted(p) => (Self::ENCRYPTED_VERSION, p),
            Self::Untagged(raw) => return Value::String(raw.clone()),
        };
        serde_json::json!({ "version": version, "payload": payload })
    }
}
