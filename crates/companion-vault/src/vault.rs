//! High-level API for the stored API credential.

use crate::cipher::{self, looks_encrypted};
use crate::{KeyProvider, StoredSecret, VaultError, VaultResult};
use companion_storage::{DurableStore, StorageKeys};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of trying to decrypt a stored value.
#[derive(Debug)]
pub enum DecryptOutcome {
    /// Authenticated decryption succeeded.
    Decrypted(String),
    /// The value did not look like ciphertext and was taken as plaintext.
    LegacyPassthrough(String),
    /// The value looked like ciphertext but could not be opened.
    Failed {
        /// The input, unchanged.
        original: String,
        /// Why decryption failed.
        reason: VaultError,
    },
}

impl DecryptOutcome {
    /// The value a caller should use: the plaintext, or the input unchanged.
    pub fn into_plaintext(self) -> String {
        match self {
            Self::Decrypted(p) | Self::LegacyPassthrough(p) => p,
            Self::Failed { original, .. } => original,
        }
    }
}

/// Encrypts, decrypts, and persists the API credential.
///
/// Writes to the credential key (save, clear, and the migrating read) are
/// serialized, so a migration never overwrites a newer save.
pub struct SecretVault {
    keys: Arc<KeyProvider>,
    store: Arc<dyn DurableStore>,
    write_lock: Mutex<()>,
}

impl SecretVault {
    /// Create a vault over the given key provider and store.
    pub fn new(keys: Arc<KeyProvider>, store: Arc<dyn DurableStore>) -> Self {
        Self {
            keys,
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Encrypt a non-empty plaintext into base64(`iv || ciphertext || tag`).
    ///
    /// Every call uses a fresh IV, so equal inputs give different outputs.
    pub async fn encrypt(&self, plaintext: &str) -> VaultResult<String> {
        if plaintext.is_empty() {
            return Err(VaultError::InvalidInput(
                "cannot encrypt an empty secret".to_string(),
            ));
        }

        let key = self.keys.derive_key().await?;
        cipher::seal(key, plaintext.as_bytes())
    }

    /// Decrypt a stored value, never failing.
    ///
    /// Legacy plaintext and values that cannot be decrypted come back
    /// unchanged. A tampered or foreign ciphertext therefore surfaces later as
    /// an invalid credential rather than as an error here.
    pub async fn decrypt(&self, stored: &str) -> String {
        let outcome = self.decrypt_detailed(stored).await;
        match &outcome {
            DecryptOutcome::Decrypted(_) => debug!("Decrypted stored secret"),
            DecryptOutcome::LegacyPassthrough(_) => {
                debug!("Stored secret is legacy plaintext; using it as-is")
            }
            DecryptOutcome::Failed { reason, .. } => {
                warn!(error = %reason, "Stored secret could not be decrypted; using it as-is")
            }
        }
        outcome.into_plaintext()
    }

    /// Decrypt a stored value, reporting which path was taken.
    pub async fn decrypt_detailed(&self, stored: &str) -> DecryptOutcome {
        if !looks_encrypted(stored) {
            return DecryptOutcome::LegacyPassthrough(stored.to_string());
        }

        let key = match self.keys.derive_key().await {
            Ok(key) => key,
            Err(reason) => {
                return DecryptOutcome::Failed {
                    original: stored.to_string(),
                    reason,
                }
            }
        };

        let opened = cipher::open(key, stored).and_then(|bytes| {
            String::from_utf8(bytes)
                .map_err(|e| VaultError::Decryption(format!("plaintext is not UTF-8: {}", e)))
        });

        match opened {
            Ok(plaintext) => DecryptOutcome::Decrypted(plaintext),
            Err(reason) => DecryptOutcome::Failed {
                original: stored.to_string(),
                reason,
            },
        }
    }

    // ==========================================
    // Persistence
    // ==========================================

    /// Encrypt and store the credential, replacing any previous one.
    ///
    /// Nothing is written if encryption fails.
    pub async fn save_secret(&self, plaintext: &str) -> VaultResult<()> {
        let _guard = self.write_lock.lock().await;
        self.write_sealed(plaintext).await
    }

    async fn write_sealed(&self, plaintext: &str) -> VaultResult<()> {
        let sealed = self.encrypt(plaintext).await?;
        self.store
            .set_one(StorageKeys::API_KEY, StoredSecret::Encrypted(sealed).to_value())
            .await?;
        info!("Saved API credential");
        Ok(())
    }

    /// Retrieve the plaintext credential, if one is stored.
    ///
    /// Untagged values from before envelopes existed are migrated to an
    /// encrypted envelope on first read. Storage errors propagate.
    pub async fn reveal_secret(&self) -> VaultResult<Option<String>> {
        let _guard = self.write_lock.lock().await;

        let value = match self.store.get_one(StorageKeys::API_KEY).await? {
            Some(value) => value,
            None => return Ok(None),
        };

        match StoredSecret::from_value(value)? {
            StoredSecret::Plaintext(plaintext) => Ok(Some(plaintext)),
            StoredSecret::Encrypted(sealed) => Ok(Some(self.decrypt(&sealed).await)),
            StoredSecret::Untagged(raw) if raw.is_empty() => Ok(None),
            StoredSecret::Untagged(raw) => match self.decrypt_detailed(&raw).await {
                DecryptOutcome::Decrypted(plaintext) | DecryptOutcome::LegacyPassthrough(plaintext) => {
                    self.migrate_untagged(&plaintext).await;
                    Ok(Some(plaintext))
                }
                DecryptOutcome::Failed { original, reason } => {
                    warn!(
                        error = %reason,
                        "Untagged credential looks encrypted but cannot be opened; leaving it in place"
                    );
                    Ok(Some(original))
                }
            },
        }
    }

    /// Whether a credential is stored.
    ///
    /// An empty untagged value counts as absent, as in [`Self::reveal_secret`].
    pub async fn has_secret(&self) -> VaultResult<bool> {
        Ok(match self.store.get_one(StorageKeys::API_KEY).await? {
            None => false,
            Some(Value::String(raw)) => !raw.is_empty(),
            Some(_) => true,
        })
    }

    /// Delete the stored credential.
    pub async fn clear_secret(&self) -> VaultResult<()> {
        let _guard = self.write_lock.lock().await;
        self.store.remove(&[StorageKeys::API_KEY]).await?;
        info!("Cleared API credential");
        Ok(())
    }

    /// Rewrite a pre-envelope credential as an encrypted envelope.
    /// The caller holds the write lock.
    ///
    /// Best effort: the read already succeeded, so a failure here is logged
    /// and retried on the next read.
    async fn migrate_untagged(&self, plaintext: &str) {
        match self.write_sealed(plaintext).await {
            Ok(()) => info!("Migrated untagged credential to encrypted envelope"),
            Err(e) => warn!(error = %e, "Failed to migrate untagged credential"),
        }
    }
}
