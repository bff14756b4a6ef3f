//! Per-installation key derivation.

use crate::{IdentityProvider, VaultError, VaultResult};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use std::sync::Arc;
use tokio::sync::OnceCell;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Derived key size for AES-256-GCM (256 bits).
pub const KEY_SIZE: usize = 32;

/// PBKDF2 iteration count.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Appended to the installation identity to form the PBKDF2 password.
const PASSWORD_SUFFIX: &str = "-companion-credential-key";

/// The PBKDF2 salt is `SALT_PREFIX || SALT_SUFFIX`.
const SALT_PREFIX: &str = "companion-vault-salt";
const SALT_SUFFIX: &str = "-v1";

/// Symmetric key derived from the installation identity.
///
/// Never persisted and never logged. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_SIZE]);

impl DerivedKey {
    /// Run PBKDF2-HMAC-SHA256 over the identity and the fixed constants.
    pub fn derive(installation_id: &str, iterations: u32) -> Self {
        let mut password = format!("{}{}", installation_id, PASSWORD_SUFFIX);
        let salt = format!("{}{}", SALT_PREFIX, SALT_SUFFIX);

        let mut key = [0u8; KEY_SIZE];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut key);
        password.zeroize();

        Self(key)
    }

    /// Returns a reference to the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Supplies the derived key, memoized for the provider's lifetime.
///
/// A failed derivation is not cached; the next call retries.
pub struct KeyProvider {
    identity: Arc<dyn IdentityProvider>,
    iterations: u32,
    cached: OnceCell<DerivedKey>,
}

impl KeyProvider {
    /// Create a provider using the standard iteration count.
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self::with_iterations(identity, PBKDF2_ITERATIONS)
    }

    /// Create a provider with a custom iteration count.
    ///
    /// Keys derived with different counts are incompatible.
    pub fn with_iterations(identity: Arc<dyn IdentityProvider>, iterations: u32) -> Self {
        Self {
            identity,
            iterations: iterations.max(1),
            cached: OnceCell::new(),
        }
    }

    /// Derive (or return the memoized) key.
    pub async fn derive_key(&self) -> VaultResult<&DerivedKey> {
        self.cached
            .get_or_try_init(|| async {
                let installation_id = self.identity.installation_id()?;
                let iterations = self.iterations;

                // PBKDF2 is CPU-bound; keep it off the async workers.
                let key = tokio::task::spawn_blocking(move || {
                    DerivedKey::derive(&installation_id, iterations)
                })
                .await
                .map_err(|e| VaultError::KeyDerivation(format!("derivation task failed: {}", e)))?;

                tracing::debug!(iterations, "Derived installation key");
                Ok::<_, VaultError>(key)
            })
            .await
    }
}
