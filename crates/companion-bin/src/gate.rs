//! Outbound call dispatch: admission first, then the credential, then the call.

use companion_admission::{AdmissionController, AdmissionError};
use companion_vault::{SecretVault, VaultError};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Why a gated call did not run.
#[derive(Error, Debug)]
pub enum GateError {
    #[error(transparent)]
    RateLimited(#[from] AdmissionError),

    #[error("No API key configured")]
    MissingSecret,

    #[error("Credential unavailable: {0}")]
    Vault(#[from] VaultError),
}

/// Every outbound action passes through here.
pub struct CallGate {
    admission: Arc<AdmissionController>,
    vault: Arc<SecretVault>,
}

impl CallGate {
    pub fn new(admission: Arc<AdmissionController>, vault: Arc<SecretVault>) -> Self {
        Self { admission, vault }
    }

    /// Run `call` with the plaintext credential if `category` is admitted.
    ///
    /// An admitted call is counted even when the credential turns out to be
    /// missing.
    pub async fn run<T, F, Fut>(&self, category: &str, call: F) -> Result<T, GateError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = T>,
    {
        self.admission
            .check_and_record(category)
            .await
            .into_result(category)?;

        let secret = self
            .vault
            .reveal_secret()
            .await?
            .ok_or(GateError::MissingSecret)?;

        debug!(category = %category, "Dispatching gated call");
        Ok(call(secret).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use companion_admission::{categories, TimeProvider};
    use companion_storage::{DurableStore, MemoryStore};
    use companion_vault::{KeyProvider, StaticIdentity};

    struct FixedClock(u64);

    impl TimeProvider for FixedClock {
        fn now_unix_ms(&self) -> u64 {
            self.0
        }
    }

    fn gate() -> (CallGate, Arc<SecretVault>) {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let keys = Arc::new(KeyProvider::with_iterations(
            Arc::new(StaticIdentity::new("gate-install")),
            1_000,
        ));
        let vault = Arc::new(SecretVault::new(keys, store.clone()));
        let admission = Arc::new(AdmissionController::with_clock(
            store,
            Arc::new(FixedClock(1_000_000)),
        ));
        (CallGate::new(admission, vault.clone()), vault)
    }

    #[tokio::test]
    async fn test_call_receives_plaintext_secret() {
        let (gate, vault) = gate();
        vault.save_secret("sk-gated").await.unwrap();

        let seen = gate
            .run(categories::CHAT_COMPLETION, |secret| async move { secret })
            .await
            .unwrap();
        assert_eq!(seen, "sk-gated");
    }

    #[tokio::test]
    async fn test_missing_secret() {
        let (gate, _vault) = gate();
        let result = gate
            .run(categories::FETCH_MODELS, |_secret| async {})
            .await;
        assert!(matches!(result, Err(GateError::MissingSecret)));
    }

    #[tokio::test]
    async fn test_rate_limit_blocks_before_call() {
        let (gate, vault) = gate();
        vault.save_secret("sk-gated").await.unwrap();

        for _ in 0..5 {
            gate.run(categories::FETCH_MODELS, |_| async {}).await.unwrap();
        }

        let mut called = false;
        let result = gate
            .run(categories::FETCH_MODELS, |_| {
                called = true;
                async {}
            })
            .await;

        assert!(!called);
        match result {
            Err(GateError::RateLimited(AdmissionError::RateLimitExceeded {
                category,
                wait_seconds,
            })) => {
                assert_eq!(category, categories::FETCH_MODELS);
                assert_eq!(wait_seconds, 60);
            }
            other => panic!("expected rate limit, got {:?}", other.map(|_| ())),
        }
    }
}
