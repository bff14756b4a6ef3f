//! Service wiring shared by the CLI and the message host.

use crate::gate::CallGate;
use companion_admission::AdmissionController;
use companion_config_and_utils::Paths;
use companion_storage::{DurableStore, JsonFileStore};
use companion_vault::{FileIdentity, IdentityProvider, KeyProvider, SecretVault, PBKDF2_ITERATIONS};
use std::sync::Arc;
use tracing::info;

/// Background services (thread-safe, cheap to share behind `Arc`).
pub struct Services {
    pub vault: Arc<SecretVault>,
    pub admission: Arc<AdmissionController>,
    pub gate: CallGate,
}

impl Services {
    /// Wire the production services under `paths`.
    pub fn open(paths: &Paths) -> Self {
        let store: Arc<dyn DurableStore> = Arc::new(JsonFileStore::new(paths.store_file()));
        let identity = Arc::new(FileIdentity::new(paths.installation_id_file()));

        info!(
            store = %paths.store_file().display(),
            identity = %paths.installation_id_file().display(),
            "Opening background services"
        );

        Self::from_parts(identity, store, PBKDF2_ITERATIONS)
    }

    /// Wire services from explicit collaborators.
    pub fn from_parts(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DurableStore>,
        iterations: u32,
    ) -> Self {
        let keys = Arc::new(KeyProvider::with_iterations(identity, iterations));
        let vault = Arc::new(SecretVault::new(keys, store.clone()));
        let admission = Arc::new(AdmissionController::new(store));
        let gate = CallGate::new(admission.clone(), vault.clone());

        Self {
            vault,
            admission,
            gate,
        }
    }
}
