//! Installation identity providers.
//!
//! The identity is assigned once per installation and only ever read by the
//! vault. It is key-derivation input, not a secret on its own.

use crate::{VaultError, VaultResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Host accessor for the installation identity.
pub trait IdentityProvider: Send + Sync {
    /// Return the stable identity string for this installation.
    ///
    /// Fails with [`VaultError::KeyDerivation`] outside a valid host context.
    fn installation_id(&self) -> VaultResult<String>;
}

/// Identity supplied directly by the host.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    id: String,
}

impl StaticIdentity {
    /// Wrap a host-supplied identity.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl IdentityProvider for StaticIdentity {
    fn installation_id(&self) -> VaultResult<String> {
        if self.id.trim().is_empty() {
            return Err(VaultError::KeyDerivation(
                "installation identity is empty".to_string(),
            ));
        }
        Ok(self.id.clone())
    }
}

/// Identity persisted in a file under the runtime directory.
///
/// [`FileIdentity::provision`] plays the host's install step and writes a
/// fresh UUID exactly once. Removing the file is equivalent to reinstalling:
/// secrets encrypted under the old identity become unrecoverable.
#[derive(Debug, Clone)]
pub struct FileIdentity {
    path: PathBuf,
}

impl FileIdentity {
    /// Create a provider reading from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the identity file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the existing identity, or create one if none was provisioned.
    ///
    /// The identity is written to a temp file first and then linked into
    /// place, so readers never see a partial file. An empty identity file
    /// left by an interrupted install is replaced.
    pub fn provision(&self) -> VaultResult<String> {
        let existing = match std::fs::read_to_string(&self.path) {
            Ok(raw) => Some(raw),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                return Err(VaultError::KeyDerivation(format!(
                    "cannot read installation identity: {}",
                    e
                )))
            }
        };

        if let Some(raw) = &existing {
            if !raw.trim().is_empty() {
                debug!(path = %self.path.display(), "Installation identity already provisioned");
                return Ok(raw.trim().to_string());
            }
            warn!(path = %self.path.display(), "Replacing empty installation identity");
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| VaultError::KeyDerivation(format!("cannot create {}: {}", parent.display(), e)))?;
        }

        let id = uuid::Uuid::new_v4().to_string();
        let tmp_path = self.path.with_extension(format!("{}.tmp", id));
        std::fs::write(&tmp_path, id.as_bytes())
            .map_err(|e| VaultError::KeyDerivation(format!("cannot write identity: {}", e)))?;

        // A fresh install links so a concurrent provisioner keeps its identity;
        // repairing an empty file replaces it outright.
        let placed = if existing.is_none() {
            let linked = std::fs::hard_link(&tmp_path, &self.path);
            let _ = std::fs::remove_file(&tmp_path);
            linked
        } else {
            std::fs::rename(&tmp_path, &self.path)
        };

        match placed {
            Ok(()) => {
                info!(path = %self.path.display(), "Provisioned installation identity");
                Ok(id)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %self.path.display(), "Installation identity provisioned concurrently");
                self.installation_id()
            }
            Err(e) => {
                let _ = std::fs::remove_file(&tmp_path);
                Err(VaultError::KeyDerivation(format!(
                    "cannot create identity file {}: {}",
                    self.path.display(),
                    e
                )))
            }
        }
    }
}

impl IdentityProvider for FileIdentity {
    fn installation_id(&self) -> VaultResult<String> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                VaultError::KeyDerivation("installation identity not provisioned".to_string())
            }
            _ => VaultError::KeyDerivation(format!("cannot read installation identity: {}", e)),
        })?;

        let id = raw.trim();
        if id.is_empty() {
            return Err(VaultError::KeyDerivation(
                "installation identity is empty".to_string(),
            ));
        }
        Ok(id.to_string())
    }
}
