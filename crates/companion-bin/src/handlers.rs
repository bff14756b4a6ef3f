//! Action handlers. Each one maps a boundary operation onto the services and
//! renders the outcome as a [`Reply`]; none of them fail.

use crate::app::Services;
use crate::gate::GateError;
use crate::protocol::{Action, Reply};
use companion_admission::{Admission, AdmissionError};
use tracing::warn;

/// Dispatch one action.
pub async fn handle(services: &Services, action: Action) -> Reply {
    match action {
        Action::EncryptSecret { plaintext } => match services.vault.encrypt(&plaintext).await {
            Ok(encrypted) => Reply::Encrypted { encrypted },
            Err(e) => {
                warn!(error = %e, "encryptSecret failed");
                Reply::error(e.to_string())
            }
        },

        Action::DecryptSecret { stored } => Reply::Decrypted {
            decrypted: services.vault.decrypt(&stored).await,
        },

        Action::CheckRate { category } => {
            match services.admission.check_and_record(&category).await {
                Admission::Allowed => Reply::allowed(),
                Admission::Denied { wait_seconds } => Reply::denied(wait_seconds),
            }
        }

        Action::SaveSecret { plaintext } => match services.vault.save_secret(&plaintext).await {
            Ok(()) => Reply::Saved { saved: true },
            Err(e) => {
                warn!(error = %e, "saveSecret failed");
                Reply::error(e.to_string())
            }
        },

        Action::RevealSecret => match services.vault.reveal_secret().await {
            Ok(secret) => Reply::Secret { secret },
            Err(e) => {
                warn!(error = %e, "revealSecret failed");
                Reply::error(e.to_string())
            }
        },

        Action::ClearSecret => match services.vault.clear_secret().await {
            Ok(()) => Reply::Cleared { cleared: true },
            Err(e) => {
                warn!(error = %e, "clearSecret failed");
                Reply::error(e.to_string())
            }
        },

        Action::AuthorizeCall { category } => {
            match services.gate.run(&category, |_secret| async {}).await {
                Ok(()) => Reply::allowed(),
                Err(GateError::RateLimited(AdmissionError::RateLimitExceeded {
                    wait_seconds,
                    ..
                })) => Reply::denied(wait_seconds),
                Err(e) => Reply::error(e.to_string()),
            }
        }
    }
}
