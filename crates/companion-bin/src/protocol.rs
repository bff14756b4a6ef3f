//! Message protocol for the stdio host.
//!
//! One JSON object per line in each direction. Requests carry an `id` for
//! correlation and an `action` discriminator; responses echo the `id` and
//! flatten the reply fields next to it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Boundary operations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    EncryptSecret { plaintext: String },
    DecryptSecret { stored: String },
    CheckRate { category: String },
    SaveSecret { plaintext: String },
    RevealSecret,
    ClearSecret,
    /// Admission check plus secret presence, the preflight for an outbound call.
    AuthorizeCall { category: String },
}

/// Inbound request message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Request {
    /// Request ID for correlation.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub action: Action,
}

impl Request {
    /// Deserialize from a JSON line.
    ///
    /// On failure the request ID is still recovered when the line was valid
    /// JSON, so the error reply can be correlated.
    pub fn parse(line: &str) -> Result<Self, (Option<String>, String)> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| (None, format!("Parse error: {}", e)))?;

        let id = value.get("id").and_then(Value::as_str).map(String::from);

        serde_json::from_value(value).map_err(|e| (id, format!("Invalid request: {}", e)))
    }
}

/// Reply payload for one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Encrypted {
        encrypted: String,
    },
    Decrypted {
        decrypted: String,
    },
    Rate {
        allowed: bool,
        #[serde(rename = "waitSeconds", skip_serializing_if = "Option::is_none")]
        wait_seconds: Option<u64>,
    },
    Saved {
        saved: bool,
    },
    Secret {
        secret: Option<String>,
    },
    Cleared {
        cleared: bool,
    },
    Error {
        error: String,
    },
}

impl Reply {
    pub fn allowed() -> Self {
        Self::Rate {
            allowed: true,
            wait_seconds: None,
        }
    }

    pub fn denied(wait_seconds: u64) -> Self {
        Self::Rate {
            allowed: false,
            wait_seconds: Some(wait_seconds),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }
}

/// Outbound response message.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    /// Request ID, `null` when the request could not be read.
    pub id: Option<String>,
    #[serde(flatten)]
    pub reply: Reply,
}

impl Response {
    pub fn new(id: Option<String>, reply: Reply) -> Self {
        Self { id, reply }
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
