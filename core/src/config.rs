//! Client configuration.
//!
//! # Design
//! Every field is mandatory; nothing here has a default. A config is read
//! only by the client and can be shared freely between concurrent calls.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL the call path is appended to.
    pub endpoint: String,
    pub authentication: Authentication,
    /// Propagate remote exceptions to the caller instead of returning them
    /// as `ResponseError::RemoteException`.
    pub rethrow_remote_exceptions: bool,
    /// Allow decoding atoms the local `SymbolTable` does not know.
    pub decode_unsafe_terms: bool,
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum Authentication {
    Basic { username: String, password: String },
    Signature { key: String },
}

impl fmt::Debug for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authentication::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Authentication::Signature { .. } => f
                .debug_struct("Signature")
                .field("key", &"<redacted>")
                .finish(),
        }
    }
}
