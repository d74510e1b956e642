//! Plugin Error Types
//!
//! Unified error handling for every blockchain plugin and the signing protocol.

use serde::{Deserialize, Serialize};

use crate::wallet::WalletError;

/// Message handed to rejectors whenever a signature cannot be produced.
pub const SIGNATURE_ERROR: &str = "Could not get signature";

/// Errors that can occur inside a plugin or the signing protocol
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PluginError {
    /// Recipient account name fails the chain's naming rules
    #[error("Invalid recipient account name")]
    InvalidRecipient,

    /// Key material could not be parsed or does not match the chain format
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// A required parameter was absent or empty
    #[error("Missing required parameters: {0}")]
    MissingParameters(String),

    /// The user declined the signature request
    #[error("Signature request rejected")]
    SignatureRejected,

    /// The hardware or software signer produced nothing
    #[error("Signature unavailable: {0}")]
    SignatureUnavailable(String),

    /// Network probe failed or the node could not be contacted
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    /// Balance lookup for an asset the account does not hold
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// Chain code not present in the blockchain registry
    #[error("Unknown blockchain: {0}")]
    UnknownBlockchain(String),

    /// No plugin is loaded for the chain
    #[error("No plugin registered for {0}")]
    PluginNotFound(String),

    /// Node answered with an RPC-level error
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Response parsing failed
    #[error("Parse error: {0}")]
    Parse(String),

    /// The plugin cannot carry out the request as given
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for PluginError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            PluginError::NetworkUnreachable(err.to_string())
        } else if err.is_decode() {
            PluginError::Parse(err.to_string())
        } else {
            PluginError::Rpc(err.to_string())
        }
    }
}

impl From<serde_json::Error> for PluginError {
    fn from(err: serde_json::Error) -> Self {
        PluginError::Parse(err.to_string())
    }
}

impl From<WalletError> for PluginError {
    fn from(err: WalletError) -> Self {
        PluginError::InvalidKey(err.to_string())
    }
}

/// Structured `{error: reason}` value.
///
/// Returned by operations that report validation failures as data instead of
/// propagating them, and passed to signing rejectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            error: reason.into(),
        }
    }

    /// The body every signing failure is reported with
    pub fn signature() -> Self {
        Self::new(SIGNATURE_ERROR)
    }
}

impl From<PluginError> for ErrorBody {
    fn from(err: PluginError) -> Self {
        match err {
            PluginError::SignatureRejected | PluginError::SignatureUnavailable(_) => {
                ErrorBody::signature()
            }
            other => ErrorBody::new(other.to_string()),
        }
    }
}

impl std::fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}
