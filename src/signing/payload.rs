//! Signing payloads and artifacts

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorBody;
use crate::models::{Account, Network};

/// Human-readable action shown in the approval popup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub code: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

/// Everything a signer needs to know about one signing attempt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignPayload {
    /// Raw transaction body as produced by the chain
    pub transaction: Value,
    /// Serialized bytes that get signed
    #[serde(skip)]
    pub buf: Vec<u8>,
    /// Arbitrary data for non-transaction signatures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub participants: Vec<Account>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
    #[serde(default)]
    pub origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_key: Option<String>,
}

impl SignPayload {
    pub fn new(transaction: Value, buf: Vec<u8>) -> Self {
        Self {
            transaction,
            buf,
            ..Default::default()
        }
    }

    /// Payload for signing arbitrary data rather than a transaction
    pub fn arbitrary(data: &str) -> Self {
        Self {
            data: Some(data.to_string()),
            ..Default::default()
        }
    }
}

/// A produced signature (hex encoded compact form)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    pub fn new(value: impl Into<String>) -> Self {
        Signature(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Callback receiving every signing failure
pub type Rejector = Box<dyn FnOnce(ErrorBody) + Send>;
