//! Account as seen by plugins

use serde::{Deserialize, Serialize};

use crate::blockchains::Blockchain;
use crate::models::Network;

/// Default permission used when signing
pub const DEFAULT_AUTHORITY: &str = "active";

/// A name/address bound to a network and a public key.
///
/// Owned by the caller; plugins only read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub name: String,
    pub public_key: String,
    pub authority: String,
    pub network: Network,
}

impl Account {
    pub fn new(name: &str, public_key: &str, network: Network) -> Self {
        Self {
            name: name.to_string(),
            public_key: public_key.to_string(),
            authority: DEFAULT_AUTHORITY.to_string(),
            network,
        }
    }

    pub fn blockchain(&self) -> &Blockchain {
        &self.network.blockchain
    }

    /// The identifier transactions are sent from: the name, or the key for
    /// key-addressed accounts
    pub fn sendable(&self) -> &str {
        if self.name.is_empty() {
            &self.public_key
        } else {
            &self.name
        }
    }
}

/// The public shape of an account handed to dapps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnableAccount {
    pub name: String,
    pub address: String,
    pub blockchain: Blockchain,
}
