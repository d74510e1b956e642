//! Network descriptor

use serde::{Deserialize, Serialize};

use crate::blockchains::Blockchain;

/// A specific deployment of a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub name: String,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub blockchain: Blockchain,
    /// Chain-id fingerprint distinguishing mainnet/testnet/forks
    pub chain_id: String,
}

impl Network {
    pub fn new(
        name: &str,
        protocol: &str,
        host: &str,
        port: u16,
        blockchain: Blockchain,
        chain_id: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            protocol: protocol.to_string(),
            host: host.to_string(),
            port,
            blockchain,
            chain_id: chain_id.to_string(),
        }
    }

    /// `protocol://host[:port]`
    pub fn fullhost(&self) -> String {
        if self.port == 0 {
            format!("{}://{}", self.protocol, self.host)
        } else {
            format!("{}://{}:{}", self.protocol, self.host, self.port)
        }
    }

    pub fn unique(&self) -> String {
        format!(
            "{}:{}",
            self.blockchain,
            if self.chain_id.is_empty() {
                format!("{}:{}", self.host, self.port)
            } else {
                self.chain_id.clone()
            }
        )
        .to_lowercase()
    }
}
