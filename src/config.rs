//! Configuration
//!
//! Loaded once at startup from an optional JSON file; every field has a
//! default so an empty file (or none) yields a working setup.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::blockchains::Blockchain;
use crate::error::PluginError;
use crate::models::Network;
use crate::signing::DEFAULT_ORIGIN;

/// Reachability race timer in milliseconds
pub const DEFAULT_REACHABILITY_TIMEOUT_MS: u64 = 2000;

/// Peerplays mainnet chain-id fingerprint
pub const PEERPLAYS_CHAIN_ID: &str =
    "6b6b5f0ce7a36d323768e534f3edb41c6d6332a541a95725b98e28d140850134";
pub const PEERPLAYS_FULL_NODE_HOST: &str = "seed01.eifos.org";
pub const PEERPLAYS_FULL_NODE_PORT: u16 = 7777;
pub const PEERPLAYS_GATEWAY_HOST: &str = "nodes.get-scatter.com";
pub const PEERPLAYS_GATEWAY_PORT: u16 = 443;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// Label placed on signing requests
    pub origin: String,
    pub reachability_timeout_ms: u64,
    /// Chain codes whose plugins are loaded, in order
    pub plugins: Vec<String>,
    pub peerplays: PeerplaysConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            reachability_timeout_ms: DEFAULT_REACHABILITY_TIMEOUT_MS,
            plugins: vec![Blockchain::PPY.code().to_string()],
            peerplays: PeerplaysConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self, PluginError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| PluginError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, PluginError> {
        let config: AppConfig =
            serde_json::from_str(raw).map_err(|e| PluginError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), PluginError> {
        if self.reachability_timeout_ms == 0 {
            return Err(PluginError::Config(
                "reachabilityTimeoutMs must be positive".to_string(),
            ));
        }
        if self.peerplays.decimals > 18 {
            return Err(PluginError::Config(format!(
                "peerplays.decimals {} is out of range",
                self.peerplays.decimals
            )));
        }
        Ok(())
    }

    pub fn reachability_timeout(&self) -> Duration {
        Duration::from_millis(self.reachability_timeout_ms)
    }
}

/// Peerplays deployment profile.
///
/// Two deployments of the adapter exist and disagree on precision and on
/// which node is canonical; both are available as presets and the choice is
/// made in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PeerplaysConfig {
    /// Precision used to scale raw balances
    pub decimals: u32,
    pub endorsed_network: Network,
    /// Path appended to the node URL by the reachability probe
    pub reachability_path: String,
}

impl PeerplaysConfig {
    /// Direct JSON-RPC against a full node
    pub fn full_node() -> Self {
        Self {
            decimals: 8,
            endorsed_network: Network::new(
                "Peerplays Mainnet",
                "https",
                PEERPLAYS_FULL_NODE_HOST,
                PEERPLAYS_FULL_NODE_PORT,
                Blockchain::PPY,
                PEERPLAYS_CHAIN_ID,
            ),
            reachability_path: "/".to_string(),
        }
    }

    /// Backend gateway deployment
    pub fn legacy_gateway() -> Self {
        Self {
            decimals: 5,
            endorsed_network: Network::new(
                "Peerplays Gateway",
                "https",
                PEERPLAYS_GATEWAY_HOST,
                PEERPLAYS_GATEWAY_PORT,
                Blockchain::PPY,
                PEERPLAYS_CHAIN_ID,
            ),
            reachability_path: "/v1/chain/get_info".to_string(),
        }
    }

    /// Look a preset up by name
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "full-node" => Some(Self::full_node()),
            "legacy-gateway" => Some(Self::legacy_gateway()),
            _ => None,
        }
    }
}

impl Default for PeerplaysConfig {
    fn default() -> Self {
        Self::full_node()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.reachability_timeout(), Duration::from_millis(2000));
        assert_eq!(config.plugins, vec!["ppy".to_string()]);
    }

    #[test]
    fn test_partial_override() {
        let config = AppConfig::from_json(
            r#"{"origin":"wallet","peerplays":{"decimals":5,"endorsedNetwork":{"name":"n","protocol":"http","host":"h","port":1,"blockchain":"ppy","chainId":"c"},"reachabilityPath":"/"}}"#,
        )
        .unwrap();

        assert_eq!(config.origin, "wallet");
        assert_eq!(config.peerplays.decimals, 5);
        assert_eq!(config.peerplays.endorsed_network.host, "h");
        assert_eq!(config.reachability_timeout_ms, DEFAULT_REACHABILITY_TIMEOUT_MS);
    }

    #[test]
    fn test_partial_peerplays_section() {
        let config = AppConfig::from_json(r#"{"peerplays":{"decimals":5}}"#).unwrap();

        assert_eq!(config.peerplays.decimals, 5);
        assert_eq!(
            config.peerplays.endorsed_network,
            PeerplaysConfig::full_node().endorsed_network
        );
        assert_eq!(config.peerplays.reachability_path, "/");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(AppConfig::from_json(r#"{"reachabilityTimeoutMs":0}"#).is_err());
        assert!(AppConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_presets_differ() {
        let full = PeerplaysConfig::preset("full-node").unwrap();
        let gateway = PeerplaysConfig::preset("legacy-gateway").unwrap();

        assert_eq!(full.decimals, 8);
        assert_eq!(gateway.decimals, 5);
        assert_ne!(full.endorsed_network.host, gateway.endorsed_network.host);
        assert!(PeerplaysConfig::preset("other").is_none());
    }
}
