//! chain-plugins - blockchain adapters for a multi-chain wallet
//!
//! Per-chain plugins behind one contract, a repository to look them up, and
//! the signature-request protocol that mediates user approval and signing.

pub mod blockchains;
pub mod config;
pub mod error;
pub mod models;
pub mod plugins;
pub mod signing;
pub mod wallet;

pub use blockchains::{Blockchain, BlockchainRegistry};
pub use config::AppConfig;
pub use error::{ErrorBody, PluginError};
pub use plugins::{Plugin, PluginContext, PluginRepository};
pub use signing::SigningProtocol;
