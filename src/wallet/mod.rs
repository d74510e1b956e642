//! Key handling for Graphene-family chains
//!
//! This module provides the key codec (WIF private keys, prefixed public keys,
//! recoverable signatures) and a software key store.

pub mod graphene;
pub mod keystore;

/// Common wallet error type
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

// Re-export wallet types
pub use graphene::{PrivateKey, PublicKey, DEFAULT_PREFIX};
pub use keystore::InMemoryKeyStore;
