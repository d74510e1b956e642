//! In-memory software key store
//!
//! Holds decrypted private keys for the lifetime of the process and records
//! which public keys belong to a hardware device.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use super::{PrivateKey, WalletError};
use crate::signing::KeyStore;

/// Key store backed by process memory
#[derive(Default)]
pub struct InMemoryKeyStore {
    /// Public key string -> raw private key bytes
    keys: RwLock<HashMap<String, Vec<u8>>>,
    /// Public keys whose private half lives on a hardware device
    hardware: RwLock<HashSet<String>>,
    identity_key: Option<String>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the identity key attached to signing requests
    pub fn with_identity_key(mut self, public_key: &str) -> Self {
        self.identity_key = Some(public_key.to_string());
        self
    }

    /// Import a WIF private key, returning its public key under `prefix`
    pub fn import_wif(&self, wif: &str, prefix: &str) -> Result<String, WalletError> {
        let key = PrivateKey::from_wif(wif)?;
        let public_key = key.public_key().to_string_with_prefix(prefix);

        let mut keys = self
            .keys
            .write()
            .map_err(|_| WalletError::InvalidPrivateKey("Key store lock poisoned".to_string()))?;
        keys.insert(public_key.clone(), key.to_bytes());

        tracing::debug!("Imported key {}", public_key);
        Ok(public_key)
    }

    /// Mark a public key as hardware-backed
    pub fn register_hardware(&self, public_key: &str) {
        if let Ok(mut hardware) = self.hardware.write() {
            hardware.insert(public_key.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.keys.read().map(|keys| keys.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn public_to_private(&self, public_key: &str) -> Option<Vec<u8>> {
        self.keys.read().ok()?.get(public_key).cloned()
    }

    fn is_hardware(&self, public_key: &str) -> bool {
        self.hardware
            .read()
            .map(|hardware| hardware.contains(public_key))
            .unwrap_or(false)
    }

    fn identity_key(&self) -> Option<String> {
        self.identity_key.clone()
    }
}

impl std::fmt::Debug for InMemoryKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKeyStore")
            .field("keys", &self.len())
            .field("identity_key", &self.identity_key)
            .finish()
    }
}
