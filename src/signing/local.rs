//! Software signing with keys from the key store

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::models::Network;
use crate::signing::{KeyStore, SignPayload, Signature, SoftwareSigner};
use crate::wallet::PrivateKey;

/// Signs locally with the private key the key store holds for a public key
pub struct LocalSoftwareSigner {
    key_store: Arc<dyn KeyStore>,
}

impl LocalSoftwareSigner {
    pub fn new(key_store: Arc<dyn KeyStore>) -> Self {
        Self { key_store }
    }
}

#[async_trait]
impl SoftwareSigner for LocalSoftwareSigner {
    async fn sign(
        &self,
        network: &Network,
        payload: &SignPayload,
        public_key: &str,
    ) -> Option<Signature> {
        let bytes = self.key_store.public_to_private(public_key).await?;

        let key = match PrivateKey::from_bytes(&bytes) {
            Ok(key) => key,
            Err(e) => {
                warn!("Stored key for {} is unusable: {}", public_key, e);
                return None;
            }
        };

        let message = match &payload.data {
            Some(data) if payload.buf.is_empty() => data.as_bytes(),
            _ => payload.buf.as_slice(),
        };

        match key.sign(message) {
            Ok(signature) => Some(Signature::new(signature)),
            Err(e) => {
                warn!("Signing for {} on {} failed: {}", public_key, network.name, e);
                None
            }
        }
    }
}
