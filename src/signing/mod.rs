//! Signature Request Protocol
//!
//! Turns a pending transaction into a signature:
//!
//! ```text
//! Built -> AwaitingApproval -> {Approved | Rejected}
//!       Approved -> {HardwareSigning | SoftwareSigning} -> {Signed | SignFailed}
//! ```
//!
//! The request is shown to the user through an [`ApprovalChannel`]. Once it is
//! accepted the account's public key decides, once, whether the hardware
//! signer or the software signer produces the signature. Every failure is
//! reported through the caller's rejector as `{error: "Could not get signature"}`.
//!
//! There is no built-in timeout; callers that give up drop the future.

pub mod local;
pub mod payload;
pub mod popup;

pub use local::LocalSoftwareSigner;
pub use payload::{Message, Rejector, SignPayload, Signature};
pub use popup::{
    ApprovalChannel, PendingApproval, PopupBridge, PopupReceiver, PopupRequest, PopupResponse,
    PopupResult, RequestType, POPOUT_EVENT,
};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Map;
use tracing::{debug, info, warn};

use crate::blockchains::Blockchain;
use crate::error::{ErrorBody, PluginError};
use crate::models::{Account, Network};

/// Default origin label on signing requests
pub const DEFAULT_ORIGIN: &str = "chain-plugins";

/// Persistent key store
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Private key bytes for a public key, if this store holds it
    async fn public_to_private(&self, public_key: &str) -> Option<Vec<u8>>;

    /// Whether the key lives on a hardware device
    fn is_hardware(&self, public_key: &str) -> bool;

    /// Public key of the wallet identity attached to requests
    fn identity_key(&self) -> Option<String> {
        None
    }
}

/// Bridge to an external hardware signer
#[async_trait]
pub trait HardwareSigner: Send + Sync {
    async fn sign(&self, account: &Account, payload: &SignPayload) -> Option<Signature>;
}

/// Software signing service
#[async_trait]
pub trait SoftwareSigner: Send + Sync {
    async fn sign(
        &self,
        network: &Network,
        payload: &SignPayload,
        public_key: &str,
    ) -> Option<Signature>;
}

/// Hardware bridge for deployments without a device
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHardware;

#[async_trait]
impl HardwareSigner for NoHardware {
    async fn sign(&self, account: &Account, _payload: &SignPayload) -> Option<Signature> {
        warn!("No hardware signer available for {}", account.public_key);
        None
    }
}

/// States of one signing attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningState {
    Built,
    AwaitingApproval,
    Approved,
    Rejected,
    HardwareSigning,
    SoftwareSigning,
    Signed,
    SignFailed,
}

impl std::fmt::Display for SigningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SigningState::Built => "built",
            SigningState::AwaitingApproval => "awaiting-approval",
            SigningState::Approved => "approved",
            SigningState::Rejected => "rejected",
            SigningState::HardwareSigning => "hardware-signing",
            SigningState::SoftwareSigning => "software-signing",
            SigningState::Signed => "signed",
            SigningState::SignFailed => "sign-failed",
        };
        write!(f, "{}", name)
    }
}

/// The signing protocol and its collaborators
pub struct SigningProtocol {
    approvals: Arc<dyn ApprovalChannel>,
    key_store: Arc<dyn KeyStore>,
    hardware: Arc<dyn HardwareSigner>,
    software: Arc<dyn SoftwareSigner>,
    origin: String,
    next_id: AtomicU64,
}

impl SigningProtocol {
    pub fn new(
        approvals: Arc<dyn ApprovalChannel>,
        key_store: Arc<dyn KeyStore>,
        hardware: Arc<dyn HardwareSigner>,
        software: Arc<dyn SoftwareSigner>,
    ) -> Self {
        Self {
            approvals,
            key_store,
            hardware,
            software,
            origin: DEFAULT_ORIGIN.to_string(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Protocol whose software path signs with keys from `key_store`
    pub fn local(approvals: Arc<dyn ApprovalChannel>, key_store: Arc<dyn KeyStore>) -> Self {
        let software = Arc::new(LocalSoftwareSigner::new(key_store.clone()));
        Self::new(approvals, key_store, Arc::new(NoHardware), software)
    }

    /// Set the origin label placed on requests
    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = origin.to_string();
        self
    }

    pub fn key_store(&self) -> &Arc<dyn KeyStore> {
        &self.key_store
    }

    /// Assemble the popup request for `payload` signed by `account`
    pub fn build_request(
        &self,
        blockchain: Blockchain,
        mut payload: SignPayload,
        account: &Account,
    ) -> PopupRequest {
        payload.identity_key = self.key_store.identity_key();
        payload.participants = vec![account.clone()];
        payload.network = Some(account.network.clone());
        payload.origin = self.origin.clone();

        PopupRequest {
            origin: payload.origin.clone(),
            payload,
            blockchain,
            required_fields: Map::new(),
            kind: RequestType::Sign,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Run the protocol, reporting failure as a typed error
    pub async fn request_signature(
        &self,
        blockchain: Blockchain,
        payload: SignPayload,
        account: &Account,
    ) -> Result<Signature, PluginError> {
        let request = self.build_request(blockchain, payload, account);
        let id = request.id;
        debug!("Signing request {} {}", id, SigningState::Built);

        // Kept for the signers; the popup gets its own copy
        let payload = request.payload.clone();

        info!(
            "Signing request {} {} for {}",
            id,
            SigningState::AwaitingApproval,
            account.sendable()
        );
        let response = self.approvals.request(POPOUT_EVENT, request).await;

        if !response.is_accepted() {
            info!("Signing request {} {}", id, SigningState::Rejected);
            return Err(PluginError::SignatureRejected);
        }
        debug!("Signing request {} {}", id, SigningState::Approved);

        let hardware = self.key_store.is_hardware(&account.public_key);
        let signature = if hardware {
            debug!("Signing request {} {}", id, SigningState::HardwareSigning);
            self.hardware.sign(account, &payload).await
        } else {
            debug!("Signing request {} {}", id, SigningState::SoftwareSigning);
            self.software
                .sign(&account.network, &payload, &account.public_key)
                .await
        };

        match signature {
            Some(signature) => {
                info!("Signing request {} {}", id, SigningState::Signed);
                Ok(signature)
            }
            None => {
                warn!("Signing request {} {}", id, SigningState::SignFailed);
                Err(PluginError::SignatureUnavailable(
                    if hardware { "hardware" } else { "software" }.to_string(),
                ))
            }
        }
    }

    /// Run the protocol, funnelling any failure into `rejector`.
    ///
    /// Returns `None` exactly when the rejector has been invoked.
    pub async fn sign(
        &self,
        blockchain: Blockchain,
        payload: SignPayload,
        account: &Account,
        rejector: Rejector,
    ) -> Option<Signature> {
        match self.request_signature(blockchain, payload, account).await {
            Ok(signature) => Some(signature),
            Err(err) => {
                rejector(ErrorBody::from(err));
                None
            }
        }
    }
}

impl std::fmt::Debug for SigningProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningProtocol")
            .field("origin", &self.origin)
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}
