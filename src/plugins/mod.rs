//! Blockchain Plugins
//!
//! Every supported chain is an adapter implementing [`Plugin`], giving the
//! rest of the wallet one interface for:
//! - identity formatting and key validation
//! - endorsed-network checks and reachability
//! - balance queries
//! - transfers and signing through the signing protocol
//!
//! Plugins are created once by the [`PluginRepository`] and shared as
//! `Arc<dyn Plugin>`.

#[cfg(feature = "peerplays")]
pub mod peerplays;
pub mod reachability;
pub mod repository;

pub use reachability::{race, HttpProbe, NetworkProbe, NetworkStatus, REACHABILITY_TIMEOUT};
pub use repository::PluginRepository;

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::blockchains::Blockchain;
use crate::config::AppConfig;
use crate::error::{ErrorBody, PluginError};
use crate::models::{Account, ExplorerTemplate, Network, ReturnableAccount, Token};
use crate::signing::{Message, Rejector, SignPayload, Signature, SigningProtocol};
use crate::wallet::PublicKey;

/// Feature tags used to filter plugins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    /// Full chain support including signing
    BlockchainSupport,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::BlockchainSupport => write!(f, "blockchain_support"),
        }
    }
}

/// Parameters of a token transfer
#[derive(Debug, Clone)]
pub struct TransferParams {
    pub account: Account,
    pub to: String,
    pub amount: Decimal,
    pub token: Token,
    pub memo: Option<String>,
    /// Ask the user through the popup before signing
    pub prompt_for_signature: bool,
}

impl TransferParams {
    pub fn new(account: Account, to: &str, amount: Decimal, token: Token) -> Self {
        Self {
            account,
            to: to.to_string(),
            amount,
            token,
            memo: None,
            prompt_for_signature: true,
        }
    }

    pub fn with_memo(mut self, memo: &str) -> Self {
        self.memo = Some(memo.to_string());
        self
    }
}

/// A signed and broadcast transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub transaction: Value,
    pub signatures: Vec<Signature>,
    /// Node response to the broadcast
    pub result: Value,
}

/// Uniform adapter contract for one blockchain
#[async_trait]
pub trait Plugin: Send + Sync {
    /// The chain this plugin serves
    fn blockchain(&self) -> Blockchain;

    fn capabilities(&self) -> &[Capability];

    fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    // =========================================================================
    // Presentation
    // =========================================================================

    /// BIP-44 derivation path prefix
    fn bip(&self) -> &str;

    fn default_explorer(&self) -> ExplorerTemplate;

    fn account_formatter(&self, account: &Account) -> String;

    fn returnable_account(&self, account: &Account) -> ReturnableAccount;

    /// Placeholder shown for the token contract field
    fn contract_placeholder(&self) -> &str;

    fn uses_resources(&self) -> bool {
        false
    }

    fn has_account_actions(&self) -> bool {
        false
    }

    fn accounts_are_imported(&self) -> bool {
        false
    }

    fn has_untouchable_tokens(&self) -> bool {
        false
    }

    // =========================================================================
    // Keys
    // =========================================================================

    fn is_valid_recipient(&self, name: &str) -> bool;

    fn valid_private_key(&self, private_key: &str) -> bool;

    /// Parsed key, or `None` when `public_key` is not valid for this chain
    fn valid_public_key(&self, public_key: &str, prefix: Option<&str>) -> Option<PublicKey>;

    fn private_to_public(&self, private_key: &str, prefix: Option<&str>)
        -> Result<String, PluginError>;

    /// Raw private key bytes to the chain's textual form
    fn buffer_to_hex_private(&self, buffer: &[u8]) -> Result<String, PluginError>;

    /// The chain's textual private key to raw bytes
    fn hex_private_to_buffer(&self, private_key: &str) -> Result<Vec<u8>, PluginError>;

    // =========================================================================
    // Networks
    // =========================================================================

    fn endorsed_network(&self) -> Network;

    /// True iff chain and chain-id both match the endorsed network
    fn is_endorsed_network(&self, network: &Network) -> bool {
        let endorsed = self.endorsed_network();
        network.blockchain == self.blockchain() && network.chain_id == endorsed.chain_id
    }

    async fn chain_id(&self, network: &Network) -> Result<String, PluginError>;

    /// Reachability race; always resolves within the configured timeout
    async fn check_network(&self, network: &Network) -> NetworkStatus;

    // =========================================================================
    // Tokens
    // =========================================================================

    fn default_decimals(&self) -> u32;

    fn default_token(&self) -> Token;

    /// Single balance; an asset the account does not hold is an error
    async fn balance_for(&self, account: &Account, token: &Token) -> Result<Token, PluginError>;

    /// Batch balance; tokens whose asset cannot be located are omitted.
    ///
    /// With `fallback` set an empty `tokens` list queries the default token.
    async fn balances_for(
        &self,
        account: &Account,
        tokens: &[Token],
        fallback: bool,
    ) -> Result<Vec<Token>, PluginError>;

    // =========================================================================
    // Signing
    // =========================================================================

    /// Accounts named as participants in a payload
    fn action_participants(&self, payload: &SignPayload) -> Vec<String>;

    /// Human-readable messages describing the payload
    fn request_parser(&self, payload: &SignPayload) -> Result<Vec<Message>, PluginError>;

    /// Validate, sign and broadcast a transfer
    async fn transfer(&self, params: TransferParams) -> Result<SignedTransaction, ErrorBody>;

    /// Sign `payload.buf` (or `payload.data` when `arbitrary`); with
    /// `is_hash` the data is a hex digest signed as is. The key is resolved
    /// from the key store unless given.
    async fn signer(
        &self,
        payload: &SignPayload,
        public_key: &str,
        arbitrary: bool,
        is_hash: bool,
        private_key: Option<&[u8]>,
    ) -> Result<Signature, PluginError>;

    /// Run the signing protocol; `None` means `rejector` was called
    async fn signer_with_popup(
        &self,
        payload: SignPayload,
        account: &Account,
        rejector: Rejector,
    ) -> Option<Signature>;

    /// Drop cached derived state
    fn bust_cache(&self) -> Result<(), PluginError>;
}

/// Shared collaborators handed to plugin factories
#[derive(Clone)]
pub struct PluginContext {
    pub signing: Arc<SigningProtocol>,
    pub http: reqwest::Client,
    pub config: AppConfig,
}

impl PluginContext {
    pub fn new(signing: Arc<SigningProtocol>, config: AppConfig) -> Self {
        Self {
            signing,
            http: reqwest::Client::new(),
            config,
        }
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("signing", &self.signing)
            .field("config", &self.config)
            .finish()
    }
}

/// Builds one plugin from the shared context
pub type PluginFactory =
    Box<dyn FnOnce(&PluginContext) -> Result<Arc<dyn Plugin>, PluginError> + Send>;

/// Factories for the chains listed in `config.plugins`, in order
pub fn factories_for(config: &AppConfig) -> Result<Vec<PluginFactory>, PluginError> {
    config
        .plugins
        .iter()
        .map(|code| factory_for(code))
        .collect()
}

fn factory_for(code: &str) -> Result<PluginFactory, PluginError> {
    match code {
        #[cfg(feature = "peerplays")]
        "ppy" => Ok(Box::new(peerplays_factory)),
        other => Err(PluginError::Config(format!(
            "No plugin implementation for chain '{}'",
            other
        ))),
    }
}

#[cfg(feature = "peerplays")]
fn peerplays_factory(ctx: &PluginContext) -> Result<Arc<dyn Plugin>, PluginError> {
    Ok(Arc::new(peerplays::PeerplaysPlugin::from_context(ctx)?))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Minimal plugin for repository tests

    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    pub struct StubPlugin {
        pub blockchain: Blockchain,
        pub capabilities: Vec<Capability>,
        pub fail_bust: bool,
        pub busts: AtomicUsize,
    }

    impl StubPlugin {
        pub fn new(blockchain: Blockchain) -> Self {
            Self {
                blockchain,
                capabilities: vec![Capability::BlockchainSupport],
                fail_bust: false,
                busts: AtomicUsize::new(0),
            }
        }

        pub fn without_capabilities(mut self) -> Self {
            self.capabilities.clear();
            self
        }

        pub fn failing_bust(mut self) -> Self {
            self.fail_bust = true;
            self
        }

        pub fn busts(&self) -> usize {
            self.busts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Plugin for StubPlugin {
        fn blockchain(&self) -> Blockchain {
            self.blockchain.clone()
        }

        fn capabilities(&self) -> &[Capability] {
            &self.capabilities
        }

        fn bip(&self) -> &str {
            "44'/0'/0'/0/"
        }

        fn default_explorer(&self) -> ExplorerTemplate {
            ExplorerTemplate {
                name: format!("{} explorer", self.blockchain),
                account: format!("https://{}.example/account/{{x}}", self.blockchain),
                transaction: format!("https://{}.example/tx/{{x}}", self.blockchain),
                block: format!("https://{}.example/block/{{x}}", self.blockchain),
            }
        }

        fn account_formatter(&self, account: &Account) -> String {
            account.name.clone()
        }

        fn returnable_account(&self, account: &Account) -> ReturnableAccount {
            ReturnableAccount {
                name: account.name.clone(),
                address: account.public_key.clone(),
                blockchain: self.blockchain.clone(),
            }
        }

        fn contract_placeholder(&self) -> &str {
            ""
        }

        fn is_valid_recipient(&self, name: &str) -> bool {
            !name.is_empty()
        }

        fn valid_private_key(&self, _private_key: &str) -> bool {
            false
        }

        fn valid_public_key(&self, _public_key: &str, _prefix: Option<&str>) -> Option<PublicKey> {
            None
        }

        fn private_to_public(
            &self,
            private_key: &str,
            _prefix: Option<&str>,
        ) -> Result<String, PluginError> {
            Err(PluginError::InvalidKey(private_key.len().to_string()))
        }

        fn buffer_to_hex_private(&self, buffer: &[u8]) -> Result<String, PluginError> {
            Ok(hex::encode(buffer))
        }

        fn hex_private_to_buffer(&self, private_key: &str) -> Result<Vec<u8>, PluginError> {
            hex::decode(private_key).map_err(|e| PluginError::InvalidKey(e.to_string()))
        }

        fn endorsed_network(&self) -> Network {
            Network::new("Stub", "https", "localhost", 0, self.blockchain.clone(), "stub-chain")
        }

        async fn chain_id(&self, _network: &Network) -> Result<String, PluginError> {
            Ok("stub-chain".to_string())
        }

        async fn check_network(&self, _network: &Network) -> NetworkStatus {
            NetworkStatus::Reachable
        }

        fn default_decimals(&self) -> u32 {
            4
        }

        fn default_token(&self) -> Token {
            Token::new(self.blockchain.clone(), "", "STUB", "Stub", 4, "stub-chain")
        }

        async fn balance_for(&self, _account: &Account, token: &Token) -> Result<Token, PluginError> {
            Ok(token.with_amount(Decimal::ZERO))
        }

        async fn balances_for(
            &self,
            _account: &Account,
            tokens: &[Token],
            _fallback: bool,
        ) -> Result<Vec<Token>, PluginError> {
            Ok(tokens.iter().map(|t| t.with_amount(Decimal::ZERO)).collect())
        }

        fn action_participants(&self, _payload: &SignPayload) -> Vec<String> {
            Vec::new()
        }

        fn request_parser(&self, _payload: &SignPayload) -> Result<Vec<Message>, PluginError> {
            Ok(Vec::new())
        }

        async fn transfer(&self, _params: TransferParams) -> Result<SignedTransaction, ErrorBody> {
            Err(ErrorBody::new("unsupported"))
        }

        async fn signer(
            &self,
            _payload: &SignPayload,
            _public_key: &str,
            _arbitrary: bool,
            _is_hash: bool,
            _private_key: Option<&[u8]>,
        ) -> Result<Signature, PluginError> {
            Err(PluginError::SignatureUnavailable("stub".to_string()))
        }

        async fn signer_with_popup(
            &self,
            _payload: SignPayload,
            _account: &Account,
            rejector: Rejector,
        ) -> Option<Signature> {
            rejector(ErrorBody::signature());
            None
        }

        fn bust_cache(&self) -> Result<(), PluginError> {
            self.busts.fetch_add(1, Ordering::SeqCst);
            if self.fail_bust {
                Err(PluginError::Rpc("cache bust failed".to_string()))
            } else {
                Ok(())
            }
        }
    }
}
