//! Peerplays Plugin
//!
//! Graphene-based chain: named accounts, `PPY`-prefixed keys, balances held
//! per asset id (`1.3.N`). Node access goes through [`PeerplaysRpc`]; one
//! connection per network is memoised until [`Plugin::bust_cache`].

pub mod rpc;

pub use rpc::{
    AccountBalance, AccountObject, AssetAmount, FullAccount, HttpPeerplaysRpc, PeerplaysRpc,
    TransferOperation, UnsignedTransaction, CORE_ASSET_ID,
};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::{
    race, Capability, HttpProbe, NetworkProbe, NetworkStatus, Plugin, PluginContext,
    SignedTransaction, TransferParams, REACHABILITY_TIMEOUT,
};
use crate::blockchains::Blockchain;
use crate::config::PeerplaysConfig;
use crate::error::{ErrorBody, PluginError};
use crate::models::{Account, ExplorerTemplate, Network, ReturnableAccount, Token};
use crate::signing::{Message, Rejector, SignPayload, Signature, SigningProtocol};
use crate::wallet::{PrivateKey, PublicKey, DEFAULT_PREFIX};

/// Asset id of the BTF token
pub const BTF_ASSET_ID: &str = "1.3.1";

const BIP: &str = "44'/194'/0'/0/";
const MIN_PRIVATE_KEY_LEN: usize = 50;
const MIN_ACCOUNT_NAME_LEN: usize = 3;
const MAX_ACCOUNT_NAME_LEN: usize = 63;

/// Opens a node connection for a network
pub type RpcConnector = Arc<dyn Fn(&Network) -> Arc<dyn PeerplaysRpc> + Send + Sync>;

/// Graphene account-name rules
pub fn is_account_name(name: &str) -> bool {
    if name.len() < MIN_ACCOUNT_NAME_LEN || name.len() > MAX_ACCOUNT_NAME_LEN {
        return false;
    }
    name.split('.').all(|label| {
        let starts_with_letter = label.chars().next().is_some_and(|c| c.is_ascii_lowercase());
        let ends_alphanumeric = label
            .chars()
            .last()
            .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
        let allowed = label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

        starts_with_letter && ends_alphanumeric && allowed && !label.contains("--")
    })
}

/// Asset ids look like `1.3.N`
fn is_asset_id(value: &str) -> bool {
    value
        .strip_prefix("1.3.")
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

fn operation_name(id: u64) -> String {
    match id {
        rpc::TRANSFER_OPERATION => "transfer".to_string(),
        other => format!("operation_{}", other),
    }
}

/// Peerplays adapter
pub struct PeerplaysPlugin {
    config: PeerplaysConfig,
    connector: RpcConnector,
    probe: Arc<dyn NetworkProbe>,
    signing: Arc<SigningProtocol>,
    reachability_timeout: Duration,
    capabilities: Vec<Capability>,
    /// Network unique -> connection
    connections: RwLock<HashMap<String, Arc<dyn PeerplaysRpc>>>,
    /// Network unique + account name -> account object id
    account_ids: RwLock<HashMap<String, String>>,
}

impl PeerplaysPlugin {
    pub fn new(
        config: PeerplaysConfig,
        connector: RpcConnector,
        probe: Arc<dyn NetworkProbe>,
        signing: Arc<SigningProtocol>,
    ) -> Self {
        Self {
            config,
            connector,
            probe,
            signing,
            reachability_timeout: REACHABILITY_TIMEOUT,
            capabilities: vec![Capability::BlockchainSupport],
            connections: RwLock::new(HashMap::new()),
            account_ids: RwLock::new(HashMap::new()),
        }
    }

    /// Plugin talking JSON-RPC over the context's HTTP client
    pub fn from_context(ctx: &PluginContext) -> Result<Self, PluginError> {
        let config = ctx.config.peerplays.clone();
        if config.endorsed_network.blockchain != Blockchain::PPY {
            return Err(PluginError::Config(format!(
                "Peerplays endorsed network is configured for {}",
                config.endorsed_network.blockchain
            )));
        }

        let http = ctx.http.clone();
        let connector: RpcConnector = Arc::new(move |network: &Network| {
            let rpc: Arc<dyn PeerplaysRpc> =
                Arc::new(HttpPeerplaysRpc::new(http.clone(), &network.fullhost()));
            rpc
        });
        let probe = Arc::new(HttpProbe::new(ctx.http.clone(), &config.reachability_path));

        Ok(Self::new(config, connector, probe, ctx.signing.clone())
            .with_reachability_timeout(ctx.config.reachability_timeout()))
    }

    pub fn with_reachability_timeout(mut self, timeout: Duration) -> Self {
        self.reachability_timeout = timeout;
        self
    }

    pub fn config(&self) -> &PeerplaysConfig {
        &self.config
    }

    /// Memoised connection for `network`
    fn rpc_for(&self, network: &Network) -> Arc<dyn PeerplaysRpc> {
        let key = network.unique();
        if let Some(rpc) = read_lock(&self.connections).get(&key) {
            return rpc.clone();
        }

        debug!("Opening Peerplays connection to {}", network.fullhost());
        let rpc = (self.connector)(network);
        write_lock(&self.connections)
            .entry(key)
            .or_insert(rpc)
            .clone()
    }

    /// Account object id for `name`, memoised per network
    async fn account_id(
        &self,
        rpc: &Arc<dyn PeerplaysRpc>,
        network: &Network,
        name: &str,
    ) -> Result<String, PluginError> {
        let key = format!("{}:{}", network.unique(), name);
        let cached = read_lock(&self.account_ids).get(&key).cloned();
        if let Some(id) = cached {
            return Ok(id);
        }

        let id = rpc.get_full_account(name).await?.account.id;
        write_lock(&self.account_ids).insert(key, id.clone());
        Ok(id)
    }

    /// Asset id backing `token`
    pub fn asset_id_for(&self, token: &Token) -> Result<String, PluginError> {
        match token.symbol.to_uppercase().as_str() {
            "PPY" => Ok(CORE_ASSET_ID.to_string()),
            "BTF" => Ok(BTF_ASSET_ID.to_string()),
            _ if is_asset_id(&token.contract) => Ok(token.contract.clone()),
            _ => Err(PluginError::AssetNotFound(token.symbol.clone())),
        }
    }

    /// `raw / 10^decimals`, exact
    fn amount_from_raw(&self, raw: i128) -> Result<Decimal, PluginError> {
        Decimal::try_from_i128_with_scale(raw, self.config.decimals)
            .map_err(|e| PluginError::Parse(format!("balance {}: {}", raw, e)))
    }

    /// `amount * 10^decimals`, rounded to the asset's precision
    fn raw_from_amount(&self, amount: Decimal) -> Option<i64> {
        let scale = Decimal::from(10u64.checked_pow(self.config.decimals)?);
        amount.checked_mul(scale)?.round().to_i64()
    }

    fn token_balance(&self, full_account: &FullAccount, token: &Token) -> Result<Token, PluginError> {
        let asset_id = self.asset_id_for(token)?;
        let raw = full_account
            .balance_of(&asset_id)
            .ok_or_else(|| PluginError::AssetNotFound(format!("{} ({})", token.symbol, asset_id)))?;
        Ok(token.with_amount(self.amount_from_raw(raw)?))
    }

    async fn sign_transfer(
        &self,
        payload: SignPayload,
        account: &Account,
        prompt_for_signature: bool,
    ) -> Result<Signature, ErrorBody> {
        if !prompt_for_signature {
            return self
                .signer(&payload, &account.public_key, false, false, None)
                .await
                .map_err(ErrorBody::from);
        }

        let (tx, mut rx) = oneshot::channel();
        let rejector: Rejector = Box::new(move |body| {
            let _ = tx.send(body);
        });

        match self.signer_with_popup(payload, account, rejector).await {
            Some(signature) => Ok(signature),
            None => Err(rx.try_recv().unwrap_or_else(|_| ErrorBody::signature())),
        }
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait]
impl Plugin for PeerplaysPlugin {
    fn blockchain(&self) -> Blockchain {
        Blockchain::PPY
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    fn bip(&self) -> &str {
        BIP
    }

    fn default_explorer(&self) -> ExplorerTemplate {
        ExplorerTemplate {
            name: "PeerplaysBlockchain".to_string(),
            account: "https://peerplaysblockchain.info/account/{x}".to_string(),
            transaction: "https://peerplaysblockchain.info/explorer/transactions/{x}".to_string(),
            block: "https://peerplaysblockchain.info/block/{x}".to_string(),
        }
    }

    fn account_formatter(&self, account: &Account) -> String {
        account.public_key.clone()
    }

    fn returnable_account(&self, account: &Account) -> ReturnableAccount {
        ReturnableAccount {
            name: account.name.clone(),
            address: account.public_key.clone(),
            blockchain: Blockchain::PPY,
        }
    }

    fn contract_placeholder(&self) -> &str {
        ""
    }

    fn accounts_are_imported(&self) -> bool {
        true
    }

    fn is_valid_recipient(&self, name: &str) -> bool {
        is_account_name(name)
    }

    fn valid_private_key(&self, private_key: &str) -> bool {
        private_key.len() >= MIN_PRIVATE_KEY_LEN && PrivateKey::from_wif(private_key).is_ok()
    }

    fn valid_public_key(&self, public_key: &str, prefix: Option<&str>) -> Option<PublicKey> {
        PublicKey::from_string(public_key, Some(prefix.unwrap_or(DEFAULT_PREFIX))).ok()
    }

    fn private_to_public(
        &self,
        private_key: &str,
        prefix: Option<&str>,
    ) -> Result<String, PluginError> {
        let key = PrivateKey::from_wif(private_key)?;
        Ok(key
            .public_key()
            .to_string_with_prefix(prefix.unwrap_or(DEFAULT_PREFIX)))
    }

    fn buffer_to_hex_private(&self, buffer: &[u8]) -> Result<String, PluginError> {
        Ok(PrivateKey::from_bytes(buffer)?.to_wif())
    }

    fn hex_private_to_buffer(&self, private_key: &str) -> Result<Vec<u8>, PluginError> {
        Ok(PrivateKey::from_wif(private_key)?.to_bytes())
    }

    fn endorsed_network(&self) -> Network {
        self.config.endorsed_network.clone()
    }

    async fn chain_id(&self, network: &Network) -> Result<String, PluginError> {
        self.rpc_for(network).get_chain_id().await
    }

    async fn check_network(&self, network: &Network) -> NetworkStatus {
        let status = race(self.probe.probe(network), self.reachability_timeout).await;
        info!("Peerplays network {} is {}", network.fullhost(), status);
        status
    }

    fn default_decimals(&self) -> u32 {
        self.config.decimals
    }

    fn default_token(&self) -> Token {
        Token::new(
            Blockchain::PPY,
            CORE_ASSET_ID,
            "PPY",
            "PPY",
            self.default_decimals(),
            &self.config.endorsed_network.chain_id,
        )
    }

    async fn balance_for(&self, account: &Account, token: &Token) -> Result<Token, PluginError> {
        let full_account = self
            .rpc_for(&account.network)
            .get_full_account(&account.name)
            .await?;
        self.token_balance(&full_account, token)
    }

    async fn balances_for(
        &self,
        account: &Account,
        tokens: &[Token],
        fallback: bool,
    ) -> Result<Vec<Token>, PluginError> {
        let defaults;
        let tokens = if tokens.is_empty() && fallback {
            defaults = [self.default_token()];
            &defaults[..]
        } else {
            tokens
        };

        let full_account = self
            .rpc_for(&account.network)
            .get_full_account(&account.name)
            .await?;

        Ok(tokens
            .iter()
            .filter_map(|token| match self.token_balance(&full_account, token) {
                Ok(balance) => Some(balance),
                Err(e) => {
                    debug!("Skipping {} for {}: {}", token.symbol, account.name, e);
                    None
                }
            })
            .collect())
    }

    fn action_participants(&self, payload: &SignPayload) -> Vec<String> {
        if let Some(participants) = payload.transaction.get("participants").and_then(Value::as_array) {
            return participants
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }

        payload
            .transaction
            .get("operations")
            .and_then(Value::as_array)
            .map(|operations| {
                operations
                    .iter()
                    .filter_map(|op| op.get(1)?.get("from")?.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn request_parser(&self, payload: &SignPayload) -> Result<Vec<Message>, PluginError> {
        let operations = match payload.transaction.get("operations") {
            Some(operations) => operations
                .as_array()
                .ok_or_else(|| PluginError::Parse("operations is not a list".to_string()))?,
            None => return Ok(Vec::new()),
        };

        operations
            .iter()
            .map(|op| {
                let id = op
                    .get(0)
                    .and_then(Value::as_u64)
                    .ok_or_else(|| PluginError::Parse(format!("Malformed operation: {}", op)))?;
                Ok(Message {
                    code: Blockchain::PPY.code().to_string(),
                    kind: operation_name(id),
                    data: op.get(1).cloned().unwrap_or(Value::Null),
                })
            })
            .collect()
    }

    async fn transfer(&self, params: TransferParams) -> Result<SignedTransaction, ErrorBody> {
        let TransferParams {
            account,
            to,
            amount,
            token,
            memo,
            prompt_for_signature,
        } = params;

        if !self.is_valid_recipient(&to) {
            return Err(PluginError::InvalidRecipient.into());
        }
        if account.name.is_empty() || account.public_key.is_empty() {
            return Err(PluginError::MissingParameters("account".to_string()).into());
        }
        let raw_amount = match self.raw_from_amount(amount) {
            Some(raw) if raw > 0 => raw,
            _ => return Err(PluginError::MissingParameters(format!("amount {}", amount)).into()),
        };
        let asset_id = self.asset_id_for(&token)?;
        if memo.as_deref().is_some_and(|m| !m.is_empty()) {
            return Err(PluginError::Unsupported("transfer memos".to_string()).into());
        }

        let network = &account.network;
        let rpc = self.rpc_for(network);
        let from = self.account_id(&rpc, network, &account.name).await?;
        let to_id = self.account_id(&rpc, network, &to).await?;

        let chain_id = if network.chain_id.is_empty() {
            rpc.get_chain_id().await?
        } else {
            network.chain_id.clone()
        };

        let operation = TransferOperation {
            from,
            to: to_id,
            amount: AssetAmount {
                amount: raw_amount,
                asset_id,
            },
        };
        let unsigned = rpc.prepare_transfer(&operation, &chain_id).await?;

        info!(
            "Transfer {} {} from {} to {} awaiting signature",
            amount, token.symbol, account.name, to
        );
        let payload = SignPayload::new(unsigned.transaction.clone(), unsigned.signing_bytes);
        let signature = self
            .sign_transfer(payload, &account, prompt_for_signature)
            .await?;

        let mut transaction = unsigned.transaction;
        transaction
            .as_object_mut()
            .ok_or_else(|| PluginError::Parse("transaction is not an object".to_string()))?
            .insert(
                "signatures".to_string(),
                Value::Array(vec![Value::String(signature.to_string())]),
            );

        let result = rpc.broadcast(&transaction).await.map_err(|e| {
            warn!("Broadcast of transfer from {} failed: {}", account.name, e);
            ErrorBody::from(e)
        })?;

        Ok(SignedTransaction {
            transaction,
            signatures: vec![signature],
            result,
        })
    }

    async fn signer(
        &self,
        payload: &SignPayload,
        public_key: &str,
        arbitrary: bool,
        is_hash: bool,
        private_key: Option<&[u8]>,
    ) -> Result<Signature, PluginError> {
        let bytes = match private_key {
            Some(bytes) => bytes.to_vec(),
            None => self
                .signing
                .key_store()
                .public_to_private(public_key)
                .await
                .ok_or_else(|| {
                    PluginError::SignatureUnavailable(format!("No private key for {}", public_key))
                })?,
        };
        let key = PrivateKey::from_bytes(&bytes)?;

        let signature = if arbitrary {
            let data = payload
                .data
                .as_deref()
                .ok_or_else(|| PluginError::MissingParameters("data".to_string()))?;
            if is_hash {
                let digest = hex::decode(data)
                    .map_err(|e| PluginError::Parse(format!("hash: {}", e)))?;
                key.sign_hash(&digest)
            } else {
                key.sign(data.as_bytes())
            }
        } else {
            key.sign(&payload.buf)
        };

        signature
            .map(Signature::new)
            .map_err(|e| PluginError::SignatureUnavailable(e.to_string()))
    }

    async fn signer_with_popup(
        &self,
        mut payload: SignPayload,
        account: &Account,
        rejector: Rejector,
    ) -> Option<Signature> {
        payload.messages = match self.request_parser(&payload) {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Could not describe Peerplays payload: {}", e);
                Vec::new()
            }
        };
        self.signing
            .sign(Blockchain::PPY, payload, account, rejector)
            .await
    }

    fn bust_cache(&self) -> Result<(), PluginError> {
        write_lock(&self.connections).clear();
        write_lock(&self.account_ids).clear();
        debug!("Peerplays caches cleared");
        Ok(())
    }
}

impl std::fmt::Debug for PeerplaysPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerplaysPlugin")
            .field("config", &self.config)
            .field("reachability_timeout", &self.reachability_timeout)
            .finish()
    }
}
