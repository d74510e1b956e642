//! Peerplays node JSON-RPC client
//!
//! Every call is a POST of `{"method":"call","params":[api, method, args]}`
//! against the node's root URL. Transaction serialization is done by the
//! node (`get_transaction_hex`); this client only assembles the JSON body.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDateTime};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::PluginError;

/// Core asset id
pub const CORE_ASSET_ID: &str = "1.3.0";

/// Seconds a prepared transaction stays valid
pub const EXPIRATION_SECONDS: i64 = 30;

/// Graphene operation id of `transfer`
pub const TRANSFER_OPERATION: u64 = 0;

const NODE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Account record returned by `get_full_accounts`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FullAccount {
    pub account: AccountObject,
    #[serde(default)]
    pub balances: Vec<AccountBalance>,
}

impl FullAccount {
    /// Raw balance of `asset_id`, if the account holds it
    pub fn balance_of(&self, asset_id: &str) -> Option<i128> {
        self.balances
            .iter()
            .find(|b| b.asset_type == asset_id)
            .map(|b| b.balance)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountObject {
    /// Object id, e.g. `1.2.345`
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountBalance {
    pub asset_type: String,
    #[serde(deserialize_with = "raw_amount")]
    pub balance: i128,
}

/// Nodes send share amounts either as numbers or as strings
fn raw_amount<'de, D>(deserializer: D) -> Result<i128, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .ok_or_else(|| serde::de::Error::custom(format!("amount out of range: {}", n))),
        Value::String(s) => s.parse().map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!("unexpected amount: {}", other))),
    }
}

/// Amount in an asset's smallest unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAmount {
    pub amount: i64,
    pub asset_id: String,
}

/// A transfer between two account ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOperation {
    pub from: String,
    pub to: String,
    pub amount: AssetAmount,
}

impl TransferOperation {
    fn to_json(&self, fee: &AssetAmount) -> Value {
        json!([
            TRANSFER_OPERATION,
            {
                "fee": fee,
                "from": self.from,
                "to": self.to,
                "amount": self.amount,
                "extensions": []
            }
        ])
    }
}

/// Transaction body plus the bytes its signature must cover
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedTransaction {
    pub transaction: Value,
    /// `chain_id ‖ serialized transaction`
    pub signing_bytes: Vec<u8>,
}

/// Node calls the Peerplays plugin needs
#[async_trait]
pub trait PeerplaysRpc: Send + Sync {
    async fn get_full_account(&self, name_or_id: &str) -> Result<FullAccount, PluginError>;

    async fn get_chain_id(&self) -> Result<String, PluginError>;

    async fn prepare_transfer(
        &self,
        operation: &TransferOperation,
        chain_id: &str,
    ) -> Result<UnsignedTransaction, PluginError>;

    /// Broadcast a signed transaction and return the node's answer
    async fn broadcast(&self, transaction: &Value) -> Result<Value, PluginError>;
}

/// JSON-RPC client over HTTP
pub struct HttpPeerplaysRpc {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpPeerplaysRpc {
    pub fn new(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Make a `call` request against one of the node's APIs
    pub async fn call(&self, api: &str, method: &str, args: Value) -> Result<Value, PluginError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "method": "call",
            "params": [api, method, args],
            "jsonrpc": "2.0",
            "id": id
        });
        debug!("Peerplays RPC {} {}.{}", id, api, method);

        let resp = self.client.post(&self.url).json(&request).send().await?;
        if !resp.status().is_success() {
            return Err(PluginError::Rpc(format!(
                "{}.{} returned HTTP {}",
                api,
                method,
                resp.status()
            )));
        }

        let data: Value = resp.json().await?;
        parse_response(data)
    }
}

fn parse_response(mut data: Value) -> Result<Value, PluginError> {
    if let Some(error) = data.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(PluginError::Rpc(message));
    }
    match data.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(PluginError::Parse("Response has no result".to_string())),
    }
}

/// `result[0][1]` of a `get_full_accounts` answer
fn first_full_account(result: Value, name_or_id: &str) -> Result<FullAccount, PluginError> {
    let entry = result
        .get(0)
        .and_then(|pair| pair.get(1))
        .cloned()
        .ok_or_else(|| PluginError::Rpc(format!("Account not found: {}", name_or_id)))?;
    Ok(serde_json::from_value(entry)?)
}

/// Reference block fields derived from the head block
fn reference_block(head_block_number: u64, head_block_id: &str) -> Result<(u16, u32), PluginError> {
    let id = hex::decode(head_block_id)
        .map_err(|e| PluginError::Parse(format!("head_block_id: {}", e)))?;
    if id.len() < 8 {
        return Err(PluginError::Parse(format!(
            "head_block_id too short: {}",
            head_block_id
        )));
    }
    let prefix = u32::from_le_bytes([id[4], id[5], id[6], id[7]]);
    Ok(((head_block_number & 0xFFFF) as u16, prefix))
}

fn expiration_after(node_time: &str, seconds: i64) -> Result<String, PluginError> {
    let time = NaiveDateTime::parse_from_str(node_time, NODE_TIME_FORMAT)
        .map_err(|e| PluginError::Parse(format!("node time '{}': {}", node_time, e)))?;
    Ok((time + ChronoDuration::seconds(seconds))
        .format(NODE_TIME_FORMAT)
        .to_string())
}

/// Bytes a signature covers: chain id then the serialized transaction
/// without its (empty) signature list
fn signing_bytes(chain_id: &str, transaction_hex: &str) -> Result<Vec<u8>, PluginError> {
    let mut bytes =
        hex::decode(chain_id).map_err(|e| PluginError::Parse(format!("chain id: {}", e)))?;
    let mut transaction = hex::decode(transaction_hex)
        .map_err(|e| PluginError::Parse(format!("transaction hex: {}", e)))?;
    if transaction.last() == Some(&0) {
        transaction.pop();
    }
    bytes.extend_from_slice(&transaction);
    Ok(bytes)
}

#[async_trait]
impl PeerplaysRpc for HttpPeerplaysRpc {
    async fn get_full_account(&self, name_or_id: &str) -> Result<FullAccount, PluginError> {
        let result = self
            .call("database", "get_full_accounts", json!([[name_or_id], true]))
            .await?;
        first_full_account(result, name_or_id)
    }

    async fn get_chain_id(&self) -> Result<String, PluginError> {
        let result = self.call("database", "get_chain_id", json!([])).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| PluginError::Parse(format!("Unexpected chain id: {}", result)))
    }

    async fn prepare_transfer(
        &self,
        operation: &TransferOperation,
        chain_id: &str,
    ) -> Result<UnsignedTransaction, PluginError> {
        let props = self
            .call("database", "get_dynamic_global_properties", json!([]))
            .await?;
        let head_block_number = props
            .get("head_block_number")
            .and_then(Value::as_u64)
            .ok_or_else(|| PluginError::Parse("Missing head_block_number".to_string()))?;
        let head_block_id = props
            .get("head_block_id")
            .and_then(Value::as_str)
            .ok_or_else(|| PluginError::Parse("Missing head_block_id".to_string()))?;
        let time = props
            .get("time")
            .and_then(Value::as_str)
            .ok_or_else(|| PluginError::Parse("Missing time".to_string()))?;

        let (ref_block_num, ref_block_prefix) = reference_block(head_block_number, head_block_id)?;
        let expiration = expiration_after(time, EXPIRATION_SECONDS)?;

        let zero_fee = AssetAmount {
            amount: 0,
            asset_id: CORE_ASSET_ID.to_string(),
        };
        let fees = self
            .call(
                "database",
                "get_required_fees",
                json!([[operation.to_json(&zero_fee)], CORE_ASSET_ID]),
            )
            .await?;
        let fee: AssetAmount = serde_json::from_value(
            fees.get(0)
                .cloned()
                .ok_or_else(|| PluginError::Parse("Empty fee list".to_string()))?,
        )?;

        let transaction = json!({
            "ref_block_num": ref_block_num,
            "ref_block_prefix": ref_block_prefix,
            "expiration": expiration,
            "operations": [operation.to_json(&fee)],
            "extensions": [],
            "signatures": []
        });

        let transaction_hex = self
            .call("database", "get_transaction_hex", json!([transaction]))
            .await?;
        let transaction_hex = transaction_hex
            .as_str()
            .ok_or_else(|| PluginError::Parse("Transaction hex is not a string".to_string()))?;

        Ok(UnsignedTransaction {
            signing_bytes: signing_bytes(chain_id, transaction_hex)?,
            transaction,
        })
    }

    async fn broadcast(&self, transaction: &Value) -> Result<Value, PluginError> {
        self.call(
            "network_broadcast",
            "broadcast_transaction_synchronous",
            json!([transaction]),
        )
        .await
    }
}

impl std::fmt::Debug for HttpPeerplaysRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPeerplaysRpc")
            .field("url", &self.url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_account_parsing() {
        let result = json!([[
            "se-dogperson420",
            {
                "account": {"id": "1.2.100", "name": "se-dogperson420", "owner": {}},
                "balances": [
                    {"id": "2.5.1", "owner": "1.2.100", "asset_type": "1.3.0", "balance": 150000000},
                    {"id": "2.5.2", "owner": "1.2.100", "asset_type": "1.3.1", "balance": "42"}
                ]
            }
        ]]);

        let account = first_full_account(result, "se-dogperson420").unwrap();
        assert_eq!(account.account.id, "1.2.100");
        assert_eq!(account.balance_of("1.3.0"), Some(150_000_000));
        assert_eq!(account.balance_of("1.3.1"), Some(42));
        assert_eq!(account.balance_of("1.3.9"), None);
    }

    #[test]
    fn test_missing_account_is_error() {
        assert!(first_full_account(json!([]), "nobody").is_err());
    }

    #[test]
    fn test_rpc_error_message() {
        let err = parse_response(json!({"id": 1, "error": {"code": 1, "message": "bad call"}}))
            .unwrap_err();
        assert_eq!(err, PluginError::Rpc("bad call".to_string()));

        let ok = parse_response(json!({"id": 1, "jsonrpc": "2.0", "result": "abc"})).unwrap();
        assert_eq!(ok, json!("abc"));
    }

    #[test]
    fn test_reference_block() {
        let (num, prefix) =
            reference_block(0x0001_2345, "0001234578563412aabbccddeeff00112233445566").unwrap();
        assert_eq!(num, 0x2345);
        assert_eq!(prefix, 0x1234_5678);
        assert!(reference_block(1, "0011").is_err());
    }

    #[test]
    fn test_expiration() {
        assert_eq!(
            expiration_after("2024-03-01T23:59:45", 30).unwrap(),
            "2024-03-02T00:00:15"
        );
        assert!(expiration_after("yesterday", 30).is_err());
    }

    #[test]
    fn test_signing_bytes_drop_empty_signature_list() {
        let bytes = signing_bytes("abcd", "010200").unwrap();
        assert_eq!(bytes, vec![0xab, 0xcd, 0x01, 0x02]);
    }
}
