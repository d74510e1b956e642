//! Fungible asset descriptor

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::blockchains::Blockchain;

/// Token value object.
///
/// `amount` is only populated on copies returned from balance queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub blockchain: Blockchain,
    /// Contract address or asset id (e.g. `1.3.0`)
    pub contract: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u32,
    pub chain_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
}

impl Token {
    pub fn new(
        blockchain: Blockchain,
        contract: &str,
        symbol: &str,
        name: &str,
        decimals: u32,
        chain_id: &str,
    ) -> Self {
        Self {
            blockchain,
            contract: contract.to_string(),
            symbol: symbol.to_string(),
            name: name.to_string(),
            decimals,
            chain_id: chain_id.to_string(),
            amount: None,
        }
    }

    /// Copy of this token carrying a balance
    pub fn with_amount(&self, amount: Decimal) -> Self {
        Self {
            amount: Some(amount),
            ..self.clone()
        }
    }

    pub fn unique(&self) -> String {
        format!("{}:{}:{}", self.blockchain, self.contract, self.symbol).to_lowercase()
    }
}
