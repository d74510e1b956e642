//! Blockchain Registry
//!
//! The table of supported chain codes and their display names. The table and
//! the name function can be replaced at runtime for white-label deployments;
//! both live in a single snapshot so a replacement is observed all at once.

use std::borrow::Cow;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::PluginError;

/// Identifier of a supported blockchain (its short code, e.g. `"ppy"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Blockchain(Cow<'static, str>);

impl Blockchain {
    pub const EOSIO: Blockchain = Blockchain(Cow::Borrowed("eos"));
    pub const ETH: Blockchain = Blockchain(Cow::Borrowed("eth"));
    pub const TRX: Blockchain = Blockchain(Cow::Borrowed("trx"));
    pub const BTC: Blockchain = Blockchain(Cow::Borrowed("btc"));
    pub const PPY: Blockchain = Blockchain(Cow::Borrowed("ppy"));

    /// Create an identifier for a chain outside the built-in set
    pub fn new(code: impl Into<String>) -> Self {
        Blockchain(Cow::Owned(code.into()))
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Blockchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the registry: symbolic key and chain code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockchainEntry {
    pub key: String,
    pub value: Blockchain,
}

impl BlockchainEntry {
    pub fn new(key: &str, value: Blockchain) -> Self {
        Self {
            key: key.to_string(),
            value,
        }
    }
}

/// Replacement for the default display-name mapping
pub type NameParser = Arc<dyn Fn(&Blockchain) -> String + Send + Sync>;

/// The built-in table
pub fn default_entries() -> Vec<BlockchainEntry> {
    vec![
        BlockchainEntry::new("EOSIO", Blockchain::EOSIO),
        BlockchainEntry::new("ETH", Blockchain::ETH),
        BlockchainEntry::new("TRX", Blockchain::TRX),
        BlockchainEntry::new("BTC", Blockchain::BTC),
        BlockchainEntry::new("PPY", Blockchain::PPY),
    ]
}

/// Fixed display names; unknown chains fall back to their code
pub fn default_name(blockchain: &Blockchain) -> String {
    match blockchain.code() {
        "eos" => "EOSIO".to_string(),
        "eth" => "Ethereum".to_string(),
        "trx" => "Tron".to_string(),
        "btc" => "Bitcoin".to_string(),
        "ppy" => "Peerplays".to_string(),
        other => other.to_string(),
    }
}

struct Table {
    entries: Vec<BlockchainEntry>,
    namer: Option<NameParser>,
}

/// Registry of chain identifiers.
///
/// Constructed once at startup and shared by reference. Readers take a
/// snapshot, so iteration never sees a half-replaced table.
pub struct BlockchainRegistry {
    table: RwLock<Arc<Table>>,
}

impl BlockchainRegistry {
    pub fn new() -> Self {
        Self::with_entries(default_entries())
    }

    pub fn with_entries(entries: Vec<BlockchainEntry>) -> Self {
        Self {
            table: RwLock::new(Arc::new(Table {
                entries,
                namer: None,
            })),
        }
    }

    fn snapshot(&self) -> Arc<Table> {
        match self.table.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Look a chain up by its code (`"ppy"`) or its key (`"PPY"`)
    pub fn identifier_for(&self, code: &str) -> Result<Blockchain, PluginError> {
        self.snapshot()
            .entries
            .iter()
            .find(|entry| entry.value.code() == code || entry.key == code)
            .map(|entry| entry.value.clone())
            .ok_or_else(|| PluginError::UnknownBlockchain(code.to_string()))
    }

    pub fn contains(&self, blockchain: &Blockchain) -> bool {
        self.snapshot()
            .entries
            .iter()
            .any(|entry| &entry.value == blockchain)
    }

    /// Ordered copy of the current table
    pub fn entries(&self) -> Vec<BlockchainEntry> {
        self.snapshot().entries.clone()
    }

    pub fn display_name(&self, blockchain: &Blockchain) -> String {
        match &self.snapshot().namer {
            Some(namer) => namer(blockchain),
            None => default_name(blockchain),
        }
    }

    /// Replace the whole table, and the name function when one is given.
    pub fn set_blockchains(&self, entries: Vec<BlockchainEntry>, namer: Option<NameParser>) {
        let mut guard = match self.table.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let namer = namer.or_else(|| guard.namer.clone());
        *guard = Arc::new(Table { entries, namer });
        tracing::debug!("Blockchain table replaced ({} entries)", guard.entries.len());
    }
}

impl Default for BlockchainRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BlockchainRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainRegistry")
            .field("entries", &self.entries())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names() {
        let registry = BlockchainRegistry::new();
        assert_eq!(registry.display_name(&Blockchain::EOSIO), "EOSIO");
        assert_eq!(registry.display_name(&Blockchain::ETH), "Ethereum");
        assert_eq!(registry.display_name(&Blockchain::TRX), "Tron");
        assert_eq!(registry.display_name(&Blockchain::BTC), "Bitcoin");
        assert_eq!(registry.display_name(&Blockchain::PPY), "Peerplays");
    }

    #[test]
    fn test_every_entry_has_a_name() {
        let registry = BlockchainRegistry::new();
        for entry in registry.entries() {
            let name = registry.display_name(&entry.value);
            assert!(!name.is_empty());
            assert_eq!(name, registry.display_name(&entry.value));
        }
    }

    #[test]
    fn test_unknown_code_is_its_own_name() {
        let registry = BlockchainRegistry::new();
        assert_eq!(registry.display_name(&Blockchain::new("xyz")), "xyz");
    }

    #[test]
    fn test_identifier_lookup() {
        let registry = BlockchainRegistry::new();
        assert_eq!(registry.identifier_for("ppy").unwrap(), Blockchain::PPY);
        assert_eq!(registry.identifier_for("PPY").unwrap(), Blockchain::PPY);
        assert_eq!(
            registry.identifier_for("doge"),
            Err(PluginError::UnknownBlockchain("doge".into()))
        );
    }

    #[test]
    fn test_replacement_swaps_table_and_keeps_namer_when_absent() {
        let registry = BlockchainRegistry::new();
        registry.set_blockchains(
            vec![BlockchainEntry::new("DOGE", Blockchain::new("doge"))],
            Some(Arc::new(|b: &Blockchain| format!("White {}", b))),
        );

        assert!(registry.identifier_for("eos").is_err());
        assert_eq!(registry.identifier_for("doge").unwrap(), Blockchain::new("doge"));
        assert_eq!(registry.display_name(&Blockchain::new("doge")), "White doge");

        registry.set_blockchains(default_entries(), None);
        assert_eq!(registry.entries().len(), 5);
        assert_eq!(registry.display_name(&Blockchain::PPY), "White ppy");
    }

    #[test]
    fn test_concurrent_readers_never_see_mixed_tables() {
        let registry = Arc::new(BlockchainRegistry::new());
        let old: Vec<_> = default_entries();
        let new: Vec<_> = (0..5)
            .map(|i| BlockchainEntry::new(&format!("K{}", i), Blockchain::new(format!("c{}", i))))
            .collect();

        let reader = {
            let registry = registry.clone();
            let (old, new) = (old.clone(), new.clone());
            std::thread::spawn(move || {
                for _ in 0..10_000 {
                    let seen = registry.entries();
                    assert!(seen == old || seen == new);
                }
            })
        };

        for i in 0..1_000 {
            let next = if i % 2 == 0 { new.clone() } else { old.clone() };
            registry.set_blockchains(next, None);
        }
        reader.join().unwrap();
    }
}
