//! Block explorer metadata
//!
//! Plugins describe their explorer with URL templates where `{x}` stands for
//! the account name, transaction id or block number.

use serde::{Deserialize, Serialize};

const PLACEHOLDER: &str = "{x}";

/// Raw explorer description as emitted by a plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerTemplate {
    pub name: String,
    pub account: String,
    pub transaction: String,
    pub block: String,
}

/// Explorer parsed from a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explorer {
    pub name: String,
    pub raw: ExplorerTemplate,
}

impl Explorer {
    pub fn from_template(raw: ExplorerTemplate) -> Self {
        Self {
            name: raw.name.clone(),
            raw,
        }
    }

    pub fn account_link(&self, account: &str) -> String {
        fill(&self.raw.account, account)
    }

    pub fn transaction_link(&self, id: &str) -> String {
        fill(&self.raw.transaction, id)
    }

    pub fn block_link(&self, block: &str) -> String {
        fill(&self.raw.block, block)
    }
}

fn fill(template: &str, value: &str) -> String {
    template.replacen(PLACEHOLDER, value, 1)
}
