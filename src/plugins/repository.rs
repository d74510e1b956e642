//! Plugin Repository
//!
//! Holds every loaded plugin for the life of the process. Loading happens
//! once at startup; afterwards the list is only read.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use super::{factories_for, Capability, NetworkStatus, Plugin, PluginContext, PluginFactory};
use crate::blockchains::{Blockchain, BlockchainRegistry};
use crate::error::PluginError;
use crate::models::Explorer;

/// Loaded plugins, in load order
pub struct PluginRepository {
    plugins: Vec<Arc<dyn Plugin>>,
    blockchains: Arc<BlockchainRegistry>,
}

impl PluginRepository {
    pub fn new(blockchains: Arc<BlockchainRegistry>) -> Self {
        Self {
            plugins: Vec::new(),
            blockchains,
        }
    }

    /// Build the repository for the chains listed in the context's config
    pub fn from_config(
        ctx: &PluginContext,
        blockchains: Arc<BlockchainRegistry>,
    ) -> Result<Self, PluginError> {
        let mut repository = Self::new(blockchains);
        repository.load(ctx, factories_for(&ctx.config)?)?;
        Ok(repository)
    }

    /// Run each factory once and append its plugin.
    ///
    /// Meant to run once per process. Loading a chain twice is a caller
    /// error; the duplicate is appended and logged, never merged.
    pub fn load(
        &mut self,
        ctx: &PluginContext,
        factories: Vec<PluginFactory>,
    ) -> Result<(), PluginError> {
        for factory in factories {
            let plugin = factory(ctx)?;
            let blockchain = plugin.blockchain();

            if !self.blockchains.contains(&blockchain) {
                warn!("Loaded plugin for {} which is not in the blockchain table", blockchain);
            }
            if self.plugins.iter().any(|p| p.blockchain() == blockchain) {
                warn!("Plugin for {} loaded more than once", blockchain);
            }

            info!("Loaded plugin: {}", self.blockchains.display_name(&blockchain));
            self.plugins.push(plugin);
        }
        Ok(())
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    pub fn blockchains(&self) -> &Arc<BlockchainRegistry> {
        &self.blockchains
    }

    pub fn by_capability(&self, capability: Capability) -> Vec<Arc<dyn Plugin>> {
        self.plugins
            .iter()
            .filter(|p| p.has_capability(capability))
            .cloned()
            .collect()
    }

    /// Plugins able to sign for their chain
    pub fn signature_providers(&self) -> Vec<Arc<dyn Plugin>> {
        self.by_capability(Capability::BlockchainSupport)
    }

    /// First plugin serving `code` (a chain code or registry key)
    pub fn by_identifier(&self, code: &str) -> Result<Arc<dyn Plugin>, PluginError> {
        let blockchain = self
            .blockchains
            .identifier_for(code)
            .unwrap_or_else(|_| Blockchain::new(code));

        self.plugins
            .iter()
            .find(|p| p.blockchain() == blockchain)
            .cloned()
            .ok_or_else(|| PluginError::PluginNotFound(code.to_string()))
    }

    /// Explorer per registered chain that has a plugin
    pub fn default_explorers(&self) -> BTreeMap<Blockchain, Explorer> {
        self.blockchains
            .entries()
            .into_iter()
            .filter_map(|entry| {
                let plugin = self.plugins.iter().find(|p| p.blockchain() == entry.value)?;
                Some((entry.value, Explorer::from_template(plugin.default_explorer())))
            })
            .collect()
    }

    /// Bust every signing plugin's cache, continuing past failures.
    ///
    /// Returns the failures that occurred.
    pub fn bust_caches(&self) -> Vec<(Blockchain, PluginError)> {
        let mut failures = Vec::new();
        for plugin in self.signature_providers() {
            match plugin.bust_cache() {
                Ok(()) => debug!("Cache busted for {}", plugin.blockchain()),
                Err(e) => {
                    warn!("Cache bust failed for {}: {}", plugin.blockchain(), e);
                    failures.push((plugin.blockchain(), e));
                }
            }
        }
        failures
    }

    /// Probe every plugin's endorsed network concurrently
    pub async fn check_endorsed_networks(&self) -> Vec<(Blockchain, NetworkStatus)> {
        let checks = self.plugins.iter().map(|plugin| async move {
            let network = plugin.endorsed_network();
            let status = plugin.check_network(&network).await;
            debug!("{} endorsed network {}: {}", plugin.blockchain(), network.fullhost(), status);
            (plugin.blockchain(), status)
        });
        join_all(checks).await
    }
}

impl std::fmt::Debug for PluginRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let loaded: Vec<Blockchain> = self.plugins.iter().map(|p| p.blockchain()).collect();
        f.debug_struct("PluginRepository")
            .field("plugins", &loaded)
            .finish()
    }
}
