//! chain-plugins - inspect and exercise the blockchain plugins
//!
//! Loads the configured plugins and runs one command against them.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use chain_plugins::blockchains::BlockchainRegistry;
use chain_plugins::config::{AppConfig, PeerplaysConfig};
use chain_plugins::error::PluginError;
use chain_plugins::models::{Account, Network, Token};
use chain_plugins::plugins::{Plugin, PluginContext, PluginRepository};
use chain_plugins::signing::{PopupBridge, SigningProtocol};
use chain_plugins::wallet::InMemoryKeyStore;

/// chain-plugins: blockchain adapters for a multi-chain wallet
#[derive(Parser)]
#[command(name = "chain-plugins")]
#[command(about = "Inspect and exercise blockchain plugins", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Peerplays deployment preset (full-node, legacy-gateway)
    #[arg(long, global = true)]
    preset: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered blockchains
    ListChains,

    /// Show default explorers of loaded plugins
    Explorers,

    /// Race a reachability probe against the timeout
    CheckNetwork {
        /// Chain code (e.g. ppy)
        chain: String,

        /// Probe this host instead of the endorsed network
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        #[arg(long, default_value = "https")]
        protocol: String,
    },

    /// Query token balances of an account
    Balances {
        chain: String,

        account: String,

        /// Comma separated symbols or asset ids
        #[arg(short, long, value_delimiter = ',', default_value = "PPY")]
        tokens: Vec<String>,
    },

    /// Validate a private or public key
    ValidateKey {
        chain: String,

        key: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set subscriber: {}", e);
    }

    if let Err(e) = run(cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig, PluginError> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };

    if let Some(preset) = &cli.preset {
        config.peerplays = PeerplaysConfig::preset(preset)
            .ok_or_else(|| PluginError::Config(format!("Unknown preset: {}", preset)))?;
    }
    Ok(config)
}

/// Approval channel for a terminal session: every request is declined
fn console_approvals() -> PopupBridge {
    let (bridge, mut popups) = PopupBridge::channel(8);
    tokio::spawn(async move {
        while let Some(pending) = popups.recv().await {
            warn!(
                "Signing request {} from {} declined: no approval UI attached",
                pending.request.id, pending.request.origin
            );
            pending.reject();
        }
    });
    bridge
}

async fn run(cli: Cli) -> Result<(), PluginError> {
    let config = load_config(&cli)?;

    let key_store = Arc::new(InMemoryKeyStore::new());
    let signing = SigningProtocol::local(Arc::new(console_approvals()), key_store)
        .with_origin(&config.origin);
    let ctx = PluginContext::new(Arc::new(signing), config);

    let blockchains = Arc::new(BlockchainRegistry::new());
    let repository = PluginRepository::from_config(&ctx, blockchains.clone())?;

    match cli.command {
        Commands::ListChains => list_chains(&repository, &blockchains),
        Commands::Explorers => explorers(&repository, &blockchains),
        Commands::CheckNetwork {
            chain,
            host,
            port,
            protocol,
        } => {
            let plugin = repository.by_identifier(&chain)?;
            let mut network = plugin.endorsed_network();
            if let Some(host) = host {
                network.name = "Custom".to_string();
                network.host = host;
                network.protocol = protocol;
                network.port = port.unwrap_or(0);
            } else if let Some(port) = port {
                network.port = port;
            }
            check_network(plugin.as_ref(), &network).await;
        }
        Commands::Balances {
            chain,
            account,
            tokens,
        } => {
            let plugin = repository.by_identifier(&chain)?;
            balances(plugin.as_ref(), &account, &tokens).await?;
        }
        Commands::ValidateKey { chain, key } => {
            let plugin = repository.by_identifier(&chain)?;
            validate_key(plugin.as_ref(), &key);
        }
    }
    Ok(())
}

fn list_chains(repository: &PluginRepository, blockchains: &BlockchainRegistry) {
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│  BLOCKCHAINS                                                │");
    println!("├─────────────────────────────────────────────────────────────┤");
    for entry in blockchains.entries() {
        let loaded = repository.by_identifier(entry.value.code()).is_ok();
        println!(
            "│  {:<6} {:<6} {:<14} {:<30}│",
            entry.key,
            entry.value.code(),
            blockchains.display_name(&entry.value),
            if loaded { "plugin loaded" } else { "-" }
        );
    }
    println!("└─────────────────────────────────────────────────────────────┘");
}

fn explorers(repository: &PluginRepository, blockchains: &BlockchainRegistry) {
    for (blockchain, explorer) in repository.default_explorers() {
        println!("{} ({})", blockchains.display_name(&blockchain), explorer.name);
        println!("  account:     {}", explorer.raw.account);
        println!("  transaction: {}", explorer.raw.transaction);
        println!("  block:       {}", explorer.raw.block);
    }
}

async fn check_network(plugin: &dyn Plugin, network: &Network) {
    let status = plugin.check_network(network).await;
    let endorsed = if plugin.is_endorsed_network(network) {
        " (endorsed)"
    } else {
        ""
    };
    println!("{}{}: {}", network.fullhost(), endorsed, status);
}

async fn balances(plugin: &dyn Plugin, name: &str, symbols: &[String]) -> Result<(), PluginError> {
    if !plugin.is_valid_recipient(name) {
        return Err(PluginError::InvalidRecipient);
    }

    let network = plugin.endorsed_network();
    let account = Account::new(name, "", network.clone());
    let tokens: Vec<Token> = symbols
        .iter()
        .map(|symbol| {
            // Asset ids are passed as the contract
            let contract = if symbol.starts_with("1.3.") { symbol.as_str() } else { "" };
            Token::new(
                plugin.blockchain(),
                contract,
                symbol,
                symbol,
                plugin.default_decimals(),
                &network.chain_id,
            )
        })
        .collect();

    let found = plugin.balances_for(&account, &tokens, true).await?;
    if found.is_empty() {
        println!("No balances found for {}", name);
    }
    for token in found {
        let amount = token.amount.unwrap_or_default();
        println!("{:>24} {}", amount, token.symbol);
    }
    Ok(())
}

fn validate_key(plugin: &dyn Plugin, key: &str) {
    if plugin.valid_private_key(key) {
        match plugin.private_to_public(key, None) {
            Ok(public_key) => println!("valid private key, public key {}", public_key),
            Err(e) => println!("invalid private key: {}", e),
        }
    } else if plugin.valid_public_key(key, None).is_some() {
        println!("valid public key");
    } else {
        println!("invalid key");
    }
}
