//! Value objects shared by every plugin
//!
//! Only the fields the plugin layer reads are modelled here; the wallet's
//! fuller Account/Network/Token classes live with their owners.

pub mod account;
pub mod explorer;
pub mod network;
pub mod token;

pub use account::{Account, ReturnableAccount};
pub use explorer::{Explorer, ExplorerTemplate};
pub use network::Network;
pub use token::Token;
