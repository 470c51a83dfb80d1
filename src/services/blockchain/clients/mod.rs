//! Source clients.
//!
//! - EVM JSON-RPC client wrapping one node transport
//! - Etherscan compatible explorer client used as the last-resort source

mod evm {
	pub mod client;
}
mod explorer;

pub use evm::client::EvmClient;
pub use explorer::{BlockExplorer, EtherscanLikeClient};
