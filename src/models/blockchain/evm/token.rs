use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
	/// ERC20 style token exposing name, symbol and decimals
	#[default]
	Fungible,
	/// ERC721 style token exposing name and symbol only
	NonFungible,
}

/// Token introspection result.
///
/// Fields the contract does not implement are `None`; fungible tokens without `decimals()`
/// get 18.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
	pub address: Address,
	pub name: Option<String>,
	pub symbol: Option<String>,
	pub decimals: Option<u8>,
}
