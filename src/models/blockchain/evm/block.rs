use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::to_hex_quantity;

/// Block reference for state queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockId {
	#[default]
	Latest,
	Number(u64),
}

impl BlockId {
	/// JSON-RPC block tag
	pub fn to_rpc(&self) -> String {
		match self {
			Self::Latest => "latest".to_string(),
			Self::Number(number) => to_hex_quantity(*number),
		}
	}

	/// Queries at a concrete block need archive state
	pub fn is_historical(&self) -> bool {
		matches!(self, Self::Number(_))
	}
}

impl From<u64> for BlockId {
	fn from(number: u64) -> Self {
		Self::Number(number)
	}
}

impl fmt::Display for BlockId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Latest => write!(f, "latest"),
			Self::Number(number) => write!(f, "{}", number),
		}
	}
}
