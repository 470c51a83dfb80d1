use alloy::primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};

/// One read-only contract call to be batched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
	pub target: Address,
	pub data: Bytes,
}

impl ContractCall {
	pub fn new(target: Address, data: impl Into<Bytes>) -> Self {
		Self {
			target,
			data: data.into(),
		}
	}
}

/// Outcome of one call inside a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallResult {
	pub success: bool,
	pub return_data: Bytes,
}

impl CallResult {
	pub fn succeeded(return_data: impl Into<Bytes>) -> Self {
		Self {
			success: true,
			return_data: return_data.into(),
		}
	}

	/// Placeholder for a call that never produced output
	pub fn failed() -> Self {
		Self::default()
	}
}
