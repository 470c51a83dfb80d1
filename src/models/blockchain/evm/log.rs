use alloy::primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::utils::{quantity, to_hex_quantity};

/// An event log as returned by `eth_getLogs` or an explorer `getLogs` call.
///
/// Explorers add fields such as `timeStamp` and `gasPrice`; those are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmLog {
	pub address: Address,
	pub topics: Vec<B256>,
	pub data: Bytes,
	#[serde(with = "quantity")]
	pub block_number: u64,
	#[serde(default)]
	pub block_hash: Option<B256>,
	pub transaction_hash: B256,
	#[serde(with = "quantity", default)]
	pub transaction_index: u64,
	#[serde(with = "quantity")]
	pub log_index: u64,
	#[serde(default)]
	pub removed: bool,
}

impl EvmLog {
	/// Identity of a log within its chain
	pub fn key(&self) -> (u64, u64, B256) {
		(self.block_number, self.log_index, self.transaction_hash)
	}
}

/// Address and positional topic filter. `None` in a topic slot matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
	#[serde(default)]
	pub addresses: Vec<Address>,
	#[serde(default)]
	pub topics: Vec<Option<B256>>,
}

impl LogFilter {
	pub fn new(addresses: Vec<Address>, topics: Vec<Option<B256>>) -> Self {
		Self { addresses, topics }
	}

	/// `eth_getLogs` params for the inclusive block range
	pub fn to_rpc_params(&self, from_block: u64, to_block: u64) -> Vec<Value> {
		let mut filter = json!({
			"fromBlock": to_hex_quantity(from_block),
			"toBlock": to_hex_quantity(to_block),
		});
		match self.addresses.as_slice() {
			[] => {}
			[single] => filter["address"] = json!(single),
			many => filter["address"] = json!(many),
		}
		if !self.topics.is_empty() {
			filter["topics"] = json!(self.topics);
		}
		vec![filter]
	}
}
