use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
	models::{NodeDescriptor, WeightedNode},
	utils::RetryConfig,
};

/// Multicall3, deployed at the same address on nearly every EVM chain
pub const MULTICALL3_ADDRESS: Address = Address::new([
	0xca, 0x11, 0xbd, 0xe0, 0x59, 0x77, 0xb3, 0x63, 0x11, 0x67, 0x02, 0x88, 0x62, 0xbe, 0x2a, 0x17,
	0x39, 0x76, 0xca, 0x11,
]);

fn default_rpc_timeout_secs() -> u64 {
	30
}

fn default_multicall_address() -> Address {
	MULTICALL3_ADDRESS
}

fn default_page_limit() -> usize {
	1000
}

fn default_max_rate_limit_retries() -> usize {
	5
}

fn default_chunk_size() -> u64 {
	250_000
}

fn default_min_chunk_size() -> u64 {
	50
}

fn default_explorer_chunk_size() -> u64 {
	300_000
}

fn default_token_metadata_capacity() -> usize {
	1024
}

fn default_block_by_timestamp_capacity() -> usize {
	512
}

/// Block explorer used as the last-resort source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExplorerConfig {
	pub name: String,

	/// Base URL of an Etherscan compatible API
	pub url: String,

	/// Environment variable holding the API key
	#[serde(default)]
	pub api_key_env: Option<String>,

	/// Maximum rows the explorer returns for one log page
	#[serde(default = "default_page_limit")]
	pub page_limit: usize,

	#[serde(default = "default_max_rate_limit_retries")]
	pub max_rate_limit_retries: usize,
}

/// Known historical balance used to tell archive nodes apart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveProbe {
	pub address: Address,
	pub block_number: u64,
	pub expected_balance: U256,
}

impl ArchiveProbe {
	/// An account holding 5.1063307 ETH at mainnet block 87042.
	pub fn ethereum_mainnet() -> Self {
		Self {
			address: Address::new([
				0x50, 0x53, 0x2e, 0x4b, 0xe1, 0x95, 0xd1, 0xde, 0x0c, 0x2e, 0x6d, 0xfa, 0x46, 0xd9,
				0xec, 0x0a, 0x4f, 0xee, 0x68, 0x61,
			]),
			block_number: 87042,
			expected_balance: U256::from(5_106_330_700_000_000_000u64),
		}
	}
}

/// Chunking limits for `eth_getLogs` walks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogQueryConfig {
	#[serde(default = "default_chunk_size")]
	pub default_chunk_size: u64,
	/// Below this many blocks per request the walk gives up
	#[serde(default = "default_min_chunk_size")]
	pub min_chunk_size: u64,
	#[serde(default = "default_explorer_chunk_size")]
	pub explorer_chunk_size: u64,
}

impl Default for LogQueryConfig {
	fn default() -> Self {
		Self {
			default_chunk_size: default_chunk_size(),
			min_chunk_size: default_min_chunk_size(),
			explorer_chunk_size: default_explorer_chunk_size(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
	#[serde(default = "default_token_metadata_capacity")]
	pub token_metadata_capacity: usize,
	#[serde(default = "default_block_by_timestamp_capacity")]
	pub block_by_timestamp_capacity: usize,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			token_metadata_capacity: default_token_metadata_capacity(),
			block_by_timestamp_capacity: default_block_by_timestamp_capacity(),
		}
	}
}

/// Everything needed to query one EVM chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainConfig {
	/// Unique identifier for this chain
	pub slug: String,

	/// Human-readable name of the chain
	pub name: String,

	pub chain_id: u64,

	/// Value nodes must report from `net_version`; defaults to the chain id
	#[serde(default)]
	pub network_id: Option<u64>,

	/// Per-request timeout applied to every node and explorer call
	#[serde(default = "default_rpc_timeout_secs")]
	pub rpc_timeout_secs: u64,

	/// Persisted weighted source list
	pub nodes: Vec<WeightedNode>,

	#[serde(default)]
	pub explorer: Option<ExplorerConfig>,

	#[serde(default)]
	pub archive_probe: Option<ArchiveProbe>,

	/// Old transaction that pruned nodes no longer serve
	#[serde(default)]
	pub pruned_probe_tx: Option<B256>,

	#[serde(default = "default_multicall_address")]
	pub multicall_address: Address,

	#[serde(default)]
	pub log_query: LogQueryConfig,

	#[serde(default)]
	pub cache: CacheConfig,

	/// Blocks carry oversized `extraData` that has to be moved aside
	#[serde(default)]
	pub proof_of_authority: bool,

	/// Receipts must carry an `l1Fee` field
	#[serde(default)]
	pub has_l1_fees: bool,

	#[serde(default)]
	pub retry: RetryConfig,
}

impl ChainConfig {
	pub fn expected_network_id(&self) -> u64 {
		self.network_id.unwrap_or(self.chain_id)
	}

	pub fn rpc_timeout(&self) -> Duration {
		Duration::from_secs(self.rpc_timeout_secs)
	}

	/// Descriptor standing in for the explorer inside call orders
	pub fn explorer_descriptor(&self) -> Option<NodeDescriptor> {
		self.explorer
			.as_ref()
			.map(|explorer| NodeDescriptor::explorer(&explorer.name, &explorer.url))
	}
}
