//! Typed requests the dispatcher can run against a source.
//!
//! Each request kind is one type implementing [`NodeQuery`]. It states which capabilities it
//! needs and how to run against a live node and against the explorer. Per-source outcomes are
//! reported as [`QueryError`] and classified by the dispatcher.

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::{
	models::{BlockId, EvmLog, LogFilter},
	services::blockchain::{
		clients::BlockExplorer, connection::LiveNode, logs::LogRangeFetcher,
		transports::TransportError,
	},
	utils::parse_quantity,
};

/// Why one source could not answer one request
#[derive(Debug, Error)]
pub enum QueryError {
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The source does not have the entity the request requires
	#[error("Not found: {0}")]
	NotFound(String),

	/// The source cannot serve this kind of request at all
	#[error("Unsupported: {0}")]
	Unsupported(String),

	/// The request itself is malformed; no source will accept it
	#[error("Invalid request: {0}")]
	Invalid(String),

	/// The source answered with something that does not have the expected shape
	#[error("Decode error: {0}")]
	Decode(String),
}

/// One kind of read request, runnable against any source in a call order
#[async_trait]
pub trait NodeQuery: Send + Sync {
	type Output: Send;

	/// Method and parameters, used in logs and in the exhaustion error
	fn describe(&self) -> String;

	/// Only archive nodes can serve it
	fn needs_archive(&self) -> bool {
		false
	}

	/// Pruned nodes cannot serve it
	fn needs_unpruned(&self) -> bool {
		false
	}

	async fn on_node(&self, node: &LiveNode) -> Result<Self::Output, QueryError>;

	async fn on_explorer(&self, explorer: &dyn BlockExplorer) -> Result<Self::Output, QueryError>;
}

fn historical_unsupported(what: &str, block: BlockId) -> QueryError {
	QueryError::Unsupported(format!("explorer cannot serve {} at block {}", what, block))
}

pub struct BlockNumberQuery;

#[async_trait]
impl NodeQuery for BlockNumberQuery {
	type Output = u64;

	fn describe(&self) -> String {
		"eth_blockNumber".to_string()
	}

	async fn on_node(&self, node: &LiveNode) -> Result<u64, QueryError> {
		Ok(node.client.block_number().await?)
	}

	async fn on_explorer(&self, explorer: &dyn BlockExplorer) -> Result<u64, QueryError> {
		Ok(explorer.block_number().await?)
	}
}

pub struct BalanceQuery {
	pub address: Address,
	pub block: BlockId,
}

#[async_trait]
impl NodeQuery for BalanceQuery {
	type Output = U256;

	fn describe(&self) -> String {
		format!("eth_getBalance({}, {})", self.address, self.block)
	}

	fn needs_archive(&self) -> bool {
		self.block.is_historical()
	}

	async fn on_node(&self, node: &LiveNode) -> Result<U256, QueryError> {
		Ok(node.client.get_balance(self.address, self.block).await?)
	}

	async fn on_explorer(&self, explorer: &dyn BlockExplorer) -> Result<U256, QueryError> {
		if self.block.is_historical() {
			return Err(historical_unsupported("balances", self.block));
		}
		Ok(explorer.get_balance(self.address).await?)
	}
}

pub struct CodeQuery {
	pub address: Address,
	pub block: BlockId,
}

#[async_trait]
impl NodeQuery for CodeQuery {
	type Output = Bytes;

	fn describe(&self) -> String {
		format!("eth_getCode({}, {})", self.address, self.block)
	}

	fn needs_archive(&self) -> bool {
		self.block.is_historical()
	}

	async fn on_node(&self, node: &LiveNode) -> Result<Bytes, QueryError> {
		Ok(node.client.get_code(self.address, self.block).await?)
	}

	async fn on_explorer(&self, explorer: &dyn BlockExplorer) -> Result<Bytes, QueryError> {
		if self.block.is_historical() {
			return Err(historical_unsupported("code", self.block));
		}
		Ok(explorer.get_code(self.address).await?)
	}
}

/// Raw `eth_call`
pub struct CallQuery {
	pub to: Address,
	pub data: Bytes,
	pub block: BlockId,
}

#[async_trait]
impl NodeQuery for CallQuery {
	type Output = Bytes;

	fn describe(&self) -> String {
		format!("eth_call({}, {}, {})", self.to, self.data, self.block)
	}

	fn needs_archive(&self) -> bool {
		self.block.is_historical()
	}

	async fn on_node(&self, node: &LiveNode) -> Result<Bytes, QueryError> {
		Ok(node.client.call(self.to, &self.data, self.block).await?)
	}

	async fn on_explorer(&self, explorer: &dyn BlockExplorer) -> Result<Bytes, QueryError> {
		if self.block.is_historical() {
			return Err(historical_unsupported("calls", self.block));
		}
		Ok(explorer.call(self.to, &self.data).await?)
	}
}

pub struct BlockQuery {
	pub block: BlockId,
	pub full_transactions: bool,
	/// Move oversized `extraData` aside, see [`strip_proof_of_authority`]
	pub proof_of_authority: bool,
}

impl BlockQuery {
	fn finish(&self, block: Option<Value>) -> Result<Value, QueryError> {
		let mut block =
			block.ok_or_else(|| QueryError::NotFound(format!("block {}", self.block)))?;
		if self.proof_of_authority {
			strip_proof_of_authority(&mut block);
		}
		Ok(block)
	}
}

#[async_trait]
impl NodeQuery for BlockQuery {
	type Output = Value;

	fn describe(&self) -> String {
		format!(
			"eth_getBlockByNumber({}, {})",
			self.block, self.full_transactions
		)
	}

	async fn on_node(&self, node: &LiveNode) -> Result<Value, QueryError> {
		let block = node
			.client
			.get_block_by_number(self.block, self.full_transactions)
			.await?;
		self.finish(block)
	}

	async fn on_explorer(&self, explorer: &dyn BlockExplorer) -> Result<Value, QueryError> {
		let block = explorer
			.get_block_by_number(self.block, self.full_transactions)
			.await?;
		self.finish(block)
	}
}

pub struct ReceiptQuery {
	pub transaction_hash: B256,
	/// Absence is a failure instead of an answer
	pub must_exist: bool,
	/// Receipts without an `l1Fee` field are unusable
	pub has_l1_fees: bool,
}

impl ReceiptQuery {
	fn finish(&self, receipt: Option<Value>) -> Result<Option<Value>, QueryError> {
		match receipt {
			None if self.must_exist => Err(QueryError::NotFound(format!(
				"receipt {}",
				self.transaction_hash
			))),
			None => Ok(None),
			Some(receipt) if self.has_l1_fees && receipt.get("l1Fee").is_none() => Err(
				QueryError::Decode(format!("receipt {} lacks l1Fee", self.transaction_hash)),
			),
			Some(receipt) => Ok(Some(receipt)),
		}
	}
}

#[async_trait]
impl NodeQuery for ReceiptQuery {
	type Output = Option<Value>;

	fn describe(&self) -> String {
		format!("eth_getTransactionReceipt({})", self.transaction_hash)
	}

	fn needs_unpruned(&self) -> bool {
		true
	}

	async fn on_node(&self, node: &LiveNode) -> Result<Option<Value>, QueryError> {
		let receipt = node
			.client
			.get_transaction_receipt(self.transaction_hash)
			.await?;
		self.finish(receipt)
	}

	async fn on_explorer(&self, explorer: &dyn BlockExplorer) -> Result<Option<Value>, QueryError> {
		let receipt = explorer
			.get_transaction_receipt(self.transaction_hash)
			.await?;
		self.finish(receipt)
	}
}

pub struct TransactionQuery {
	pub transaction_hash: B256,
	pub must_exist: bool,
}

impl TransactionQuery {
	fn finish(&self, transaction: Option<Value>) -> Result<Option<Value>, QueryError> {
		match transaction {
			None if self.must_exist => Err(QueryError::NotFound(format!(
				"transaction {}",
				self.transaction_hash
			))),
			other => Ok(other),
		}
	}
}

#[async_trait]
impl NodeQuery for TransactionQuery {
	type Output = Option<Value>;

	fn describe(&self) -> String {
		format!("eth_getTransactionByHash({})", self.transaction_hash)
	}

	fn needs_unpruned(&self) -> bool {
		true
	}

	async fn on_node(&self, node: &LiveNode) -> Result<Option<Value>, QueryError> {
		let transaction = node
			.client
			.get_transaction_by_hash(self.transaction_hash)
			.await?;
		self.finish(transaction)
	}

	async fn on_explorer(&self, explorer: &dyn BlockExplorer) -> Result<Option<Value>, QueryError> {
		let transaction = explorer
			.get_transaction_by_hash(self.transaction_hash)
			.await?;
		self.finish(transaction)
	}
}

/// A whole log range, walked by the [`LogRangeFetcher`] against one source
pub struct LogsQuery<'a> {
	pub fetcher: &'a LogRangeFetcher,
	pub filter: LogFilter,
	pub from_block: u64,
	pub to_block: u64,
}

#[async_trait]
impl NodeQuery for LogsQuery<'_> {
	type Output = Vec<EvmLog>;

	fn describe(&self) -> String {
		format!(
			"eth_getLogs({:?}, {}..={})",
			self.filter.addresses, self.from_block, self.to_block
		)
	}

	async fn on_node(&self, node: &LiveNode) -> Result<Vec<EvmLog>, QueryError> {
		self.fetcher
			.fetch_from_node(&node.client, &self.filter, self.from_block, self.to_block)
			.await
	}

	async fn on_explorer(&self, explorer: &dyn BlockExplorer) -> Result<Vec<EvmLog>, QueryError> {
		if self.filter.addresses.len() > 1 {
			return Err(QueryError::Unsupported(
				"explorer log queries filter on a single address".to_string(),
			));
		}
		self.fetcher
			.fetch_from_explorer(explorer, &self.filter, self.from_block, self.to_block)
			.await
	}
}

/// Block in which a contract was deployed. Only an indexer can answer this.
pub struct ContractCreationQuery {
	pub address: Address,
}

#[async_trait]
impl NodeQuery for ContractCreationQuery {
	type Output = Option<u64>;

	fn describe(&self) -> String {
		format!("getcontractcreation({})", self.address)
	}

	async fn on_node(&self, _node: &LiveNode) -> Result<Option<u64>, QueryError> {
		Err(QueryError::Unsupported(
			"nodes do not index contract creation".to_string(),
		))
	}

	async fn on_explorer(&self, explorer: &dyn BlockExplorer) -> Result<Option<u64>, QueryError> {
		let Some(creation_hash) = explorer.contract_creation_hash(self.address).await? else {
			return Ok(None);
		};
		let receipt = explorer
			.get_transaction_receipt(creation_hash)
			.await?
			.ok_or_else(|| QueryError::NotFound(format!("receipt {}", creation_hash)))?;

		receipt
			.get("blockNumber")
			.and_then(Value::as_str)
			.ok_or_else(|| QueryError::Decode("creation receipt lacks blockNumber".to_string()))
			.and_then(|number| parse_quantity(number).map_err(QueryError::Decode))
			.map(Some)
	}
}

/// Last block mined at or before a unix timestamp
pub struct BlockByTimeQuery {
	pub timestamp: u64,
}

#[async_trait]
impl NodeQuery for BlockByTimeQuery {
	type Output = u64;

	fn describe(&self) -> String {
		format!("getblocknobytime({})", self.timestamp)
	}

	async fn on_node(&self, _node: &LiveNode) -> Result<u64, QueryError> {
		Err(QueryError::Unsupported(
			"nodes cannot map timestamps to blocks".to_string(),
		))
	}

	async fn on_explorer(&self, explorer: &dyn BlockExplorer) -> Result<u64, QueryError> {
		Ok(explorer.block_number_by_timestamp(self.timestamp).await?)
	}
}

/// Moves a proof-of-authority block's `extraData` to `proofOfAuthorityData`, keeping only the
/// first 32 bytes in `extraData`.
pub fn strip_proof_of_authority(block: &mut Value) {
	const KEPT_HEX_CHARS: usize = 2 + 64;

	let Some(object) = block.as_object_mut() else {
		return;
	};
	let Some(extra_data) = object.get("extraData").and_then(Value::as_str) else {
		return;
	};
	let extra_data = extra_data.to_string();
	let kept: String = extra_data.chars().take(KEPT_HEX_CHARS).collect();
	object.insert("proofOfAuthorityData".to_string(), Value::String(extra_data));
	object.insert("extraData".to_string(), Value::String(kept));
}
