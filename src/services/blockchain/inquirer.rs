//! Entry point for querying one EVM chain.
//!
//! [`EvmNodeInquirer`] ties the catalog, the connection manager, the dispatcher and the
//! specialised fetchers together. Every method accepts an optional call order; without one a
//! fresh order over all active sources, explorer last, is built per call.

use alloy::primitives::{Address, Bytes, B256, U256};
use serde_json::Value;
use std::sync::Arc;

use crate::{
	models::{
		BlockId, CallResult, ChainConfig, ContractCall, EvmLog, LogFilter, NodeDescriptor,
		TokenKind, TokenMetadata,
	},
	services::blockchain::{
		catalog::{CallOrder, NodeCatalog},
		clients::BlockExplorer,
		connection::ConnectionManager,
		dispatcher::Dispatcher,
		error::InquirerError,
		logs::LogRangeFetcher,
		metadata::MetadataCache,
		multicall::BatchCaller,
		request::{
			BalanceQuery, BlockNumberQuery, BlockQuery, CallQuery, CodeQuery,
			ContractCreationQuery, LogsQuery, NodeQuery, ReceiptQuery, TransactionQuery,
		},
		transports::TransportConnector,
	},
};

pub struct EvmNodeInquirer {
	chain: ChainConfig,
	catalog: NodeCatalog,
	dispatcher: Dispatcher,
	log_fetcher: LogRangeFetcher,
	batch_caller: BatchCaller,
	metadata: MetadataCache,
}

impl EvmNodeInquirer {
	pub fn new(
		chain: ChainConfig,
		connector: Arc<dyn TransportConnector>,
		explorer: Option<Arc<dyn BlockExplorer>>,
	) -> Self {
		let connections = Arc::new(ConnectionManager::new(&chain, connector));
		Self {
			catalog: NodeCatalog::from_chain(&chain),
			dispatcher: Dispatcher::new(connections, explorer),
			log_fetcher: LogRangeFetcher::new(chain.log_query.clone()),
			batch_caller: BatchCaller::new(chain.multicall_address),
			metadata: MetadataCache::new(chain.chain_id, &chain.cache),
			chain,
		}
	}

	pub fn chain(&self) -> &ChainConfig {
		&self.chain
	}

	pub fn catalog(&self) -> &NodeCatalog {
		&self.catalog
	}

	pub fn connections(&self) -> &Arc<ConnectionManager> {
		self.dispatcher.connections()
	}

	pub fn dispatcher(&self) -> &Dispatcher {
		&self.dispatcher
	}

	pub fn metadata_cache(&self) -> &MetadataCache {
		&self.metadata
	}

	pub fn call_order(&self, skip_explorer: bool) -> CallOrder {
		self.catalog.build_call_order(skip_explorer)
	}

	/// Starts background connections to every active node.
	pub async fn connect_to_nodes(&self) {
		let nodes: Vec<NodeDescriptor> = self
			.catalog
			.nodes()
			.iter()
			.filter(|node| node.active)
			.map(|node| node.node.clone())
			.collect();
		self.connections().connect_multiple(&nodes).await;
	}

	/// Aborts pending background connections.
	pub fn shutdown(&self) {
		self.connections().shutdown();
	}

	/// Runs any request along `call_order`, or a fresh default order.
	pub async fn query<Q: NodeQuery>(
		&self,
		query: &Q,
		call_order: Option<&CallOrder>,
	) -> Result<Q::Output, InquirerError> {
		match call_order {
			Some(order) => self.dispatcher.query(query, order).await,
			None => {
				let order = self.call_order(false);
				self.dispatcher.query(query, &order).await
			}
		}
	}

	pub async fn get_block_number(
		&self,
		call_order: Option<&CallOrder>,
	) -> Result<u64, InquirerError> {
		self.query(&BlockNumberQuery, call_order).await
	}

	pub async fn get_balance(
		&self,
		address: Address,
		block: BlockId,
		call_order: Option<&CallOrder>,
	) -> Result<U256, InquirerError> {
		self.query(&BalanceQuery { address, block }, call_order)
			.await
	}

	pub async fn get_code(
		&self,
		address: Address,
		block: BlockId,
		call_order: Option<&CallOrder>,
	) -> Result<Bytes, InquirerError> {
		self.query(&CodeQuery { address, block }, call_order).await
	}

	pub async fn call(
		&self,
		to: Address,
		data: Bytes,
		block: BlockId,
		call_order: Option<&CallOrder>,
	) -> Result<Bytes, InquirerError> {
		self.query(&CallQuery { to, data, block }, call_order).await
	}

	pub async fn get_block_by_number(
		&self,
		block: BlockId,
		full_transactions: bool,
		call_order: Option<&CallOrder>,
	) -> Result<Value, InquirerError> {
		let query = BlockQuery {
			block,
			full_transactions,
			proof_of_authority: self.chain.proof_of_authority,
		};
		self.query(&query, call_order).await
	}

	/// `None` only when `must_exist` is false and the first answering source has no receipt.
	pub async fn get_transaction_receipt(
		&self,
		transaction_hash: B256,
		must_exist: bool,
		call_order: Option<&CallOrder>,
	) -> Result<Option<Value>, InquirerError> {
		let query = ReceiptQuery {
			transaction_hash,
			must_exist,
			has_l1_fees: self.chain.has_l1_fees,
		};
		self.query(&query, call_order).await
	}

	pub async fn get_transaction_by_hash(
		&self,
		transaction_hash: B256,
		must_exist: bool,
		call_order: Option<&CallOrder>,
	) -> Result<Option<Value>, InquirerError> {
		let query = TransactionQuery {
			transaction_hash,
			must_exist,
		};
		self.query(&query, call_order).await
	}

	pub async fn get_logs(
		&self,
		filter: LogFilter,
		from_block: u64,
		to_block: u64,
		call_order: Option<&CallOrder>,
	) -> Result<Vec<EvmLog>, InquirerError> {
		let query = LogsQuery {
			fetcher: &self.log_fetcher,
			filter,
			from_block,
			to_block,
		};
		self.query(&query, call_order).await
	}

	pub async fn batch_call(
		&self,
		calls: &[ContractCall],
		chunk_size: usize,
		all_or_nothing: bool,
		block: BlockId,
		call_order: Option<&CallOrder>,
	) -> Result<Vec<CallResult>, InquirerError> {
		let default_order;
		let order = match call_order {
			Some(order) => order,
			None => {
				default_order = self.call_order(false);
				&default_order
			}
		};
		self.batch_caller
			.batch_call(
				&self.dispatcher,
				calls,
				chunk_size,
				all_or_nothing,
				block,
				order,
			)
			.await
	}

	pub async fn contract_creation_block(
		&self,
		address: Address,
	) -> Result<Option<u64>, InquirerError> {
		self.query(&ContractCreationQuery { address }, None).await
	}

	pub async fn block_number_by_timestamp(&self, timestamp: u64) -> Result<u64, InquirerError> {
		let order = self.call_order(false);
		self.metadata
			.block_number_by_timestamp(&self.dispatcher, timestamp, &order)
			.await
	}

	pub async fn token_metadata(
		&self,
		address: Address,
		kind: TokenKind,
		force_refresh: bool,
	) -> Result<TokenMetadata, InquirerError> {
		let order = self.call_order(false);
		self.metadata
			.token_metadata(
				&self.dispatcher,
				&self.batch_caller,
				address,
				kind,
				force_refresh,
				&order,
			)
			.await
	}

	pub async fn tokens_metadata(
		&self,
		addresses: &[Address],
		kind: TokenKind,
	) -> Result<Vec<TokenMetadata>, InquirerError> {
		let order = self.call_order(false);
		self.metadata
			.tokens_metadata(
				&self.dispatcher,
				&self.batch_caller,
				addresses,
				kind,
				&order,
			)
			.await
	}
}
