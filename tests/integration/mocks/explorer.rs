use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use mockall::mock;
use serde_json::Value;

use evm_node_inquirer::{
	models::{BlockId, EvmLog, LogFilter},
	services::blockchain::{BlockExplorer, TransportError},
};

mock! {
	pub Explorer {}

	#[async_trait]
	impl BlockExplorer for Explorer {
		fn name(&self) -> &str;
		fn page_limit(&self) -> usize;
		async fn block_number(&self) -> Result<u64, TransportError>;
		async fn get_balance(&self, address: Address) -> Result<U256, TransportError>;
		async fn get_code(&self, address: Address) -> Result<Bytes, TransportError>;
		async fn call(&self, to: Address, data: &Bytes) -> Result<Bytes, TransportError>;
		async fn get_block_by_number(
			&self,
			block: BlockId,
			full_transactions: bool,
		) -> Result<Option<Value>, TransportError>;
		async fn get_transaction_receipt(
			&self,
			transaction_hash: B256,
		) -> Result<Option<Value>, TransportError>;
		async fn get_transaction_by_hash(
			&self,
			transaction_hash: B256,
		) -> Result<Option<Value>, TransportError>;
		async fn get_logs(
			&self,
			filter: &LogFilter,
			from_block: u64,
			to_block: u64,
		) -> Result<Vec<EvmLog>, TransportError>;
		async fn contract_creation_hash(
			&self,
			address: Address,
		) -> Result<Option<B256>, TransportError>;
		async fn block_number_by_timestamp(&self, timestamp: u64) -> Result<u64, TransportError>;
	}
}

/// An explorer mock answering to `name` with the usual page limit
pub fn named_explorer(name: &str, page_limit: usize) -> MockExplorer {
	let mut explorer = MockExplorer::new();
	explorer.expect_name().return_const(name.to_string());
	explorer.expect_page_limit().return_const(page_limit);
	explorer
}
