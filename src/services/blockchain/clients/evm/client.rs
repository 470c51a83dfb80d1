//! EVM-compatible JSON-RPC client implementation.
//!
//! Thin typed layer over a [`BlockchainTransport`]: it builds the parameter arrays, extracts
//! the `result` field and decodes it. Absent data (`null` results) is reported as `None` so the
//! caller can decide whether that is an answer or a reason to try the next source.

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};
use tracing::instrument;

use crate::{
	models::{BlockId, EvmLog, LogFilter},
	services::blockchain::transports::{BlockchainTransport, TransportError},
	utils::parse_quantity,
};

/// Client for one Ethereum Virtual Machine (EVM) compatible node
#[derive(Clone)]
pub struct EvmClient {
	/// The underlying transport for RPC communication
	transport: Arc<dyn BlockchainTransport>,
}

impl EvmClient {
	/// Creates a new EVM client instance with a specific transport client
	pub fn new_with_transport(transport: Arc<dyn BlockchainTransport>) -> Self {
		Self { transport }
	}

	pub fn transport(&self) -> &Arc<dyn BlockchainTransport> {
		&self.transport
	}

	async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, TransportError> {
		let response = self.transport.send_raw_request(method, Some(params)).await?;

		// Extract the "result" field from the JSON-RPC response
		response.get("result").cloned().ok_or_else(|| {
			TransportError::response_parse(
				format!("Missing 'result' field in {} response", method),
				None,
				Some(HashMap::from([("method".to_string(), method.to_string())])),
			)
		})
	}

	async fn request_decoded<T: DeserializeOwned>(
		&self,
		method: &str,
		params: Vec<Value>,
	) -> Result<T, TransportError> {
		let result = self.request(method, params).await?;
		decode_result(method, result)
	}

	async fn request_optional(
		&self,
		method: &str,
		params: Vec<Value>,
	) -> Result<Option<Value>, TransportError> {
		let result = self.request(method, params).await?;
		Ok(if result.is_null() { None } else { Some(result) })
	}

	async fn request_quantity(
		&self,
		method: &str,
		params: Vec<Value>,
	) -> Result<u64, TransportError> {
		let result = self.request(method, params).await?;
		let parsed = match &result {
			Value::String(s) => parse_quantity(s),
			Value::Number(n) => n.as_u64().ok_or_else(|| format!("{} out of range", n)),
			other => Err(format!("expected a quantity, got {}", other)),
		};
		parsed.map_err(|e| {
			TransportError::response_parse(
				format!("Failed to parse {} result: {}", method, e),
				None,
				None,
			)
		})
	}

	/// Network id reported by the node
	#[instrument(skip(self))]
	pub async fn net_version(&self) -> Result<u64, TransportError> {
		self.request_quantity("net_version", vec![]).await
	}

	#[instrument(skip(self))]
	pub async fn block_number(&self) -> Result<u64, TransportError> {
		self.request_quantity("eth_blockNumber", vec![]).await
	}

	#[instrument(skip(self))]
	pub async fn get_balance(&self, address: Address, block: BlockId) -> Result<U256, TransportError> {
		self.request_decoded("eth_getBalance", vec![json!(address), json!(block.to_rpc())])
			.await
	}

	#[instrument(skip(self))]
	pub async fn get_code(&self, address: Address, block: BlockId) -> Result<Bytes, TransportError> {
		self.request_decoded("eth_getCode", vec![json!(address), json!(block.to_rpc())])
			.await
	}

	#[instrument(skip(self, data))]
	pub async fn call(
		&self,
		to: Address,
		data: &Bytes,
		block: BlockId,
	) -> Result<Bytes, TransportError> {
		self.request_decoded(
			"eth_call",
			vec![json!({ "to": to, "data": data }), json!(block.to_rpc())],
		)
		.await
	}

	/// Raw block object, `None` when the node does not know the block
	#[instrument(skip(self))]
	pub async fn get_block_by_number(
		&self,
		block: BlockId,
		full_transactions: bool,
	) -> Result<Option<Value>, TransportError> {
		self.request_optional(
			"eth_getBlockByNumber",
			vec![json!(block.to_rpc()), json!(full_transactions)],
		)
		.await
	}

	#[instrument(skip(self, filter), fields(from_block, to_block))]
	pub async fn get_logs(
		&self,
		filter: &LogFilter,
		from_block: u64,
		to_block: u64,
	) -> Result<Vec<EvmLog>, TransportError> {
		let result = self
			.request("eth_getLogs", filter.to_rpc_params(from_block, to_block))
			.await?;
		if result.is_null() {
			return Ok(Vec::new());
		}
		decode_result("eth_getLogs", result)
	}

	#[instrument(skip(self))]
	pub async fn get_transaction_receipt(
		&self,
		transaction_hash: B256,
	) -> Result<Option<Value>, TransportError> {
		self.request_optional("eth_getTransactionReceipt", vec![json!(transaction_hash)])
			.await
	}

	#[instrument(skip(self))]
	pub async fn get_transaction_by_hash(
		&self,
		transaction_hash: B256,
	) -> Result<Option<Value>, TransportError> {
		self.request_optional("eth_getTransactionByHash", vec![json!(transaction_hash)])
			.await
	}
}

fn decode_result<T: DeserializeOwned>(method: &str, result: Value) -> Result<T, TransportError> {
	serde_json::from_value(result).map_err(|e| {
		TransportError::response_parse(
			format!("Failed to parse {} result", method),
			Some(Box::new(e)),
			None,
		)
	})
}
