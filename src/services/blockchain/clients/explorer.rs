//! Etherscan compatible block explorer client.
//!
//! The explorer is the last source in every call order. It answers the same questions as a node
//! through the `proxy` module, plus a few only an indexer can answer (contract creation, block
//! by timestamp). Log pages are capped at [`BlockExplorer::page_limit`] rows; continuing past a
//! full page is the log fetcher's job.
//!
//! Rate limit responses are retried with exponential backoff. Only once the retries are spent
//! does the caller see [`TransportError::RateLimited`].

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest_middleware::ClientWithMiddleware;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{collections::HashMap, str::FromStr, time::Duration};
use tracing::instrument;
use url::Url;

use crate::{
	models::{BlockId, EvmLog, ExplorerConfig, LogFilter},
	services::blockchain::transports::{TransientErrorRetryStrategy, TransportError},
	utils::{
		create_base_http_client, create_retryable_http_client, parse_quantity, JitterSetting,
		RetryConfig,
	},
};

/// Queries an indexer can answer for the dispatcher
#[async_trait]
pub trait BlockExplorer: Send + Sync {
	fn name(&self) -> &str;

	/// Rows returned by a full log page
	fn page_limit(&self) -> usize;

	async fn block_number(&self) -> Result<u64, TransportError>;

	/// Balance at the latest block; explorers cannot answer historical balances
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

	/// One page of logs for a single address, oldest first
	async fn get_logs(
		&self,
		filter: &LogFilter,
		from_block: u64,
		to_block: u64,
	) -> Result<Vec<EvmLog>, TransportError>;

	/// Hash of the transaction that deployed `address`, `None` if it is not a contract
	async fn contract_creation_hash(&self, address: Address) -> Result<Option<B256>, TransportError>;

	/// Last block mined at or before `timestamp`
	async fn block_number_by_timestamp(&self, timestamp: u64) -> Result<u64, TransportError>;
}

/// Client for Etherscan style `?module=..&action=..` APIs
pub struct EtherscanLikeClient {
	name: String,
	base_url: Url,
	chain_id: u64,
	api_key: Option<String>,
	page_limit: usize,
	max_rate_limit_retries: usize,
	retry_policy: RetryConfig,
	client: ClientWithMiddleware,
}

impl EtherscanLikeClient {
	/// Creates a new explorer client
	///
	/// # Arguments
	/// * `config` - Explorer section of the chain configuration
	/// * `chain_id` - Sent with every request so one API host can serve many chains
	/// * `api_key` - Optional API key, already resolved from the environment
	/// * `timeout` - Per-request timeout
	/// * `retry_policy` - Backoff bounds used for HTTP retries and rate limit retries
	pub fn new(
		config: &ExplorerConfig,
		chain_id: u64,
		api_key: Option<String>,
		timeout: Duration,
		retry_policy: RetryConfig,
	) -> Result<Self, TransportError> {
		let base_url = Url::parse(&config.url).map_err(|e| {
			TransportError::network(
				format!("Invalid explorer URL '{}'", config.url),
				Some(Box::new(e)),
				None,
			)
		})?;
		let base_client = create_base_http_client(timeout).map_err(|e| {
			TransportError::network("Failed to create base HTTP client", Some(Box::new(e)), None)
		})?;

		Ok(Self {
			name: config.name.clone(),
			base_url,
			chain_id,
			api_key,
			page_limit: config.page_limit,
			max_rate_limit_retries: config.max_rate_limit_retries,
			client: create_retryable_http_client(
				&retry_policy,
				base_client,
				Some(TransientErrorRetryStrategy),
			),
			retry_policy,
		})
	}

	fn request_metadata(&self, module: &str, action: &str) -> Option<HashMap<String, String>> {
		Some(HashMap::from([
			("explorer".to_string(), self.name.clone()),
			("module".to_string(), module.to_string()),
			("action".to_string(), action.to_string()),
		]))
	}

	/// Runs one explorer query, backing off while the explorer reports a rate limit.
	///
	/// Returns `None` when the explorer answered without a result.
	async fn query(
		&self,
		module: &str,
		action: &str,
		options: &[(&str, String)],
	) -> Result<Option<Value>, TransportError> {
		let operation = || async { self.query_once(module, action, options).await };

		let backoff = ExponentialBuilder::default()
			.with_min_delay(self.retry_policy.initial_backoff)
			.with_max_delay(self.retry_policy.max_backoff)
			.with_max_times(self.max_rate_limit_retries);

		let backoff_with_jitter = match self.retry_policy.jitter {
			JitterSetting::Full => backoff.with_jitter(),
			JitterSetting::None => backoff,
		};

		operation
			.retry(backoff_with_jitter)
			.when(|e: &TransportError| matches!(e, TransportError::RateLimited(_)))
			.notify(|_, delay| {
				tracing::debug!(
					"{} rate limited {}/{}, backing off for {:?}",
					self.name,
					module,
					action,
					delay
				);
			})
			.await
	}

	async fn query_once(
		&self,
		module: &str,
		action: &str,
		options: &[(&str, String)],
	) -> Result<Option<Value>, TransportError> {
		let mut params: Vec<(&str, String)> = vec![
			("chainid", self.chain_id.to_string()),
			("module", module.to_string()),
			("action", action.to_string()),
		];
		params.extend(options.iter().cloned());
		if let Some(api_key) = &self.api_key {
			params.push(("apikey", api_key.clone()));
		}

		tracing::debug!("Querying {} {}/{}", self.name, module, action);
		let response = self
			.client
			.get(self.base_url.clone())
			.query(&params)
			.send()
			.await
			.map_err(|e| {
				let timed_out = matches!(&e, reqwest_middleware::Error::Reqwest(inner) if inner.is_timeout());
				if timed_out {
					TransportError::timeout(
						format!("{} {} timed out", self.name, action),
						Some(Box::new(e)),
						self.request_metadata(module, action),
					)
				} else {
					TransportError::network(
						e.to_string(),
						Some(Box::new(e)),
						self.request_metadata(module, action),
					)
				}
			})?;

		let status = response.status();
		if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
			return Err(TransportError::rate_limited(
				format!("{} returned HTTP 429", self.name),
				None,
				self.request_metadata(module, action),
			));
		}
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(TransportError::http(
				status,
				self.base_url.to_string(),
				body,
				None,
				self.request_metadata(module, action),
			));
		}

		let json_ret: Value = response.json().await.map_err(|e| {
			TransportError::response_parse(
				format!("{} returned invalid JSON", self.name),
				Some(Box::new(e)),
				self.request_metadata(module, action),
			)
		})?;

		self.interpret_response(module, action, json_ret)
	}

	fn interpret_response(
		&self,
		module: &str,
		action: &str,
		json_ret: Value,
	) -> Result<Option<Value>, TransportError> {
		if let Some(error) = json_ret.get("error").filter(|error| !error.is_null()) {
			let code = error.get("code").and_then(Value::as_i64).unwrap_or(-32000);
			let message = error
				.get("message")
				.and_then(Value::as_str)
				.map(str::to_string)
				.unwrap_or_else(|| error.to_string());
			return Err(TransportError::rpc(
				code,
				message,
				self.request_metadata(module, action),
			));
		}

		let result = json_ret.get("result").cloned().unwrap_or(Value::Null);

		// successful proxy calls do not include a status
		let status = match json_ret.get("status") {
			Some(Value::String(s)) => s.parse::<i64>().unwrap_or(1),
			Some(Value::Number(n)) => n.as_i64().unwrap_or(1),
			_ => 1,
		};

		if status == 0 {
			let message = json_ret
				.get("message")
				.and_then(Value::as_str)
				.unwrap_or_default();
			let result_text = result.as_str().unwrap_or_default();

			if result_text.to_lowercase().contains("rate limit reached") {
				return Err(TransportError::rate_limited(
					format!("{}: {}", self.name, result_text),
					None,
					self.request_metadata(module, action),
				));
			}
			if message == "No records found" || message == "No transactions found" {
				return Ok(Some(Value::Array(Vec::new())));
			}
			if result_text.contains("Invalid address format") {
				return Err(TransportError::invalid_request(
					format!("{}: {}", self.name, result_text),
					None,
					self.request_metadata(module, action),
				));
			}
			return Err(TransportError::rpc(
				0,
				format!("{}: {}", message, result_text),
				self.request_metadata(module, action),
			));
		}

		Ok(if result.is_null() { None } else { Some(result) })
	}

	async fn query_required(
		&self,
		module: &str,
		action: &str,
		options: &[(&str, String)],
	) -> Result<Value, TransportError> {
		self.query(module, action, options).await?.ok_or_else(|| {
			TransportError::response_parse(
				format!("{} response to {} is missing a result", self.name, action),
				None,
				self.request_metadata(module, action),
			)
		})
	}

	async fn proxy_decoded<T: DeserializeOwned>(
		&self,
		action: &str,
		options: &[(&str, String)],
	) -> Result<T, TransportError> {
		let result = self.query_required("proxy", action, options).await?;
		serde_json::from_value(result).map_err(|e| {
			TransportError::response_parse(
				format!("Failed to parse {} {} result", self.name, action),
				Some(Box::new(e)),
				self.request_metadata("proxy", action),
			)
		})
	}

	fn parse_number(&self, action: &str, value: &Value) -> Result<u64, TransportError> {
		let parsed = match value {
			Value::String(s) => parse_quantity(s),
			Value::Number(n) => n.as_u64().ok_or_else(|| format!("{} out of range", n)),
			other => Err(format!("expected a number, got {}", other)),
		};
		parsed.map_err(|e| {
			TransportError::response_parse(
				format!("Could not read {} {} result: {}", self.name, action, e),
				None,
				None,
			)
		})
	}
}

#[async_trait]
impl BlockExplorer for EtherscanLikeClient {
	fn name(&self) -> &str {
		&self.name
	}

	fn page_limit(&self) -> usize {
		self.page_limit
	}

	#[instrument(skip(self), fields(explorer = %self.name))]
	async fn block_number(&self) -> Result<u64, TransportError> {
		let result = self.query_required("proxy", "eth_blockNumber", &[]).await?;
		self.parse_number("eth_blockNumber", &result)
	}

	#[instrument(skip(self), fields(explorer = %self.name))]
	async fn get_balance(&self, address: Address) -> Result<U256, TransportError> {
		let result = self
			.query_required(
				"account",
				"balance",
				&[("address", address.to_string()), ("tag", "latest".to_string())],
			)
			.await?;
		let text = result.as_str().unwrap_or_default();
		U256::from_str(text).map_err(|e| {
			TransportError::response_parse(
				format!("Could not read {} balance '{}'", self.name, text),
				Some(Box::new(e)),
				None,
			)
		})
	}

	#[instrument(skip(self), fields(explorer = %self.name))]
	async fn get_code(&self, address: Address) -> Result<Bytes, TransportError> {
		self.proxy_decoded(
			"eth_getCode",
			&[("address", address.to_string()), ("tag", "latest".to_string())],
		)
		.await
	}

	#[instrument(skip(self, data), fields(explorer = %self.name))]
	async fn call(&self, to: Address, data: &Bytes) -> Result<Bytes, TransportError> {
		self.proxy_decoded(
			"eth_call",
			&[
				("to", to.to_string()),
				("data", data.to_string()),
				("tag", "latest".to_string()),
			],
		)
		.await
	}

	#[instrument(skip(self), fields(explorer = %self.name))]
	async fn get_block_by_number(
		&self,
		block: BlockId,
		full_transactions: bool,
	) -> Result<Option<Value>, TransportError> {
		self.query(
			"proxy",
			"eth_getBlockByNumber",
			&[
				("tag", block.to_rpc()),
				("boolean", full_transactions.to_string()),
			],
		)
		.await
	}

	#[instrument(skip(self), fields(explorer = %self.name))]
	async fn get_transaction_receipt(
		&self,
		transaction_hash: B256,
	) -> Result<Option<Value>, TransportError> {
		self.query(
			"proxy",
			"eth_getTransactionReceipt",
			&[("txhash", transaction_hash.to_string())],
		)
		.await
	}

	#[instrument(skip(self), fields(explorer = %self.name))]
	async fn get_transaction_by_hash(
		&self,
		transaction_hash: B256,
	) -> Result<Option<Value>, TransportError> {
		self.query(
			"proxy",
			"eth_getTransactionByHash",
			&[("txhash", transaction_hash.to_string())],
		)
		.await
	}

	#[instrument(skip(self, filter), fields(explorer = %self.name, from_block, to_block))]
	async fn get_logs(
		&self,
		filter: &LogFilter,
		from_block: u64,
		to_block: u64,
	) -> Result<Vec<EvmLog>, TransportError> {
		let options = logs_options(filter, from_block, to_block, self.page_limit);
		let result = self.query("logs", "getLogs", &options).await?;
		match result {
			None => Ok(Vec::new()),
			Some(value) => serde_json::from_value(value).map_err(|e| {
				TransportError::response_parse(
					format!("Failed to parse {} logs", self.name),
					Some(Box::new(e)),
					self.request_metadata("logs", "getLogs"),
				)
			}),
		}
	}

	#[instrument(skip(self), fields(explorer = %self.name))]
	async fn contract_creation_hash(&self, address: Address) -> Result<Option<B256>, TransportError> {
		let result = self
			.query(
				"contract",
				"getcontractcreation",
				&[("contractaddresses", address.to_string())],
			)
			.await?;

		let tx_hash = result
			.as_ref()
			.and_then(|entries| entries.get(0))
			.and_then(|entry| entry.get("txHash"))
			.and_then(Value::as_str);

		match tx_hash {
			None => Ok(None),
			Some(hash) => B256::from_str(hash).map(Some).map_err(|e| {
				TransportError::response_parse(
					format!("Invalid contract creation hash '{}'", hash),
					Some(Box::new(e)),
					None,
				)
			}),
		}
	}

	#[instrument(skip(self), fields(explorer = %self.name))]
	async fn block_number_by_timestamp(&self, timestamp: u64) -> Result<u64, TransportError> {
		let result = self
			.query_required(
				"block",
				"getblocknobytime",
				&[
					("timestamp", timestamp.to_string()),
					("closest", "before".to_string()),
				],
			)
			.await;

		match result {
			Ok(value) => self.parse_number("getblocknobytime", &value),
			// Timestamps before the first indexed block have no closest block before them
			Err(TransportError::Rpc { message, .. }) if message.contains("No closest block found") => {
				Ok(0)
			}
			Err(e) => Err(e),
		}
	}
}

/// Query options for one `logs/getLogs` page.
///
/// Explorers filter on one address at most; the first address of the filter is used.
fn logs_options(
	filter: &LogFilter,
	from_block: u64,
	to_block: u64,
	page_limit: usize,
) -> Vec<(&'static str, String)> {
	const TOPIC_KEYS: [&str; 4] = ["topic0", "topic1", "topic2", "topic3"];
	const OPERATOR_KEYS: [&str; 3] = ["topic0_1_opr", "topic1_2_opr", "topic2_3_opr"];

	let mut options = vec![
		("fromBlock", from_block.to_string()),
		("toBlock", to_block.to_string()),
		("page", "1".to_string()),
		("offset", page_limit.to_string()),
	];
	if let Some(address) = filter.addresses.first() {
		options.push(("address", address.to_string()));
	}
	for (index, topic) in filter.topics.iter().take(TOPIC_KEYS.len()).enumerate() {
		if let Some(topic) = topic {
			options.push((TOPIC_KEYS[index], topic.to_string()));
		}
	}
	for (index, pair) in filter.topics.windows(2).take(OPERATOR_KEYS.len()).enumerate() {
		if pair[0].is_some() && pair[1].is_some() {
			options.push((OPERATOR_KEYS[index], "and".to_string()));
		}
	}
	options
}
