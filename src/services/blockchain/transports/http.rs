//! HTTP transport implementation for JSON-RPC nodes.

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::Value;
use std::{collections::HashMap, sync::Arc, time::Duration};
use url::Url;

use crate::{
	models::NodeDescriptor,
	services::blockchain::transports::{
		BlockchainTransport, TransientErrorRetryStrategy, TransportConnector, TransportError,
	},
	utils::http::{create_base_http_client, create_retryable_http_client, RetryConfig},
};

/// JSON-RPC over HTTP against a single endpoint
#[derive(Clone, Debug)]
pub struct HttpTransportClient {
	/// Retryable HTTP client for making requests
	pub client: ClientWithMiddleware,
	url: Url,
}

impl HttpTransportClient {
	/// Creates a transport for `endpoint`. No request is sent until the first call.
	pub fn new(endpoint: &str, timeout: Duration, retry: &RetryConfig) -> Result<Self, TransportError> {
		let url = Url::parse(endpoint).map_err(|e| {
			TransportError::network(
				format!("Invalid endpoint URL '{}'", endpoint),
				Some(Box::new(e)),
				None,
			)
		})?;

		let base_client = create_base_http_client(timeout).map_err(|e| {
			TransportError::network("Failed to create base HTTP client", Some(Box::new(e)), None)
		})?;

		Ok(Self {
			client: create_retryable_http_client(
				retry,
				base_client,
				Some(TransientErrorRetryStrategy),
			),
			url,
		})
	}

	fn request_metadata(&self, method: &str) -> Option<HashMap<String, String>> {
		Some(HashMap::from([
			("url".to_string(), self.url.to_string()),
			("method".to_string(), method.to_string()),
		]))
	}

	fn map_send_error(&self, method: &str, error: reqwest_middleware::Error) -> TransportError {
		let timed_out = match &error {
			reqwest_middleware::Error::Reqwest(e) => e.is_timeout(),
			reqwest_middleware::Error::Middleware(_) => false,
		};
		if timed_out {
			TransportError::timeout(
				format!("{} timed out", method),
				Some(Box::new(error)),
				self.request_metadata(method),
			)
		} else {
			TransportError::network(
				error.to_string(),
				Some(Box::new(error)),
				self.request_metadata(method),
			)
		}
	}
}

#[async_trait]
impl BlockchainTransport for HttpTransportClient {
	async fn get_current_url(&self) -> String {
		self.url.to_string()
	}

	/// Sends a JSON-RPC request.
	///
	/// A JSON-RPC `error` object in a 200 response becomes [`TransportError::Rpc`] so callers
	/// can inspect the provider message.
	async fn send_raw_request(
		&self,
		method: &str,
		params: Option<Vec<Value>>,
	) -> Result<Value, TransportError> {
		let request_body = self.customize_request(method, params);

		let response = self
			.client
			.post(self.url.clone())
			.json(&request_body)
			.send()
			.await
			.map_err(|e| self.map_send_error(method, e))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			tracing::debug!("Request to {} failed with status {}: {}", self.url, status, body);
			return Err(TransportError::http(
				status,
				self.url.to_string(),
				body,
				None,
				self.request_metadata(method),
			));
		}

		let body: Value = response.json().await.map_err(|e| {
			if e.is_timeout() {
				TransportError::timeout(
					format!("{} timed out while reading the response", method),
					Some(Box::new(e)),
					self.request_metadata(method),
				)
			} else {
				TransportError::response_parse(
					"Failed to parse JSON response",
					Some(Box::new(e)),
					self.request_metadata(method),
				)
			}
		})?;

		if let Some(error) = body.get("error").filter(|error| !error.is_null()) {
			let code = error.get("code").and_then(Value::as_i64).unwrap_or(-32000);
			let message = error
				.get("message")
				.and_then(Value::as_str)
				.map(str::to_string)
				.unwrap_or_else(|| error.to_string());
			return Err(TransportError::rpc(
				code,
				message,
				self.request_metadata(method),
			));
		}

		Ok(body)
	}
}

/// Opens [`HttpTransportClient`]s with a shared timeout and retry policy
#[derive(Clone, Debug)]
pub struct HttpTransportConnector {
	timeout: Duration,
	retry: RetryConfig,
}

impl HttpTransportConnector {
	pub fn new(timeout: Duration, retry: RetryConfig) -> Self {
		Self { timeout, retry }
	}
}

#[async_trait]
impl TransportConnector for HttpTransportConnector {
	async fn connect(
		&self,
		node: &NodeDescriptor,
	) -> Result<Arc<dyn BlockchainTransport>, TransportError> {
		let transport = HttpTransportClient::new(&node.endpoint, self.timeout, &self.retry)?;
		Ok(Arc::new(transport))
	}
}
