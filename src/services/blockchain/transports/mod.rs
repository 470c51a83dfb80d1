//! Network transport implementations for blockchain clients.
//!
//! A transport talks to exactly one endpoint. Failover between sources is the dispatcher's
//! job, so transports only retry transient HTTP failures and report everything else.
//!
//! - [`BlockchainTransport`]: send one JSON-RPC request
//! - [`TransportConnector`]: open a transport for a configured source

mod error;
mod http;

pub use error::TransportError;
pub use http::{HttpTransportClient, HttpTransportConnector};

use async_trait::async_trait;
use reqwest_retry::{
	default_on_request_failure, default_on_request_success, Retryable, RetryableStrategy,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::models::NodeDescriptor;

/// Base trait for all blockchain transport clients
#[async_trait]
pub trait BlockchainTransport: Send + Sync {
	/// Get the URL used by the transport
	async fn get_current_url(&self) -> String;

	/// Send a raw JSON-RPC request and return the full response envelope
	async fn send_raw_request(
		&self,
		method: &str,
		params: Option<Vec<Value>>,
	) -> Result<Value, TransportError>;

	/// Builds the JSON-RPC 2.0 request body
	fn customize_request(&self, method: &str, params: Option<Vec<Value>>) -> Value {
		json!({
			"jsonrpc": "2.0",
			"id": 1,
			"method": method,
			"params": params.unwrap_or_default()
		})
	}
}

/// Opens transports for sources on demand
#[async_trait]
pub trait TransportConnector: Send + Sync {
	async fn connect(
		&self,
		node: &NodeDescriptor,
	) -> Result<Arc<dyn BlockchainTransport>, TransportError>;
}

/// Retries transient HTTP failures but never a timeout or an HTTP 429.
///
/// A timed out source is abandoned for the rest of the process by the dispatcher, so retrying
/// it here would only multiply the wait. Rate limits are left to the caller: the explorer
/// client backs off on its own budget and the dispatcher moves on from a throttled node.
pub struct TransientErrorRetryStrategy;

impl RetryableStrategy for TransientErrorRetryStrategy {
	fn handle(
		&self,
		res: &Result<reqwest::Response, reqwest_middleware::Error>,
	) -> Option<Retryable> {
		match res {
			Ok(response) if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
				Some(Retryable::Fatal)
			}
			Ok(success) => default_on_request_success(success),
			Err(reqwest_middleware::Error::Reqwest(error)) if error.is_timeout() => {
				Some(Retryable::Fatal)
			}
			Err(error) => default_on_request_failure(error),
		}
	}
}
