//! Error types for blockchain transport services
//!
//! One `TransportError` describes one failed exchange with one source. The dispatcher
//! classifies it and decides whether to skip the source, mark it dead or abort.

use crate::utils::logging::error::{ErrorContext, TraceableError};
use std::collections::HashMap;
use thiserror::Error;

type BoxedSource = Option<Box<dyn std::error::Error + Send + Sync + 'static>>;

#[derive(Debug, Error)]
pub enum TransportError {
	/// Non-success HTTP status
	#[error("HTTP error: status {status_code} for URL {url}")]
	Http {
		status_code: reqwest::StatusCode,
		url: String,
		body: String,
		context: ErrorContext,
	},

	/// Connection level failure
	#[error("Network error: {0}")]
	Network(ErrorContext),

	/// The request did not complete within the configured timeout
	#[error("Request timed out: {0}")]
	Timeout(ErrorContext),

	/// JSON-RPC `error` object or explorer error message
	#[error("RPC error {code}: {message}")]
	Rpc {
		code: i64,
		message: String,
		context: ErrorContext,
	},

	/// The source rejected the request itself (e.g. a malformed address)
	#[error("Invalid request: {0}")]
	InvalidRequest(ErrorContext),

	/// The source kept rate limiting after all backoff attempts
	#[error("Rate limited: {0}")]
	RateLimited(ErrorContext),

	/// JSON parsing error
	#[error("Failed to parse JSON response: {0}")]
	ResponseParse(ErrorContext),

	/// Request body serialization error
	#[error("Failed to serialize request JSON: {0}")]
	RequestSerialization(ErrorContext),
}

impl TransportError {
	pub fn http(
		status_code: reqwest::StatusCode,
		url: String,
		body: String,
		source: BoxedSource,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		let msg = format!("HTTP error: status {} for URL {}", status_code, url);

		Self::Http {
			status_code,
			url,
			body,
			context: ErrorContext::new(msg, source, metadata),
		}
	}

	pub fn network(
		msg: impl Into<String>,
		source: BoxedSource,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::Network(ErrorContext::new(msg, source, metadata))
	}

	pub fn timeout(
		msg: impl Into<String>,
		source: BoxedSource,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::Timeout(ErrorContext::new(msg, source, metadata))
	}

	pub fn rpc(
		code: i64,
		message: impl Into<String>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		let message = message.into();
		Self::Rpc {
			code,
			context: ErrorContext::new(message.clone(), None, metadata),
			message,
		}
	}

	pub fn invalid_request(
		msg: impl Into<String>,
		source: BoxedSource,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::InvalidRequest(ErrorContext::new(msg, source, metadata))
	}

	pub fn rate_limited(
		msg: impl Into<String>,
		source: BoxedSource,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::RateLimited(ErrorContext::new(msg, source, metadata))
	}

	pub fn response_parse(
		msg: impl Into<String>,
		source: BoxedSource,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::ResponseParse(ErrorContext::new(msg, source, metadata))
	}

	pub fn request_serialization(
		msg: impl Into<String>,
		source: BoxedSource,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::RequestSerialization(ErrorContext::new(msg, source, metadata))
	}

	/// Text the provider sent back, used to recognise provider specific failure signatures
	pub fn provider_message(&self) -> String {
		match self {
			Self::Http { body, .. } => body.clone(),
			Self::Rpc { message, .. } => message.clone(),
			Self::Network(ctx)
			| Self::Timeout(ctx)
			| Self::InvalidRequest(ctx)
			| Self::RateLimited(ctx)
			| Self::ResponseParse(ctx)
			| Self::RequestSerialization(ctx) => ctx.message.clone(),
		}
	}
}

impl TraceableError for TransportError {
	fn trace_id(&self) -> String {
		match self {
			Self::Http { context, .. } | Self::Rpc { context, .. } => context.trace_id.clone(),
			Self::Network(ctx)
			| Self::Timeout(ctx)
			| Self::InvalidRequest(ctx)
			| Self::RateLimited(ctx)
			| Self::ResponseParse(ctx)
			| Self::RequestSerialization(ctx) => ctx.trace_id.clone(),
		}
	}
}
