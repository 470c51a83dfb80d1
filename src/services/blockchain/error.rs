//! Errors visible to callers of the inquirer.
//!
//! Per-source failures never escape the dispatcher on their own. A caller sees a result or
//! exactly one of the variants below.

use crate::utils::logging::error::{ErrorContext, TraceableError};
use std::collections::HashMap;
use thiserror::Error as ThisError;
use uuid::Uuid;

type BoxedSource = Option<Box<dyn std::error::Error + Send + Sync + 'static>>;

#[derive(ThisError, Debug)]
pub enum InquirerError {
	/// The request itself is malformed; no source can answer it
	#[error("Invalid request: {0}")]
	RequestInvalid(ErrorContext),

	/// Every source that answered reported the entity as missing
	#[error("Data unavailable: {0}")]
	DataUnavailable(ErrorContext),

	/// Every candidate in the call order failed
	#[error("All sources exhausted: {context}")]
	ExhaustedSources {
		attempted: Vec<String>,
		context: ErrorContext,
	},

	/// A response arrived but could not be interpreted
	#[error("Decode failure: {0}")]
	DecodeFailure(ErrorContext),

	/// Setup time failures such as configuration or client construction
	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl InquirerError {
	pub fn request_invalid(
		msg: impl Into<String>,
		source: BoxedSource,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::RequestInvalid(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn data_unavailable(
		msg: impl Into<String>,
		source: BoxedSource,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::DataUnavailable(ErrorContext::new_with_log(msg, source, metadata))
	}

	/// Aggregates a failed call order. `request` describes the original parameters.
	pub fn exhausted_sources(
		attempted: Vec<String>,
		request: impl Into<String>,
		last_failure: BoxedSource,
	) -> Self {
		let request = request.into();
		let msg = format!(
			"{} failed against {} source(s)",
			request,
			attempted.len()
		);
		let metadata = HashMap::from([
			("attempted".to_string(), attempted.join(",")),
			("request".to_string(), request),
		]);
		Self::ExhaustedSources {
			attempted,
			context: ErrorContext::new_with_log(msg, last_failure, Some(metadata)),
		}
	}

	pub fn decode_failure(
		msg: impl Into<String>,
		source: BoxedSource,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::DecodeFailure(ErrorContext::new_with_log(msg, source, metadata))
	}

	/// Names of the sources tried before giving up
	pub fn attempted_sources(&self) -> &[String] {
		match self {
			Self::ExhaustedSources { attempted, .. } => attempted,
			_ => &[],
		}
	}
}

impl TraceableError for InquirerError {
	fn trace_id(&self) -> String {
		match self {
			Self::RequestInvalid(ctx) | Self::DataUnavailable(ctx) | Self::DecodeFailure(ctx) => {
				ctx.trace_id.clone()
			}
			Self::ExhaustedSources { context, .. } => context.trace_id.clone(),
			Self::Other(_) => Uuid::new_v4().to_string(),
		}
	}
}
