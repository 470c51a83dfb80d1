//! Query dispatch across a call order.
//!
//! Every read goes through [`Dispatcher::query`]. Candidates are tried strictly one after the
//! other in call order; the first success is returned and nothing after it is invoked.
//! Per-source failures never reach the caller on their own. Either a request is invalid and the
//! walk stops at once, or every candidate failed and the failures are folded into one error.

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::services::blockchain::{
	catalog::CallOrder,
	classify::{classify_failure, Disposition, FailureKind},
	clients::BlockExplorer,
	connection::{ConnectionAttempt, ConnectionManager},
	error::InquirerError,
	request::NodeQuery,
};

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Runs typed requests against the sources of one chain
pub struct Dispatcher {
	connections: Arc<ConnectionManager>,
	explorer: Option<Arc<dyn BlockExplorer>>,
}

impl Dispatcher {
	pub fn new(
		connections: Arc<ConnectionManager>,
		explorer: Option<Arc<dyn BlockExplorer>>,
	) -> Self {
		Self {
			connections,
			explorer,
		}
	}

	pub fn connections(&self) -> &Arc<ConnectionManager> {
		&self.connections
	}

	pub fn explorer(&self) -> Option<&Arc<dyn BlockExplorer>> {
		self.explorer.as_ref()
	}

	/// Returns the first successful answer to `query` along `call_order`.
	///
	/// # Errors
	/// - [`InquirerError::RequestInvalid`] as soon as a source rejects the request itself
	/// - [`InquirerError::DataUnavailable`] when every source reported the entity missing
	/// - [`InquirerError::DecodeFailure`] when every source answered with an unusable shape
	/// - [`InquirerError::ExhaustedSources`] otherwise
	#[instrument(skip_all, fields(request = %query.describe()))]
	pub async fn query<Q: NodeQuery>(
		&self,
		query: &Q,
		call_order: &CallOrder,
	) -> Result<Q::Output, InquirerError> {
		let mut attempted: Vec<String> = Vec::new();
		let mut failures: Vec<FailureKind> = Vec::new();
		let mut last_failure: Option<BoxedError> = None;

		for candidate in call_order.iter() {
			let node = &candidate.node;

			let outcome = if node.is_explorer() {
				let Some(explorer) = &self.explorer else {
					debug!("No explorer client for {}, skipping", node.name);
					continue;
				};
				debug!("Querying explorer {}", node.name);
				attempted.push(node.name.clone());
				query.on_explorer(explorer.as_ref()).await
			} else {
				if self.connections.is_dead(&node.name).await {
					debug!("Skipping dead node {}", node.name);
					continue;
				}

				let live = match self.connections.attempt_connect(node).await {
					ConnectionAttempt::Connected { node: live, .. } => live,
					ConnectionAttempt::Failed { reason, .. } => {
						attempted.push(node.name.clone());
						failures.push(FailureKind::Transport);
						last_failure = Some(Box::new(reason));
						continue;
					}
				};

				if query.needs_unpruned() && live.is_pruned {
					debug!("Skipping pruned node {}", node.name);
					continue;
				}
				if query.needs_archive() && !live.is_archive {
					debug!("Skipping non-archive node {}", node.name);
					continue;
				}

				debug!("Querying node {}", node.name);
				attempted.push(node.name.clone());
				query.on_node(&live).await
			};

			let error = match outcome {
				Ok(output) => return Ok(output),
				Err(error) => error,
			};

			match classify_failure(&error) {
				Disposition::Fatal => {
					return Err(InquirerError::request_invalid(
						format!("{} rejected by {}", query.describe(), node.name),
						Some(Box::new(error)),
						None,
					));
				}
				Disposition::Skip { mark_dead, kind } => {
					if mark_dead && !node.is_explorer() {
						warn!("Marking {} dead after: {}", node.name, error);
						self.connections.mark_dead(&node.name).await;
					} else {
						warn!("{} failed on {}: {}", query.describe(), node.name, error);
					}
					failures.push(kind);
					last_failure = Some(Box::new(error));
				}
			}
		}

		Err(fold_exhaustion(
			query.describe(),
			attempted,
			&failures,
			last_failure,
		))
	}
}

/// Turns the failures of a fully walked call order into the single caller-visible error.
fn fold_exhaustion(
	request: String,
	attempted: Vec<String>,
	failures: &[FailureKind],
	last_failure: Option<BoxedError>,
) -> InquirerError {
	let relevant: Vec<FailureKind> = failures
		.iter()
		.copied()
		.filter(|kind| *kind != FailureKind::Unsupported)
		.collect();

	if !relevant.is_empty() && relevant.iter().all(|kind| *kind == FailureKind::NotFound) {
		return InquirerError::data_unavailable(
			format!(
				"{} not available from any of {} source(s)",
				request,
				attempted.len()
			),
			last_failure,
			None,
		);
	}
	if !relevant.is_empty() && relevant.iter().all(|kind| *kind == FailureKind::Decode) {
		return InquirerError::decode_failure(
			format!("No source returned a decodable answer to {}", request),
			last_failure,
			None,
		);
	}
	InquirerError::exhausted_sources(attempted, request, last_failure)
}
