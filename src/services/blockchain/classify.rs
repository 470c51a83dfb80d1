//! Failure classification.
//!
//! Providers report the same conditions with different texts. All the message matching lives
//! here so the dispatcher and the log fetcher only deal with small enums:
//!
//! - [`classify_failure`]: what the dispatcher does after a source failed a request
//! - [`log_range_adjustment`]: the smaller block range to retry an `eth_getLogs` window with
//! - [`capability_override`]: sources whose capability probes cannot be trusted

use lazy_static::lazy_static;
use regex::Regex;

use crate::services::blockchain::{request::QueryError, transports::TransportError};

/// Category of a skipped source, used to fold the final error when every source failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
	Transport,
	NotFound,
	Decode,
	Unsupported,
}

/// What the dispatcher does with a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
	/// Advance to the next candidate
	Skip { mark_dead: bool, kind: FailureKind },
	/// Abort the whole call order
	Fatal,
}

pub fn classify_failure(error: &QueryError) -> Disposition {
	match error {
		QueryError::Invalid(_) | QueryError::Transport(TransportError::InvalidRequest(_)) => {
			Disposition::Fatal
		}
		QueryError::Transport(TransportError::Timeout(_)) => Disposition::Skip {
			mark_dead: true,
			kind: FailureKind::Transport,
		},
		QueryError::Transport(_) => Disposition::Skip {
			mark_dead: false,
			kind: FailureKind::Transport,
		},
		QueryError::NotFound(_) => Disposition::Skip {
			mark_dead: false,
			kind: FailureKind::NotFound,
		},
		QueryError::Decode(_) => Disposition::Skip {
			mark_dead: false,
			kind: FailureKind::Decode,
		},
		QueryError::Unsupported(_) => Disposition::Skip {
			mark_dead: false,
			kind: FailureKind::Unsupported,
		},
	}
}

lazy_static! {
	static ref MAX_BLOCK_RANGE: Regex =
		Regex::new(r"(?i)exceed(?:s|ed)? maximum block range:?\s*(\d+)").unwrap();
	static ref LIMITED_RANGE: Regex =
		Regex::new(r"(?i)limited to a (\d+)\s*(?:block )?range").unwrap();
}

/// Messages meaning "ask for fewer blocks" without saying how many
const HALVING_SIGNATURES: &[&str] = &[
	"query returned more than 10000 results",
	"query timeout exceeded",
	"block range is too large",
	"block range is too wide",
	"log response size exceeded",
	"response size exceeded",
	"too many results",
];

/// Block range to retry a failed `eth_getLogs` window with, or `None` if the failure is not a
/// range complaint.
///
/// Providers that name their ceiling get it directly; everything else is halved.
pub fn log_range_adjustment(error: &TransportError, current: u64) -> Option<u64> {
	if matches!(error, TransportError::Timeout(_)) {
		return None;
	}

	let message = error.provider_message();
	let ceiling = MAX_BLOCK_RANGE
		.captures(&message)
		.or_else(|| LIMITED_RANGE.captures(&message))
		.and_then(|captures| captures.get(1))
		.and_then(|ceiling| ceiling.as_str().parse::<u64>().ok());

	if let Some(ceiling) = ceiling {
		return Some(if ceiling < current {
			ceiling
		} else {
			current / 2
		});
	}

	let lowered = message.to_lowercase();
	if HALVING_SIGNATURES
		.iter()
		.any(|signature| lowered.contains(signature))
	{
		return Some(current / 2);
	}

	None
}

/// Capabilities forced for sources known to misreport them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityOverride {
	pub endpoint_suffix: &'static str,
	pub is_pruned: bool,
	pub is_archive: bool,
}

/// Providers whose probe results are unreliable.
///
/// Entries are matched against the end of the endpoint. Each one papers over provider
/// behaviour at the time it was added and must be rechecked when the provider changes.
pub const CAPABILITY_OVERRIDES: &[CapabilityOverride] = &[
	// Load balances between pruned and unpruned backends
	CapabilityOverride {
		endpoint_suffix: "llamarpc.com",
		is_pruned: true,
		is_archive: false,
	},
	// Switches between archive and non-archive backends
	CapabilityOverride {
		endpoint_suffix: "blastapi.io",
		is_pruned: false,
		is_archive: false,
	},
];

pub fn capability_override(endpoint: &str) -> Option<&'static CapabilityOverride> {
	let endpoint = endpoint.trim_end_matches('/');
	let host = url::Url::parse(endpoint)
		.ok()
		.and_then(|url| url.host_str().map(str::to_string));

	CAPABILITY_OVERRIDES.iter().find(|entry| {
		endpoint.ends_with(entry.endpoint_suffix)
			|| host
				.as_deref()
				.is_some_and(|host| host.ends_with(entry.endpoint_suffix))
	})
}
