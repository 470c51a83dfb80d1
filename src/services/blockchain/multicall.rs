//! Batched contract reads through a Multicall3 style contract.
//!
//! Calls are split into chunks and each chunk is one `eth_call` to the batching contract.
//! All-or-nothing batches use `aggregate`, which reverts if any call reverts. Partial batches
//! use `tryAggregate(false, ..)` and report success per call.

use alloy::{
	dyn_abi::{DynSolType, DynSolValue},
	primitives::{keccak256, Address, Bytes},
};
use tracing::{instrument, warn};

use crate::{
	models::{BlockId, CallResult, ContractCall},
	services::blockchain::{
		catalog::CallOrder, dispatcher::Dispatcher, error::InquirerError, request::CallQuery,
	},
};

const AGGREGATE_SIGNATURE: &str = "aggregate((address,bytes)[])";
const AGGREGATE_RETURNS: &str = "(uint256,bytes[])";
const TRY_AGGREGATE_SIGNATURE: &str = "tryAggregate(bool,(address,bytes)[])";
const TRY_AGGREGATE_RETURNS: &str = "((bool,bytes)[])";

/// First four bytes of the keccak hash of a function signature
pub fn selector(signature: &str) -> [u8; 4] {
	let hash = keccak256(signature.as_bytes());
	[hash[0], hash[1], hash[2], hash[3]]
}

pub struct BatchCaller {
	multicall_address: Address,
}

impl BatchCaller {
	pub fn new(multicall_address: Address) -> Self {
		Self { multicall_address }
	}

	pub fn multicall_address(&self) -> Address {
		self.multicall_address
	}

	/// Runs `calls` in chunks of `chunk_size`, returning one result per call in input order.
	///
	/// With `all_or_nothing` any failed chunk fails the whole batch. Otherwise a chunk that
	/// could not be executed at all yields `(false, empty)` for each of its calls.
	#[instrument(skip(self, dispatcher, calls, call_order), fields(calls = calls.len()))]
	pub async fn batch_call(
		&self,
		dispatcher: &Dispatcher,
		calls: &[ContractCall],
		chunk_size: usize,
		all_or_nothing: bool,
		block: BlockId,
		call_order: &CallOrder,
	) -> Result<Vec<CallResult>, InquirerError> {
		let mut results = Vec::with_capacity(calls.len());

		for chunk in calls.chunks(chunk_size.max(1)) {
			match self
				.call_chunk(dispatcher, chunk, all_or_nothing, block, call_order)
				.await
			{
				Ok(chunk_results) => results.extend(chunk_results),
				Err(e) if all_or_nothing || matches!(e, InquirerError::RequestInvalid(_)) => {
					return Err(e)
				}
				Err(e) => {
					warn!(
						"Batch of {} calls failed, substituting empty results: {}",
						chunk.len(),
						e
					);
					results.extend(vec![CallResult::failed(); chunk.len()]);
				}
			}
		}

		Ok(results)
	}

	/// Runs `calls` as a single `eth_call` to the batching contract.
	///
	/// Unlike [`BatchCaller::batch_call`] a failure is returned as is, so callers can tell a
	/// batch that never executed from individual calls that reverted inside it.
	pub async fn call_chunk(
		&self,
		dispatcher: &Dispatcher,
		calls: &[ContractCall],
		all_or_nothing: bool,
		block: BlockId,
		call_order: &CallOrder,
	) -> Result<Vec<CallResult>, InquirerError> {
		let query = CallQuery {
			to: self.multicall_address,
			data: encode_batch(calls, all_or_nothing),
			block,
		};
		let output = dispatcher.query(&query, call_order).await?;
		decode_batch(&output, calls.len(), all_or_nothing)
	}
}

/// Calldata for one batch
pub fn encode_batch(calls: &[ContractCall], all_or_nothing: bool) -> Bytes {
	let call_values = DynSolValue::Array(
		calls
			.iter()
			.map(|call| {
				DynSolValue::Tuple(vec![
					DynSolValue::Address(call.target),
					DynSolValue::Bytes(call.data.to_vec()),
				])
			})
			.collect(),
	);

	let (signature, params) = if all_or_nothing {
		(AGGREGATE_SIGNATURE, DynSolValue::Tuple(vec![call_values]))
	} else {
		(
			TRY_AGGREGATE_SIGNATURE,
			DynSolValue::Tuple(vec![DynSolValue::Bool(false), call_values]),
		)
	};

	let mut data = selector(signature).to_vec();
	data.extend(params.abi_encode_params());
	data.into()
}

/// Splits the return data of one batch into per-call results
pub fn decode_batch(
	output: &Bytes,
	expected: usize,
	all_or_nothing: bool,
) -> Result<Vec<CallResult>, InquirerError> {
	let return_type = if all_or_nothing {
		AGGREGATE_RETURNS
	} else {
		TRY_AGGREGATE_RETURNS
	};
	let decode_error = |msg: String| InquirerError::decode_failure(msg, None, None);

	let decoded = DynSolType::parse(return_type)
		.and_then(|ty| ty.abi_decode_params(output))
		.map_err(|e| {
			InquirerError::decode_failure(
				"Failed to decode multicall output",
				Some(Box::new(e)),
				None,
			)
		})?;

	let fields = decoded
		.as_tuple()
		.ok_or_else(|| decode_error("multicall output is not a tuple".to_string()))?;

	let results: Vec<CallResult> = if all_or_nothing {
		let entries = fields
			.get(1)
			.and_then(DynSolValue::as_array)
			.ok_or_else(|| decode_error("aggregate output lacks return data".to_string()))?;
		entries
			.iter()
			.map(|entry| {
				entry
					.as_bytes()
					.map(|bytes| CallResult::succeeded(bytes.to_vec()))
					.ok_or_else(|| decode_error("aggregate entry is not bytes".to_string()))
			})
			.collect::<Result<_, _>>()?
	} else {
		let entries = fields
			.first()
			.and_then(DynSolValue::as_array)
			.ok_or_else(|| decode_error("tryAggregate output lacks results".to_string()))?;
		entries
			.iter()
			.map(|entry| match entry.as_tuple() {
				Some([DynSolValue::Bool(success), DynSolValue::Bytes(bytes)]) => Ok(CallResult {
					success: *success,
					return_data: bytes.clone().into(),
				}),
				_ => Err(decode_error(
					"tryAggregate entry is not (bool,bytes)".to_string(),
				)),
			})
			.collect::<Result<_, _>>()?
	};

	if results.len() != expected {
		return Err(decode_error(format!(
			"multicall returned {} results for {} calls",
			results.len(),
			expected
		)));
	}
	Ok(results)
}
