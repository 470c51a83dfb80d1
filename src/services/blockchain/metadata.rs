//! Cached token metadata and timestamp to block lookups.
//!
//! Both caches are bounded LRU maps. Token metadata is fetched with one partial multicall per
//! group of tokens (`name`, `symbol` and, for fungible tokens, `decimals`). Text fields are
//! decoded as ABI `string`; contracts that predate the standard return `bytes32` instead and
//! are decoded as such when the string decoding fails.
//!
//! Only fully decoded metadata is cached. A token whose batch never executed, or whose text
//! fields decode neither way, is returned to the caller and fetched again next time.
//!
//! A forced refresh of a token is serialized per address. A caller that waited for another
//! refresh of the same address reuses that result instead of refreshing again.

use alloy::{
	dyn_abi::{DynSolType, DynSolValue},
	primitives::{Address, Bytes},
};
use std::{
	collections::HashMap,
	sync::atomic::{AtomicU64, Ordering},
};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::{
	models::{BlockId, CacheConfig, CallResult, ContractCall, TokenKind, TokenMetadata},
	services::blockchain::{
		catalog::CallOrder,
		dispatcher::Dispatcher,
		error::InquirerError,
		multicall::{selector, BatchCaller},
		request::BlockByTimeQuery,
	},
	utils::{BoundedCache, RefreshLocks},
};

/// Decimals assumed for fungible tokens without a `decimals()` function
pub const DEFAULT_DECIMALS: u8 = 18;

/// Tokens per multicall when fetching metadata
const METADATA_TOKENS_PER_BATCH: usize = 10;

/// The pre-ERC20 wrapped ether contract, whose metadata functions do not decode
pub const OLD_WETH_ADDRESS: Address = Address::new([
	0xec, 0xf8, 0xf8, 0x7f, 0x81, 0x0e, 0xcf, 0x45, 0x09, 0x40, 0xc9, 0xf6, 0x00, 0x66, 0xb4, 0xa7,
	0xa5, 0x01, 0xd6, 0xa7,
]);

fn old_weth() -> TokenMetadata {
	TokenMetadata {
		address: OLD_WETH_ADDRESS,
		name: Some("Old Wrapped Ether".to_string()),
		symbol: Some("WETH".to_string()),
		decimals: Some(18),
	}
}

/// Placeholder for a token whose metadata calls never executed
fn unresolved(address: Address) -> TokenMetadata {
	TokenMetadata {
		address,
		name: None,
		symbol: None,
		decimals: None,
	}
}

pub struct MetadataCache {
	chain_id: u64,
	/// Metadata with the stamp of the store that wrote it
	tokens: Mutex<BoundedCache<Address, (TokenMetadata, u64)>>,
	block_by_timestamp: Mutex<BoundedCache<(u64, u64), u64>>,
	refresh_locks: RefreshLocks<Address>,
	stores: AtomicU64,
}

impl MetadataCache {
	pub fn new(chain_id: u64, config: &CacheConfig) -> Self {
		Self {
			chain_id,
			tokens: Mutex::new(BoundedCache::new(config.token_metadata_capacity)),
			block_by_timestamp: Mutex::new(BoundedCache::new(config.block_by_timestamp_capacity)),
			refresh_locks: RefreshLocks::new(),
			stores: AtomicU64::new(0),
		}
	}

	pub async fn cached_token(&self, address: &Address) -> Option<TokenMetadata> {
		self.tokens
			.lock()
			.await
			.get(address)
			.map(|(metadata, _)| metadata)
	}

	pub async fn cached_token_count(&self) -> usize {
		self.tokens.lock().await.len()
	}

	/// Stamp of the cached entry, zero when the token is not cached
	async fn stamp(&self, address: &Address) -> u64 {
		self.tokens
			.lock()
			.await
			.peek(address)
			.map(|(_, stamp)| *stamp)
			.unwrap_or(0)
	}

	/// Metadata of one token, from the cache unless `force_refresh` is set.
	///
	/// Fails when the metadata batch could not be executed by any source.
	#[instrument(skip(self, dispatcher, batch_caller, call_order))]
	pub async fn token_metadata(
		&self,
		dispatcher: &Dispatcher,
		batch_caller: &BatchCaller,
		address: Address,
		kind: TokenKind,
		force_refresh: bool,
		call_order: &CallOrder,
	) -> Result<TokenMetadata, InquirerError> {
		if address == OLD_WETH_ADDRESS {
			return Ok(old_weth());
		}
		if !force_refresh {
			if let Some(hit) = self.cached_token(&address).await {
				return Ok(hit);
			}
		}

		let seen_stamp = self.stamp(&address).await;
		let _guard = self.refresh_locks.acquire(&address).await;

		// Another caller finished fetching this token while we waited for the lock
		if self.stamp(&address).await != seen_stamp {
			if let Some(hit) = self.cached_token(&address).await {
				return Ok(hit);
			}
		}

		let results = batch_caller
			.call_chunk(
				dispatcher,
				&metadata_calls(&[address], kind),
				false,
				BlockId::Latest,
				call_order,
			)
			.await?;
		let decoded = decode_metadata(address, kind, &results);
		if decoded.complete {
			self.store(decoded.metadata.clone()).await;
		}
		Ok(decoded.metadata)
	}

	/// Metadata of several tokens of the same kind. Cache misses are fetched together.
	///
	/// A group of tokens whose batch could not be executed comes back with every field unset
	/// rather than failing the other groups. Only an invalid request fails the whole call.
	#[instrument(skip(self, dispatcher, batch_caller, addresses, call_order), fields(tokens = addresses.len()))]
	pub async fn tokens_metadata(
		&self,
		dispatcher: &Dispatcher,
		batch_caller: &BatchCaller,
		addresses: &[Address],
		kind: TokenKind,
		call_order: &CallOrder,
	) -> Result<Vec<TokenMetadata>, InquirerError> {
		let mut found: HashMap<Address, TokenMetadata> = HashMap::new();
		let mut missing = Vec::new();

		for address in addresses {
			if *address == OLD_WETH_ADDRESS {
				found.insert(*address, old_weth());
			} else if let Some(hit) = self.cached_token(address).await {
				found.insert(*address, hit);
			} else if !missing.contains(address) {
				missing.push(*address);
			}
		}

		if !missing.is_empty() {
			debug!("Fetching metadata for {} uncached tokens", missing.len());
		}
		let fields_per_token = metadata_signatures(kind).len();
		for group in missing.chunks(METADATA_TOKENS_PER_BATCH) {
			let outcome = batch_caller
				.call_chunk(
					dispatcher,
					&metadata_calls(group, kind),
					false,
					BlockId::Latest,
					call_order,
				)
				.await;

			match outcome {
				Ok(results) => {
					for (address, fields) in group.iter().zip(results.chunks(fields_per_token)) {
						let decoded = decode_metadata(*address, kind, fields);
						if decoded.complete {
							self.store(decoded.metadata.clone()).await;
						}
						found.insert(*address, decoded.metadata);
					}
				}
				Err(e @ InquirerError::RequestInvalid(_)) => return Err(e),
				Err(e) => {
					warn!(
						"Metadata of {} tokens is unavailable, leaving them uncached: {}",
						group.len(),
						e
					);
					for address in group {
						found.insert(*address, unresolved(*address));
					}
				}
			}
		}

		Ok(addresses
			.iter()
			.map(|address| {
				found
					.get(address)
					.cloned()
					.unwrap_or_else(|| unresolved(*address))
			})
			.collect())
	}

	async fn store(&self, metadata: TokenMetadata) {
		let stamp = self.stores.fetch_add(1, Ordering::Relaxed) + 1;
		self.tokens
			.lock()
			.await
			.insert(metadata.address, (metadata, stamp));
	}

	/// Last block at or before `timestamp`, cached per chain and timestamp.
	#[instrument(skip(self, dispatcher, call_order))]
	pub async fn block_number_by_timestamp(
		&self,
		dispatcher: &Dispatcher,
		timestamp: u64,
		call_order: &CallOrder,
	) -> Result<u64, InquirerError> {
		let key = (self.chain_id, timestamp);
		if let Some(block) = self.block_by_timestamp.lock().await.get(&key) {
			return Ok(block);
		}

		let block = dispatcher
			.query(&BlockByTimeQuery { timestamp }, call_order)
			.await?;
		self.block_by_timestamp.lock().await.insert(key, block);
		Ok(block)
	}
}

fn metadata_signatures(kind: TokenKind) -> &'static [&'static str] {
	match kind {
		TokenKind::Fungible => &["name()", "symbol()", "decimals()"],
		TokenKind::NonFungible => &["name()", "symbol()"],
	}
}

fn metadata_calls(addresses: &[Address], kind: TokenKind) -> Vec<ContractCall> {
	let signatures = metadata_signatures(kind);
	addresses
		.iter()
		.flat_map(|address| {
			signatures
				.iter()
				.map(move |signature| ContractCall::new(*address, selector(signature).to_vec()))
		})
		.collect()
}

/// Metadata decoded from the call results of one token
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMetadata {
	pub metadata: TokenMetadata,
	/// False when a returned text field decoded neither as `string` nor as `bytes32`
	pub complete: bool,
}

/// Builds metadata from the `name`, `symbol` and `decimals` results of one token.
///
/// Calls that reverted leave their field unset, or at [`DEFAULT_DECIMALS`] for decimals.
/// A text field that returned data but cannot be decoded is unset and marks the result
/// incomplete.
pub fn decode_metadata(address: Address, kind: TokenKind, fields: &[CallResult]) -> DecodedMetadata {
	let mut complete = true;
	let mut text = |index: usize, field: &str| -> Option<String> {
		let data = fields.get(index).and_then(returned_data)?;
		let decoded = decode_text(data);
		if decoded.is_none() {
			warn!("Could not decode {} of token {}", field, address);
			complete = false;
		}
		decoded
	};

	let name = text(0, "name");
	let symbol = text(1, "symbol");
	let decimals = match kind {
		TokenKind::NonFungible => None,
		TokenKind::Fungible => Some(
			fields
				.get(2)
				.and_then(returned_data)
				.and_then(decode_decimals)
				.unwrap_or(DEFAULT_DECIMALS),
		),
	};

	DecodedMetadata {
		metadata: TokenMetadata {
			address,
			name,
			symbol,
			decimals,
		},
		complete,
	}
}

/// Return data of a call that succeeded with a non-empty answer
fn returned_data(result: &CallResult) -> Option<&Bytes> {
	(result.success && !result.return_data.is_empty()).then_some(&result.return_data)
}

fn decode_single(ty: DynSolType, data: &[u8]) -> Option<DynSolValue> {
	DynSolType::Tuple(vec![ty])
		.abi_decode_params(data)
		.ok()
		.and_then(|value| value.as_tuple().and_then(|fields| fields.first().cloned()))
}

/// Decodes an ABI `string`, falling back to a zero padded `bytes32`.
pub fn decode_text(data: &[u8]) -> Option<String> {
	if let Some(DynSolValue::String(text)) = decode_single(DynSolType::String, data) {
		return Some(text.trim_end_matches('\0').to_string());
	}

	let Some(DynSolValue::FixedBytes(word, 32)) = decode_single(DynSolType::FixedBytes(32), data)
	else {
		return None;
	};
	let end = word
		.iter()
		.position(|byte| *byte == 0)
		.unwrap_or(word.len());
	String::from_utf8(word[..end].to_vec()).ok()
}

fn decode_decimals(data: &Bytes) -> Option<u8> {
	match decode_single(DynSolType::Uint(256), data) {
		Some(DynSolValue::Uint(value, _)) => u8::try_from(value).ok(),
		_ => None,
	}
}
