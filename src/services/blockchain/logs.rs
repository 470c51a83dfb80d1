//! Chunked `eth_getLogs` retrieval.
//!
//! Against a node the range is walked in windows of `default_chunk_size` blocks. A window the
//! provider refuses as too large is retried with a smaller size until it succeeds or the size
//! drops below `min_chunk_size`. The next window starts again at the default size.
//!
//! Against the explorer the range is walked in fixed `explorer_chunk_size` windows. A page with
//! exactly `page_limit` rows may be truncated, so the next page restarts at the block of the
//! last row. Rows repeated by that overlap are dropped.

use alloy::primitives::B256;
use std::collections::HashSet;
use tracing::{debug, instrument, warn};

use crate::{
	models::{EvmLog, LogFilter, LogQueryConfig},
	services::blockchain::{
		classify::log_range_adjustment, clients::BlockExplorer, clients::EvmClient,
		request::QueryError,
	},
};

#[derive(Debug, Clone)]
pub struct LogRangeFetcher {
	config: LogQueryConfig,
}

impl LogRangeFetcher {
	pub fn new(config: LogQueryConfig) -> Self {
		Self { config }
	}

	pub fn config(&self) -> &LogQueryConfig {
		&self.config
	}

	fn check_range(from_block: u64, to_block: u64) -> Result<(), QueryError> {
		if from_block > to_block {
			return Err(QueryError::Invalid(format!(
				"from_block {} is after to_block {}",
				from_block, to_block
			)));
		}
		Ok(())
	}

	/// Logs in `[from_block, to_block]` from one node, in block order.
	#[instrument(skip(self, client, filter))]
	pub async fn fetch_from_node(
		&self,
		client: &EvmClient,
		filter: &LogFilter,
		from_block: u64,
		to_block: u64,
	) -> Result<Vec<EvmLog>, QueryError> {
		Self::check_range(from_block, to_block)?;

		let default_chunk = self.config.default_chunk_size.max(1);
		let floor = self.config.min_chunk_size.max(1);
		let mut chunk = default_chunk;
		let mut start = from_block;
		let mut logs = Vec::new();

		loop {
			let end = start.saturating_add(chunk - 1).min(to_block);
			match client.get_logs(filter, start, end).await {
				Ok(mut batch) => {
					logs.append(&mut batch);
					if end >= to_block {
						break;
					}
					start = end + 1;
					chunk = default_chunk;
				}
				Err(error) => {
					let Some(smaller) = log_range_adjustment(&error, chunk) else {
						return Err(error.into());
					};
					if smaller < floor {
						debug!(
							"Log window {}..={} still too large at {} blocks, giving up",
							start, end, chunk
						);
						return Err(error.into());
					}
					debug!(
						"Retrying log window at {} with {} blocks instead of {}",
						start, smaller, chunk
					);
					chunk = smaller;
				}
			}
		}

		Ok(logs)
	}

	/// Logs in `[from_block, to_block]` from the explorer, in block order and without repeats.
	#[instrument(skip(self, explorer, filter))]
	pub async fn fetch_from_explorer(
		&self,
		explorer: &dyn BlockExplorer,
		filter: &LogFilter,
		from_block: u64,
		to_block: u64,
	) -> Result<Vec<EvmLog>, QueryError> {
		Self::check_range(from_block, to_block)?;

		let chunk = self.config.explorer_chunk_size.max(1);
		let page_limit = explorer.page_limit();
		let mut logs: Vec<EvmLog> = Vec::new();
		let mut start = from_block;

		loop {
			let end = start.saturating_add(chunk - 1).min(to_block);
			let mut page_start = start;

			loop {
				let page = explorer.get_logs(filter, page_start, end).await?;
				let full_page = page_limit > 0 && page.len() >= page_limit;
				let last_block = page.last().map(|log| log.block_number);
				merge_page(&mut logs, page);

				let Some(last_block) = last_block.filter(|_| full_page) else {
					break;
				};
				if last_block <= page_start {
					warn!(
						"{} returned {} logs for block {} alone; entries past the page limit are \
						 unreachable",
						explorer.name(),
						page_limit,
						last_block
					);
					break;
				}
				page_start = last_block;
			}

			if end >= to_block {
				break;
			}
			start = end + 1;
		}

		Ok(logs)
	}
}

/// Appends `page` to `accumulated`, skipping rows already present in the accumulated tail that
/// overlaps the page. Returns the number of rows added.
pub fn merge_page(accumulated: &mut Vec<EvmLog>, page: Vec<EvmLog>) -> usize {
	let Some(first_block) = page.first().map(|log| log.block_number) else {
		return 0;
	};

	let seen: HashSet<(u64, u64, B256)> = accumulated
		.iter()
		.rev()
		.take_while(|log| log.block_number >= first_block)
		.map(EvmLog::key)
		.collect();

	let before = accumulated.len();
	accumulated.extend(page.into_iter().filter(|log| !seen.contains(&log.key())));
	accumulated.len() - before
}
