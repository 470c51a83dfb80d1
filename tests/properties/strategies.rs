use alloy::primitives::{Address, Bytes, B256, U256};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::BTreeSet;

use evm_node_inquirer::models::{EvmLog, NodeDescriptor, WeightedNode};

const MAX_NODES: usize = 8;
const MAX_LOGS: usize = 60;

/// Weights with up to two decimal places in `[0, 1]`
pub fn weight_strategy() -> impl Strategy<Value = Decimal> {
	(0u32..=100).prop_map(|hundredths| Decimal::new(hundredths as i64, 2))
}

/// Uniquely named nodes with random ownership, weight and activity
pub fn weighted_nodes_strategy() -> impl Strategy<Value = Vec<WeightedNode>> {
	prop::collection::vec(
		(any::<bool>(), weight_strategy(), prop::bool::weighted(0.8)),
		0..MAX_NODES,
	)
	.prop_map(|specs| {
		specs
			.into_iter()
			.enumerate()
			.map(|(index, (owned, weight, active))| {
				let name = format!("node{}", index);
				let mut node = WeightedNode::new(
					NodeDescriptor::rpc(&name, format!("https://{}.example.org", name), owned),
					weight,
				);
				node.active = active;
				node
			})
			.collect()
	})
}

fn log_at(block_number: u64, log_index: u64) -> EvmLog {
	EvmLog {
		address: Address::repeat_byte(0x11),
		topics: vec![],
		data: Bytes::new(),
		block_number,
		block_hash: None,
		transaction_hash: B256::from(U256::from(block_number * 1_000 + log_index)),
		transaction_index: 0,
		log_index,
		removed: false,
	}
}

/// Logs in block order, several per block, without duplicates
pub fn sorted_logs_strategy(max_block: u64) -> impl Strategy<Value = Vec<EvmLog>> {
	prop::collection::btree_set((0..=max_block, 0u64..4), 0..MAX_LOGS).prop_map(
		|keys: BTreeSet<(u64, u64)>| {
			keys.into_iter()
				.map(|(block_number, log_index)| log_at(block_number, log_index))
				.collect()
		},
	)
}
