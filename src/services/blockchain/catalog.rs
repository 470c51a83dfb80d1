//! Call order construction.
//!
//! Owned sources always come first. The remaining active sources are drawn one at a time with
//! probability proportional to their weight, so load spreads over third-party providers in
//! line with how much the user trusts them. The explorer, when included, is always last.

use rand::Rng;
use rust_decimal::{prelude::ToPrimitive, Decimal};

use crate::models::{ChainConfig, NodeDescriptor, WeightedNode};

/// Ordered candidates for one logical query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOrder(Vec<WeightedNode>);

impl CallOrder {
	pub fn new(nodes: Vec<WeightedNode>) -> Self {
		Self(nodes)
	}

	pub fn iter(&self) -> impl Iterator<Item = &WeightedNode> {
		self.0.iter()
	}

	pub fn names(&self) -> Vec<String> {
		self.0.iter().map(|node| node.name().to_string()).collect()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn into_inner(self) -> Vec<WeightedNode> {
		self.0
	}
}

/// The configured sources of one chain
#[derive(Debug, Clone)]
pub struct NodeCatalog {
	nodes: Vec<WeightedNode>,
	explorer: Option<WeightedNode>,
}

impl NodeCatalog {
	pub fn new(nodes: Vec<WeightedNode>, explorer: Option<NodeDescriptor>) -> Self {
		Self {
			nodes,
			explorer: explorer.map(|descriptor| WeightedNode::new(descriptor, Decimal::ONE)),
		}
	}

	pub fn from_chain(chain: &ChainConfig) -> Self {
		Self::new(chain.nodes.clone(), chain.explorer_descriptor())
	}

	pub fn nodes(&self) -> &[WeightedNode] {
		&self.nodes
	}

	pub fn explorer(&self) -> Option<&WeightedNode> {
		self.explorer.as_ref()
	}

	/// Builds a fresh call order using the thread-local generator.
	pub fn build_call_order(&self, skip_explorer: bool) -> CallOrder {
		self.build_call_order_with(skip_explorer, &mut rand::rng())
	}

	/// Builds a call order drawing from `rng`.
	pub fn build_call_order_with<R: Rng + ?Sized>(
		&self,
		skip_explorer: bool,
		rng: &mut R,
	) -> CallOrder {
		let (owned, mut remaining): (Vec<&WeightedNode>, Vec<&WeightedNode>) = self
			.nodes
			.iter()
			.filter(|node| node.active)
			.partition(|node| node.node.owned);

		let mut order: Vec<WeightedNode> = owned
			.into_iter()
			.map(|node| WeightedNode {
				weight: Decimal::ONE,
				..node.clone()
			})
			.collect();

		while !remaining.is_empty() {
			let index = pick_weighted(&remaining, rng);
			order.push(remaining.remove(index).clone());
		}

		if !skip_explorer {
			if let Some(explorer) = &self.explorer {
				order.push(explorer.clone());
			}
		}

		CallOrder(order)
	}
}

/// Index of one entry drawn with probability proportional to its weight.
///
/// When every remaining weight is zero the draw is uniform.
fn pick_weighted<R: Rng + ?Sized>(candidates: &[&WeightedNode], rng: &mut R) -> usize {
	let weights: Vec<f64> = candidates
		.iter()
		.map(|node| node.weight.to_f64().unwrap_or(0.0).max(0.0))
		.collect();
	let total: f64 = weights.iter().sum();

	if total <= 0.0 {
		return rng.random_range(0..candidates.len());
	}

	let mut pick = rng.random::<f64>() * total;
	for (index, weight) in weights.iter().enumerate() {
		if pick < *weight {
			return index;
		}
		pick -= weight;
	}
	// Rounding left `pick` just past the last bucket.
	weights.iter().rposition(|weight| *weight > 0.0).unwrap_or(0)
}
