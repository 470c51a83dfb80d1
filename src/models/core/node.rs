use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What kind of service sits behind a source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
	/// JSON-RPC node
	#[default]
	Rpc,
	/// Block explorer REST API, only ever queried as the last resort
	Explorer,
}

/// Identity of one queryable source.
///
/// Immutable after creation; the name doubles as the key of the live handle cache and of the
/// dead-source set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeDescriptor {
	/// Unique name of the source within its chain
	pub name: String,

	/// Endpoint URL
	pub endpoint: String,

	/// Whether the source is operated by the user
	#[serde(default)]
	pub owned: bool,

	#[serde(default)]
	pub kind: SourceKind,
}

impl NodeDescriptor {
	pub fn rpc(name: impl Into<String>, endpoint: impl Into<String>, owned: bool) -> Self {
		Self {
			name: name.into(),
			endpoint: endpoint.into(),
			owned,
			kind: SourceKind::Rpc,
		}
	}

	pub fn explorer(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			endpoint: endpoint.into(),
			owned: false,
			kind: SourceKind::Explorer,
		}
	}

	pub fn is_explorer(&self) -> bool {
		self.kind == SourceKind::Explorer
	}
}

fn default_weight() -> Decimal {
	Decimal::ONE
}

fn default_active() -> bool {
	true
}

/// A configured source together with the user's preference for it.
///
/// The weight drives the probability of a non-owned source being drawn early in a call order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedNode {
	#[serde(flatten)]
	pub node: NodeDescriptor,

	/// Non-negative sampling weight
	#[serde(default = "default_weight")]
	pub weight: Decimal,

	/// Inactive sources never appear in a call order
	#[serde(default = "default_active")]
	pub active: bool,
}

impl WeightedNode {
	pub fn new(node: NodeDescriptor, weight: Decimal) -> Self {
		Self {
			node,
			weight,
			active: true,
		}
	}

	pub fn name(&self) -> &str {
		&self.node.name
	}
}
