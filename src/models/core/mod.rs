//! Core domain models: sources and the chains they serve.

mod chain;
mod node;

pub use chain::{
	ArchiveProbe, CacheConfig, ChainConfig, ExplorerConfig, LogQueryConfig, MULTICALL3_ADDRESS,
};
pub use node::{NodeDescriptor, SourceKind, WeightedNode};
