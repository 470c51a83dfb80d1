//! Domain models and data structures.
//!
//! - `blockchain`: EVM data shapes (logs, block references, batched calls, token metadata)
//! - `config`: Configuration loading and validation
//! - `core`: Sources and chain definitions

mod blockchain;
mod config;
mod core;

pub use blockchain::evm::{
	BlockId, CallResult, ContractCall, EvmLog, LogFilter, TokenKind, TokenMetadata,
};

pub use core::{
	ArchiveProbe, CacheConfig, ChainConfig, ExplorerConfig, LogQueryConfig, NodeDescriptor,
	SourceKind, WeightedNode, MULTICALL3_ADDRESS,
};

pub use config::{ConfigError, ConfigLoader, DEFAULT_CHAINS_DIR};
