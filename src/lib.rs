//! Multi-source query engine for EVM chains.
//!
//! A chain is queried through a weighted set of JSON-RPC nodes, with an Etherscan compatible
//! explorer as the last resort. The library provides:
//!
//! - Configuration management through one JSON file per chain
//! - Weighted call orders, lazy connections and a dead-node set per chain
//! - Failover dispatch of any request kind along a call order
//! - Chunked log retrieval, batched contract calls and cached token metadata
//!
//! # Module Structure
//!
//! - `bootstrap`: Builds an inquirer from a chain configuration
//! - `models`: Data structures for configuration and blockchain data
//! - `repositories`: Configuration storage and management
//! - `services`: Core business logic and blockchain interaction
//! - `utils`: Common utilities and helper functions

pub mod bootstrap;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;
