//! Multi-source query engine for EVM chains.
//!
//! - `catalog`: builds call orders from the configured sources
//! - `connection`: live node handles, capability probes and the dead-source set
//! - `dispatcher`: runs one request along a call order
//! - `logs`: chunked log retrieval from nodes and explorers
//! - `multicall`: batched contract reads
//! - `metadata`: cached token metadata and timestamp lookups
//! - `clients` and `transports`: talking to nodes and explorers

mod catalog;
mod classify;
mod clients;
mod connection;
mod dispatcher;
mod error;
mod inquirer;
mod logs;
mod metadata;
mod multicall;
mod request;
mod transports;

pub use catalog::{CallOrder, NodeCatalog};
pub use classify::{
	capability_override, classify_failure, log_range_adjustment, CapabilityOverride,
	Disposition, FailureKind, CAPABILITY_OVERRIDES,
};
pub use clients::{BlockExplorer, EtherscanLikeClient, EvmClient};
pub use connection::{ConnectFailure, ConnectionAttempt, ConnectionManager, LiveNode};
pub use dispatcher::Dispatcher;
pub use error::InquirerError;
pub use inquirer::EvmNodeInquirer;
pub use logs::{merge_page, LogRangeFetcher};
pub use metadata::{decode_text, MetadataCache, DEFAULT_DECIMALS, OLD_WETH_ADDRESS};
pub use multicall::{decode_batch, encode_batch, selector, BatchCaller};
pub use request::{
	BalanceQuery, BlockByTimeQuery, BlockNumberQuery, BlockQuery, CallQuery, CodeQuery,
	ContractCreationQuery, LogsQuery, NodeQuery, QueryError, ReceiptQuery, TransactionQuery,
};
pub use transports::{
	BlockchainTransport, HttpTransportClient, HttpTransportConnector,
	TransientErrorRetryStrategy, TransportConnector, TransportError,
};
