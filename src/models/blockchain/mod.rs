//! Blockchain-specific model implementations.
//!
//! Blocks, transactions and receipts travel as raw JSON; only the shapes this crate reasons
//! about (logs, block references, batched calls, token metadata) are typed.

pub mod evm;
