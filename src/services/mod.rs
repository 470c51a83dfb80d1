//! Core services implementing the business logic.
//!
//! - `blockchain`: Sources, connections, dispatch and the query helpers built on them
pub mod blockchain;
