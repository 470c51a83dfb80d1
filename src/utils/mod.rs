//! Utility modules for common functionality.
//!
//! - cache: Bounded LRU cache and per-key refresh locks
//! - client_storage: Shared storage of live source handles
//! - http: HTTP client utilities (i.e. creation of retryable HTTP clients)
//! - logging: Logging utilities
//! - parsing: Parsing utilities
//! - tests: Test utilities

pub mod cache;
pub mod client_storage;
pub mod http;
pub mod logging;
pub mod parsing;

pub use cache::{BoundedCache, RefreshLocks};
pub use client_storage::ClientStorage;
pub use http::*;
pub use parsing::*;
