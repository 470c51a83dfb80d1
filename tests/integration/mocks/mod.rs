//! Mock implementations for testing purposes.
//!
//! - [`ScriptedTransport`] and [`ScriptedConnector`]: in-memory nodes answering JSON-RPC methods
//!   from per-method handlers, recording every call
//! - `MockTransport`, `MockConnector`, `MockExplorer` and `MockChainRepository`: `mockall`
//!   mocks of the transport, connector, explorer and repository traits
//! - `models`: fixtures for logs, call orders and ABI encoded return data

mod explorer;

#[allow(unused_imports)]
pub use explorer::*;
#[allow(unused_imports)]
pub use models::*;
#[allow(unused_imports)]
pub use repositories::*;
#[allow(unused_imports)]
pub use transports::*;
