//! EVM data types shared by the dispatcher, the fetchers and their callers.

mod block;
mod call;
mod log;
mod token;

pub use block::BlockId;
pub use call::{CallResult, ContractCall};
pub use log::{EvmLog, LogFilter};
pub use token::{TokenKind, TokenMetadata};
