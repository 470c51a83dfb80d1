//! Repository implementations for configuration management.
//!
//! Chain definitions are loaded from JSON files and exposed through [`ChainService`], which the
//! CLI uses to resolve the chain a command runs against.

mod chain;
mod error;

pub use chain::{ChainRepository, ChainRepositoryTrait, ChainService};
pub use error::RepositoryError;
