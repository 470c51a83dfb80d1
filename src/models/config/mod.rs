//! Configuration loading and validation.
//!
//! Chain definitions live one per JSON file in a directory; see [`ChainConfig`] for the shape.
//!
//! [`ChainConfig`]: crate::models::ChainConfig

#![allow(clippy::result_large_err)]

use async_trait::async_trait;
use std::path::Path;

mod chain_config;
mod error;

pub use chain_config::DEFAULT_CHAINS_DIR;
pub use error::ConfigError;

/// Common interface for loading configuration files
#[async_trait]
pub trait ConfigLoader: Sized {
	/// Load all configuration files from a directory
	///
	/// If no path is provided, uses the default config directory.
	async fn load_all<T>(path: Option<&Path>) -> Result<T, error::ConfigError>
	where
		T: FromIterator<(String, Self)>;

	/// Load configuration from a specific file path
	async fn load_from_path(path: &Path) -> Result<Self, error::ConfigError>;

	/// Validate the configuration
	fn validate(&self) -> Result<(), error::ConfigError>;

	/// Logs a warning for every endpoint reached over an unencrypted protocol
	fn validate_protocol(&self);

	/// Check if a file is a JSON file based on extension
	fn is_json_file(path: &Path) -> bool {
		path.extension()
			.map(|ext| ext.to_string_lossy().to_lowercase() == "json")
			.unwrap_or(false)
	}

	/// Rejects `current_instance` if it collides with one already loaded
	fn validate_uniqueness(
		instances: &[&Self],
		current_instance: &Self,
		file_path: &str,
	) -> Result<(), ConfigError>;
}
