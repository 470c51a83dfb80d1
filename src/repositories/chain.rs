//! Chain configuration repository.
//!
//! Chains are loaded from a directory of JSON files and keyed by slug. Lookups accept either the
//! slug or the decimal chain id, which is what the CLI's `--chain` flag passes through.

#![allow(clippy::result_large_err)]

use std::{collections::HashMap, path::Path};

use async_trait::async_trait;

use crate::{
	models::{ChainConfig, ConfigLoader},
	repositories::error::RepositoryError,
	utils::normalize_string,
};

/// Repository for storing and retrieving chain configurations
#[derive(Clone)]
pub struct ChainRepository {
	/// Map of chain slugs to their configurations
	pub chains: HashMap<String, ChainConfig>,
}

impl ChainRepository {
	/// Loads every chain definition under `path` (or the default chains directory).
	pub async fn new(path: Option<&Path>) -> Result<Self, RepositoryError> {
		let chains = Self::load_all(path).await?;
		Ok(ChainRepository { chains })
	}
}

/// Interface for chain repository implementations
#[async_trait]
pub trait ChainRepositoryTrait: Clone {
	/// Create a new repository instance
	async fn new(path: Option<&Path>) -> Result<Self, RepositoryError>
	where
		Self: Sized;

	/// Load all chain configurations from the given path
	///
	/// If no path is provided, uses the default config directory.
	async fn load_all(path: Option<&Path>)
		-> Result<HashMap<String, ChainConfig>, RepositoryError>;

	/// Get a chain by slug
	fn get(&self, slug: &str) -> Option<ChainConfig>;

	/// Get all chains
	fn get_all(&self) -> HashMap<String, ChainConfig>;
}

#[async_trait]
impl ChainRepositoryTrait for ChainRepository {
	async fn new(path: Option<&Path>) -> Result<Self, RepositoryError> {
		ChainRepository::new(path).await
	}

	async fn load_all(
		path: Option<&Path>,
	) -> Result<HashMap<String, ChainConfig>, RepositoryError> {
		ChainConfig::load_all(path).await.map_err(|e| {
			RepositoryError::load_error(
				"Failed to load chains",
				Some(Box::new(e)),
				Some(HashMap::from([(
					"path".to_string(),
					path.map_or_else(|| "default".to_string(), |p| p.display().to_string()),
				)])),
			)
		})
	}

	fn get(&self, slug: &str) -> Option<ChainConfig> {
		self.chains.get(slug).cloned()
	}

	fn get_all(&self) -> HashMap<String, ChainConfig> {
		self.chains.clone()
	}
}

/// Service layer over a [`ChainRepositoryTrait`] implementation
#[derive(Clone)]
pub struct ChainService<T: ChainRepositoryTrait> {
	repository: T,
}

impl<T: ChainRepositoryTrait> ChainService<T> {
	/// Create a new chain service with the default repository implementation
	pub async fn new(path: Option<&Path>) -> Result<ChainService<ChainRepository>, RepositoryError> {
		let repository = ChainRepository::new(path).await?;
		Ok(ChainService { repository })
	}

	/// Create a new chain service with a custom repository implementation
	pub fn new_with_repository(repository: T) -> Result<Self, RepositoryError> {
		Ok(ChainService { repository })
	}

	/// Create a new chain service with a specific configuration path
	pub async fn new_with_path(
		path: Option<&Path>,
	) -> Result<ChainService<ChainRepository>, RepositoryError> {
		let repository = ChainRepository::new(path).await?;
		Ok(ChainService { repository })
	}

	/// Get a chain by slug
	pub fn get(&self, slug: &str) -> Option<ChainConfig> {
		self.repository.get(slug)
	}

	/// Get all chains
	pub fn get_all(&self) -> HashMap<String, ChainConfig> {
		self.repository.get_all()
	}

	/// Resolves a chain by slug, case-insensitively, or by decimal chain id.
	pub fn resolve(&self, selector: &str) -> Result<ChainConfig, RepositoryError> {
		let normalized = normalize_string(selector);
		if let Some(chain) = self.repository.get(&normalized) {
			return Ok(chain);
		}

		if let Ok(chain_id) = normalized.parse::<u64>() {
			if let Some(chain) = self
				.repository
				.get_all()
				.into_values()
				.find(|chain| chain.chain_id == chain_id)
			{
				return Ok(chain);
			}
		}

		let mut known: Vec<String> = self.repository.get_all().into_keys().collect();
		known.sort();
		Err(RepositoryError::validation_error(
			format!("Unknown chain '{}'", selector),
			None,
			Some(HashMap::from([("known_chains".to_string(), known.join(","))])),
		))
	}
}
