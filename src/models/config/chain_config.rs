//! Chain configuration loading and validation.
//!
//! Implements [`ConfigLoader`] for [`ChainConfig`] so chain definitions can be loaded from
//! a directory of JSON files, one chain per file.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::{collections::HashMap, collections::HashSet, path::Path};
use url::Url;

use crate::{
	models::{config::error::ConfigError, ChainConfig, ConfigLoader},
	utils::normalize_string,
};

pub const DEFAULT_CHAINS_DIR: &str = "config/chains";

fn path_metadata(path: &Path) -> Option<HashMap<String, String>> {
	Some(HashMap::from([(
		"path".to_string(),
		path.display().to_string(),
	)]))
}

fn validate_endpoint(kind: &str, name: &str, endpoint: &str) -> Result<(), ConfigError> {
	let url = Url::parse(endpoint).map_err(|e| {
		ConfigError::validation_error(
			format!("{} '{}' has an invalid endpoint: {}", kind, name, e),
			Some(Box::new(e)),
			Some(HashMap::from([("endpoint".to_string(), endpoint.to_string())])),
		)
	})?;
	if !matches!(url.scheme(), "http" | "https") {
		return Err(ConfigError::validation_error(
			format!("{} '{}' endpoint must use http:// or https://", kind, name),
			None,
			Some(HashMap::from([("endpoint".to_string(), endpoint.to_string())])),
		));
	}
	Ok(())
}

#[async_trait]
impl ConfigLoader for ChainConfig {
	async fn load_all<T>(path: Option<&Path>) -> Result<T, ConfigError>
	where
		T: FromIterator<(String, Self)>,
	{
		let chains_dir = path.unwrap_or(Path::new(DEFAULT_CHAINS_DIR));
		let mut pairs = Vec::new();

		if !chains_dir.exists() {
			return Err(ConfigError::file_error(
				"chains directory not found",
				None,
				path_metadata(chains_dir),
			));
		}

		let entries = std::fs::read_dir(chains_dir).map_err(|e| {
			ConfigError::file_error(
				format!("failed to read chains directory: {}", e),
				Some(Box::new(e)),
				path_metadata(chains_dir),
			)
		})?;

		for entry in entries {
			let path = entry
				.map_err(|e| {
					ConfigError::file_error(
						format!("failed to read directory entry: {}", e),
						Some(Box::new(e)),
						path_metadata(chains_dir),
					)
				})?
				.path();

			if !Self::is_json_file(&path) {
				continue;
			}

			let chain = Self::load_from_path(&path).await?;
			let existing: Vec<&ChainConfig> = pairs.iter().map(|(_, chain)| chain).collect();
			Self::validate_uniqueness(&existing, &chain, &path.display().to_string())?;

			pairs.push((chain.slug.clone(), chain));
		}

		Ok(T::from_iter(pairs))
	}

	async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
		let file = std::fs::File::open(path).map_err(|e| {
			ConfigError::file_error(
				format!("failed to open chain config file: {}", e),
				Some(Box::new(e)),
				path_metadata(path),
			)
		})?;
		let config: ChainConfig = serde_json::from_reader(file).map_err(|e| {
			ConfigError::parse_error(
				format!("failed to parse chain config: {}", e),
				Some(Box::new(e)),
				path_metadata(path),
			)
		})?;

		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.name.trim().is_empty() {
			return Err(ConfigError::validation_error(
				"Chain name is required",
				None,
				None,
			));
		}

		if self.slug.is_empty()
			|| !self
				.slug
				.chars()
				.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
		{
			return Err(ConfigError::validation_error(
				"Slug must contain only lowercase letters, numbers, and underscores",
				None,
				None,
			));
		}

		if self.chain_id == 0 {
			return Err(ConfigError::validation_error(
				"chain_id must be greater than 0",
				None,
				None,
			));
		}

		if self.rpc_timeout_secs == 0 {
			return Err(ConfigError::validation_error(
				"rpc_timeout_secs must be greater than 0",
				None,
				None,
			));
		}

		let mut seen_names = HashSet::new();
		for weighted in &self.nodes {
			let node = &weighted.node;
			if node.name.trim().is_empty() {
				return Err(ConfigError::validation_error(
					"Node name is required",
					None,
					None,
				));
			}
			if node.is_explorer() {
				return Err(ConfigError::validation_error(
					format!(
						"Node '{}' cannot be an explorer; configure the explorer section instead",
						node.name
					),
					None,
					None,
				));
			}
			if !seen_names.insert(normalize_string(&node.name)) {
				return Err(ConfigError::validation_error(
					format!("Duplicate node name found: '{}'", node.name),
					None,
					Some(HashMap::from([("node".to_string(), node.name.clone())])),
				));
			}
			if weighted.weight < Decimal::ZERO {
				return Err(ConfigError::validation_error(
					format!("Node '{}' has a negative weight", node.name),
					None,
					None,
				));
			}
			validate_endpoint("Node", &node.name, &node.endpoint)?;
		}

		if let Some(explorer) = &self.explorer {
			if explorer.url.trim().is_empty() {
				return Err(ConfigError::validation_error(
					"Explorer url is required",
					None,
					None,
				));
			}
			validate_endpoint("Explorer", &explorer.name, &explorer.url)?;
			if !seen_names.insert(normalize_string(&explorer.name)) {
				return Err(ConfigError::validation_error(
					format!("Explorer name '{}' collides with a node name", explorer.name),
					None,
					None,
				));
			}
			if explorer.page_limit == 0 {
				return Err(ConfigError::validation_error(
					"Explorer page_limit must be greater than 0",
					None,
					None,
				));
			}
		}

		let log_query = &self.log_query;
		if log_query.min_chunk_size == 0
			|| log_query.default_chunk_size < log_query.min_chunk_size
			|| log_query.explorer_chunk_size == 0
		{
			return Err(ConfigError::validation_error(
				"log_query requires 0 < min_chunk_size <= default_chunk_size and a non-zero \
				 explorer_chunk_size",
				None,
				None,
			));
		}

		if self.cache.token_metadata_capacity == 0 || self.cache.block_by_timestamp_capacity == 0
		{
			return Err(ConfigError::validation_error(
				"Cache capacities must be greater than 0",
				None,
				None,
			));
		}

		self.validate_protocol();

		Ok(())
	}

	fn validate_protocol(&self) {
		for weighted in &self.nodes {
			if weighted.node.endpoint.starts_with("http://") && !weighted.node.owned {
				tracing::warn!(
					"Chain '{}' uses an insecure RPC URL for third-party node '{}': {}",
					self.slug,
					weighted.node.name,
					weighted.node.endpoint
				);
			}
		}
		if let Some(explorer) = &self.explorer {
			if explorer.url.starts_with("http://") {
				tracing::warn!(
					"Chain '{}' uses an insecure explorer URL: {}",
					self.slug,
					explorer.url
				);
			}
		}
	}

	fn validate_uniqueness(
		instances: &[&Self],
		current_instance: &Self,
		file_path: &str,
	) -> Result<(), ConfigError> {
		for existing in instances {
			let duplicate = if normalize_string(&existing.slug)
				== normalize_string(&current_instance.slug)
			{
				Some(("slug", current_instance.slug.clone()))
			} else if existing.chain_id == current_instance.chain_id {
				Some(("chain_id", current_instance.chain_id.to_string()))
			} else {
				None
			};

			if let Some((field_name, field_value)) = duplicate {
				return Err(ConfigError::validation_error(
					format!("Duplicate chain {} found: '{}'", field_name, field_value),
					None,
					Some(HashMap::from([
						(format!("chain_{}", field_name), field_value),
						("path".to_string(), file_path.to_string()),
					])),
				));
			}
		}
		Ok(())
	}
}
