//! Bootstrap module for building an [`EvmNodeInquirer`] from configuration.
//!
//! - `load_chain`: Loads the chain definitions and resolves the one a command targets
//! - `create_explorer`: Builds the Etherscan compatible client for a chain, if it has one
//! - `initialize_inquirer`: Wires the HTTP connector and the explorer into an inquirer

use std::{collections::HashMap, env, error::Error, path::Path, sync::Arc};

use crate::{
	models::{ChainConfig, ExplorerConfig},
	repositories::{ChainRepository, ChainService, RepositoryError},
	services::blockchain::{
		BlockExplorer, EtherscanLikeClient, EvmNodeInquirer, HttpTransportConnector,
		InquirerError,
	},
};

pub type Result<T> = std::result::Result<T, Box<dyn Error>>;

/// Loads every chain under `config_dir` (or the default directory) and resolves `selector`,
/// which is either a slug or a decimal chain id.
pub async fn load_chain(
	config_dir: Option<&Path>,
	selector: &str,
) -> std::result::Result<ChainConfig, RepositoryError> {
	let service = ChainService::<ChainRepository>::new_with_path(config_dir).await?;
	service.resolve(selector)
}

/// Reads the explorer API key from the variable named by `api_key_env`.
///
/// A missing or blank variable means requests go out without a key.
pub fn explorer_api_key(config: &ExplorerConfig) -> Option<String> {
	config
		.api_key_env
		.as_ref()
		.and_then(|name| env::var(name).ok())
		.map(|key| key.trim().to_string())
		.filter(|key| !key.is_empty())
}

/// Builds the explorer client for `chain`, or `None` when the chain has no explorer.
pub fn create_explorer(
	chain: &ChainConfig,
) -> std::result::Result<Option<Arc<dyn BlockExplorer>>, InquirerError> {
	let Some(config) = chain.explorer.as_ref() else {
		return Ok(None);
	};

	let client = EtherscanLikeClient::new(
		config,
		chain.chain_id,
		explorer_api_key(config),
		chain.rpc_timeout(),
		chain.retry.clone(),
	)
	.map_err(|e| {
		InquirerError::Other(anyhow::anyhow!(
			"Failed to create explorer client for {}: {}",
			chain.slug,
			e
		))
	})?;

	Ok(Some(Arc::new(client)))
}

/// Builds an inquirer for `chain` over HTTP JSON-RPC.
///
/// No connection is opened here; call [`EvmNodeInquirer::connect_to_nodes`] to warm the nodes
/// up in the background, or let the first query connect lazily.
pub fn initialize_inquirer(
	chain: ChainConfig,
) -> std::result::Result<EvmNodeInquirer, InquirerError> {
	let connector = Arc::new(HttpTransportConnector::new(
		chain.rpc_timeout(),
		chain.retry.clone(),
	));
	let explorer = create_explorer(&chain)?;

	tracing::debug!(
		chain = %chain.slug,
		nodes = chain.nodes.len(),
		explorer = explorer.is_some(),
		"Initialized inquirer"
	);

	Ok(EvmNodeInquirer::new(chain, connector, explorer))
}

/// Summarizes a chain for the `nodes` command.
pub fn describe_chain(chain: &ChainConfig) -> HashMap<String, String> {
	HashMap::from([
		("slug".to_string(), chain.slug.clone()),
		("name".to_string(), chain.name.clone()),
		("chain_id".to_string(), chain.chain_id.to_string()),
		(
			"network_id".to_string(),
			chain.expected_network_id().to_string(),
		),
	])
}
