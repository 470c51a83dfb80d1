//! Command line front end for querying one EVM chain.
//!
//! Every command resolves the chain named by `--chain` from the chain configuration directory,
//! builds an inquirer for it and prints the answer as JSON on stdout. Logs go to stdout or to a
//! rolling file depending on the `--log-*` flags.

pub mod bootstrap;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

use crate::{
	bootstrap::{describe_chain, initialize_inquirer, load_chain, Result},
	models::{BlockId, LogFilter, TokenKind},
	services::blockchain::{EvmNodeInquirer, InquirerError},
	utils::{logging::setup_logging, parse_string_to_bytes_size},
};

use alloy::primitives::{Address, B256};
use clap::{Parser, Subcommand};
use dotenvy::dotenv_override;
use serde_json::{json, Value};
use std::{
	env::{set_var, var},
	path::PathBuf,
	str::FromStr,
};
use tracing::{error, info};

#[derive(Parser)]
#[command(
	name = "evm-node-inquirer",
	about = "Queries an EVM chain through a weighted set of JSON-RPC nodes with a block explorer as the last resort.",
	version
)]
struct Cli {
	/// Chain to query, by slug or chain id
	#[arg(long, value_name = "CHAIN", default_value = "ethereum")]
	chain: String,

	/// Directory holding the chain JSON files (default: config/chains, or CHAINS_CONFIG_DIR)
	#[arg(long, value_name = "PATH")]
	config_dir: Option<PathBuf>,

	/// Write logs to file instead of stdout
	#[arg(long)]
	log_file: bool,

	/// Set log level (trace, debug, info, warn, error)
	#[arg(long, value_name = "LEVEL")]
	log_level: Option<String>,

	/// Path to store log files (default: logs/)
	#[arg(long, value_name = "PATH")]
	log_path: Option<String>,

	/// Maximum log file size before rolling (e.g., "1GB", "500MB", "1024KB")
	#[arg(long, value_name = "SIZE", value_parser = parse_string_to_bytes_size)]
	log_max_size: Option<u64>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Latest block number
	BlockNumber,

	/// Native balance of an account
	Balance {
		address: Address,
		/// Historical block; queries it through archive nodes only
		#[arg(long)]
		block: Option<u64>,
	},

	/// Deployed bytecode of an account
	Code {
		address: Address,
		#[arg(long)]
		block: Option<u64>,
	},

	/// Event logs over an inclusive block range
	Logs {
		#[arg(long = "address", value_name = "ADDRESS")]
		addresses: Vec<Address>,
		/// Positional topic; `*` matches anything
		#[arg(long = "topic", value_name = "TOPIC")]
		topics: Vec<TopicArg>,
		#[arg(long)]
		from: u64,
		#[arg(long)]
		to: u64,
	},

	/// Transaction receipt, or null when no source knows the transaction
	Receipt { hash: B256 },

	/// Name, symbol and decimals of a token contract
	Token {
		address: Address,
		/// Treat the contract as an NFT collection, which has no decimals
		#[arg(long)]
		nft: bool,
	},

	/// Block in which a contract was deployed
	CreationBlock { address: Address },

	/// Last block mined at or before a unix timestamp
	BlockByTime { timestamp: u64 },

	/// Connects to every node and prints a call order with the connection state
	Nodes,
}

/// Topic filter slot given on the command line
#[derive(Debug, Clone, Copy)]
struct TopicArg(Option<B256>);

impl FromStr for TopicArg {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s.trim() {
			"*" | "" => Ok(Self(None)),
			topic => B256::from_str(topic)
				.map(|hash| Self(Some(hash)))
				.map_err(|e| format!("Invalid topic '{}': {}", topic, e)),
		}
	}
}

impl Cli {
	/// Apply CLI options to environment variables, overriding any existing values
	fn apply_to_env(&self) {
		dotenv_override().ok();

		if self.log_file {
			set_var("LOG_MODE", "file");
		}

		if let Ok(level) = var("RUST_LOG") {
			set_var("LOG_LEVEL", level);
		}

		if let Some(level) = &self.log_level {
			set_var("LOG_LEVEL", level);
			set_var("RUST_LOG", level);
		}

		if let Some(path) = &self.log_path {
			set_var("LOG_DATA_DIR", path);
		}

		if let Some(max_size) = &self.log_max_size {
			set_var("LOG_MAX_SIZE", max_size.to_string());
		}
	}

	fn config_dir(&self) -> Option<PathBuf> {
		self.config_dir
			.clone()
			.or_else(|| var("CHAINS_CONFIG_DIR").ok().map(PathBuf::from))
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();
	cli.apply_to_env();

	setup_logging().unwrap_or_else(|e| {
		error!("Failed to setup logging: {}", e);
	});

	let config_dir = cli.config_dir();
	let chain = load_chain(config_dir.as_deref(), &cli.chain)
		.await
		.map_err(|e| anyhow::anyhow!("Failed to load chain '{}': {}", cli.chain, e))?;
	info!(chain = %chain.slug, "Loaded chain configuration");

	let inquirer = initialize_inquirer(chain)?;
	let output = run_command(&inquirer, cli.command).await;
	inquirer.shutdown();

	let output = output.inspect_err(|e| error!("Command failed: {}", e))?;
	println!("{}", serde_json::to_string_pretty(&output)?);
	Ok(())
}

async fn run_command(
	inquirer: &EvmNodeInquirer,
	command: Command,
) -> std::result::Result<Value, InquirerError> {
	match command {
		Command::BlockNumber => {
			let block_number = inquirer.get_block_number(None).await?;
			Ok(json!({ "block_number": block_number }))
		}
		Command::Balance { address, block } => {
			let block = block.map_or(BlockId::Latest, BlockId::Number);
			let balance = inquirer.get_balance(address, block, None).await?;
			Ok(json!({
				"address": address,
				"block": block.to_string(),
				"balance": balance.to_string(),
			}))
		}
		Command::Code { address, block } => {
			let block = block.map_or(BlockId::Latest, BlockId::Number);
			let code = inquirer.get_code(address, block, None).await?;
			Ok(json!({ "address": address, "block": block.to_string(), "code": code }))
		}
		Command::Logs {
			addresses,
			topics,
			from,
			to,
		} => {
			let filter = LogFilter::new(addresses, topics.into_iter().map(|t| t.0).collect());
			let logs = inquirer.get_logs(filter, from, to, None).await?;
			Ok(json!(logs))
		}
		Command::Receipt { hash } => {
			let receipt = inquirer.get_transaction_receipt(hash, false, None).await?;
			Ok(receipt.unwrap_or(Value::Null))
		}
		Command::Token { address, nft } => {
			let kind = if nft {
				TokenKind::NonFungible
			} else {
				TokenKind::Fungible
			};
			let metadata = inquirer.token_metadata(address, kind, false).await?;
			Ok(json!(metadata))
		}
		Command::CreationBlock { address } => {
			let block = inquirer.contract_creation_block(address).await?;
			Ok(json!({ "address": address, "creation_block": block }))
		}
		Command::BlockByTime { timestamp } => {
			let block_number = inquirer.block_number_by_timestamp(timestamp).await?;
			Ok(json!({ "timestamp": timestamp, "block_number": block_number }))
		}
		Command::Nodes => {
			inquirer.connect_to_nodes().await;
			inquirer.connections().join_pending().await;

			let connections = inquirer.connections();
			let mut sources = Vec::new();
			for entry in inquirer.call_order(false).iter() {
				let live = connections.live_node(entry.name()).await;
				sources.push(json!({
					"name": entry.name(),
					"endpoint": entry.node.endpoint,
					"kind": entry.node.kind,
					"owned": entry.node.owned,
					"weight": entry.weight.to_string(),
					"connected": live.is_some() || entry.node.is_explorer(),
					"dead": connections.is_dead(entry.name()).await,
					"archive": live.as_ref().map(|node| node.is_archive),
					"pruned": live.as_ref().map(|node| node.is_pruned),
				}));
			}

			Ok(json!({
				"chain": describe_chain(inquirer.chain()),
				"call_order": sources,
			}))
		}
	}
}
