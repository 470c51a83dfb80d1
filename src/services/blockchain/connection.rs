//! Live connections to configured sources.
//!
//! A source is connected at most once per [`ConnectionManager`]. Connecting checks liveness and
//! network identity, then probes whether the node is an archive node and whether it is pruned.
//! Sources that fail to connect at the transport level are recorded as dead and never retried
//! by this manager; a new manager starts with a clean slate.

use alloy::primitives::B256;
use std::{
	collections::HashSet,
	fmt,
	sync::{Arc, Mutex},
};
use thiserror::Error;
use tokio::{sync::RwLock, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
	models::{ArchiveProbe, BlockId, ChainConfig, NodeDescriptor},
	services::blockchain::{
		classify::capability_override,
		clients::EvmClient,
		transports::{TransportConnector, TransportError},
	},
	utils::ClientStorage,
};

/// A connected node and its probed capabilities
pub struct LiveNode {
	pub descriptor: NodeDescriptor,
	pub client: EvmClient,
	pub is_pruned: bool,
	pub is_archive: bool,
}

impl fmt::Debug for LiveNode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LiveNode")
			.field("descriptor", &self.descriptor)
			.field("is_pruned", &self.is_pruned)
			.field("is_archive", &self.is_archive)
			.finish()
	}
}

/// Why a connection attempt failed
#[derive(Debug, Error)]
pub enum ConnectFailure {
	/// The source could not be reached or did not answer the probes
	#[error(transparent)]
	Transport(TransportError),

	/// The source serves a different network
	#[error("Network id mismatch: expected {expected}, source reports {reported}")]
	Mismatch { expected: u64, reported: u64 },
}

/// Outcome of [`ConnectionManager::attempt_connect`]. Failing to connect is an expected outcome,
/// not an error.
#[derive(Debug)]
pub enum ConnectionAttempt {
	Connected {
		node: Arc<LiveNode>,
		message: String,
	},
	Failed {
		reason: ConnectFailure,
		message: String,
	},
}

impl ConnectionAttempt {
	pub fn is_ok(&self) -> bool {
		matches!(self, Self::Connected { .. })
	}

	pub fn live_node(&self) -> Option<&Arc<LiveNode>> {
		match self {
			Self::Connected { node, .. } => Some(node),
			Self::Failed { .. } => None,
		}
	}

	pub fn message(&self) -> &str {
		match self {
			Self::Connected { message, .. } | Self::Failed { message, .. } => message,
		}
	}
}

/// State shared with background connection tasks
struct ConnectionCore {
	connector: Arc<dyn TransportConnector>,
	live: ClientStorage<LiveNode>,
	dead: RwLock<HashSet<String>>,
	chain_name: String,
	expected_network_id: u64,
	archive_probe: Option<ArchiveProbe>,
	pruned_probe_tx: Option<B256>,
}

impl ConnectionCore {
	async fn attempt_connect(&self, node: &NodeDescriptor) -> ConnectionAttempt {
		if let Some(live) = self.live.get(&node.name).await {
			return ConnectionAttempt::Connected {
				node: live,
				message: format!("Already connected to {} node {}", self.chain_name, node.name),
			};
		}

		match self.connect_and_probe(node).await {
			Ok(live) => {
				let live = self.live.insert(&node.name, live).await;
				info!(
					"Connected {} node {} at {} (archive: {}, pruned: {})",
					self.chain_name, node.name, node.endpoint, live.is_archive, live.is_pruned
				);
				ConnectionAttempt::Connected {
					node: live,
					message: String::new(),
				}
			}
			Err(reason) => {
				let message = match &reason {
					ConnectFailure::Transport(e) => format!(
						"Failed to connect to {} node {} at endpoint {}: {}",
						self.chain_name, node.name, node.endpoint, e
					),
					ConnectFailure::Mismatch { expected, reported } => format!(
						"{} node {} at endpoint {} reports network id {} instead of {}",
						self.chain_name, node.name, node.endpoint, reported, expected
					),
				};
				warn!("{}", message);
				if matches!(reason, ConnectFailure::Transport(_)) {
					self.dead.write().await.insert(node.name.clone());
				}
				ConnectionAttempt::Failed { reason, message }
			}
		}
	}

	async fn connect_and_probe(&self, node: &NodeDescriptor) -> Result<LiveNode, ConnectFailure> {
		let transport = self
			.connector
			.connect(node)
			.await
			.map_err(ConnectFailure::Transport)?;
		let client = EvmClient::new_with_transport(transport);

		client
			.block_number()
			.await
			.map_err(ConnectFailure::Transport)?;

		let reported = client
			.net_version()
			.await
			.map_err(ConnectFailure::Transport)?;
		if reported != self.expected_network_id {
			return Err(ConnectFailure::Mismatch {
				expected: self.expected_network_id,
				reported,
			});
		}

		let (is_pruned, is_archive) = match capability_override(&node.endpoint) {
			Some(known) => {
				debug!("Using fixed capabilities for {}", node.name);
				(known.is_pruned, known.is_archive)
			}
			None => (
				self.probe_pruned(&client).await,
				self.probe_archive(&client).await,
			),
		};

		Ok(LiveNode {
			descriptor: node.clone(),
			client,
			is_pruned,
			is_archive,
		})
	}

	/// Archive nodes still know the balance of the probe account at the probe block.
	async fn probe_archive(&self, client: &EvmClient) -> bool {
		let Some(probe) = &self.archive_probe else {
			return true;
		};
		match client
			.get_balance(probe.address, BlockId::Number(probe.block_number))
			.await
		{
			Ok(balance) => balance == probe.expected_balance,
			Err(e) => {
				debug!("Archive probe failed, assuming not archive: {}", e);
				false
			}
		}
	}

	/// Pruned nodes no longer return the probe transaction. Only an explicit "not found" counts.
	async fn probe_pruned(&self, client: &EvmClient) -> bool {
		let Some(transaction_hash) = self.pruned_probe_tx else {
			return false;
		};
		match client.get_transaction_by_hash(transaction_hash).await {
			Ok(transaction) => transaction.is_none(),
			Err(TransportError::Rpc { message, .. }) => {
				message.to_lowercase().contains("not found")
			}
			Err(e) => {
				debug!("Pruned probe failed, assuming not pruned: {}", e);
				false
			}
		}
	}
}

/// Owns the live node handles and the dead-source set of one chain
pub struct ConnectionManager {
	core: Arc<ConnectionCore>,
	tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionManager {
	pub fn new(chain: &ChainConfig, connector: Arc<dyn TransportConnector>) -> Self {
		Self {
			core: Arc::new(ConnectionCore {
				connector,
				live: ClientStorage::new(),
				dead: RwLock::new(HashSet::new()),
				chain_name: chain.name.clone(),
				expected_network_id: chain.expected_network_id(),
				archive_probe: chain.archive_probe.clone(),
				pruned_probe_tx: chain.pruned_probe_tx,
			}),
			tasks: Mutex::new(Vec::new()),
		}
	}

	/// Connects to `node` unless already connected.
	///
	/// Transport failures add the node to the dead set. A network id mismatch does not.
	pub async fn attempt_connect(&self, node: &NodeDescriptor) -> ConnectionAttempt {
		self.core.attempt_connect(node).await
	}

	/// Starts one background connection attempt per source and returns immediately.
	///
	/// Explorers, dead sources and already connected sources are left alone.
	pub async fn connect_multiple(&self, nodes: &[NodeDescriptor]) {
		let mut spawned = Vec::new();
		for node in nodes {
			if node.is_explorer() || self.is_dead(&node.name).await {
				continue;
			}
			if self.core.live.get(&node.name).await.is_some() {
				continue;
			}

			let core = self.core.clone();
			let node = node.clone();
			spawned.push(tokio::spawn(async move {
				let attempt = core.attempt_connect(&node).await;
				debug!(
					"Background connection to {} finished (ok: {})",
					node.name,
					attempt.is_ok()
				);
			}));
		}

		let mut tasks = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
		tasks.retain(|task| !task.is_finished());
		tasks.extend(spawned);
	}

	/// Waits for every background connection attempt started so far.
	pub async fn join_pending(&self) {
		let pending: Vec<_> = {
			let mut tasks = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
			tasks.drain(..).collect()
		};
		for result in futures::future::join_all(pending).await {
			if let Err(e) = result {
				if !e.is_cancelled() {
					warn!("Background connection task failed: {}", e);
				}
			}
		}
	}

	/// Aborts background connection attempts that are still running.
	pub fn shutdown(&self) {
		let mut tasks = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
		for task in tasks.drain(..) {
			task.abort();
		}
	}

	pub async fn live_node(&self, name: &str) -> Option<Arc<LiveNode>> {
		self.core.live.get(name).await
	}

	pub async fn connected_count(&self) -> usize {
		self.core.live.len().await
	}

	pub async fn is_dead(&self, name: &str) -> bool {
		self.core.dead.read().await.contains(name)
	}

	/// Records a source as dead and drops its live handle.
	pub async fn mark_dead(&self, name: &str) {
		self.core.dead.write().await.insert(name.to_string());
		self.core.live.remove(name).await;
	}

	pub async fn dead_nodes(&self) -> Vec<String> {
		let mut names: Vec<String> = self.core.dead.read().await.iter().cloned().collect();
		names.sort();
		names
	}
}

impl Drop for ConnectionManager {
	fn drop(&mut self) {
		self.shutdown();
	}
}
