use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};

use evm_node_inquirer::{
	models::{ArchiveProbe, ChainConfig, NodeDescriptor},
	services::blockchain::{
		BlockchainTransport, ConnectFailure, ConnectionAttempt, ConnectionManager,
		TransportConnector, TransportError,
	},
	utils::tests::builders::chain::ChainBuilder,
};

use crate::integration::mocks::{
	MockConnector, MockTransport, ScriptedConnector, ScriptedTransport,
};

fn probe() -> ArchiveProbe {
	ArchiveProbe {
		address: Address::repeat_byte(0x50),
		block_number: 87042,
		expected_balance: U256::from(5_106_330_700_000_000_000u64),
	}
}

fn chain() -> ChainConfig {
	ChainBuilder::new()
		.owned_node("own", "http://10.0.0.1:8545")
		.node("infura", "https://mainnet.infura.io/v3/key", false, "0.5")
		.explorer("etherscan", "https://api.etherscan.io/v2/api")
		.build()
}

fn descriptor(chain: &ChainConfig, name: &str) -> NodeDescriptor {
	chain
		.nodes
		.iter()
		.find(|node| node.name() == name)
		.map(|node| node.node.clone())
		.unwrap()
}

#[tokio::test]
async fn test_connect_is_idempotent() {
	let chain = chain();
	let transport = ScriptedTransport::healthy("http://10.0.0.1:8545", 1).into_arc();
	let connector = ScriptedConnector::new().with("own", transport.clone()).into_arc();
	let manager = ConnectionManager::new(&chain, connector.clone());
	let node = descriptor(&chain, "own");

	let first = manager.attempt_connect(&node).await;
	let second = manager.attempt_connect(&node).await;

	assert!(first.is_ok());
	assert!(second.is_ok());
	assert!(second.message().contains("Already connected"));
	assert_eq!(connector.connect_count("own"), 1);
	assert_eq!(transport.call_count("eth_blockNumber"), 1);
	assert_eq!(transport.call_count("net_version"), 1);
	assert_eq!(manager.connected_count().await, 1);
}

#[tokio::test]
async fn test_no_probes_configured_means_archive_and_unpruned() {
	let chain = chain();
	let transport = ScriptedTransport::healthy("http://10.0.0.1:8545", 1).into_arc();
	let connector = ScriptedConnector::new().with("own", transport.clone()).into_arc();
	let manager = ConnectionManager::new(&chain, connector);

	let attempt = manager.attempt_connect(&descriptor(&chain, "own")).await;
	let live = attempt.live_node().unwrap();

	assert!(live.is_archive);
	assert!(!live.is_pruned);
	assert_eq!(transport.call_count("eth_getBalance"), 0);
	assert_eq!(transport.call_count("eth_getTransactionByHash"), 0);
}

#[tokio::test]
async fn test_network_mismatch_is_not_dead() {
	let chain = chain();
	let transport = ScriptedTransport::healthy("http://10.0.0.1:8545", 5).into_arc();
	let connector = ScriptedConnector::new().with("own", transport).into_arc();
	let manager = ConnectionManager::new(&chain, connector.clone());
	let node = descriptor(&chain, "own");

	match manager.attempt_connect(&node).await {
		ConnectionAttempt::Failed {
			reason: ConnectFailure::Mismatch { expected, reported },
			message,
		} => {
			assert_eq!((expected, reported), (1, 5));
			assert!(message.contains("reports network id 5"));
		}
		other => panic!("Expected a mismatch, got {:?}", other),
	}

	assert!(!manager.is_dead("own").await);
	manager.attempt_connect(&node).await;
	assert_eq!(connector.connect_count("own"), 2);
}

#[tokio::test]
async fn test_mismatched_node_skips_capability_checks() {
	let chain = ChainBuilder::new()
		.owned_node("own", "http://10.0.0.1:8545")
		.archive_probe(probe())
		.build();
	let mut transport = MockTransport::new();
	transport
		.expect_send_raw_request()
		.withf(|method, _| method.to_string() == "eth_blockNumber")
		.times(1)
		.returning(|_, _| Ok(json!({"jsonrpc": "2.0", "id": 1, "result": "0x112a880"})));
	transport
		.expect_send_raw_request()
		.withf(|method, _| method.to_string() == "net_version")
		.times(1)
		.returning(|_, _| Ok(json!({"jsonrpc": "2.0", "id": 1, "result": "5"})));
	transport
		.expect_send_raw_request()
		.withf(|method, _| method.to_string() == "eth_getBalance")
		.never();
	let transport: Arc<dyn BlockchainTransport> = Arc::new(transport);

	let mut connector = MockConnector::new();
	connector
		.expect_connect()
		.times(1)
		.returning(move |_| Ok(transport.clone()));
	let manager = ConnectionManager::new(&chain, Arc::new(connector));

	let attempt = manager.attempt_connect(&descriptor(&chain, "own")).await;

	assert!(matches!(
		attempt,
		ConnectionAttempt::Failed {
			reason: ConnectFailure::Mismatch { .. },
			..
		}
	));
}

#[tokio::test]
async fn test_hex_network_id_accepted() {
	let chain = ChainBuilder::new()
		.chain_id(100)
		.owned_node("own", "http://10.0.0.1:8545")
		.build();
	let transport = ScriptedTransport::new("http://10.0.0.1:8545")
		.returning("eth_blockNumber", json!("0x1"))
		.returning("net_version", json!("0x64"))
		.into_arc();
	let connector = ScriptedConnector::new().with("own", transport).into_arc();
	let manager = ConnectionManager::new(&chain, connector);

	assert!(manager
		.attempt_connect(&descriptor(&chain, "own"))
		.await
		.is_ok());
}

#[tokio::test]
async fn test_unreachable_node_is_dead() {
	let chain = chain();
	let mut connector = MockConnector::new();
	connector.expect_connect().times(1).returning(|node| {
		Err(TransportError::network(
			format!("connection refused by {}", node.endpoint),
			None,
			None,
		))
	});
	let manager = ConnectionManager::new(&chain, Arc::new(connector));
	let node = descriptor(&chain, "infura");

	let attempt = manager.attempt_connect(&node).await;
	assert!(matches!(
		attempt,
		ConnectionAttempt::Failed {
			reason: ConnectFailure::Transport(_),
			..
		}
	));
	assert!(attempt.message().contains("Failed to connect"));
	assert!(manager.is_dead("infura").await);
	assert_eq!(manager.dead_nodes().await, vec!["infura".to_string()]);

	// dead nodes are never handed to the connector again
	manager.connect_multiple(&[node]).await;
	manager.join_pending().await;
}

#[tokio::test]
async fn test_failed_liveness_probe_is_dead() {
	let chain = chain();
	let transport = ScriptedTransport::new("http://10.0.0.1:8545")
		.failing_with_timeout("eth_blockNumber")
		.into_arc();
	let connector = ScriptedConnector::new().with("own", transport.clone()).into_arc();
	let manager = ConnectionManager::new(&chain, connector);

	assert!(!manager
		.attempt_connect(&descriptor(&chain, "own"))
		.await
		.is_ok());
	assert!(manager.is_dead("own").await);
	assert_eq!(transport.call_count("net_version"), 0);
}

#[tokio::test]
async fn test_archive_probe() {
	let chain = ChainBuilder::new()
		.owned_node("archive", "http://10.0.0.1:8545")
		.owned_node("full", "http://10.0.0.2:8545")
		.archive_probe(probe())
		.build();
	let archive = ScriptedTransport::healthy("http://10.0.0.1:8545", 1)
		.returning("eth_getBalance", json!("0x46dd54b7972bf800"))
		.into_arc();
	let full = ScriptedTransport::healthy("http://10.0.0.2:8545", 1)
		.on("eth_getBalance", |_| {
			Err(TransportError::rpc(
				-32000,
				"missing trie node 0f2a (path ) state is not available",
				None,
			))
		})
		.into_arc();
	let connector = ScriptedConnector::new()
		.with("archive", archive.clone())
		.with("full", full)
		.into_arc();
	let manager = ConnectionManager::new(&chain, connector);

	let archive_node = manager.attempt_connect(&descriptor(&chain, "archive")).await;
	let full_node = manager.attempt_connect(&descriptor(&chain, "full")).await;

	assert!(archive_node.live_node().unwrap().is_archive);
	assert!(!full_node.live_node().unwrap().is_archive);
	assert_eq!(
		archive.calls("eth_getBalance")[0][1],
		Value::String("0x15402".to_string())
	);
}

#[tokio::test]
async fn test_pruned_probe() {
	let probe_tx = B256::repeat_byte(0x5c);
	let chain = ChainBuilder::new()
		.owned_node("pruned", "http://10.0.0.1:8545")
		.owned_node("complete", "http://10.0.0.2:8545")
		.owned_node("flaky", "http://10.0.0.3:8545")
		.pruned_probe_tx(probe_tx)
		.build();
	let pruned = ScriptedTransport::healthy("http://10.0.0.1:8545", 1)
		.returning("eth_getTransactionByHash", Value::Null)
		.into_arc();
	let complete = ScriptedTransport::healthy("http://10.0.0.2:8545", 1)
		.returning("eth_getTransactionByHash", json!({"hash": probe_tx}))
		.into_arc();
	let flaky = ScriptedTransport::healthy("http://10.0.0.3:8545", 1)
		.on("eth_getTransactionByHash", |_| {
			Err(TransportError::rpc(-32603, "internal error", None))
		})
		.into_arc();
	let connector = ScriptedConnector::new()
		.with("pruned", pruned)
		.with("complete", complete)
		.with("flaky", flaky)
		.into_arc();
	let manager = ConnectionManager::new(&chain, connector);

	for (name, expected) in [("pruned", true), ("complete", false), ("flaky", false)] {
		let attempt = manager.attempt_connect(&descriptor(&chain, name)).await;
		assert_eq!(attempt.live_node().unwrap().is_pruned, expected, "{}", name);
	}
}

#[tokio::test]
async fn test_capability_override_skips_probes() {
	let chain = ChainBuilder::new()
		.node("llamarpc", "https://eth.llamarpc.com", false, "1")
		.archive_probe(probe())
		.pruned_probe_tx(B256::repeat_byte(0x5c))
		.build();
	let transport = ScriptedTransport::healthy("https://eth.llamarpc.com", 1).into_arc();
	let connector = ScriptedConnector::new()
		.with("llamarpc", transport.clone())
		.into_arc();
	let manager = ConnectionManager::new(&chain, connector);

	let attempt = manager
		.attempt_connect(&descriptor(&chain, "llamarpc"))
		.await;
	let live = attempt.live_node().unwrap();

	assert!(live.is_pruned);
	assert!(!live.is_archive);
	assert_eq!(transport.call_count("eth_getBalance"), 0);
	assert_eq!(transport.call_count("eth_getTransactionByHash"), 0);
}

#[tokio::test]
async fn test_connect_multiple_in_background() {
	let chain = chain();
	let connector = ScriptedConnector::new()
		.with("own", ScriptedTransport::healthy("http://10.0.0.1:8545", 1).into_arc())
		.with(
			"infura",
			ScriptedTransport::healthy("https://mainnet.infura.io/v3/key", 1).into_arc(),
		)
		.into_arc();
	let manager = ConnectionManager::new(&chain, connector.clone());

	let mut nodes: Vec<NodeDescriptor> = chain.nodes.iter().map(|n| n.node.clone()).collect();
	nodes.extend(chain.explorer_descriptor());
	manager.connect_multiple(&nodes).await;
	manager.join_pending().await;

	assert_eq!(manager.connected_count().await, 2);
	assert!(manager.live_node("own").await.is_some());
	assert!(manager.live_node("etherscan").await.is_none());
	assert_eq!(connector.connect_count("etherscan"), 0);

	// already connected nodes are skipped
	manager.connect_multiple(&nodes).await;
	manager.join_pending().await;
	assert_eq!(connector.connect_count("own"), 1);
}

/// Never finishes connecting
struct HangingConnector;

#[async_trait]
impl TransportConnector for HangingConnector {
	async fn connect(
		&self,
		_node: &NodeDescriptor,
	) -> Result<Arc<dyn BlockchainTransport>, TransportError> {
		tokio::time::sleep(Duration::from_secs(3600)).await;
		Err(TransportError::timeout("never reached", None, None))
	}
}

#[tokio::test]
async fn test_shutdown_aborts_pending_connections() {
	let chain = chain();
	let manager = ConnectionManager::new(&chain, Arc::new(HangingConnector));
	let nodes: Vec<NodeDescriptor> = chain.nodes.iter().map(|n| n.node.clone()).collect();

	manager.connect_multiple(&nodes).await;
	manager.shutdown();

	tokio::time::timeout(Duration::from_secs(5), manager.join_pending())
		.await
		.expect("aborted tasks should finish promptly");
	assert_eq!(manager.connected_count().await, 0);
	assert!(manager.dead_nodes().await.is_empty());
}

#[tokio::test]
async fn test_mark_dead_drops_live_handle() {
	let chain = chain();
	let connector = ScriptedConnector::new()
		.with("own", ScriptedTransport::healthy("http://10.0.0.1:8545", 1).into_arc())
		.into_arc();
	let manager = ConnectionManager::new(&chain, connector);

	manager.attempt_connect(&descriptor(&chain, "own")).await;
	manager.mark_dead("own").await;

	assert!(manager.is_dead("own").await);
	assert!(manager.live_node("own").await.is_none());
}
