use mockito::{Matcher, Server};
use serde_json::json;
use std::{io::Write, time::Duration};

use evm_node_inquirer::{
	models::NodeDescriptor,
	services::blockchain::{
		BlockchainTransport, HttpTransportClient, HttpTransportConnector, TransportConnector,
		TransportError,
	},
	utils::{JitterSetting, RetryConfig},
};

fn fast_retry() -> RetryConfig {
	RetryConfig {
		max_retries: 2,
		base_for_backoff: 2,
		initial_backoff: Duration::from_millis(1),
		max_backoff: Duration::from_millis(5),
		jitter: JitterSetting::None,
	}
}

fn transport(url: &str) -> HttpTransportClient {
	HttpTransportClient::new(url, Duration::from_secs(5), &fast_retry()).unwrap()
}

#[tokio::test]
async fn test_successful_request_returns_envelope() {
	let mut server = Server::new_async().await;
	let mock = server
		.mock("POST", "/")
		.match_body(Matcher::PartialJson(json!({
			"jsonrpc": "2.0",
			"method": "eth_getBalance",
			"params": ["0x0000000000000000000000000000000000000000", "latest"]
		})))
		.with_header("content-type", "application/json")
		.with_status(200)
		.with_body(r#"{"jsonrpc":"2.0","id":1,"result":"0x1bc16d674ec80000"}"#)
		.create_async()
		.await;

	let response = transport(&server.url())
		.send_raw_request(
			"eth_getBalance",
			Some(vec![
				json!("0x0000000000000000000000000000000000000000"),
				json!("latest"),
			]),
		)
		.await
		.unwrap();

	assert_eq!(response["result"], "0x1bc16d674ec80000");
	mock.assert_async().await;
}

#[tokio::test]
async fn test_rpc_error_object() {
	let mut server = Server::new_async().await;
	let mock = server
		.mock("POST", "/")
		.with_status(200)
		.with_body(
			r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32005,"message":"query returned more than 10000 results"}}"#,
		)
		.create_async()
		.await;

	let result = transport(&server.url())
		.send_raw_request("eth_getLogs", None)
		.await;

	match result {
		Err(TransportError::Rpc { code, message, .. }) => {
			assert_eq!(code, -32005);
			assert_eq!(message, "query returned more than 10000 results");
		}
		other => panic!("Expected RPC error, got {:?}", other),
	}
	mock.assert_async().await;
}

#[tokio::test]
async fn test_server_error_is_retried() {
	let mut server = Server::new_async().await;
	let expected_attempts = 1 + fast_retry().max_retries;
	let mock = server
		.mock("POST", "/")
		.with_status(503)
		.with_body("upstream unavailable")
		.expect(expected_attempts as usize)
		.create_async()
		.await;

	let result = transport(&server.url())
		.send_raw_request("eth_blockNumber", None)
		.await;

	match result {
		Err(TransportError::Http {
			status_code, body, ..
		}) => {
			assert_eq!(status_code.as_u16(), 503);
			assert_eq!(body, "upstream unavailable");
		}
		other => panic!("Expected HTTP error, got {:?}", other),
	}
	mock.assert_async().await;
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
	let mut server = Server::new_async().await;
	let mock = server
		.mock("POST", "/")
		.with_status(400)
		.with_body("bad request")
		.expect(1)
		.create_async()
		.await;

	let result = transport(&server.url())
		.send_raw_request("eth_blockNumber", None)
		.await;

	assert!(matches!(result, Err(TransportError::Http { .. })));
	mock.assert_async().await;
}

#[tokio::test]
async fn test_rate_limited_node_is_not_retried() {
	let mut server = Server::new_async().await;
	let mock = server
		.mock("POST", "/")
		.with_status(429)
		.with_body("too many requests")
		.expect(1)
		.create_async()
		.await;

	let result = transport(&server.url())
		.send_raw_request("eth_blockNumber", None)
		.await;

	match result {
		Err(TransportError::Http { status_code, .. }) => assert_eq!(status_code.as_u16(), 429),
		other => panic!("Expected HTTP error, got {:?}", other),
	}
	mock.assert_async().await;
}

#[tokio::test]
async fn test_malformed_body() {
	let mut server = Server::new_async().await;
	let mock = server
		.mock("POST", "/")
		.with_status(200)
		.with_body("<html>not json</html>")
		.create_async()
		.await;

	let result = transport(&server.url())
		.send_raw_request("eth_blockNumber", None)
		.await;

	assert!(matches!(result, Err(TransportError::ResponseParse(_))));
	mock.assert_async().await;
}

#[tokio::test]
async fn test_slow_response_is_a_timeout() {
	let mut server = Server::new_async().await;
	let _mock = server
		.mock("POST", "/")
		.with_status(200)
		.with_chunked_body(|writer| {
			std::thread::sleep(Duration::from_millis(800));
			writer.write_all(br#"{"jsonrpc":"2.0","id":1,"result":"0x1"}"#)
		})
		.create_async()
		.await;

	let client =
		HttpTransportClient::new(&server.url(), Duration::from_millis(200), &fast_retry()).unwrap();
	let result = client.send_raw_request("eth_blockNumber", None).await;

	assert!(matches!(result, Err(TransportError::Timeout(_))));
}

#[tokio::test]
async fn test_invalid_endpoint() {
	let result = HttpTransportClient::new("not a url", Duration::from_secs(1), &fast_retry());
	assert!(matches!(result, Err(TransportError::Network(_))));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_a_network_error() {
	let result = transport("http://127.0.0.1:1")
		.send_raw_request("eth_blockNumber", None)
		.await;
	assert!(matches!(result, Err(TransportError::Network(_))));
}

#[tokio::test]
async fn test_connector_opens_transport_for_node() {
	let connector = HttpTransportConnector::new(Duration::from_secs(5), fast_retry());
	let node = NodeDescriptor::rpc("own", "https://node.example.org/rpc", true);

	let transport = connector.connect(&node).await.unwrap();
	assert_eq!(
		transport.get_current_url().await,
		"https://node.example.org/rpc"
	);
}
