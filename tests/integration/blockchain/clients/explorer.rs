use alloy::primitives::{Address, B256, U256};
use mockito::{Matcher, Server};
use std::{
	str::FromStr,
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	},
	time::Duration,
};

use evm_node_inquirer::{
	models::{ExplorerConfig, LogFilter},
	services::blockchain::{BlockExplorer, EtherscanLikeClient, TransportError},
	utils::{JitterSetting, RetryConfig},
};

fn explorer(url: &str, max_rate_limit_retries: usize, api_key: Option<&str>) -> EtherscanLikeClient {
	explorer_with_retry(url, max_rate_limit_retries, api_key, 0)
}

fn explorer_with_retry(
	url: &str,
	max_rate_limit_retries: usize,
	api_key: Option<&str>,
	max_http_retries: u32,
) -> EtherscanLikeClient {
	EtherscanLikeClient::new(
		&ExplorerConfig {
			name: "etherscan".to_string(),
			url: url.to_string(),
			api_key_env: None,
			page_limit: 1000,
			max_rate_limit_retries,
		},
		1,
		api_key.map(str::to_string),
		Duration::from_secs(5),
		RetryConfig {
			max_retries: max_http_retries,
			base_for_backoff: 2,
			initial_backoff: Duration::from_millis(1),
			max_backoff: Duration::from_millis(5),
			jitter: JitterSetting::None,
		},
	)
	.unwrap()
}

fn action(module: &str, action: &str) -> Matcher {
	Matcher::AllOf(vec![
		Matcher::UrlEncoded("chainid".into(), "1".into()),
		Matcher::UrlEncoded("module".into(), module.into()),
		Matcher::UrlEncoded("action".into(), action.into()),
	])
}

#[tokio::test]
async fn test_block_number_sends_api_key() {
	let mut server = Server::new_async().await;
	let mock = server
		.mock("GET", "/")
		.match_query(Matcher::AllOf(vec![
			action("proxy", "eth_blockNumber"),
			Matcher::UrlEncoded("apikey".into(), "secret".into()),
		]))
		.with_status(200)
		.with_body(r#"{"jsonrpc":"2.0","id":83,"result":"0x1234ab"}"#)
		.create_async()
		.await;

	let block_number = explorer(&server.url(), 0, Some("secret"))
		.block_number()
		.await
		.unwrap();

	assert_eq!(block_number, 0x1234ab);
	mock.assert_async().await;
}

#[tokio::test]
async fn test_rate_limit_backs_off_then_succeeds() {
	let mut server = Server::new_async().await;
	let hits = Arc::new(AtomicUsize::new(0));
	let counter = hits.clone();
	let mock = server
		.mock("GET", "/")
		.match_query(action("account", "balance"))
		.with_status(200)
		.with_body_from_request(move |_| {
			if counter.fetch_add(1, Ordering::SeqCst) == 0 {
				br#"{"status":"0","message":"NOTOK","result":"Max rate limit reached"}"#.to_vec()
			} else {
				br#"{"status":"1","message":"OK","result":"1000000000000000000"}"#.to_vec()
			}
		})
		.expect(2)
		.create_async()
		.await;

	let balance = explorer(&server.url(), 3, None)
		.get_balance(Address::repeat_byte(0x42))
		.await
		.unwrap();

	assert_eq!(balance, U256::from(1_000_000_000_000_000_000u64));
	assert_eq!(hits.load(Ordering::SeqCst), 2);
	mock.assert_async().await;
}

#[tokio::test]
async fn test_persistent_429_is_rate_limited() {
	let mut server = Server::new_async().await;
	let mock = server
		.mock("GET", "/")
		.match_query(action("proxy", "eth_blockNumber"))
		.with_status(429)
		.expect(3)
		.create_async()
		.await;

	let result = explorer(&server.url(), 2, None).block_number().await;

	assert!(matches!(result, Err(TransportError::RateLimited(_))));
	mock.assert_async().await;
}

#[tokio::test]
async fn test_rate_limit_budget_is_taken_from_config() {
	let mut server = Server::new_async().await;
	let max_rate_limit_retries = 5;
	let mock = server
		.mock("GET", "/")
		.match_query(action("proxy", "eth_blockNumber"))
		.with_status(429)
		.expect(1 + max_rate_limit_retries)
		.create_async()
		.await;

	// The HTTP layer has its own retry budget, which must not apply to 429s on top
	let result = explorer_with_retry(&server.url(), max_rate_limit_retries, None, 2)
		.block_number()
		.await;

	assert!(matches!(result, Err(TransportError::RateLimited(_))));
	mock.assert_async().await;
}

#[tokio::test]
async fn test_logs_page_options() {
	let mut server = Server::new_async().await;
	let topic = B256::repeat_byte(0xdd);
	let address = Address::repeat_byte(0x11);
	let mock = server
		.mock("GET", "/")
		.match_query(Matcher::AllOf(vec![
			action("logs", "getLogs"),
			Matcher::UrlEncoded("fromBlock".into(), "100".into()),
			Matcher::UrlEncoded("toBlock".into(), "200".into()),
			Matcher::UrlEncoded("page".into(), "1".into()),
			Matcher::UrlEncoded("offset".into(), "1000".into()),
			Matcher::UrlEncoded("address".into(), address.to_string()),
			Matcher::UrlEncoded("topic0".into(), topic.to_string()),
		]))
		.with_status(200)
		.with_body(format!(
			r#"{{"status":"1","message":"OK","result":[{{
				"address":"{address}",
				"topics":["{topic}"],
				"data":"0x",
				"blockNumber":"0x64",
				"blockHash":"{topic}",
				"timeStamp":"0x6543a1b0",
				"gasPrice":"0x3b9aca00",
				"logIndex":"0x",
				"transactionHash":"{topic}",
				"transactionIndex":"0x"
			}}]}}"#
		))
		.create_async()
		.await;

	let logs = explorer(&server.url(), 0, None)
		.get_logs(&LogFilter::new(vec![address], vec![Some(topic)]), 100, 200)
		.await
		.unwrap();

	assert_eq!(logs.len(), 1);
	assert_eq!(logs[0].block_number, 100);
	assert_eq!(logs[0].log_index, 0);
	mock.assert_async().await;
}

#[tokio::test]
async fn test_no_records_is_an_empty_page() {
	let mut server = Server::new_async().await;
	let mock = server
		.mock("GET", "/")
		.match_query(action("logs", "getLogs"))
		.with_status(200)
		.with_body(r#"{"status":"0","message":"No records found","result":[]}"#)
		.create_async()
		.await;

	let logs = explorer(&server.url(), 0, None)
		.get_logs(&LogFilter::default(), 0, 10)
		.await
		.unwrap();

	assert!(logs.is_empty());
	mock.assert_async().await;
}

#[tokio::test]
async fn test_invalid_address_is_invalid_request() {
	let mut server = Server::new_async().await;
	let _mock = server
		.mock("GET", "/")
		.match_query(action("account", "balance"))
		.with_status(200)
		.with_body(r#"{"status":"0","message":"NOTOK","result":"Error! Invalid address format"}"#)
		.create_async()
		.await;

	let result = explorer(&server.url(), 0, None)
		.get_balance(Address::ZERO)
		.await;

	assert!(matches!(result, Err(TransportError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_contract_creation_hash() {
	let mut server = Server::new_async().await;
	let creation = "0x0ab2bd8e1d5ad43d4fe6b8c9a0b5a1e49e1a34bb4f4ad9dd0b4c3e0b6b7a3cdd";
	let address = Address::repeat_byte(0x06);
	let mock = server
		.mock("GET", "/")
		.match_query(Matcher::AllOf(vec![
			action("contract", "getcontractcreation"),
			Matcher::UrlEncoded("contractaddresses".into(), address.to_string()),
		]))
		.with_status(200)
		.with_body(format!(
			r#"{{"status":"1","message":"OK","result":[{{"contractAddress":"{}","contractCreator":"0x0000000000000000000000000000000000000001","txHash":"{}"}}]}}"#,
			address, creation
		))
		.create_async()
		.await;

	let hash = explorer(&server.url(), 0, None)
		.contract_creation_hash(address)
		.await
		.unwrap();

	assert_eq!(hash, Some(B256::from_str(creation).unwrap()));
	mock.assert_async().await;
}

#[tokio::test]
async fn test_block_number_by_timestamp() {
	let mut server = Server::new_async().await;
	let _found = server
		.mock("GET", "/")
		.match_query(Matcher::AllOf(vec![
			action("block", "getblocknobytime"),
			Matcher::UrlEncoded("timestamp".into(), "1700000000".into()),
			Matcher::UrlEncoded("closest".into(), "before".into()),
		]))
		.with_status(200)
		.with_body(r#"{"status":"1","message":"OK","result":"18573049"}"#)
		.create_async()
		.await;
	let _before_genesis = server
		.mock("GET", "/")
		.match_query(Matcher::AllOf(vec![
			action("block", "getblocknobytime"),
			Matcher::UrlEncoded("timestamp".into(), "1".into()),
		]))
		.with_status(200)
		.with_body(r#"{"status":"0","message":"NOTOK","result":"Error! No closest block found"}"#)
		.create_async()
		.await;

	let client = explorer(&server.url(), 0, None);
	assert_eq!(
		client.block_number_by_timestamp(1_700_000_000).await.unwrap(),
		18_573_049
	);
	assert_eq!(client.block_number_by_timestamp(1).await.unwrap(), 0);
}

#[tokio::test]
async fn test_missing_receipt_is_none() {
	let mut server = Server::new_async().await;
	let _mock = server
		.mock("GET", "/")
		.match_query(action("proxy", "eth_getTransactionReceipt"))
		.with_status(200)
		.with_body(r#"{"jsonrpc":"2.0","id":1,"result":null}"#)
		.create_async()
		.await;

	let receipt = explorer(&server.url(), 0, None)
		.get_transaction_receipt(B256::repeat_byte(0x01))
		.await
		.unwrap();
	assert!(receipt.is_none());
}
