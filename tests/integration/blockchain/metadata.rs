//! Token metadata and timestamp caches.

use alloy::primitives::{Address, Bytes};
use std::{
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	time::Duration,
};

use evm_node_inquirer::{
	models::TokenKind,
	services::blockchain::{
		EvmNodeInquirer, InquirerError, TransportError, DEFAULT_DECIMALS, OLD_WETH_ADDRESS,
	},
	utils::tests::builders::chain::ChainBuilder,
};

use crate::integration::mocks::{
	abi_bytes32, abi_string, abi_uint, named_explorer, MulticallAnswers, ScriptedConnector,
	ScriptedTransport,
};

fn usdc() -> Address {
	Address::repeat_byte(0xa0)
}

fn maker() -> Address {
	Address::repeat_byte(0x9f)
}

fn answers() -> MulticallAnswers {
	MulticallAnswers::new()
		.answer(usdc(), "name()", abi_string("USD Coin"))
		.answer(usdc(), "symbol()", abi_string("USDC"))
		.answer(usdc(), "decimals()", abi_uint(6))
		.answer(maker(), "name()", abi_bytes32("Maker"))
		.answer(maker(), "symbol()", abi_bytes32("MKR"))
}

fn node(answers: MulticallAnswers) -> Arc<ScriptedTransport> {
	ScriptedTransport::healthy("http://a.invalid", 1)
		.on("eth_call", move |params| answers.execute(params))
		.into_arc()
}

fn inquirer_with(transport: Arc<ScriptedTransport>) -> EvmNodeInquirer {
	let chain = ChainBuilder::new()
		.owned_node("a", "http://a.invalid")
		.build();
	EvmNodeInquirer::new(chain, ScriptedConnector::new().with("a", transport).into_arc(), None)
}

#[tokio::test]
async fn test_metadata_is_cached() {
	let transport = node(answers());
	let inquirer = inquirer_with(transport.clone());

	let first = inquirer
		.token_metadata(usdc(), TokenKind::Fungible, false)
		.await
		.unwrap();
	let second = inquirer
		.token_metadata(usdc(), TokenKind::Fungible, false)
		.await
		.unwrap();

	assert_eq!(first.name.as_deref(), Some("USD Coin"));
	assert_eq!(first.symbol.as_deref(), Some("USDC"));
	assert_eq!(first.decimals, Some(6));
	assert_eq!(first, second);
	assert_eq!(transport.call_count("eth_call"), 1);
}

#[tokio::test]
async fn test_force_refresh_queries_again() {
	let transport = node(answers());
	let inquirer = inquirer_with(transport.clone());

	inquirer
		.token_metadata(usdc(), TokenKind::Fungible, false)
		.await
		.unwrap();
	inquirer
		.token_metadata(usdc(), TokenKind::Fungible, true)
		.await
		.unwrap();

	assert_eq!(transport.call_count("eth_call"), 2);
}

#[tokio::test]
async fn test_concurrent_refreshes_share_one_fetch() {
	let transport = ScriptedTransport::healthy("http://a.invalid", 1)
		.on("eth_call", {
			let answers = answers();
			move |params| answers.execute(params)
		})
		.with_latency(Duration::from_millis(50))
		.into_arc();
	let inquirer = inquirer_with(transport.clone());

	let (first, second) = tokio::join!(
		inquirer.token_metadata(usdc(), TokenKind::Fungible, true),
		inquirer.token_metadata(usdc(), TokenKind::Fungible, true),
	);

	assert_eq!(first.unwrap(), second.unwrap());
	assert_eq!(transport.call_count("eth_call"), 1);
}

#[tokio::test]
async fn test_bytes32_text_and_default_decimals() {
	let inquirer = inquirer_with(node(answers()));

	let metadata = inquirer
		.token_metadata(maker(), TokenKind::Fungible, false)
		.await
		.unwrap();

	assert_eq!(metadata.name.as_deref(), Some("Maker"));
	assert_eq!(metadata.symbol.as_deref(), Some("MKR"));
	assert_eq!(metadata.decimals, Some(DEFAULT_DECIMALS));
}

#[tokio::test]
async fn test_non_fungible_has_no_decimals() {
	let inquirer = inquirer_with(node(answers()));

	let metadata = inquirer
		.token_metadata(usdc(), TokenKind::NonFungible, false)
		.await
		.unwrap();

	assert_eq!(metadata.symbol.as_deref(), Some("USDC"));
	assert_eq!(metadata.decimals, None);
}

#[tokio::test]
async fn test_old_weth_is_never_queried() {
	let inquirer = EvmNodeInquirer::new(
		ChainBuilder::new().build(),
		ScriptedConnector::new().into_arc(),
		None,
	);

	let metadata = inquirer
		.token_metadata(OLD_WETH_ADDRESS, TokenKind::Fungible, true)
		.await
		.unwrap();

	assert_eq!(metadata.symbol.as_deref(), Some("WETH"));
	assert_eq!(metadata.decimals, Some(18));
}

#[tokio::test]
async fn test_many_tokens_fetch_only_misses() {
	let transport = node(answers());
	let inquirer = inquirer_with(transport.clone());
	inquirer
		.token_metadata(usdc(), TokenKind::Fungible, false)
		.await
		.unwrap();

	let all = inquirer
		.tokens_metadata(&[maker(), usdc(), OLD_WETH_ADDRESS, maker()], TokenKind::Fungible)
		.await
		.unwrap();

	let symbols: Vec<_> = all.iter().map(|token| token.symbol.clone().unwrap()).collect();
	assert_eq!(symbols, vec!["MKR", "USDC", "WETH", "MKR"]);
	assert_eq!(transport.call_count("eth_call"), 2);
	let last_batch = &transport.calls("eth_call")[1];
	let calldata = last_batch[0]["data"].as_str().unwrap();
	assert!(!calldata.contains(&hex::encode(usdc().as_slice())));
}

#[tokio::test]
async fn test_outage_is_not_cached_and_recovery_returns_real_decimals() {
	let recovered = Arc::new(AtomicBool::new(false));
	let transport = ScriptedTransport::healthy("http://a.invalid", 1)
		.on("eth_call", {
			let recovered = recovered.clone();
			let answers = answers();
			move |params| {
				if recovered.load(Ordering::SeqCst) {
					answers.execute(params)
				} else {
					Err(TransportError::rpc(-32000, "header not found", None))
				}
			}
		})
		.into_arc();
	let inquirer = inquirer_with(transport.clone());

	let during_outage = inquirer
		.token_metadata(usdc(), TokenKind::Fungible, false)
		.await;
	assert!(matches!(
		during_outage,
		Err(InquirerError::ExhaustedSources { .. })
	));
	assert_eq!(inquirer.metadata_cache().cached_token_count().await, 0);

	recovered.store(true, Ordering::SeqCst);
	let metadata = inquirer
		.token_metadata(usdc(), TokenKind::Fungible, false)
		.await
		.unwrap();

	assert_eq!(metadata.decimals, Some(6));
	assert_eq!(transport.call_count("eth_call"), 2);
	assert_eq!(inquirer.metadata_cache().cached_token_count().await, 1);
}

#[tokio::test]
async fn test_outage_in_token_batch_leaves_fields_unset() {
	let inquirer = inquirer_with(
		ScriptedTransport::healthy("http://a.invalid", 1)
			.on("eth_call", |_| {
				Err(TransportError::rpc(-32000, "header not found", None))
			})
			.into_arc(),
	);

	let all = inquirer
		.tokens_metadata(&[usdc(), maker()], TokenKind::Fungible)
		.await
		.unwrap();

	assert_eq!(all.len(), 2);
	assert!(all
		.iter()
		.all(|token| token.name.is_none() && token.decimals.is_none()));
	assert_eq!(inquirer.metadata_cache().cached_token_count().await, 0);
}

#[tokio::test]
async fn test_undecodable_token_does_not_spoil_the_batch() {
	let junk = Address::repeat_byte(0x77);
	let transport = node(
		answers()
			.answer(junk, "name()", Bytes::from(vec![0xff; 7]))
			.answer(junk, "symbol()", abi_string("JUNK"))
			.answer(junk, "decimals()", abi_uint(9)),
	);
	let inquirer = inquirer_with(transport.clone());

	let all = inquirer
		.tokens_metadata(&[usdc(), junk], TokenKind::Fungible)
		.await
		.unwrap();

	assert_eq!(all[0].symbol.as_deref(), Some("USDC"));
	assert_eq!(all[0].decimals, Some(6));
	assert_eq!(all[1].name, None);
	assert_eq!(all[1].symbol.as_deref(), Some("JUNK"));
	assert_eq!(all[1].decimals, Some(9));

	let cache = inquirer.metadata_cache();
	assert!(cache.cached_token(&usdc()).await.is_some());
	assert!(cache.cached_token(&junk).await.is_none());
}

#[tokio::test]
async fn test_block_by_timestamp_is_cached() {
	let mut explorer = named_explorer("etherscan", 1000);
	explorer
		.expect_block_number_by_timestamp()
		.withf(|timestamp| *timestamp == 1_700_000_000)
		.times(1)
		.returning(|_| Ok(18_573_049));
	let chain = ChainBuilder::new()
		.explorer("etherscan", "https://api.etherscan.io/v2/api")
		.build();
	let inquirer = EvmNodeInquirer::new(
		chain,
		ScriptedConnector::new().into_arc(),
		Some(Arc::new(explorer)),
	);

	assert_eq!(
		inquirer.block_number_by_timestamp(1_700_000_000).await.unwrap(),
		18_573_049
	);
	assert_eq!(
		inquirer.block_number_by_timestamp(1_700_000_000).await.unwrap(),
		18_573_049
	);
}

#[tokio::test]
async fn test_block_by_timestamp_without_explorer() {
	let inquirer = EvmNodeInquirer::new(
		ChainBuilder::new().owned_node("a", "http://a.invalid").build(),
		ScriptedConnector::new()
			.with("a", ScriptedTransport::healthy("http://a.invalid", 1).into_arc())
			.into_arc(),
		None,
	);

	let result = inquirer.block_number_by_timestamp(1_700_000_000).await;
	assert!(matches!(result, Err(InquirerError::ExhaustedSources { .. })));
}
