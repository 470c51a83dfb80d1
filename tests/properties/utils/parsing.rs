use evm_node_inquirer::utils::{parse_quantity, to_hex_quantity};
use proptest::{prelude::*, test_runner::Config};

proptest! {
	#![proptest_config(Config {
		failure_persistence: None,
		..Config::default()
	})]

	#[test]
	fn test_hex_and_decimal_quantities_agree(value in any::<u64>()) {
		prop_assert_eq!(parse_quantity(&to_hex_quantity(value)), Ok(value));
		prop_assert_eq!(parse_quantity(&value.to_string()), Ok(value));
		prop_assert_eq!(parse_quantity(&format!("0X{:X}", value)), Ok(value));
	}

	#[test]
	fn test_garbage_never_panics(input in "\\PC{0,24}") {
		let _ = parse_quantity(&input);
	}
}
