//! Parsing utilities
//!
//! Helpers for the textual encodings used by nodes and explorers: JSON-RPC hex quantities,
//! explorer decimal strings and human readable byte sizes for the CLI.

use byte_unit::Byte;
use std::str::FromStr;

/// Parses a string argument into a `u64` value representing a file size.
///
/// Accepts human-readable formats like "1GB", "500MB", "1024KB", etc.
pub fn parse_string_to_bytes_size(s: &str) -> Result<u64, String> {
	match Byte::from_str(s) {
		Ok(byte) => Ok(byte.as_u64()),
		Err(e) => Err(format!("Invalid size format: '{}'. Error: {}", s, e)),
	}
}

/// Normalizes a string by trimming whitespace and converting to lowercase.
pub fn normalize_string(input: &str) -> String {
	input.trim().to_lowercase()
}

/// Parses a quantity that is either `0x`-prefixed hex or plain decimal.
///
/// Explorers return `"0x"` for a zero log index, so an empty hex body parses as zero.
pub fn parse_quantity(input: &str) -> Result<u64, String> {
	let trimmed = input.trim();
	if let Some(hex) = trimmed
		.strip_prefix("0x")
		.or_else(|| trimmed.strip_prefix("0X"))
	{
		if hex.is_empty() {
			return Ok(0);
		}
		return u64::from_str_radix(hex, 16)
			.map_err(|e| format!("Invalid hex quantity '{}': {}", input, e));
	}
	trimmed
		.parse::<u64>()
		.map_err(|e| format!("Invalid quantity '{}': {}", input, e))
}

/// Formats a number as a JSON-RPC hex quantity.
pub fn to_hex_quantity(value: u64) -> String {
	format!("0x{:x}", value)
}

/// Serde adapter for `u64` fields encoded as hex quantities, decimal strings or numbers.
pub mod quantity {
	use serde::{de, Deserialize, Deserializer, Serializer};
	use serde_json::Value;

	pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&super::to_hex_quantity(*value))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
	where
		D: Deserializer<'de>,
	{
		match Value::deserialize(deserializer)? {
			Value::String(s) => super::parse_quantity(&s).map_err(de::Error::custom),
			Value::Number(n) => n
				.as_u64()
				.ok_or_else(|| de::Error::custom(format!("quantity out of range: {}", n))),
			Value::Null => Ok(0),
			other => Err(de::Error::custom(format!(
				"expected a quantity, got {}",
				other
			))),
		}
	}
}
