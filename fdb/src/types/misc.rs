//! Scalar value types.

use error::{ErrorKind, Result};

fn bad(keyword: &str, value: &str, msg: &str) -> ::error::Error {
	ErrorKind::InvalidValue(keyword.into(), value.into(), msg.into()).into()
}

/// Canonical integer form: parseable, leading zeros stripped.
pub fn canonicalise_integer(keyword: &str, value: &str) -> Result<String> {
	value.parse::<i64>()
		.map(|n| n.to_string())
		.map_err(|_| bad(keyword, value, "expected an integer"))
}

/// Canonical floating point form: trailing fractional zeros stripped, so
/// `200.0` and `200` name the same level.
pub fn canonicalise_double(keyword: &str, value: &str) -> Result<String> {
	value.parse::<f64>()
		.map_err(|_| bad(keyword, value, "expected a number"))?;

	if !value.contains('.') {
		return Ok(value.into());
	}

	let trimmed = value.trim_right_matches('0').trim_right_matches('.');
	if trimmed.is_empty() || trimmed == "-" {
		return Ok("0".into());
	}
	Ok(trimmed.into())
}

/// Experiment versions are zero-padded to four characters.
pub fn pad_expver(value: &str) -> String {
	format!("{:0>4}", value)
}
