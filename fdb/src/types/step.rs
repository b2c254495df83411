//! Forecast step canonicalisation.
//!
//! Steps are hours (`6`), ranges (`6-12`) or minutes (`30m`). Whole hours
//! expressed in minutes collapse to the hour form, so `60m` and `1` name
//! the same step.

use error::{ErrorKind, Result};
use super::AxisSource;

fn bad(keyword: &str, value: &str, msg: &str) -> ::error::Error {
	ErrorKind::InvalidValue(keyword.into(), value.into(), msg.into()).into()
}

fn canonicalise_endpoint(keyword: &str, value: &str) -> Result<String> {
	if value.ends_with('m') {
		let minutes: i64 = value[..value.len() - 1]
			.parse()
			.map_err(|_| bad(keyword, value, "expected minutes"))?;
		if minutes % 60 == 0 {
			return Ok((minutes / 60).to_string());
		}
		return Ok(format!("{}m", minutes));
	}

	let hours: i64 = value.parse().map_err(|_| bad(keyword, value, "expected hours"))?;
	Ok(hours.to_string())
}

/// Canonical form of a step or step range.
pub fn canonicalise_step(keyword: &str, value: &str) -> Result<String> {
	let parts: Vec<&str> = value.split('-').collect();
	if parts.len() > 2 || parts.iter().any(|p| p.is_empty()) {
		return Err(bad(keyword, value, "expected N or N-M"));
	}

	let endpoints = parts.into_iter()
		.map(|p| canonicalise_endpoint(keyword, p))
		.collect::<Result<Vec<_>>>()?;

	Ok(endpoints.join("-"))
}

/// Resolves canonical steps against the axis of the selected database:
/// a step stored as an accumulation range `0-N` answers a request for `N`.
pub fn expand_step(values: Vec<String>, keyword: &str, db: Option<&AxisSource>) -> Vec<String> {
	let axis = match db {
		Some(db) => db.axis(keyword),
		None => return values,
	};

	if axis.is_empty() {
		return values;
	}

	values.into_iter()
		.map(|step| {
			if axis.contains(&step) {
				return step;
			}
			let range = format!("0-{}", step);
			if axis.contains(&range) {
				range
			} else {
				step
			}
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeSet;
	use types::AxisSource;
	use super::{canonicalise_step, expand_step};

	#[test]
	fn test_canonical_forms() {
		assert_eq!(canonicalise_step("step", "0").unwrap(), "0");
		assert_eq!(canonicalise_step("step", "00").unwrap(), "0");
		assert_eq!(canonicalise_step("step", "02-12").unwrap(), "2-12");
		assert_eq!(canonicalise_step("step", "30m").unwrap(), "30m");
		assert_eq!(canonicalise_step("step", "60m").unwrap(), "1");
		assert_eq!(canonicalise_step("step", "30m-60m").unwrap(), "30m-1");
		assert_eq!(canonicalise_step("step", "30m-1").unwrap(), "30m-1");
		assert_eq!(canonicalise_step("step", "60m-120m").unwrap(), "1-2");
	}

	#[test]
	fn test_invalid_forms() {
		for bad in &["", "-", "1-2-3", "6h", "m", "1-"] {
			assert!(canonicalise_step("step", bad).is_err(), "{} should be rejected", bad);
		}
	}

	struct Axis(BTreeSet<String>);

	impl AxisSource for Axis {
		fn axis(&self, _keyword: &str) -> BTreeSet<String> {
			self.0.clone()
		}
	}

	#[test]
	fn test_axis_range_fallback() {
		let axis = Axis(["0-6", "12"].iter().map(|s| s.to_string()).collect());
		let out = expand_step(vec!["6".into(), "12".into(), "24".into()], "step", Some(&axis));
		assert_eq!(out, ["0-6", "12", "24"]);
	}
}
