//! Parameter codes (`n` or `n.table`) and the wind substitution.

use std::collections::BTreeSet;

use error::{ErrorKind, Result};
use super::{AxisSource, WindNotify};

const PARAM_U: u64 = 131;
const PARAM_V: u64 = 132;
const PARAM_VO: u64 = 138;
const PARAM_D: u64 = 155;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Param {
	value: u64,
	table: u64,
}

impl Param {
	fn parse(s: &str) -> Option<Param> {
		let mut parts = s.splitn(2, '.');
		let value: u64 = parts.next()?.parse().ok()?;
		let table: u64 = match parts.next() {
			Some(t) => t.parse().ok()?,
			None => 0,
		};
		Some(Param { value, table })
	}

	fn format(&self) -> String {
		if self.table == 0 {
			self.value.to_string()
		} else {
			format!("{}.{}", self.value, self.table)
		}
	}

	// the parameter number with any table prefix stripped
	fn number(&self) -> u64 {
		if self.table == 0 && self.value >= 1000 {
			self.value % 1000
		} else {
			self.value
		}
	}
}

/// Canonical `n` or `n.table` form.
pub fn canonicalise_param(keyword: &str, value: &str) -> Result<String> {
	match Param::parse(value) {
		Some(p) => Ok(p.format()),
		None => Err(ErrorKind::InvalidValue(
			keyword.into(),
			value.into(),
			"expected n or n.table".into(),
		).into()),
	}
}

/// Parameter equality: exact, table-less against the same numeric part, or
/// table folded into the number (`table * 1000 + n`).
pub fn params_match(v1: &str, v2: &str) -> bool {
	if v1 == v2 {
		return true;
	}

	let (p1, p2) = match (Param::parse(v1), Param::parse(v2)) {
		(Some(p1), Some(p2)) => (p1, p2),
		_ => return false,
	};

	if p1.value == p2.value && (p1.table == 0 || p2.table == 0) {
		return true;
	}
	if p1.table * 1000 + p1.value == p2.value {
		return true;
	}
	if p2.table * 1000 + p2.value == p1.value {
		return true;
	}

	false
}

fn find_by_number(axis: &BTreeSet<String>, number: u64) -> Option<String> {
	axis.iter()
		.find(|a| Param::parse(a).map(|p| p.number() == number).unwrap_or(false))
		.cloned()
}

fn resolve(axis: &BTreeSet<String>, value: &str) -> Option<String> {
	if axis.contains(value) {
		return Some(value.into());
	}
	axis.iter()
		.find(|a| params_match(value, a))
		.cloned()
}

/// Resolves requested parameters against the axis of the selected database.
///
/// A request for wind components (U, V) over a database that only holds
/// vorticity and divergence is answered with VO and D instead, and the
/// notifier is told so an upper layer can reconstruct the winds.
pub fn expand_param(
	values: Vec<String>,
	keyword: &str,
	db: Option<&AxisSource>,
	wind: Option<&WindNotify>,
) -> Vec<String> {
	let axis = match db {
		Some(db) => db.axis(keyword),
		None => return values,
	};

	if axis.is_empty() {
		return values;
	}

	let mut out: Vec<String> = Vec::with_capacity(values.len());
	let mut converted = false;

	for value in values {
		if let Some(found) = resolve(&axis, &value) {
			if !out.contains(&found) {
				out.push(found);
			}
			continue;
		}

		let number = Param::parse(&value).map(|p| p.number()).unwrap_or(0);
		if number == PARAM_U || number == PARAM_V {
			let vo = find_by_number(&axis, PARAM_VO);
			let d = find_by_number(&axis, PARAM_D);
			if let (Some(vo), Some(d)) = (vo, d) {
				if !out.contains(&vo) {
					out.push(vo);
				}
				if !out.contains(&d) {
					out.push(d);
				}
				converted = true;
				continue;
			}
		}

		if !out.contains(&value) {
			out.push(value);
		}
	}

	if converted {
		if let Some(wind) = wind {
			wind.notify_winds();
		}
	}

	out
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;
	use std::collections::BTreeSet;

	use types::{AxisSource, WindNotify};
	use super::{canonicalise_param, expand_param, params_match};

	#[test]
	fn test_canonical() {
		assert_eq!(canonicalise_param("param", "129.128").unwrap(), "129.128");
		assert_eq!(canonicalise_param("param", "007.128").unwrap(), "7.128");
		assert_eq!(canonicalise_param("param", "129").unwrap(), "129");
		assert!(canonicalise_param("param", "t.128").is_err());
	}

	#[test]
	fn test_match() {
		assert!(params_match("129.128", "129.128"));
		assert!(params_match("129", "129.128"));
		assert!(params_match("129.128", "129"));
		assert!(params_match("129.140", "140129"));
		assert!(params_match("140129", "129.140"));
		assert!(!params_match("129.128", "130.128"));
		assert!(!params_match("129.128", "129.129"));
	}

	struct Axis(BTreeSet<String>);

	impl AxisSource for Axis {
		fn axis(&self, _keyword: &str) -> BTreeSet<String> {
			self.0.clone()
		}
	}

	struct Counter(Cell<usize>);

	impl WindNotify for Counter {
		fn notify_winds(&self) {
			self.0.set(self.0.get() + 1);
		}
	}

	fn axis(values: &[&str]) -> Axis {
		Axis(values.iter().map(|s| s.to_string()).collect())
	}

	#[test]
	fn test_resolution_against_axis() {
		let axis = axis(&["129.128", "130.128"]);
		let out = expand_param(vec!["129".into(), "130.128".into()], "param", Some(&axis), None);
		assert_eq!(out, ["129.128", "130.128"]);
	}

	#[test]
	fn test_wind_substitution() {
		let axis = axis(&["138.128", "155.128"]);
		let counter = Counter(Cell::new(0));

		let out = expand_param(vec!["131.128".into()], "param", Some(&axis), Some(&counter));
		assert_eq!(out, ["138.128", "155.128"]);
		assert_eq!(counter.0.get(), 1);
	}

	#[test]
	fn test_wind_substitution_dedups_u_and_v() {
		let axis = axis(&["138.128", "155.128"]);
		let counter = Counter(Cell::new(0));

		let out = expand_param(
			vec!["131.128".into(), "132.128".into()],
			"param",
			Some(&axis),
			Some(&counter),
		);
		assert_eq!(out, ["138.128", "155.128"]);
		assert_eq!(counter.0.get(), 1);
	}

	#[test]
	fn test_no_substitution_when_wind_is_archived() {
		let axis = axis(&["131.128", "138.128", "155.128"]);
		let counter = Counter(Cell::new(0));

		let out = expand_param(vec!["131".into()], "param", Some(&axis), Some(&counter));
		assert_eq!(out, ["131.128"]);
		assert_eq!(counter.0.get(), 0);
	}
}
