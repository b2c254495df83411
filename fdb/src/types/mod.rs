//! Pluggable per-keyword value types.
//!
//! Every keyword canonicalises its values through a [`Type`]. The schema
//! binds keywords to type names; unbound keywords fall back to `Default`.
//! `Step` and `Param` consult the axis of the selected database while
//! expanding a request.

mod date;
mod misc;
mod param;
mod step;
mod time;

use std::collections::BTreeSet;
use std::fmt::Write as FmtWrite;

use error::{ErrorKind, Result};
use request::Request;

/// Supplies the per-keyword sets of values seen by a database's indexes.
pub trait AxisSource {
	/// Union of the values seen for `keyword` across the live indexes.
	fn axis(&self, keyword: &str) -> BTreeSet<String>;
}

/// Raised by `Param` expansion when a wind component was substituted by
/// vorticity and divergence.
pub trait WindNotify {
	/// Called once per substituting expansion.
	fn notify_winds(&self);
}

/// The closed set of value types.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
	/// Values pass through unchanged.
	Default,
	/// Integers, leading zeros stripped.
	Integer,
	/// Floating point numbers, trailing fractional zeros stripped.
	Double,
	/// Grid designations.
	Grid,
	/// Values are lowercased.
	Lowercase,
	/// Values canonicalise to empty and never participate in matching.
	Ignore,
	/// Abbreviation to the first `n` characters.
	First(usize),
	/// Experiment versions, zero-padded to four characters.
	Expver,
	/// Dates, canonical `YYYYMMDD`, relative day counts accepted.
	Date,
	/// Years, bare or taken from a date.
	Year,
	/// Months, by number, name or date.
	Month,
	/// The month of a full date.
	MonthOfDate,
	/// Climatology days, equal by month and day whatever the year.
	ClimateDaily,
	/// Climatology months, equal by month number.
	ClimateMonthly,
	/// Times of day, canonical `HHMM`.
	Time,
	/// Forecast steps; whole hours in minutes collapse to the hour form.
	Step,
	/// Parameter codes `n` or `n.table`, resolved against the axis.
	Param,
}

impl Type {
	/// Builds a type from its schema name, e.g. `Date` or `First3`.
	pub fn build(spec: &str) -> Result<Type> {
		let t = match spec {
			"Default" => Type::Default,
			"Integer" => Type::Integer,
			"Double" => Type::Double,
			"Grid" => Type::Grid,
			"Lowercase" => Type::Lowercase,
			"Ignore" => Type::Ignore,
			"Expver" => Type::Expver,
			"Date" => Type::Date,
			"Year" => Type::Year,
			"Month" => Type::Month,
			"MonthOfDate" => Type::MonthOfDate,
			"ClimateDaily" => Type::ClimateDaily,
			"ClimateMonthly" => Type::ClimateMonthly,
			"Time" => Type::Time,
			"Step" => Type::Step,
			"Param" => Type::Param,
			_ => {
				if spec.starts_with("First") {
					let n: usize = spec["First".len()..].parse().map_err(|_| {
						ErrorKind::InvalidConfig("type", format!("bad abbreviation `{}`", spec))
					})?;
					Type::First(n)
				} else {
					bail!(ErrorKind::InvalidConfig("type", format!("unknown value type `{}`", spec)));
				}
			}
		};
		Ok(t)
	}

	/// Normalises a raw value to its canonical form. Idempotent.
	pub fn canonicalise(&self, keyword: &str, value: &str) -> Result<String> {
		match *self {
			Type::Default | Type::Grid | Type::First(_) | Type::ClimateMonthly => Ok(value.into()),
			Type::Integer => misc::canonicalise_integer(keyword, value),
			Type::Double => misc::canonicalise_double(keyword, value),
			Type::Lowercase => Ok(value.to_lowercase()),
			Type::Ignore => Ok(String::new()),
			Type::Expver => Ok(misc::pad_expver(value)),
			Type::Date => date::canonicalise_date(keyword, value),
			Type::Year => date::canonicalise_year(keyword, value),
			Type::Month => date::canonicalise_month(keyword, value),
			Type::MonthOfDate => date::canonicalise_month_of_date(keyword, value),
			Type::ClimateDaily => date::canonicalise_climate_daily(keyword, value),
			Type::Time => time::canonicalise_time(keyword, value),
			Type::Step => step::canonicalise_step(keyword, value),
			Type::Param => param::canonicalise_param(keyword, value),
		}
	}

	/// Projects a canonical value to its on-disk key form.
	pub fn to_key(&self, value: &str) -> String {
		match *self {
			Type::Ignore => String::new(),
			Type::First(n) => value.chars().take(n).collect(),
			Type::ClimateDaily => date::climate_daily_key(value).unwrap_or_else(|_| value.into()),
			Type::ClimateMonthly => date::climate_monthly_key(value).unwrap_or_else(|_| value.into()),
			_ => value.into(),
		}
	}

	/// The set of candidate values for `keyword` taken from a request,
	/// canonicalised, in request order.
	pub fn expand(
		&self,
		request: &Request,
		keyword: &str,
		db: Option<&AxisSource>,
		wind: Option<&WindNotify>,
	) -> Result<Vec<String>> {
		match *self {
			Type::Ignore => Ok(Vec::new()),
			Type::Step => {
				let values = self.canonical_request_values(request, keyword)?;
				Ok(step::expand_step(values, keyword, db))
			}
			Type::Param => {
				let values = self.canonical_request_values(request, keyword)?;
				Ok(param::expand_param(values, keyword, db, wind))
			}
			_ => self.canonical_request_values(request, keyword),
		}
	}

	fn canonical_request_values(&self, request: &Request, keyword: &str) -> Result<Vec<String>> {
		let mut out = Vec::new();
		for value in request.values(keyword) {
			let canonical = self.canonicalise(keyword, value)?;
			if !out.contains(&canonical) {
				out.push(canonical);
			}
		}
		Ok(out)
	}

	/// Equality of two values under this type.
	pub fn matches(&self, v1: &str, v2: &str) -> bool {
		match *self {
			Type::Ignore => true,
			Type::Param => param::params_match(v1, v2),
			Type::ClimateDaily => date::climate_daily_match(v1, v2),
			Type::ClimateMonthly => date::climate_monthly_match(v1, v2),
			_ => v1 == v2,
		}
	}
}

/// Keyword to type-name bindings, flattened down the rule tree.
///
/// Rules carry an overlay registry; when the schema is checked each overlay
/// is merged over its parent so lookups see the whole chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypesRegistry {
	types: ::std::collections::BTreeMap<String, String>,
}

impl TypesRegistry {
	/// Creates an empty registry; every lookup yields `Default`.
	pub fn new() -> TypesRegistry {
		TypesRegistry::default()
	}

	/// Binds a keyword to a type name. Fails on an unknown type or a
	/// duplicate binding.
	pub fn add(&mut self, keyword: &str, type_name: &str) -> Result<()> {
		Type::build(type_name)?;
		if self.types.insert(keyword.into(), type_name.into()).is_some() {
			bail!(ErrorKind::InvalidConfig(
				"type",
				format!("duplicate type for keyword `{}`", keyword)
			));
		}
		Ok(())
	}

	/// True when this registry binds `keyword` itself.
	pub fn binds(&self, keyword: &str) -> bool {
		self.types.contains_key(keyword)
	}

	/// The type for a keyword, `Default` when unbound.
	pub fn lookup(&self, keyword: &str) -> Type {
		match self.types.get(keyword) {
			Some(name) => Type::build(name).expect("bindings are validated on insertion; qed"),
			None => Type::Default,
		}
	}

	/// This registry merged over a parent: own bindings win.
	pub fn merged_over(&self, parent: &TypesRegistry) -> TypesRegistry {
		let mut types = parent.types.clone();
		for (k, v) in &self.types {
			types.insert(k.clone(), v.clone());
		}
		TypesRegistry { types }
	}

	/// Dumps the bindings in schema grammar form, one `keyword:Type;` line
	/// per binding.
	pub fn dump(&self, out: &mut String) {
		for (k, v) in &self.types {
			let _ = writeln!(out, "{}:{};", k, v);
		}
	}

	/// Dumps a keyword with its binding, if any, in predicate form.
	pub fn dump_keyword(&self, out: &mut String, keyword: &str) {
		out.push_str(keyword);
		if let Some(t) = self.types.get(keyword) {
			let _ = write!(out, ":{}", t);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::{Type, TypesRegistry};

	#[test]
	fn test_build_abbreviation() {
		assert_eq!(Type::build("First3").unwrap(), Type::First(3));
		assert!(Type::build("FirstN").is_err());
		assert!(Type::build("Frobnicate").is_err());
	}

	#[test]
	fn test_first_to_key() {
		assert_eq!(Type::First(3).to_key("oper"), "ope");
		assert_eq!(Type::First(3).to_key("od"), "od");
	}

	#[test]
	fn test_ignore() {
		assert_eq!(Type::Ignore.canonicalise("foo", "whatever").unwrap(), "");
		assert_eq!(Type::Ignore.to_key("whatever"), "");
		assert!(Type::Ignore.matches("a", "b"));
	}

	#[test]
	fn test_registry_fallback_and_merge() {
		let mut root = TypesRegistry::new();
		root.add("date", "Date").unwrap();

		let mut overlay = TypesRegistry::new();
		overlay.add("date", "ClimateDaily").unwrap();
		overlay.add("step", "Step").unwrap();

		let merged = overlay.merged_over(&root);
		assert_eq!(merged.lookup("date"), Type::ClimateDaily);
		assert_eq!(merged.lookup("step"), Type::Step);
		assert_eq!(merged.lookup("class"), Type::Default);
	}

	#[test]
	fn test_registry_rejects_duplicates() {
		let mut registry = TypesRegistry::new();
		registry.add("date", "Date").unwrap();
		assert!(registry.add("date", "Time").is_err());
	}

	#[test]
	fn test_canonicalisation_is_idempotent() {
		for (t, raw) in &[
			(Type::Time, "6"),
			(Type::Step, "60m"),
			(Type::Expver, "1"),
			(Type::Double, "200.500"),
			(Type::Integer, "007"),
		] {
			let once = t.canonicalise("k", raw).unwrap();
			let twice = t.canonicalise("k", &once).unwrap();
			assert_eq!(once, twice);
		}
	}
}
