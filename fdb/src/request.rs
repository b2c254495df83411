use std::collections::HashMap;
use std::fmt;

use itertools::Itertools;

use error::{ErrorKind, Result};

/// A MARS-style retrieval request: a verb plus a mapping of keywords to
/// sets of values, interpreted as a Cartesian product.
#[derive(Debug, Clone, Default)]
pub struct Request {
	verb: String,
	names: Vec<String>,
	values: HashMap<String, Vec<String>>,
}

impl Request {
	/// Creates an empty `retrieve` request.
	pub fn new() -> Request {
		Request {
			verb: "retrieve".into(),
			names: Vec::new(),
			values: HashMap::new(),
		}
	}

	/// Parses the `verb k1=v1/v2,k2=v3,…` form. The verb is optional and
	/// defaults to `retrieve`.
	pub fn parse(s: &str) -> Result<Request> {
		let s = s.trim();
		let (verb, rest) = match s.find(char::is_whitespace) {
			Some(pos) if !s[..pos].contains('=') => (&s[..pos], s[pos..].trim()),
			_ => ("retrieve", s),
		};

		let mut request = Request::new();
		request.verb = verb.to_lowercase();

		if rest.is_empty() {
			return Ok(request);
		}

		for part in rest.split(',') {
			let mut kv = part.trim().splitn(2, '=');
			let k = kv.next().unwrap_or("");
			let v = match kv.next() {
				Some(v) => v,
				None => bail!(ErrorKind::InvalidValue(
					k.into(),
					part.into(),
					"expected keyword=value[/value…]".into()
				)),
			};
			request.set(k, v.split('/').map(|v| v.trim()));
		}

		Ok(request)
	}

	/// The request verb, lowercased.
	pub fn verb(&self) -> &str {
		&self.verb
	}

	/// Replaces the values of a keyword.
	pub fn set<'a, I: IntoIterator<Item = &'a str>>(&mut self, keyword: &str, values: I) {
		if !self.values.contains_key(keyword) {
			self.names.push(keyword.into());
		}
		self.values.insert(
			keyword.into(),
			values.into_iter().map(|v| v.to_string()).collect(),
		);
	}

	/// The values of a keyword, empty when absent.
	pub fn values(&self, keyword: &str) -> &[String] {
		self.values.get(keyword).map(|v| v.as_slice()).unwrap_or(&[])
	}

	/// Number of values for a keyword.
	pub fn count_values(&self, keyword: &str) -> usize {
		self.values(keyword).len()
	}

	/// True if the keyword is present.
	pub fn has(&self, keyword: &str) -> bool {
		self.values.contains_key(keyword)
	}

	/// Keywords in insertion order.
	pub fn names(&self) -> &[String] {
		&self.names
	}

	/// True when the caller asked for the gathered result to be sorted
	/// (`_sort=1`).
	pub fn wants_sorted(&self) -> bool {
		self.values("_sort") == ["1"]
	}
}

impl fmt::Display for Request {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.verb)?;
		let mut sep = " ";
		for name in &self.names {
			write!(f, "{}{}={}", sep, name, self.values[name].iter().join("/"))?;
			sep = ",";
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::Request;

	#[test]
	fn test_parse_with_verb() {
		let r = Request::parse("retrieve class=od,stream=oper,step=0/6/12").unwrap();
		assert_eq!(r.verb(), "retrieve");
		assert_eq!(r.values("class"), ["od"]);
		assert_eq!(r.values("step"), ["0", "6", "12"]);
		assert!(!r.has("date"));
	}

	#[test]
	fn test_parse_without_verb() {
		let r = Request::parse("class=od,expver=1").unwrap();
		assert_eq!(r.verb(), "retrieve");
		assert_eq!(r.values("expver"), ["1"]);
	}

	#[test]
	fn test_display_roundtrip() {
		let r = Request::parse("retrieve class=od,step=0/6").unwrap();
		assert_eq!(r.to_string(), "retrieve class=od,step=0/6");
		let again = Request::parse(&r.to_string()).unwrap();
		assert_eq!(again.values("step"), ["0", "6"]);
	}

	#[test]
	fn test_sort_flag() {
		assert!(Request::parse("class=od,_sort=1").unwrap().wants_sorted());
		assert!(!Request::parse("class=od").unwrap().wants_sorted());
	}
}
