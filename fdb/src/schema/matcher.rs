use std::collections::BTreeSet;
use std::fmt::Write;

use key::Key;
use types::TypesRegistry;

/// How a predicate accepts values for its keyword.
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
	/// Any value is accepted; the keyword must be supplied.
	Always,
	/// Exactly one value is accepted.
	Value(String),
	/// Any value of the set is accepted.
	Any(BTreeSet<String>),
	/// Any value outside the set is accepted; an absent keyword passes.
	None(BTreeSet<String>),
	/// Like `None`, kept distinct for rules that exclude whole subtrees.
	ExcludeAll(BTreeSet<String>),
	/// Any value is accepted; an absent keyword takes the default.
	Optional(String),
	/// Like `Optional`, but the value does not contribute to the stored
	/// key (the keyword is implicitly `Ignore`-typed).
	Hidden(String),
}

/// A `(keyword, matcher)` pair of a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
	keyword: String,
	matcher: Matcher,
}

impl Predicate {
	/// Creates a predicate for a keyword.
	pub fn new(keyword: &str, matcher: Matcher) -> Predicate {
		Predicate { keyword: keyword.into(), matcher }
	}

	/// The keyword this predicate constrains.
	pub fn keyword(&self) -> &str {
		&self.keyword
	}

	/// How values are accepted.
	pub fn matcher(&self) -> &Matcher {
		&self.matcher
	}

	/// True when an absent keyword has a default.
	pub fn optional(&self) -> bool {
		match self.matcher {
			Matcher::Optional(_) | Matcher::Hidden(_) => true,
			_ => false,
		}
	}

	/// The default value, for optional predicates.
	pub fn default_value(&self) -> Option<&str> {
		match self.matcher {
			Matcher::Optional(ref d) | Matcher::Hidden(ref d) => Some(d),
			_ => None,
		}
	}

	/// Does a fully specified field key satisfy this predicate?
	pub fn match_key(&self, key: &Key) -> bool {
		match self.matcher {
			Matcher::Always | Matcher::Optional(_) | Matcher::Hidden(_) => true,
			Matcher::Value(ref v) => key.get(&self.keyword) == Some(v),
			Matcher::Any(ref set) => {
				key.get(&self.keyword).map(|v| set.contains(v)).unwrap_or(false)
			}
			Matcher::None(ref set) | Matcher::ExcludeAll(ref set) => {
				key.get(&self.keyword).map(|v| !set.contains(v)).unwrap_or(true)
			}
		}
	}

	/// Does a single candidate value satisfy this predicate?
	pub fn match_value(&self, value: &str) -> bool {
		match self.matcher {
			Matcher::Always | Matcher::Optional(_) | Matcher::Hidden(_) => true,
			Matcher::Value(ref v) => value == v,
			Matcher::Any(ref set) => set.contains(value),
			Matcher::None(ref set) | Matcher::ExcludeAll(ref set) => !set.contains(value),
		}
	}

	/// The value this predicate contributes for a field key, falling back
	/// to the default for optional predicates.
	pub fn value_for<'a>(&'a self, key: &'a Key) -> Option<&'a str> {
		key.get(&self.keyword).or_else(|| self.default_value())
	}

	/// Writes the predicate in schema grammar form.
	pub fn dump(&self, out: &mut String, registry: &TypesRegistry) {
		registry.dump_keyword(out, &self.keyword);
		match self.matcher {
			Matcher::Always => {}
			Matcher::Value(ref v) => {
				let _ = write!(out, "={}", v);
			}
			Matcher::Any(ref set) | Matcher::None(ref set) | Matcher::ExcludeAll(ref set) => {
				out.push('=');
				let mut sep = "";
				for v in set {
					let _ = write!(out, "{}{}", sep, v);
					sep = "/";
				}
			}
			Matcher::Optional(ref d) => {
				let _ = write!(out, "?{}", d);
			}
			Matcher::Hidden(ref d) => {
				let _ = write!(out, "-{}", d);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use key::Key;
	use super::{Matcher, Predicate};

	fn key(s: &str) -> Key {
		let registry = ::types::TypesRegistry::new();
		Key::parse(s, &registry).unwrap()
	}

	#[test]
	fn test_match_key() {
		let k = key("class=od,stream=oper");

		assert!(Predicate::new("class", Matcher::Always).match_key(&k));
		assert!(Predicate::new("missing", Matcher::Always).match_key(&k));
		assert!(Predicate::new("class", Matcher::Value("od".into())).match_key(&k));
		assert!(!Predicate::new("class", Matcher::Value("rd".into())).match_key(&k));
		assert!(!Predicate::new("missing", Matcher::Value("od".into())).match_key(&k));

		let any = Matcher::Any(["oper", "dacl"].iter().map(|s| s.to_string()).collect());
		assert!(Predicate::new("stream", any.clone()).match_key(&k));
		assert!(!Predicate::new("missing", any).match_key(&k));

		let none = Matcher::None(["od"].iter().map(|s| s.to_string()).collect());
		assert!(!Predicate::new("class", none.clone()).match_key(&k));
		assert!(Predicate::new("stream", none.clone()).match_key(&k));
		assert!(Predicate::new("missing", none).match_key(&k));
	}

	#[test]
	fn test_defaults() {
		let k = key("class=od");
		let p = Predicate::new("domain", Matcher::Optional("g".into()));
		assert_eq!(p.value_for(&k), Some("g"));
		assert!(p.optional());

		let p = Predicate::new("class", Matcher::Optional("rd".into()));
		assert_eq!(p.value_for(&k), Some("od"));

		let p = Predicate::new("domain", Matcher::Always);
		assert_eq!(p.value_for(&k), None);
	}
}
