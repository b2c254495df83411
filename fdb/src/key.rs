use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use codec;
use error::{ErrorKind, Result};
use types::TypesRegistry;

/// An insertion-ordered keyword to value mapping identifying a field,
/// an index or a database.
///
/// The name list and the value map always hold the same keywords. Keywords
/// are pushed in rule order and popped in reverse order while the schema
/// expansion walks up and down the rule tree.
#[derive(Debug, Clone, Default)]
pub struct Key {
	names: Vec<String>,
	values: HashMap<String, String>,
}

impl Key {
	/// Creates an empty key.
	pub fn new() -> Key {
		Key::default()
	}

	/// Parses the `k1=v1,k2=v2` form, canonicalising each value through
	/// the given registry.
	pub fn parse(s: &str, registry: &TypesRegistry) -> Result<Key> {
		let mut key = Key::new();

		if s.is_empty() {
			return Ok(key);
		}

		for part in s.split(',') {
			let mut kv = part.splitn(2, '=');
			let k = kv.next().unwrap_or("");
			let v = match kv.next() {
				Some(v) => v,
				None => bail!(ErrorKind::InvalidValue(
					k.into(),
					part.into(),
					"expected keyword=value".into()
				)),
			};

			let tidy = registry.lookup(k).canonicalise(k, v)?;

			if key.contains(k) {
				key.set(k, &tidy);
			} else {
				key.push(k, &tidy);
			}
		}

		Ok(key)
	}

	/// Appends a keyword. A duplicate name replaces the value but keeps
	/// the original position.
	pub fn push(&mut self, keyword: &str, value: &str) {
		if !self.values.contains_key(keyword) {
			self.names.push(keyword.into());
		}
		self.values.insert(keyword.into(), value.into());
	}

	/// Removes a keyword. Pops must happen in reverse order of pushes.
	pub fn pop(&mut self, keyword: &str) {
		self.values.remove(keyword);
		assert_eq!(self.names.last().map(|n| n.as_str()), Some(keyword), "pop out of order");
		self.names.pop();
	}

	/// Replaces the value of an already present keyword, or appends it.
	pub fn set(&mut self, keyword: &str, value: &str) {
		self.push(keyword, value);
	}

	/// Removes a keyword regardless of position.
	pub fn unset(&mut self, keyword: &str) {
		if self.values.remove(keyword).is_some() {
			self.names.retain(|n| n != keyword);
		}
	}

	/// Value of a keyword, if present.
	pub fn get(&self, keyword: &str) -> Option<&str> {
		self.values.get(keyword).map(|v| v.as_str())
	}

	/// True if the keyword is present.
	pub fn contains(&self, keyword: &str) -> bool {
		self.values.contains_key(keyword)
	}

	/// Number of keywords.
	pub fn len(&self) -> usize {
		self.names.len()
	}

	/// True if the key holds no keywords.
	pub fn is_empty(&self) -> bool {
		self.names.is_empty()
	}

	/// Keywords in insertion order.
	pub fn names(&self) -> &[String] {
		&self.names
	}

	/// `(keyword, value)` pairs in insertion order.
	pub fn iter<'a>(&'a self) -> Box<Iterator<Item = (&'a str, &'a str)> + 'a> {
		Box::new(self.names.iter().map(move |n| {
			(n.as_str(), self.values[n].as_str())
		}))
	}

	/// Appends every keyword of `other`, in `other`'s order.
	pub fn push_from(&mut self, other: &Key) {
		for (k, v) in other.iter() {
			self.push(k, v);
		}
	}

	/// Pops every keyword of `other`, in reverse of `other`'s order.
	pub fn pop_from(&mut self, other: &Key) {
		for name in other.names.iter().rev() {
			self.pop(name);
		}
	}

	/// True if every pair of `other` is present in `self` with an equal value.
	pub fn matches(&self, other: &Key) -> bool {
		other.iter().all(|(k, v)| self.get(k) == Some(v))
	}

	/// The colon-joined value fingerprint used as a B-tree key and as a
	/// database directory name.
	pub fn fingerprint(&self) -> String {
		debug_assert_eq!(self.names.len(), self.values.len());

		let mut out = String::new();
		let mut sep = "";
		for name in &self.names {
			out.push_str(sep);
			out.push_str(&self.values[name]);
			sep = ":";
		}
		out
	}

	pub(crate) fn encode(&self, writer: &mut codec::Writer) {
		writer.write_u64(self.names.len() as u64);
		for (k, v) in self.iter() {
			writer.write_string(k);
			writer.write_string(v);
		}
	}

	pub(crate) fn decode(reader: &mut codec::Reader) -> Result<Key> {
		let len = reader.read_u64()?;
		let mut key = Key::new();
		for _ in 0..len {
			let k = reader.read_string()?;
			let v = reader.read_string()?;
			key.push(&k, &v);
		}
		Ok(key)
	}
}

impl fmt::Display for Key {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let mut sep = "";
		for (k, v) in self.iter() {
			write!(f, "{}{}={}", sep, k, v)?;
			sep = ",";
		}
		Ok(())
	}
}

impl PartialEq for Key {
	fn eq(&self, other: &Self) -> bool {
		self.names == other.names && self.names.iter().all(|n| self.values[n] == other.values[n])
	}
}

impl Eq for Key {}

impl Hash for Key {
	fn hash<H: Hasher>(&self, state: &mut H) {
		for (k, v) in self.iter() {
			k.hash(state);
			v.hash(state);
		}
	}
}

/// A key bound to a types registry, so canonicalisation can be applied.
pub struct TypedKey<'a> {
	key: Key,
	registry: &'a TypesRegistry,
}

impl<'a> TypedKey<'a> {
	/// Creates an empty typed key over a registry.
	pub fn new(registry: &'a TypesRegistry) -> TypedKey<'a> {
		TypedKey { key: Key::new(), registry }
	}

	/// Appends a raw keyword value.
	pub fn push(&mut self, keyword: &str, value: &str) {
		self.key.push(keyword, value);
	}

	/// The canonical on-disk value of a single keyword.
	pub fn canonical_value(&self, keyword: &str) -> Result<String> {
		let value = self.key.get(keyword).ok_or_else(|| {
			ErrorKind::MissingKeyword(keyword.into(), self.key.to_string())
		})?;
		let t = self.registry.lookup(keyword);
		Ok(t.to_key(&t.canonicalise(keyword, value)?))
	}

	/// Projects to a plain key by canonicalising every value and applying
	/// its on-disk form.
	pub fn canonical(&self) -> Result<Key> {
		let mut out = Key::new();
		for (k, v) in self.key.iter() {
			let t = self.registry.lookup(k);
			out.push(k, &t.to_key(&t.canonicalise(k, v)?));
		}
		Ok(out)
	}
}

#[cfg(test)]
mod tests {
	use super::{Key, TypedKey};
	use types::TypesRegistry;

	#[test]
	fn test_push_pop_order() {
		let mut key = Key::new();
		key.push("class", "od");
		key.push("stream", "oper");
		assert_eq!(key.fingerprint(), "od:oper");

		key.pop("stream");
		assert_eq!(key.fingerprint(), "od");
	}

	#[test]
	#[should_panic]
	fn test_pop_out_of_order() {
		let mut key = Key::new();
		key.push("class", "od");
		key.push("stream", "oper");
		key.pop("class");
	}

	#[test]
	fn test_duplicate_push_keeps_position() {
		let mut key = Key::new();
		key.push("class", "od");
		key.push("stream", "oper");
		key.push("class", "rd");
		assert_eq!(key.fingerprint(), "rd:oper");
		assert_eq!(key.len(), 2);
	}

	#[test]
	fn test_parse_roundtrip() {
		let registry = TypesRegistry::new();
		let key = Key::parse("class=od,stream=oper,date=20210427", &registry).unwrap();
		assert_eq!(key.to_string(), "class=od,stream=oper,date=20210427");

		let again = Key::parse(&key.to_string(), &registry).unwrap();
		assert_eq!(key, again);
	}

	#[test]
	fn test_matches_is_subset_equality() {
		let registry = TypesRegistry::new();
		let key = Key::parse("class=od,stream=oper,time=1200", &registry).unwrap();
		let sub = Key::parse("class=od,time=1200", &registry).unwrap();
		let other = Key::parse("class=rd", &registry).unwrap();

		assert!(key.matches(&sub));
		assert!(!key.matches(&other));
		assert!(!sub.matches(&key));
	}

	#[test]
	fn test_push_from_pop_from() {
		let registry = TypesRegistry::new();
		let mut full = Key::parse("class=od", &registry).unwrap();
		let index = Key::parse("type=pb,levtype=pl", &registry).unwrap();

		full.push_from(&index);
		assert_eq!(full.fingerprint(), "od:pb:pl");
		full.pop_from(&index);
		assert_eq!(full.fingerprint(), "od");
	}

	#[test]
	fn test_typed_key_canonical_values() {
		let mut registry = TypesRegistry::new();
		registry.add("date", "ClimateDaily").unwrap();
		registry.add("time", "Time").unwrap();
		registry.add("step", "Step").unwrap();
		registry.add("expver", "Expver").unwrap();

		let mut key = TypedKey::new(&registry);
		assert!(key.canonical_value("date").is_err());

		key.push("date", "20210427");
		key.push("stream", "dacl");
		key.push("time", "6");
		key.push("step", "30m-60m");
		key.push("expver", "1");

		assert_eq!(key.canonical_value("date").unwrap(), "0427");
		assert_eq!(key.canonical_value("time").unwrap(), "0600");
		assert_eq!(key.canonical_value("step").unwrap(), "30m-1");
		assert_eq!(key.canonical_value("expver").unwrap(), "0001");
		assert_eq!(key.canonical().unwrap().fingerprint(), "0427:dacl:0600:30m-1:0001");
	}

	#[test]
	fn test_typed_key_canonicalisation_is_idempotent() {
		let mut registry = TypesRegistry::new();
		registry.add("time", "Time").unwrap();
		registry.add("step", "Step").unwrap();
		registry.add("levelist", "Double").unwrap();

		let mut key = TypedKey::new(&registry);
		key.push("time", "12");
		key.push("step", "60m");
		key.push("levelist", "200.0");

		let canonical = key.canonical().unwrap();

		let mut again = TypedKey::new(&registry);
		for (k, v) in canonical.iter() {
			again.push(k, v);
		}
		assert_eq!(again.canonical().unwrap(), canonical);
	}

	quickcheck! {
		fn quickcheck_display_parse_roundtrip(values: Vec<u8>) -> bool {
			let registry = TypesRegistry::new();

			let mut key = Key::new();
			for (i, v) in values.iter().enumerate() {
				key.push(&format!("k{}", i), &format!("v{}", v));
			}

			let again = Key::parse(&key.to_string(), &registry).unwrap();
			again == key && again.to_string() == key.to_string()
		}
	}
}
