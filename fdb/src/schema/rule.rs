use error::{ErrorKind, Result};
use key::Key;
use request::Request;
use schema::matcher::Predicate;
use types::TypesRegistry;
use visitor::{ReadVisitor, WriteVisitor};

/// A node of the three-level rule tree. The outermost rules select
/// databases, their children select indexes, and the innermost leaves
/// select datums.
#[derive(Debug, Clone)]
pub struct Rule {
	line: usize,
	predicates: Vec<Predicate>,
	children: Vec<Rule>,
	registry: TypesRegistry,
}

impl Rule {
	pub(crate) fn new(
		line: usize,
		predicates: Vec<Predicate>,
		children: Vec<Rule>,
		registry: TypesRegistry,
	) -> Rule {
		Rule { line, predicates, children, registry }
	}

	/// Source line of the opening bracket, for diagnostics.
	pub fn line(&self) -> usize {
		self.line
	}

	/// Child rules of the next level down.
	pub fn children(&self) -> &[Rule] {
		&self.children
	}

	/// The effective types registry of this rule.
	pub fn registry(&self) -> &TypesRegistry {
		&self.registry
	}

	pub(crate) fn check_depth(&self, level: usize) -> Result<()> {
		if self.children.is_empty() {
			if level != 3 {
				bail!(ErrorKind::SchemaSyntax(
					self.line,
					format!("rule tree must be three levels deep, leaf found at level {}", level)
				));
			}
			return Ok(());
		}
		for child in &self.children {
			child.check_depth(level + 1)?;
		}
		Ok(())
	}

	// merge the overlay registries down the tree so every rule sees the
	// whole keyword->type chain
	pub(crate) fn flatten_registries(&mut self, parent: &TypesRegistry) {
		self.registry = self.registry.merged_over(parent);
		let registry = self.registry.clone();
		for child in &mut self.children {
			child.flatten_registries(&registry);
		}
	}

	/// Do all predicates accept this key?
	pub fn matches_key(&self, key: &Key) -> bool {
		self.predicates.iter().all(|p| p.match_key(key))
	}

	/// The key this rule derives from a fully specified field key, in
	/// on-disk form, or `None` when a predicate rejects the field.
	pub fn find_matching_key(&self, field: &Key, check_missing: bool) -> Result<Option<Key>> {
		let mut key = Key::new();

		for pred in &self.predicates {
			if !pred.match_key(field) {
				return Ok(None);
			}

			let raw = match pred.value_for(field) {
				Some(v) => v.to_string(),
				None if check_missing => bail!(ErrorKind::MissingKeyword(
					pred.keyword().into(),
					field.to_string()
				)),
				None => return Ok(None),
			};

			let t = self.registry.lookup(pred.keyword());
			let canonical = t.canonicalise(pred.keyword(), &raw)?;
			key.push(pred.keyword(), &t.to_key(&canonical));
		}

		Ok(Some(key))
	}

	/// All keys this rule derives from a request, in on-disk form and in
	/// predicate declaration order.
	pub fn matching_keys(&self, request: &Request, visitor: &mut ReadVisitor) -> Result<Vec<Key>> {
		let mut nodes: Vec<(&str, Vec<String>)> = Vec::with_capacity(self.predicates.len());

		for pred in &self.predicates {
			let keyword = pred.keyword();

			if !pred.optional() && request.count_values(keyword) == 0 {
				return Ok(Vec::new());
			}

			let mut values = visitor.values(request, keyword, &self.registry)?;
			if values.is_empty() {
				match pred.default_value() {
					Some(default) => values.push(default.to_string()),
					None => return Ok(Vec::new()),
				}
			}

			let t = self.registry.lookup(keyword);
			let mut node: Vec<String> = Vec::with_capacity(values.len());
			for value in values {
				if !pred.match_value(&value) {
					continue;
				}
				let projected = t.to_key(&value);
				if !node.contains(&projected) {
					node.push(projected);
				}
			}

			if node.is_empty() {
				return Ok(Vec::new());
			}
			nodes.push((keyword, node));
		}

		let mut keys = Vec::new();
		if !nodes.is_empty() {
			let mut key = Key::new();
			Self::product(&nodes, &mut key, &mut keys);
		}
		Ok(keys)
	}

	// depth-first Cartesian product over the per-predicate value sets
	fn product(nodes: &[(&str, Vec<String>)], key: &mut Key, keys: &mut Vec<Key>) {
		match nodes.split_first() {
			None => keys.push(key.clone()),
			Some((&(keyword, ref values), rest)) => {
				for value in values {
					key.push(keyword, value);
					Self::product(rest, key, keys);
					key.pop(keyword);
				}
			}
		}
	}

	pub(crate) fn expand_read_index(
		&self,
		request: &Request,
		visitor: &mut ReadVisitor,
		full: &mut Key,
	) -> Result<()> {
		for key in self.matching_keys(request, visitor)? {
			full.push_from(&key);
			if visitor.select_index(&key, full)? {
				for rule in &self.children {
					rule.expand_read_datum(request, visitor, full)?;
				}
			}
			full.pop_from(&key);
		}
		Ok(())
	}

	pub(crate) fn expand_read_datum(
		&self,
		request: &Request,
		visitor: &mut ReadVisitor,
		full: &mut Key,
	) -> Result<()> {
		for key in self.matching_keys(request, visitor)? {
			full.push_from(&key);
			visitor.select_datum(&key, full)?;
			full.pop_from(&key);
		}
		Ok(())
	}

	pub(crate) fn expand_write_index(
		&self,
		field: &Key,
		visitor: &mut WriteVisitor,
		full: &mut Key,
		check_missing: bool,
		match_first: bool,
	) -> Result<bool> {
		if let Some(key) = self.find_matching_key(field, check_missing)? {
			full.push_from(&key);
			if visitor.select_index(&key, full)? {
				for rule in &self.children {
					if rule.expand_write_datum(field, visitor, full, check_missing, match_first)? {
						full.pop_from(&key);
						return Ok(true);
					}
				}
			}
			full.pop_from(&key);
		}
		Ok(false)
	}

	pub(crate) fn expand_write_datum(
		&self,
		field: &Key,
		visitor: &mut WriteVisitor,
		full: &mut Key,
		check_missing: bool,
		match_first: bool,
	) -> Result<bool> {
		if let Some(key) = self.find_matching_key(field, check_missing)? {
			full.push_from(&key);

			if let Some(previous) = visitor.rule() {
				bail!(ErrorKind::AmbiguousRule(full.to_string(), previous, self.line));
			}

			if visitor.select_datum(&key, full)? {
				visitor.set_rule(self.line);
				if match_first {
					full.pop_from(&key);
					return Ok(true);
				}
			}

			full.pop_from(&key);
		}
		Ok(false)
	}

	/// Reconstructs a key from a colon-joined fingerprint, mapping each
	/// value back to this rule's predicates in order.
	pub fn key_from_fingerprint(&self, fingerprint: &str) -> Result<Key> {
		let values: Vec<&str> = if fingerprint.is_empty() {
			Vec::new()
		} else {
			fingerprint.split(':').collect()
		};

		if values.len() != self.predicates.len() {
			bail!(ErrorKind::InvalidValue(
				"fingerprint".into(),
				fingerprint.into(),
				format!("expected {} values, got {}", self.predicates.len(), values.len())
			));
		}

		let mut key = Key::new();
		for (pred, value) in self.predicates.iter().zip(values) {
			key.push(pred.keyword(), value);
		}
		Ok(key)
	}

	/// Writes the rule in schema grammar form.
	pub fn dump(&self, out: &mut String) {
		out.push('[');
		let mut sep = "";
		for pred in &self.predicates {
			out.push_str(sep);
			pred.dump(out, &self.registry);
			sep = ",";
		}
		for child in &self.children {
			child.dump(out);
		}
		out.push(']');
	}

	#[cfg(test)]
	pub(crate) fn with_predicates(line: usize, predicates: Vec<(&str, ::schema::matcher::Matcher)>) -> Rule {
		Rule::new(
			line,
			predicates.into_iter().map(|(k, m)| Predicate::new(k, m)).collect(),
			Vec::new(),
			TypesRegistry::new(),
		)
	}
}
