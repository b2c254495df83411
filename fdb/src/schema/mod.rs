//! The declarative rule tree mapping keys to databases, indexes and datums.

mod matcher;
mod parser;
mod rule;

pub use self::matcher::{Matcher, Predicate};
pub use self::rule::Rule;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use error::Result;
use key::Key;
use request::Request;
use types::TypesRegistry;
use visitor::{ReadVisitor, WriteVisitor};

use self::parser::SchemaParser;

/// An ordered forest of database rules plus the root types registry.
///
/// Once a database has been created its schema is copied into the database
/// directory; that copy, not the process master schema, governs the
/// database from then on.
#[derive(Debug)]
pub struct Schema {
	path: PathBuf,
	registry: TypesRegistry,
	rules: Vec<Rule>,
}

impl Schema {
	/// Loads and checks a schema file.
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Schema> {
		let text = fs::read_to_string(&path)?;
		Schema::from_str(&text, path.as_ref())
	}

	/// Parses and checks schema text. `path` is only used for messages
	/// and drift reporting.
	pub fn from_str(text: &str, path: &Path) -> Result<Schema> {
		let (registry, rules) = SchemaParser::new(text).parse()?;
		let mut schema = Schema {
			path: path.to_path_buf(),
			registry,
			rules,
		};
		schema.check()?;
		Ok(schema)
	}

	// rule trees must be exactly three levels deep, and every rule sees
	// the registry chain down to the root
	fn check(&mut self) -> Result<()> {
		for rule in &self.rules {
			rule.check_depth(1)?;
		}
		let registry = self.registry.clone();
		for rule in &mut self.rules {
			rule.flatten_registries(&registry);
		}
		Ok(())
	}

	/// Where this schema was loaded from.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// The root types registry.
	pub fn registry(&self) -> &TypesRegistry {
		&self.registry
	}

	/// The database-level rules, in declaration order.
	pub fn rules(&self) -> &[Rule] {
		&self.rules
	}

	/// The first database rule whose predicates accept `db_key`.
	pub fn matching_rule(&self, db_key: &Key) -> Option<&Rule> {
		self.rules.iter().find(|r| r.matches_key(db_key))
	}

	/// Expands a fully specified field key through the rule tree, driving
	/// the write visitor. Once a database is selected the expansion
	/// continues with that database's own schema.
	pub fn expand_write(
		&self,
		field: &Key,
		visitor: &mut WriteVisitor,
		check_missing: bool,
		match_first: bool,
	) -> Result<()> {
		for db_rule in &self.rules {
			let key = match db_rule.find_matching_key(field, check_missing)? {
				Some(key) => key,
				None => continue,
			};

			if !visitor.select_database(&key, &key)? {
				continue;
			}

			let db_schema = visitor.database_schema()
				.expect("database schema is available after selection; qed");

			if let Some(db_rule) = db_schema.matching_rule(&key) {
				let mut full = key.clone();
				for index_rule in db_rule.children() {
					if index_rule.expand_write_index(field, visitor, &mut full, check_missing, match_first)? {
						break;
					}
				}
			}
		}
		Ok(())
	}

	/// Expands a request through the rule tree, driving the read visitor.
	pub fn expand_read(&self, request: &Request, visitor: &mut ReadVisitor) -> Result<()> {
		for db_rule in &self.rules {
			for key in db_rule.matching_keys(request, visitor)? {
				if !visitor.select_database(&key, &key)? {
					continue;
				}

				let db_schema = visitor.database_schema()
					.expect("database schema is available after selection; qed");

				if let Some(db_rule) = db_schema.matching_rule(&key) {
					let mut full = key.clone();
					for index_rule in db_rule.children() {
						index_rule.expand_read_index(request, visitor, &mut full)?;
					}
				}
			}
		}
		Ok(())
	}

	/// Renders the schema in its grammar. Two schemas are considered
	/// equal when their dumps are byte-identical.
	pub fn dump(&self) -> String {
		let mut out = String::new();
		self.registry.dump(&mut out);
		for rule in &self.rules {
			rule.dump(&mut out);
			out.push('\n');
		}
		out
	}

	/// True when `other` describes the same rules and types.
	pub fn same_as(&self, other: &Schema) -> bool {
		self.dump() == other.dump()
	}
}

/// Process-wide cache of loaded schemas, keyed by path.
#[derive(Debug, Default)]
pub struct SchemaCache {
	cache: Mutex<HashMap<PathBuf, Arc<Schema>>>,
}

impl SchemaCache {
	/// Creates an empty cache.
	pub fn new() -> SchemaCache {
		SchemaCache::default()
	}

	/// Loads a schema, or returns the cached copy.
	pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Arc<Schema>> {
		let path = path.as_ref();
		let mut cache = self.cache.lock();
		if let Some(schema) = cache.get(path) {
			return Ok(schema.clone());
		}

		let schema = Arc::new(Schema::load(path)?);
		cache.insert(path.to_path_buf(), schema.clone());
		Ok(schema)
	}
}

#[cfg(test)]
mod tests {
	use std::path::Path;
	use super::Schema;

	const SCHEMA: &str = "
		date: Date;
		time: Time;
		step: Step;
		param: Param;
		expver: Expver;

		[ class=od, expver, stream=oper, date, time, domain?g
			[ type, levtype
				[ step, quantile?, levelist?, param ]]]

		[ class=od, expver, stream=dacl, date:ClimateDaily, time, domain?g
			[ type, levtype
				[ step, levelist?, param ]]]
	";

	#[test]
	fn test_load_and_dump_fixpoint() {
		let schema = Schema::from_str(SCHEMA, Path::new("test")).unwrap();
		let dump = schema.dump();

		let again = Schema::from_str(&dump, Path::new("test2")).unwrap();
		assert_eq!(dump, again.dump());
		assert!(schema.same_as(&again));
	}

	#[test]
	fn test_wrong_depth_is_rejected() {
		assert!(Schema::from_str("[ class [ type ]]", Path::new("t")).is_err());
		assert!(Schema::from_str("[ class [ type [ step [ param ]]]]", Path::new("t")).is_err());
		assert!(Schema::from_str("[ class ]", Path::new("t")).is_err());
	}

	#[test]
	fn test_matching_rule() {
		let schema = Schema::from_str(SCHEMA, Path::new("t")).unwrap();
		let registry = schema.registry().clone();

		let key = ::key::Key::parse("class=od,expver=0001,stream=oper,date=20210427,time=1200,domain=g", &registry).unwrap();
		let rule = schema.matching_rule(&key).unwrap();
		assert_eq!(rule.line(), 8);

		let other = ::key::Key::parse("class=rd", &registry).unwrap();
		assert!(schema.matching_rule(&other).is_none());
	}
}
