use std::sync::Arc;

use error::Result;
use key::Key;
use request::Request;
use schema::Schema;
use types::TypesRegistry;

/// Callbacks driven by the write-path expansion.
///
/// The schema calls `select_database`, `select_index` and `select_datum`
/// in that order for each matching rule chain; returning `false` vetoes
/// further descent.
pub trait WriteVisitor {
	/// A database rule matched; opens or creates the database.
	fn select_database(&mut self, key: &Key, full: &Key) -> Result<bool>;
	/// An index rule matched within the selected database.
	fn select_index(&mut self, key: &Key, full: &Key) -> Result<bool>;
	/// A datum rule matched; stores the field.
	fn select_datum(&mut self, key: &Key, full: &Key) -> Result<bool>;

	/// Schema of the currently selected database. Available after
	/// `select_database` returned `true`.
	fn database_schema(&self) -> Option<Arc<Schema>>;

	/// Source line of the datum rule that accepted the field, if any.
	fn rule(&self) -> Option<usize>;
	/// Remembers the datum rule that accepted the field.
	fn set_rule(&mut self, line: usize);
}

/// Callbacks driven by the read-path expansion.
pub trait ReadVisitor {
	/// A candidate database key was derived from the request.
	fn select_database(&mut self, key: &Key, full: &Key) -> Result<bool>;
	/// A candidate index key was derived within the selected database.
	fn select_index(&mut self, key: &Key, full: &Key) -> Result<bool>;
	/// A candidate datum key was derived; looks the field up.
	fn select_datum(&mut self, key: &Key, full: &Key) -> Result<bool>;

	/// The candidate values of `keyword`, canonicalised through its type.
	/// Implementations supply the axis of the selected database so `Step`
	/// and `Param` can resolve against the stored values.
	fn values(&mut self, request: &Request, keyword: &str, registry: &TypesRegistry) -> Result<Vec<String>>;

	/// Schema of the currently selected database. Available after
	/// `select_database` returned `true`.
	fn database_schema(&self) -> Option<Arc<Schema>>;
}
