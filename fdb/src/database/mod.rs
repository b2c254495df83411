//! Database abstraction and the TOC engine behind it.

mod datafile;
mod reader;
mod root;
mod writer;

pub use self::reader::TocDbReader;
pub use self::root::RootManager;
pub use self::writer::TocDbWriter;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use config::Config;
use error::{ErrorKind, Result};
use index::Field;
use key::Key;
use schema::Schema;

/// A database opened for archiving.
pub trait DbWriter {
	/// The database key.
	fn key(&self) -> &Key;
	/// The schema governing this database.
	fn schema(&self) -> Arc<Schema>;
	/// Selects (creating on first use) the index for an index key.
	fn select_index(&mut self, key: &Key) -> Result<bool>;
	/// Appends field bytes and records them under the datum key in the
	/// selected index.
	fn archive(&mut self, datum: &Key, data: &[u8]) -> Result<()>;
	/// Makes everything archived so far visible to readers.
	fn flush(&mut self) -> Result<()>;
	/// Flushes and releases all file handles.
	fn close(&mut self) -> Result<()>;
	/// Marks the database as recently used.
	fn touch(&mut self);
	/// When the database was last used.
	fn last_access(&self) -> Instant;
}

/// A database opened for retrieval. The set of visible indexes is the
/// snapshot taken when the database was opened.
pub trait DbReader {
	/// The database key.
	fn key(&self) -> &Key;
	/// The schema governing this database.
	fn schema(&self) -> Arc<Schema>;
	/// Selects the live indexes matching an index key.
	fn select_index(&mut self, key: &Key) -> Result<bool>;
	/// Looks a datum up in the selected indexes, latest writer first.
	fn retrieve(&mut self, datum: &Key) -> Result<Option<Field>>;
	/// Union of the values seen for a keyword across the live indexes.
	fn axis(&self, keyword: &str) -> BTreeSet<String>;
}

/// A database backend: builds readers and writers for database keys.
pub trait Engine: Send + Sync + fmt::Debug {
	/// The engine name, e.g. `toc`.
	fn name(&self) -> &str;
	/// Opens (creating if necessary) a database for writing.
	fn open_writer(&self, key: &Key, config: &Config, schema: Arc<Schema>) -> Result<Box<DbWriter>>;
	/// Opens a database for reading; `None` when it does not exist.
	fn open_reader(&self, key: &Key, config: &Config, master: Arc<Schema>) -> Result<Option<Box<DbReader>>>;
}

/// The default append-only engine.
#[derive(Debug)]
pub struct TocEngine;

impl Engine for TocEngine {
	fn name(&self) -> &str {
		"toc"
	}

	fn open_writer(&self, key: &Key, config: &Config, schema: Arc<Schema>) -> Result<Box<DbWriter>> {
		Ok(Box::new(TocDbWriter::open(key, config, schema)?))
	}

	fn open_reader(&self, key: &Key, config: &Config, master: Arc<Schema>) -> Result<Option<Box<DbReader>>> {
		Ok(TocDbReader::open(key, config, master)?
			.map(|reader| Box::new(reader) as Box<DbReader>))
	}
}

/// Engine dispatch by name. Backend specifications such as `toc.writer`
/// name the engine before the first dot.
pub struct EngineRegistry {
	engines: Mutex<HashMap<String, Arc<Engine>>>,
}

impl EngineRegistry {
	/// A registry with the TOC engine registered.
	pub fn with_defaults() -> EngineRegistry {
		let registry = EngineRegistry { engines: Mutex::new(HashMap::new()) };
		registry.register(Arc::new(TocEngine));
		registry
	}

	/// Registers an engine under its name.
	pub fn register(&self, engine: Arc<Engine>) {
		self.engines.lock().insert(engine.name().to_string(), engine);
	}

	/// Resolves a backend specification to its engine.
	pub fn engine(&self, spec: &str) -> Result<Arc<Engine>> {
		let name = spec.split('.').next().unwrap_or(spec);
		self.engines.lock()
			.get(name)
			.cloned()
			.ok_or_else(|| ErrorKind::NoEngine(spec.into()).into())
	}
}

impl fmt::Debug for EngineRegistry {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let names: Vec<String> = self.engines.lock().keys().cloned().collect();
		write!(f, "EngineRegistry{:?}", names)
	}
}
