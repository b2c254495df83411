use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use config::Config;
use database::root::RootManager;
use database::DbReader;
use error::Result;
use index::{Field, Index};
use key::Key;
use schema::Schema;
use toc::TocHandler;

/// The snapshot reader behind `toc.reader`.
///
/// The set of live indexes is fixed when the database is opened; records
/// appended afterwards are observed by a later open. When the stored
/// schema differs from the master schema the stored one wins, with a
/// warning.
pub struct TocDbReader {
	key: Key,
	directory: PathBuf,
	schema: Arc<Schema>,
	indexes: Vec<Index>,
	selected: Vec<usize>,
}

impl TocDbReader {
	/// Opens a database for reading; `None` when no database exists for
	/// the key on any visitable root.
	pub fn open(key: &Key, config: &Config, master: Arc<Schema>) -> Result<Option<TocDbReader>> {
		let directory = match RootManager::new(config).existing_directory(key) {
			Some(directory) => directory,
			None => return Ok(None),
		};

		Self::open_directory(key.clone(), directory, config, Some(master))
	}

	/// Opens the database in a specific directory, bypassing root
	/// selection (used by maintenance tools).
	pub fn open_directory(
		key: Key,
		directory: PathBuf,
		config: &Config,
		master: Option<Arc<Schema>>,
	) -> Result<Option<TocDbReader>> {
		let toc = TocHandler::new(&directory, config);
		if !toc.exists() {
			return Ok(None);
		}

		let schema = config.schemas().load(toc.schema_path())?;
		if let Some(master) = master {
			if !schema.same_as(&master) {
				warn!(
					"schema has changed for {}: using the schema stored in {}",
					key,
					toc.schema_path().display()
				);
			}
		}

		let indexes = toc.load_indexes()?;

		Ok(Some(TocDbReader {
			key,
			directory,
			schema,
			indexes,
			selected: Vec::new(),
		}))
	}

	/// The database directory.
	pub fn directory(&self) -> &PathBuf {
		&self.directory
	}

	/// Number of live indexes in the snapshot.
	pub fn index_count(&self) -> usize {
		self.indexes.len()
	}
}

impl DbReader for TocDbReader {
	fn key(&self) -> &Key {
		&self.key
	}

	fn schema(&self) -> Arc<Schema> {
		self.schema.clone()
	}

	fn select_index(&mut self, key: &Key) -> Result<bool> {
		self.selected = self.indexes.iter()
			.enumerate()
			.filter(|&(_, index)| index.key() == key)
			.map(|(i, _)| i)
			.collect();
		Ok(!self.selected.is_empty())
	}

	fn retrieve(&mut self, datum: &Key) -> Result<Option<Field>> {
		let fingerprint = datum.fingerprint();

		// indexes are held latest-first, so the first hit wins
		for &i in &self.selected {
			if let Some(field) = self.indexes[i].get(&fingerprint)? {
				debug!("retrieved {{{}}} from {}", datum, field.path.display());
				return Ok(Some(field));
			}
		}
		Ok(None)
	}

	fn axis(&self, keyword: &str) -> BTreeSet<String> {
		let mut out = BTreeSet::new();
		for index in &self.indexes {
			if let Some(values) = index.axis().values(keyword) {
				for value in values {
					out.insert(value.clone());
				}
			}
		}
		out
	}
}
