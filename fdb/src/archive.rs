use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use config::Config;
use database::DbWriter;
use error::{ErrorKind, Result};
use key::Key;
use schema::Schema;
use visitor::WriteVisitor;

/// The write driver: expands each field key through the master schema
/// and hands the bytes to the right database.
///
/// Open writers are cached up to `fdbMaxNbDBsOpen` and evicted least
/// recently used; eviction flushes the evicted database. One archiver
/// serves one thread; parallel archiving takes one archiver per thread.
pub struct Archiver {
	config: Config,
	schema: Arc<Schema>,
	databases: HashMap<Key, Box<DbWriter>>,
	// schemas adopted after drift, kept alive until the data is flushed
	retry_schemas: Vec<Arc<Schema>>,
}

impl Archiver {
	/// Creates an archiver over the master schema of the configuration.
	pub fn new(config: Config) -> Result<Archiver> {
		let schema = config.schemas().load(&config.schema_path)?;
		Ok(Archiver {
			config,
			schema,
			databases: HashMap::new(),
			retry_schemas: Vec::new(),
		})
	}

	/// The master schema.
	pub fn schema(&self) -> &Arc<Schema> {
		&self.schema
	}

	/// Archives one field. The key must reach exactly one datum rule.
	///
	/// When the schema stored in the target database differs from the
	/// master schema, the archive is retried with the stored schema; the
	/// write fails only when that schema rejects the key too.
	pub fn archive(&mut self, key: &Key, data: &[u8]) -> Result<()> {
		let schema = self.schema.clone();

		let matched = match self.expand_with(schema, key, data) {
			Ok(matched) => matched,
			Err(e) => {
				let stored_path: PathBuf = match *e.kind() {
					ErrorKind::SchemaHasChanged(ref path) => path.clone(),
					_ => return Err(e),
				};

				error!("{}", e);
				error!("trying with the schema stored in {}", stored_path.display());

				let stored = self.config.schemas().load(&stored_path)?;
				// the stored schema must outlive the flush of this data
				self.retry_schemas.push(stored.clone());
				self.expand_with(stored, key, data)?
			}
		};

		if !matched {
			bail!(ErrorKind::RuleNotFound(key.to_string()));
		}
		Ok(())
	}

	/// Flushes every open database, making all archived fields visible.
	pub fn flush(&mut self) -> Result<()> {
		for db in self.databases.values_mut() {
			db.flush()?;
		}
		Ok(())
	}

	fn expand_with(&mut self, schema: Arc<Schema>, key: &Key, data: &[u8]) -> Result<bool> {
		let check_missing = self.config.check_missing_keys;
		let match_first = self.config.match_first_rule;

		let mut visitor = ArchiveVisitor {
			archiver: self,
			schema: schema.clone(),
			data,
			current: None,
			rule: None,
		};

		schema.expand_write(key, &mut visitor, check_missing, match_first)?;
		Ok(visitor.rule.is_some())
	}

	// the writer for a database key, opened on demand; evicts the least
	// recently used writer when the cache is full
	fn database(&mut self, key: &Key, schema: &Arc<Schema>) -> Result<&mut Box<DbWriter>> {
		if self.databases.contains_key(key) {
			let db = self.databases.get_mut(key).expect("just checked; qed");
			db.touch();
			return Ok(db);
		}

		if self.databases.len() >= self.config.max_open_dbs {
			let oldest = self.databases.iter()
				.min_by_key(|&(_, db)| db.last_access())
				.map(|(k, _)| k.clone());
			if let Some(oldest) = oldest {
				info!("closing database {}", oldest);
				if let Some(mut db) = self.databases.remove(&oldest) {
					db.close()?;
				}
			}
		}

		let engine = self.config.engines().engine(&self.config.writer_engine)?;
		let db = engine.open_writer(key, &self.config, schema.clone())?;
		self.databases.insert(key.clone(), db);
		Ok(self.databases.get_mut(key).expect("just inserted; qed"))
	}

	#[cfg(test)]
	pub(crate) fn open_database_count(&self) -> usize {
		self.databases.len()
	}
}

impl Drop for Archiver {
	fn drop(&mut self) {
		if let Err(e) = self.flush() {
			error!("flush on drop failed: {}", e);
		}
	}
}

// drives one field through select_database/select_index/select_datum
struct ArchiveVisitor<'a> {
	archiver: &'a mut Archiver,
	schema: Arc<Schema>,
	data: &'a [u8],
	current: Option<Key>,
	rule: Option<usize>,
}

impl<'a> ArchiveVisitor<'a> {
	fn current_db(&mut self) -> &mut Box<DbWriter> {
		let key = self.current.as_ref().expect("a database was selected; qed");
		self.archiver.databases.get_mut(key).expect("selected databases stay cached; qed")
	}
}

impl<'a> WriteVisitor for ArchiveVisitor<'a> {
	fn select_database(&mut self, key: &Key, _full: &Key) -> Result<bool> {
		let schema = self.schema.clone();
		self.archiver.database(key, &schema)?;
		self.current = Some(key.clone());
		Ok(true)
	}

	fn select_index(&mut self, key: &Key, _full: &Key) -> Result<bool> {
		self.current_db().select_index(key)
	}

	fn select_datum(&mut self, key: &Key, _full: &Key) -> Result<bool> {
		let data = self.data;
		self.current_db().archive(key, data)?;
		Ok(true)
	}

	fn database_schema(&self) -> Option<Arc<Schema>> {
		let key = self.current.as_ref()?;
		self.archiver.databases.get(key).map(|db| db.schema())
	}

	fn rule(&self) -> Option<usize> {
		self.rule
	}

	fn set_rule(&mut self, line: usize) {
		self.rule = Some(line);
	}
}
