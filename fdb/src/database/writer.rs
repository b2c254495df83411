use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use fs2;

use config::Config;
use database::datafile::DataHandle;
use database::root::RootManager;
use database::DbWriter;
use error::{ErrorKind, Result};
use index::Index;
use key::Key;
use schema::Schema;
use toc::{unique_suffix, TocHandler};

/// The append-only writer behind `toc.writer`.
///
/// Fields go to striped data files, one per index key, padded to the
/// block size; datum keys go to a fresh index per writer session. Nothing
/// becomes visible to readers until `flush` records the indexes in the
/// TOC.
pub struct TocDbWriter {
	key: Key,
	directory: PathBuf,
	schema: Arc<Schema>,
	config: Config,
	toc: TocHandler,
	indexes: HashMap<Key, Index>,
	data_paths: HashMap<Key, PathBuf>,
	handles: HashMap<PathBuf, DataHandle>,
	current: Option<Key>,
	dirty: bool,
	block_size: u64,
	last_access: Instant,
}

impl TocDbWriter {
	/// Opens a database for writing, creating it if needed. The schema
	/// stored in the database must agree with the schema driving the
	/// caller's expansion, else `SchemaHasChanged` asks the caller to
	/// retry with the stored one.
	pub fn open(key: &Key, config: &Config, expected_schema: Arc<Schema>) -> Result<TocDbWriter> {
		let directory = RootManager::new(config).directory_for(key)?;
		let mut toc = TocHandler::new(&directory, config);

		if !toc.exists() {
			toc.initialise(key, Some(&config.schema_path))?;
		} else {
			let (stored, _) = toc.database_key()?;
			if stored != *key {
				bail!(ErrorKind::CorruptedToc(
					toc.toc_path().to_path_buf(),
					format!("database holds key {}, expected {}", stored, key),
				));
			}
		}

		toc.check_writable(config)?;

		let schema = config.schemas().load(toc.schema_path())?;
		if !schema.same_as(&expected_schema) {
			bail!(ErrorKind::SchemaHasChanged(toc.schema_path().to_path_buf()));
		}

		let block_size = if config.block_size > 0 {
			config.block_size as u64
		} else {
			fs2::statvfs(&directory)?.allocation_granularity()
		};

		info!(
			"opened {} for writing with block size of {} bytes",
			directory.display(),
			block_size
		);

		Ok(TocDbWriter {
			key: key.clone(),
			directory,
			schema,
			config: config.clone(),
			toc,
			indexes: HashMap::new(),
			data_paths: HashMap::new(),
			handles: HashMap::new(),
			current: None,
			dirty: false,
			block_size,
			last_access: Instant::now(),
		})
	}

	/// The database directory.
	pub fn directory(&self) -> &PathBuf {
		&self.directory
	}

	fn data_path(&mut self, index_key: &Key) -> PathBuf {
		if let Some(path) = self.data_paths.get(index_key) {
			return path.clone();
		}
		let path = self.directory.join(
			format!("{}.{}.data", index_key.fingerprint(), unique_suffix()),
		);
		self.config.lustre.apply(&path, &self.config.lustre.data);
		self.data_paths.insert(index_key.clone(), path.clone());
		path
	}
}

impl DbWriter for TocDbWriter {
	fn key(&self) -> &Key {
		&self.key
	}

	fn schema(&self) -> Arc<Schema> {
		self.schema.clone()
	}

	fn select_index(&mut self, key: &Key) -> Result<bool> {
		if !self.indexes.contains_key(key) {
			let path = self.directory.join(
				format!("{}.{}.idx", key.fingerprint(), unique_suffix()),
			);
			self.config.lustre.apply(&path, &self.config.lustre.index);
			self.indexes.insert(
				key.clone(),
				Index::create(key.clone(), path, self.config.check_double_insert),
			);
		}
		self.current = Some(key.clone());
		Ok(true)
	}

	fn archive(&mut self, datum: &Key, data: &[u8]) -> Result<()> {
		let current = self.current.clone()
			.expect("archive is only called after select_index; qed");

		self.dirty = true;

		let data_path = self.data_path(&current);
		if !self.handles.contains_key(&data_path) {
			let handle = DataHandle::open(&data_path, self.block_size, self.config.async_write)?;
			self.handles.insert(data_path.clone(), handle);
		}
		let (offset, length) = self.handles
			.get_mut(&data_path)
			.expect("handle was just inserted; qed")
			.write_field(data)?;

		debug!("indexing {{{}}} at {}+{}", datum, offset, length);

		self.indexes
			.get_mut(&current)
			.expect("select_index created the index; qed")
			.put(datum, &data_path, offset, length)
	}

	// the pinned order: flush data, flush indexes, record them in the
	// TOC, close the indexes, close the data handles; the next session
	// gets fresh index files
	fn flush(&mut self) -> Result<()> {
		if !self.dirty {
			return Ok(());
		}

		for handle in self.handles.values_mut() {
			handle.flush()?;
		}

		for index in self.indexes.values_mut() {
			index.flush()?;
		}

		for index in self.indexes.values() {
			self.toc.write_index_record(index, &self.key)?;
		}

		self.indexes.clear();
		self.current = None;

		for (_, handle) in self.handles.drain() {
			handle.close()?;
		}

		self.dirty = false;
		Ok(())
	}

	fn close(&mut self) -> Result<()> {
		self.flush()?;
		self.data_paths.clear();
		Ok(())
	}

	fn touch(&mut self) {
		self.last_access = Instant::now();
	}

	fn last_access(&self) -> Instant {
		self.last_access
	}
}

impl Drop for TocDbWriter {
	fn drop(&mut self) {
		if let Err(e) = self.close() {
			error!("closing {} failed: {}", self.directory.display(), e);
		}
	}
}
