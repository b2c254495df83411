//! B-tree indexes mapping datum keys to field locations.
//!
//! A writer session materialises each index as a fresh write-once `.idx`
//! file on flush; readers load the file back into memory on first use.
//! The index also owns a [`FileStore`] deduplicating data-file paths and
//! an [`IndexAxis`] of the values it has seen.

mod axis;
mod filestore;

pub use self::axis::IndexAxis;
pub use self::filestore::FileStore;

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use codec;
use error::{ErrorKind, Result};
use key::Key;

const INDEX_MAGIC: u32 = 0x4644_4249;
const INDEX_VERSION: u16 = 1;

/// Index open mode. An index is opened once per mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
	Write,
	Read,
}

/// A field location by file id within the index's file store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRef {
	/// Id of the data file in the file store.
	pub path_id: u32,
	/// Byte offset of the field within the file.
	pub offset: u64,
	/// Field length in bytes.
	pub length: u64,
}

/// A field location with the file id resolved to a path.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
	/// The data file.
	pub path: PathBuf,
	/// Byte offset of the field within the file.
	pub offset: u64,
	/// Field length in bytes.
	pub length: u64,
}

/// One B-tree of datum keys within a database.
#[derive(Debug)]
pub struct Index {
	key: Key,
	path: PathBuf,
	offset: u64,
	mode: Mode,
	entries: BTreeMap<String, FieldRef>,
	files: FileStore,
	axis: IndexAxis,
	loaded: bool,
	check_double_insert: bool,
}

impl Index {
	/// Creates an empty writable index that will be written to `path`.
	pub fn create(key: Key, path: PathBuf, check_double_insert: bool) -> Index {
		Index {
			key,
			path,
			offset: 0,
			mode: Mode::Write,
			entries: BTreeMap::new(),
			files: FileStore::new(),
			axis: IndexAxis::new(),
			loaded: true,
			check_double_insert,
		}
	}

	/// Opens an index recorded in a TOC; entries are loaded lazily.
	pub fn open(key: Key, path: PathBuf, offset: u64, axis: IndexAxis) -> Index {
		Index {
			key,
			path,
			offset,
			mode: Mode::Read,
			entries: BTreeMap::new(),
			files: FileStore::new(),
			axis,
			loaded: false,
			check_double_insert: false,
		}
	}

	/// The index key.
	pub fn key(&self) -> &Key {
		&self.key
	}

	/// Path of the `.idx` file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Byte offset of the index within its file.
	pub fn offset(&self) -> u64 {
		self.offset
	}

	/// The accumulated axis.
	pub fn axis(&self) -> &IndexAxis {
		&self.axis
	}

	/// Inserts a datum. Fails when double-insert checking is on and the
	/// datum key is already present.
	pub fn put(&mut self, datum: &Key, data_path: &Path, offset: u64, length: u64) -> Result<()> {
		assert_eq!(self.mode, Mode::Write);

		let path_id = self.files.insert(data_path);
		let fingerprint = datum.fingerprint();

		let replaced = self.entries
			.insert(fingerprint.clone(), FieldRef { path_id, offset, length })
			.is_some();

		if replaced && self.check_double_insert {
			bail!(ErrorKind::DoubleInsert(fingerprint));
		}

		self.axis.insert(datum);
		Ok(())
	}

	/// Looks a datum fingerprint up.
	pub fn get(&mut self, fingerprint: &str) -> Result<Option<Field>> {
		self.ensure_loaded()?;
		let field = match self.entries.get(fingerprint) {
			Some(r) => self.resolve(fingerprint, r)?,
			None => return Ok(None),
		};
		Ok(Some(field))
	}

	/// Removes a datum, reporting whether it was present.
	pub fn remove(&mut self, fingerprint: &str) -> Result<bool> {
		assert_eq!(self.mode, Mode::Write);
		Ok(self.entries.remove(fingerprint).is_some())
	}

	/// All `(fingerprint, field)` pairs in key order.
	pub fn entries(&mut self) -> Result<Vec<(String, Field)>> {
		self.ensure_loaded()?;
		let mut out = Vec::with_capacity(self.entries.len());
		for (fingerprint, r) in &self.entries {
			out.push((fingerprint.clone(), self.resolve(fingerprint, r)?));
		}
		Ok(out)
	}

	/// All `(fingerprint, field)` pairs within `[lo, hi)`.
	pub fn range(&mut self, lo: &str, hi: &str) -> Result<Vec<(String, Field)>> {
		self.ensure_loaded()?;
		let mut out = Vec::new();
		for (fingerprint, r) in self.entries.range(lo.to_string()..hi.to_string()) {
			out.push((fingerprint.clone(), self.resolve(fingerprint, r)?));
		}
		Ok(out)
	}

	/// Number of datums.
	pub fn len(&mut self) -> Result<usize> {
		self.ensure_loaded()?;
		Ok(self.entries.len())
	}

	fn resolve(&self, fingerprint: &str, r: &FieldRef) -> Result<Field> {
		let path = self.files.get(r.path_id).ok_or_else(|| {
			ErrorKind::CorruptedIndex(
				self.path.clone(),
				format!("entry `{}` references unknown file id {}", fingerprint, r.path_id),
			)
		})?;
		Ok(Field { path: path.to_path_buf(), offset: r.offset, length: r.length })
	}

	/// Writes the index out. The file is immutable afterwards.
	pub fn flush(&mut self) -> Result<()> {
		assert_eq!(self.mode, Mode::Write);

		let mut writer = codec::Writer::new();
		writer.write_u32(INDEX_MAGIC);
		writer.write_u16(INDEX_VERSION);
		self.key.encode(&mut writer);
		self.axis.encode(&mut writer);
		self.files.encode(&mut writer);
		writer.write_u64(self.entries.len() as u64);
		for (fingerprint, r) in &self.entries {
			writer.write_string(fingerprint);
			writer.write_u32(r.path_id);
			writer.write_u64(r.offset);
			writer.write_u64(r.length);
		}

		let mut file = fs::OpenOptions::new()
			.write(true)
			.create_new(true)
			.open(&self.path)?;
		file.write_all(&writer.into_bytes())?;
		file.sync_all()?;
		Ok(())
	}

	fn ensure_loaded(&mut self) -> Result<()> {
		if self.loaded {
			return Ok(());
		}

		let data = fs::read(&self.path)?;
		let offset = self.offset as usize;
		if offset >= data.len() {
			bail!(ErrorKind::CorruptedIndex(
				self.path.clone(),
				format!("offset {} beyond end of file", offset),
			));
		}

		let mut reader = codec::Reader::new(&data[offset..]);

		if reader.read_u32()? != INDEX_MAGIC {
			bail!(ErrorKind::CorruptedIndex(self.path.clone(), "bad magic".into()));
		}
		let version = reader.read_u16()?;
		if version > INDEX_VERSION {
			bail!(ErrorKind::VersionMismatch(INDEX_VERSION, version));
		}

		self.key = Key::decode(&mut reader)?;
		self.axis = IndexAxis::decode(&mut reader)?;
		self.files = FileStore::decode(&mut reader)?;

		let count = reader.read_u64()?;
		for _ in 0..count {
			let fingerprint = reader.read_string()?;
			let path_id = reader.read_u32()?;
			let offset = reader.read_u64()?;
			let length = reader.read_u64()?;
			self.entries.insert(fingerprint, FieldRef { path_id, offset, length });
		}

		self.loaded = true;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	extern crate tempdir;

	use self::tempdir::TempDir;
	use std::path::Path;

	use error::ErrorKind;
	use key::Key;
	use index::IndexAxis;
	use types::TypesRegistry;
	use super::Index;

	fn key(s: &str) -> Key {
		Key::parse(s, &TypesRegistry::new()).unwrap()
	}

	#[test]
	fn test_put_flush_load_get() {
		let temp = TempDir::new("test_put_flush_load_get").unwrap();
		let path = temp.path().join("pb:pl.0.idx");

		let mut index = Index::create(key("type=pb,levtype=pl"), path.clone(), true);
		index.put(&key("step=0,param=129.128"), Path::new("/db/a.data"), 0, 4).unwrap();
		index.put(&key("step=6,param=129.128"), Path::new("/db/a.data"), 4096, 4).unwrap();
		index.flush().unwrap();

		let mut reader = Index::open(key("type=pb,levtype=pl"), path, 0, IndexAxis::new());
		let field = reader.get("0:129.128").unwrap().unwrap();
		assert_eq!(field.path, Path::new("/db/a.data"));
		assert_eq!(field.offset, 0);
		assert_eq!(field.length, 4);

		let field = reader.get("6:129.128").unwrap().unwrap();
		assert_eq!(field.offset, 4096);

		assert!(reader.get("12:129.128").unwrap().is_none());
		assert_eq!(reader.len().unwrap(), 2);

		let steps: Vec<&String> = reader.axis().values("step").unwrap().iter().collect();
		assert_eq!(steps, ["0", "6"]);
	}

	#[test]
	fn test_double_insert_is_fatal() {
		let temp = TempDir::new("test_double_insert").unwrap();
		let path = temp.path().join("i.idx");

		let mut index = Index::create(key("type=pb"), path, true);
		index.put(&key("step=0"), Path::new("/db/a.data"), 0, 4).unwrap();
		let err = index.put(&key("step=0"), Path::new("/db/a.data"), 4096, 4).unwrap_err();
		assert_eq!(err.kind(), &ErrorKind::DoubleInsert("0".into()));
	}

	#[test]
	fn test_double_insert_allowed_when_disabled() {
		let temp = TempDir::new("test_double_insert_off").unwrap();
		let path = temp.path().join("i.idx");

		let mut index = Index::create(key("type=pb"), path, false);
		index.put(&key("step=0"), Path::new("/db/a.data"), 0, 4).unwrap();
		index.put(&key("step=0"), Path::new("/db/a.data"), 4096, 4).unwrap();
		assert_eq!(index.get("0").unwrap().unwrap().offset, 4096);
	}

	#[test]
	fn test_remove() {
		let temp = TempDir::new("test_remove").unwrap();
		let path = temp.path().join("i.idx");

		let mut index = Index::create(key("type=pb"), path, true);
		index.put(&key("step=0"), Path::new("/db/a.data"), 0, 4).unwrap();

		assert!(index.remove("0").unwrap());
		assert!(!index.remove("0").unwrap());
		assert!(index.get("0").unwrap().is_none());
	}

	#[test]
	fn test_range() {
		let temp = TempDir::new("test_range").unwrap();
		let path = temp.path().join("i.idx");

		let mut index = Index::create(key("type=pb"), path, true);
		index.put(&key("step=0"), Path::new("/db/a.data"), 0, 4).unwrap();
		index.put(&key("step=12"), Path::new("/db/a.data"), 4, 4).unwrap();
		index.put(&key("step=6"), Path::new("/db/a.data"), 8, 4).unwrap();

		let hits = index.range("0", "2").unwrap();
		let keys: Vec<&str> = hits.iter().map(|&(ref k, _)| k.as_str()).collect();
		assert_eq!(keys, ["0", "12"]);
	}
}
