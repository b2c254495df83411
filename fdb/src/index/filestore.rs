use std::collections::HashMap;
use std::path::{Path, PathBuf};

use codec;
use error::Result;

/// Append-only dedup table mapping data-file paths to small ids, so index
/// entries reference files by a `u32` instead of repeating the path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileStore {
	paths: Vec<PathBuf>,
	ids: HashMap<PathBuf, u32>,
}

impl FileStore {
	/// Creates an empty store.
	pub fn new() -> FileStore {
		FileStore::default()
	}

	/// The id of a path, inserting it when not yet present.
	pub fn insert(&mut self, path: &Path) -> u32 {
		if let Some(id) = self.ids.get(path) {
			return *id;
		}
		let id = self.paths.len() as u32;
		self.paths.push(path.to_path_buf());
		self.ids.insert(path.to_path_buf(), id);
		id
	}

	/// The path behind an id.
	pub fn get(&self, id: u32) -> Option<&Path> {
		self.paths.get(id as usize).map(|p| p.as_path())
	}

	/// All paths, in id order.
	pub fn paths(&self) -> &[PathBuf] {
		&self.paths
	}

	pub(crate) fn encode(&self, writer: &mut codec::Writer) {
		writer.write_u64(self.paths.len() as u64);
		for path in &self.paths {
			writer.write_string(&path.to_string_lossy());
		}
	}

	pub(crate) fn decode(reader: &mut codec::Reader) -> Result<FileStore> {
		let mut store = FileStore::new();
		let count = reader.read_u64()?;
		for _ in 0..count {
			let path = PathBuf::from(reader.read_string()?);
			store.insert(&path);
		}
		Ok(store)
	}
}
