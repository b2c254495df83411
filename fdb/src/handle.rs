use std::path::PathBuf;

use memmap::{Mmap, Protection};

use error::{ErrorKind, Result};

/// A `(path, offset, length)` window onto a data file, locating one
/// field's bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct PartHandle {
	/// The data file.
	pub path: PathBuf,
	/// Byte offset of the field within the file.
	pub offset: u64,
	/// Field length in bytes.
	pub length: u64,
}

impl PartHandle {
	/// Reads the field bytes.
	pub fn read(&self) -> Result<Vec<u8>> {
		if self.length == 0 {
			return Ok(Vec::new());
		}

		let mmap = Mmap::open_path(&self.path, Protection::Read)?;
		let data = unsafe { mmap.as_slice() };

		let start = self.offset as usize;
		let end = start + self.length as usize;
		if end > data.len() {
			bail!(ErrorKind::CorruptedIndex(
				self.path.clone(),
				format!("field at {}+{} is beyond end of file", self.offset, self.length),
			));
		}

		Ok(data[start..end].to_vec())
	}
}

/// The gathered result of a retrieval: the located fields in visit
/// order, streamable as one concatenated payload.
#[derive(Debug, Default)]
pub struct MultiHandle {
	parts: Vec<PartHandle>,
}

impl MultiHandle {
	/// An empty result.
	pub fn new() -> MultiHandle {
		MultiHandle::default()
	}

	/// Appends a located field.
	pub fn add(&mut self, part: PartHandle) {
		self.parts.push(part);
	}

	/// Appends every field of another handle.
	pub fn extend(&mut self, other: MultiHandle) {
		self.parts.extend(other.parts);
	}

	/// The located fields.
	pub fn parts(&self) -> &[PartHandle] {
		&self.parts
	}

	/// Number of located fields.
	pub fn len(&self) -> usize {
		self.parts.len()
	}

	/// True when the retrieval found nothing.
	pub fn is_empty(&self) -> bool {
		self.parts.is_empty()
	}

	/// Merge-sorts the parts by file and offset so sequential reads
	/// stream each file once.
	pub fn compress(&mut self) {
		self.parts.sort_by(|a, b| {
			a.path.cmp(&b.path).then(a.offset.cmp(&b.offset))
		});
	}

	/// Reads the concatenation of all fields.
	pub fn read_all(&self) -> Result<Vec<u8>> {
		let mut out = Vec::new();
		for part in &self.parts {
			out.extend(part.read()?);
		}
		Ok(out)
	}
}

#[cfg(test)]
mod tests {
	extern crate tempdir;

	use self::tempdir::TempDir;
	use std::fs;

	use super::{MultiHandle, PartHandle};

	#[test]
	fn test_part_reads_window() {
		let temp = TempDir::new("test_part").unwrap();
		let path = temp.path().join("x.data");
		fs::write(&path, b"aaaaABCDzzzz").unwrap();

		let part = PartHandle { path: path.clone(), offset: 4, length: 4 };
		assert_eq!(part.read().unwrap(), b"ABCD");

		let beyond = PartHandle { path, offset: 10, length: 10 };
		assert!(beyond.read().is_err());
	}

	#[test]
	fn test_compress_sorts_by_file_and_offset() {
		let temp = TempDir::new("test_compress").unwrap();
		let a = temp.path().join("a.data");
		let b = temp.path().join("b.data");
		fs::write(&a, b"0123456789").unwrap();
		fs::write(&b, b"abcdefghij").unwrap();

		let mut handle = MultiHandle::new();
		handle.add(PartHandle { path: b.clone(), offset: 5, length: 2 });
		handle.add(PartHandle { path: a.clone(), offset: 8, length: 2 });
		handle.add(PartHandle { path: a.clone(), offset: 0, length: 2 });

		handle.compress();
		assert_eq!(handle.read_all().unwrap(), b"0189fg");
	}
}
