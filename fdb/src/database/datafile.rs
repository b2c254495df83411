use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use error::Result;

// buffered writes; a large buffer approximates asynchronous output while
// keeping flush() synchronous
const BUFFER_SIZE: usize = 8 * 1024;
const ASYNC_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// An append handle on one data file. Fields are padded to the block
/// size so every field starts on a block boundary.
#[derive(Debug)]
pub struct DataHandle {
	path: PathBuf,
	file: BufWriter<fs::File>,
	position: u64,
	block_size: u64,
}

impl DataHandle {
	/// Opens (creating if needed) a data file for appending.
	pub fn open(path: &Path, block_size: u64, async_write: bool) -> Result<DataHandle> {
		let file = fs::OpenOptions::new()
			.write(true)
			.append(true)
			.create(true)
			.open(path)?;
		let position = file.metadata()?.len();

		let capacity = if async_write { ASYNC_BUFFER_SIZE } else { BUFFER_SIZE };

		Ok(DataHandle {
			path: path.to_path_buf(),
			file: BufWriter::with_capacity(capacity, file),
			position,
			block_size,
		})
	}

	/// The file path.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Appends one field, returning its `(offset, length)` within the
	/// file.
	pub fn write_field(&mut self, data: &[u8]) -> Result<(u64, u64)> {
		let offset = self.position;
		self.file.write_all(data)?;
		self.position += data.len() as u64;

		if self.block_size > 0 {
			let len = data.len() as u64;
			let padded = (len + self.block_size - 1) / self.block_size * self.block_size;
			let padding = (padded - len) as usize;
			if padding > 0 {
				self.file.write_all(&vec![0u8; padding])?;
				self.position += padding as u64;
			}
		}

		Ok((offset, data.len() as u64))
	}

	/// Flushes buffered bytes down to the device.
	pub fn flush(&mut self) -> Result<()> {
		self.file.flush()?;
		self.file.get_ref().sync_data()?;
		Ok(())
	}

	/// Flushes and closes the handle.
	pub fn close(mut self) -> Result<()> {
		self.flush()
	}
}

#[cfg(test)]
mod tests {
	extern crate tempdir;

	use self::tempdir::TempDir;
	use std::fs;

	use super::DataHandle;

	#[test]
	fn test_fields_are_padded_to_blocks() {
		let temp = TempDir::new("test_padding").unwrap();
		let path = temp.path().join("x.data");

		let mut handle = DataHandle::open(&path, 512, false).unwrap();
		let (offset, length) = handle.write_field(b"ABCD").unwrap();
		assert_eq!((offset, length), (0, 4));

		let (offset, length) = handle.write_field(b"EFGHI").unwrap();
		assert_eq!((offset, length), (512, 5));
		handle.flush().unwrap();

		let bytes = fs::read(&path).unwrap();
		assert_eq!(bytes.len(), 1024);
		assert_eq!(&bytes[..4], b"ABCD");
		assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
		assert_eq!(&bytes[512..517], b"EFGHI");
	}

	#[test]
	fn test_no_padding_without_block_size() {
		let temp = TempDir::new("test_no_padding").unwrap();
		let path = temp.path().join("x.data");

		let mut handle = DataHandle::open(&path, 0, false).unwrap();
		handle.write_field(b"ABCD").unwrap();
		let (offset, _) = handle.write_field(b"EF").unwrap();
		assert_eq!(offset, 4);
		handle.close().unwrap();

		assert_eq!(fs::read(&path).unwrap().len(), 6);
	}

	#[test]
	fn test_reopen_appends() {
		let temp = TempDir::new("test_reopen").unwrap();
		let path = temp.path().join("x.data");

		{
			let mut handle = DataHandle::open(&path, 0, false).unwrap();
			handle.write_field(b"ABCD").unwrap();
			handle.close().unwrap();
		}

		let mut handle = DataHandle::open(&path, 0, false).unwrap();
		let (offset, _) = handle.write_field(b"EF").unwrap();
		assert_eq!(offset, 4);
	}
}
