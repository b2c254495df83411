use std::io::Read;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{LittleEndian, ByteOrder};

use error::{ErrorKind, Result};

/// Fixed size of the record header.
pub const HEADER_SIZE: usize = 64;

/// Appends of at most this many bytes are atomic on POSIX filesystems;
/// every record must fit.
pub const PIPE_BUF: usize = 4096;

/// Version written into new records. Readers refuse newer versions.
pub const TOC_VERSION: u16 = 1;

// sanity bound while reading: no record is larger than this
const MAX_RECORD_SIZE: u32 = 1 << 20;

/// Record kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tag {
	/// Database creation; payload is the database key.
	Init = 1,
	/// An index file became live; payload is its location and summary.
	Index = 2,
	/// Masks a previous `Index` record.
	Clear = 3,
	/// Redirects readers into a per-writer sub-TOC.
	SubToc = 4,
	/// Masks everything before it.
	Wipe = 5,
}

impl Tag {
	fn from_u16(value: u16, path: &Path) -> Result<Tag> {
		match value {
			1 => Ok(Tag::Init),
			2 => Ok(Tag::Index),
			3 => Ok(Tag::Clear),
			4 => Ok(Tag::SubToc),
			5 => Ok(Tag::Wipe),
			other => Err(ErrorKind::CorruptedToc(
				path.into(),
				format!("unknown record tag {}", other),
			).into()),
		}
	}
}

/// One table-of-contents record: a fixed header plus a streamed payload,
/// padded to the configured round size.
#[derive(Debug, Clone)]
pub struct TocRecord {
	/// Record kind.
	pub tag: Tag,
	/// Writer version.
	pub version: u16,
	/// Total encoded size, header and padding included.
	pub size: u32,
	/// Seconds since the epoch at append time.
	pub timestamp: i64,
	/// Uid of the writing user.
	pub uid: u32,
	/// Pid of the writing process.
	pub pid: u32,
	/// The streamed payload, padding included.
	pub payload: Vec<u8>,
}

impl TocRecord {
	/// Creates a record stamped with the current time, user and process.
	pub fn new(tag: Tag, payload: Vec<u8>) -> TocRecord {
		let timestamp = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|d| d.as_secs() as i64)
			.unwrap_or(0);

		TocRecord {
			tag,
			version: TOC_VERSION,
			size: 0,
			timestamp,
			uid: unsafe { ::libc::getuid() as u32 },
			pid: unsafe { ::libc::getpid() as u32 },
			payload,
		}
	}

	/// Encodes the record, rounding its size up to a multiple of `round`.
	/// The encoded record must fit in `PIPE_BUF` so the kernel append is
	/// atomic.
	pub fn encode(&self, round: usize) -> Vec<u8> {
		let logical = HEADER_SIZE + self.payload.len();
		let total = (logical + round - 1) / round * round;
		assert!(
			total <= PIPE_BUF,
			"TOC record of {} bytes exceeds the atomic append limit of {}",
			total,
			PIPE_BUF
		);

		let mut buffer = vec![0u8; total];
		LittleEndian::write_u16(&mut buffer[0..], self.tag as u16);
		LittleEndian::write_u16(&mut buffer[2..], self.version);
		LittleEndian::write_u32(&mut buffer[4..], total as u32);
		LittleEndian::write_i64(&mut buffer[8..], self.timestamp);
		LittleEndian::write_u32(&mut buffer[16..], self.uid);
		LittleEndian::write_u32(&mut buffer[20..], self.pid);
		buffer[HEADER_SIZE..HEADER_SIZE + self.payload.len()].copy_from_slice(&self.payload);
		buffer
	}

	/// Reads the next record, or `None` at a clean end of file.
	pub fn read<R: Read>(file: &mut R, path: &Path) -> Result<Option<TocRecord>> {
		let mut header = [0u8; HEADER_SIZE];
		let mut got = 0;
		while got < HEADER_SIZE {
			let n = file.read(&mut header[got..])?;
			if n == 0 {
				break;
			}
			got += n;
		}
		if got == 0 {
			return Ok(None);
		}
		if got < HEADER_SIZE {
			bail!(ErrorKind::CorruptedToc(path.into(), "truncated record header".into()));
		}

		let tag = Tag::from_u16(LittleEndian::read_u16(&header[0..]), path)?;
		let version = LittleEndian::read_u16(&header[2..]);
		let size = LittleEndian::read_u32(&header[4..]);
		let timestamp = LittleEndian::read_i64(&header[8..]);
		let uid = LittleEndian::read_u32(&header[16..]);
		let pid = LittleEndian::read_u32(&header[20..]);

		if version > TOC_VERSION {
			bail!(ErrorKind::VersionMismatch(TOC_VERSION, version));
		}
		if (size as usize) < HEADER_SIZE || size > MAX_RECORD_SIZE {
			bail!(ErrorKind::CorruptedToc(path.into(), format!("bad record size {}", size)));
		}

		let mut payload = vec![0u8; size as usize - HEADER_SIZE];
		file.read_exact(&mut payload)
			.map_err(|_| ErrorKind::CorruptedToc(path.into(), "truncated record payload".into()))?;

		Ok(Some(TocRecord {
			tag,
			version,
			size,
			timestamp,
			uid,
			pid,
			payload,
		}))
	}
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;
	use std::path::Path;

	use error::ErrorKind;
	use super::{HEADER_SIZE, Tag, TocRecord, TOC_VERSION};

	#[test]
	fn test_roundtrip_and_padding() {
		let record = TocRecord::new(Tag::Init, b"payload".to_vec());
		let bytes = record.encode(1024);
		assert_eq!(bytes.len(), 1024);

		let mut cursor = Cursor::new(bytes);
		let back = TocRecord::read(&mut cursor, Path::new("toc")).unwrap().unwrap();
		assert_eq!(back.tag, Tag::Init);
		assert_eq!(back.version, TOC_VERSION);
		assert_eq!(back.size, 1024);
		assert_eq!(&back.payload[..7], b"payload");

		assert!(TocRecord::read(&mut cursor, Path::new("toc")).unwrap().is_none());
	}

	#[test]
	fn test_consecutive_records() {
		let mut bytes = TocRecord::new(Tag::Init, vec![1]).encode(128);
		bytes.extend(TocRecord::new(Tag::Wipe, vec![]).encode(128));

		let mut cursor = Cursor::new(bytes);
		assert_eq!(TocRecord::read(&mut cursor, Path::new("toc")).unwrap().unwrap().tag, Tag::Init);
		assert_eq!(TocRecord::read(&mut cursor, Path::new("toc")).unwrap().unwrap().tag, Tag::Wipe);
		assert!(TocRecord::read(&mut cursor, Path::new("toc")).unwrap().is_none());
	}

	#[test]
	fn test_newer_version_is_refused() {
		let mut record = TocRecord::new(Tag::Init, vec![]);
		record.version = TOC_VERSION + 1;
		let bytes = record.encode(128);

		let mut cursor = Cursor::new(bytes);
		let err = TocRecord::read(&mut cursor, Path::new("toc")).unwrap_err();
		assert_eq!(err.kind(), &ErrorKind::VersionMismatch(TOC_VERSION, TOC_VERSION + 1));
	}

	#[test]
	fn test_truncated_header() {
		let bytes = vec![1u8; HEADER_SIZE - 10];
		let mut cursor = Cursor::new(bytes);
		assert!(TocRecord::read(&mut cursor, Path::new("toc")).is_err());
	}

	#[test]
	#[should_panic]
	fn test_oversized_record_is_asserted() {
		let record = TocRecord::new(Tag::Index, vec![0u8; 8192]);
		let _ = record.encode(1024);
	}
}
