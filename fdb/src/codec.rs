//! Length-prefixed little-endian stream encoding.
//!
//! TOC record payloads and index files are streams of primitive values:
//! integers are fixed-width little-endian, strings and byte blobs are
//! length-prefixed. Padding bytes after the logical end of a stream are
//! ignored by readers.

use byteorder::{LittleEndian, ByteOrder};

use error::{ErrorKind, Result};

/// Encoder appending primitive values to an in-memory buffer.
pub struct Writer {
	buffer: Vec<u8>,
}

impl Writer {
	/// Creates an empty stream.
	pub fn new() -> Writer {
		Writer { buffer: Vec::new() }
	}

	/// Consumes the stream, yielding the encoded bytes.
	pub fn into_bytes(self) -> Vec<u8> {
		self.buffer
	}

	/// Number of bytes encoded so far.
	pub fn position(&self) -> usize {
		self.buffer.len()
	}

	pub fn write_u16(&mut self, value: u16) {
		let mut buf = [0u8; 2];
		LittleEndian::write_u16(&mut buf, value);
		self.buffer.extend_from_slice(&buf);
	}

	pub fn write_u32(&mut self, value: u32) {
		let mut buf = [0u8; 4];
		LittleEndian::write_u32(&mut buf, value);
		self.buffer.extend_from_slice(&buf);
	}

	pub fn write_u64(&mut self, value: u64) {
		let mut buf = [0u8; 8];
		LittleEndian::write_u64(&mut buf, value);
		self.buffer.extend_from_slice(&buf);
	}

	pub fn write_i64(&mut self, value: i64) {
		self.write_u64(value as u64);
	}

	pub fn write_bool(&mut self, value: bool) {
		self.buffer.push(value as u8);
	}

	pub fn write_bytes(&mut self, value: &[u8]) {
		self.write_u32(value.len() as u32);
		self.buffer.extend_from_slice(value);
	}

	pub fn write_string(&mut self, value: &str) {
		self.write_bytes(value.as_bytes());
	}
}

/// Decoder reading primitive values back out of a byte slice.
pub struct Reader<'a> {
	data: &'a [u8],
	position: usize,
}

impl<'a> Reader<'a> {
	/// Creates a stream reader over `data`.
	pub fn new(data: &'a [u8]) -> Reader<'a> {
		Reader { data, position: 0 }
	}

	/// Number of bytes consumed so far.
	pub fn position(&self) -> usize {
		self.position
	}

	fn take(&mut self, len: usize) -> Result<&'a [u8]> {
		if self.position + len > self.data.len() {
			bail!(ErrorKind::TruncatedStream);
		}
		let slice = &self.data[self.position..self.position + len];
		self.position += len;
		Ok(slice)
	}

	pub fn read_u16(&mut self) -> Result<u16> {
		Ok(LittleEndian::read_u16(self.take(2)?))
	}

	pub fn read_u32(&mut self) -> Result<u32> {
		Ok(LittleEndian::read_u32(self.take(4)?))
	}

	pub fn read_u64(&mut self) -> Result<u64> {
		Ok(LittleEndian::read_u64(self.take(8)?))
	}

	pub fn read_i64(&mut self) -> Result<i64> {
		Ok(self.read_u64()? as i64)
	}

	pub fn read_bool(&mut self) -> Result<bool> {
		Ok(self.take(1)?[0] != 0)
	}

	pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
		let len = self.read_u32()? as usize;
		self.take(len)
	}

	pub fn read_string(&mut self) -> Result<String> {
		let bytes = self.read_bytes()?;
		String::from_utf8(bytes.to_vec())
			.map_err(|_| ErrorKind::TruncatedStream.into())
	}
}

#[cfg(test)]
mod tests {
	use super::{Writer, Reader};
	use error::ErrorKind;

	#[test]
	fn test_roundtrip() {
		let mut w = Writer::new();
		w.write_u16(7);
		w.write_u32(1024);
		w.write_u64(1 << 40);
		w.write_i64(-5);
		w.write_bool(true);
		w.write_string("class");
		let bytes = w.into_bytes();

		let mut r = Reader::new(&bytes);
		assert_eq!(r.read_u16().unwrap(), 7);
		assert_eq!(r.read_u32().unwrap(), 1024);
		assert_eq!(r.read_u64().unwrap(), 1 << 40);
		assert_eq!(r.read_i64().unwrap(), -5);
		assert_eq!(r.read_bool().unwrap(), true);
		assert_eq!(r.read_string().unwrap(), "class");
		assert_eq!(r.position(), bytes.len());
	}

	#[test]
	fn test_padding_is_ignored() {
		let mut w = Writer::new();
		w.write_string("oper");
		let mut bytes = w.into_bytes();
		bytes.extend_from_slice(&[0u8; 16]);

		let mut r = Reader::new(&bytes);
		assert_eq!(r.read_string().unwrap(), "oper");
	}

	#[test]
	fn test_truncated() {
		let mut w = Writer::new();
		w.write_string("truncate me");
		let bytes = w.into_bytes();

		let mut r = Reader::new(&bytes[..bytes.len() - 1]);
		assert_eq!(r.read_string().unwrap_err().kind(), &ErrorKind::TruncatedStream);
	}

	quickcheck! {
		fn quickcheck_strings_roundtrip(values: Vec<String>) -> bool {
			let mut w = Writer::new();
			for v in &values {
				w.write_string(v);
			}
			let bytes = w.into_bytes();

			let mut r = Reader::new(&bytes);
			values.iter().all(|v| r.read_string().unwrap() == *v)
		}

		fn quickcheck_integers_roundtrip(values: Vec<u64>) -> bool {
			let mut w = Writer::new();
			for v in &values {
				w.write_u64(*v);
			}
			let bytes = w.into_bytes();

			let mut r = Reader::new(&bytes);
			values.iter().all(|v| r.read_u64().unwrap() == *v)
		}
	}
}
