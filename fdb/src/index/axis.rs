use std::collections::{BTreeMap, BTreeSet};

use codec;
use error::Result;
use key::Key;

/// Per-keyword sets of values seen by an index, accumulated on every
/// insert. The axis travels with the index summary in the TOC, so request
/// expansion can consult it without loading index entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexAxis {
	axis: BTreeMap<String, BTreeSet<String>>,
}

impl IndexAxis {
	/// Creates an empty axis.
	pub fn new() -> IndexAxis {
		IndexAxis::default()
	}

	/// Records every component of a datum key.
	pub fn insert(&mut self, key: &Key) {
		for (keyword, value) in key.iter() {
			self.axis
				.entry(keyword.to_string())
				.or_insert_with(BTreeSet::new)
				.insert(value.to_string());
		}
	}

	/// The values seen for a keyword.
	pub fn values(&self, keyword: &str) -> Option<&BTreeSet<String>> {
		self.axis.get(keyword)
	}

	/// Merges another axis into this one.
	pub fn merge(&mut self, other: &IndexAxis) {
		for (keyword, values) in &other.axis {
			let entry = self.axis
				.entry(keyword.clone())
				.or_insert_with(BTreeSet::new);
			for value in values {
				entry.insert(value.clone());
			}
		}
	}

	/// True when nothing has been recorded.
	pub fn is_empty(&self) -> bool {
		self.axis.is_empty()
	}

	pub(crate) fn encode(&self, writer: &mut codec::Writer) {
		writer.write_u64(self.axis.len() as u64);
		for (keyword, values) in &self.axis {
			writer.write_string(keyword);
			writer.write_u64(values.len() as u64);
			for value in values {
				writer.write_string(value);
			}
		}
	}

	pub(crate) fn decode(reader: &mut codec::Reader) -> Result<IndexAxis> {
		let mut axis = IndexAxis::new();
		let keywords = reader.read_u64()?;
		for _ in 0..keywords {
			let keyword = reader.read_string()?;
			let count = reader.read_u64()?;
			let mut values = BTreeSet::new();
			for _ in 0..count {
				values.insert(reader.read_string()?);
			}
			axis.axis.insert(keyword, values);
		}
		Ok(axis)
	}
}
