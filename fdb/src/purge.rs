//! Duplicate purge: masks indexes whose datums are all superseded by
//! later insertions and removes the files they orphan.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use bit_vec::BitVec;

use config::Config;
use error::{ErrorKind, Result};
use toc::TocHandler;

/// What a purge pass found and, with `doit`, did.
#[derive(Debug, Default)]
pub struct PurgeReport {
	/// Datums visible to a reader.
	pub reachable: usize,
	/// Datums masked by a later insertion of the same key.
	pub duplicates: usize,
	/// Index files whose TOC entries were masked.
	pub masked_indexes: Vec<PathBuf>,
	/// Index and data files deleted from the database directory.
	pub deleted_files: Vec<PathBuf>,
}

/// Scans the live indexes of the database in `directory`, classifying
/// every datum as reachable or duplicate. With `doit` the indexes whose
/// reachable count is zero are masked with `TOC_CLEAR` records, and
/// index and data files that no live index references are deleted.
/// Files outside the database directory (adopted data) are never
/// deleted. A second pass over the same database is a no-op.
pub fn purge(directory: &Path, config: &Config, doit: bool) -> Result<PurgeReport> {
	let toc = TocHandler::new(directory, config);
	if !toc.exists() {
		bail!(ErrorKind::NotFound(format!("no database in {}", directory.display())));
	}

	let mut indexes = toc.load_indexes()?;

	let mut report = PurgeReport::default();
	let mut seen: HashSet<String> = HashSet::new();
	let mut liveness: Vec<BitVec> = Vec::with_capacity(indexes.len());
	let mut entries = Vec::with_capacity(indexes.len());

	// indexes come latest-first, so the first sighting of a datum key is
	// the one a reader would get
	for index in &mut indexes {
		let index_entries = index.entries()?;
		let mut live = BitVec::from_elem(index_entries.len(), false);

		for (i, &(ref fingerprint, _)) in index_entries.iter().enumerate() {
			if seen.insert(fingerprint.clone()) {
				live.set(i, true);
				report.reachable += 1;
			} else {
				report.duplicates += 1;
			}
		}

		liveness.push(live);
		entries.push(index_entries);
	}

	if !doit {
		return Ok(report);
	}

	let mut masked = Vec::new();
	let mut kept_files: HashSet<PathBuf> = HashSet::new();

	for (i, live) in liveness.iter().enumerate() {
		if live.none() && !entries[i].is_empty() {
			masked.push(i);
		} else {
			for &(_, ref field) in &entries[i] {
				kept_files.insert(field.path.clone());
			}
		}
	}

	let mut doomed: BTreeSet<PathBuf> = BTreeSet::new();

	for &i in &masked {
		let index = &indexes[i];
		let basename = index.path()
			.file_name()
			.expect("index paths are regular files; qed")
			.to_string_lossy()
			.into_owned();

		toc.write_clear_record(&basename, index.offset())?;
		report.masked_indexes.push(index.path().to_path_buf());
		doomed.insert(index.path().to_path_buf());

		for &(_, ref field) in &entries[i] {
			// adopted files live outside the database directory
			if !kept_files.contains(&field.path) && field.path.starts_with(directory) {
				doomed.insert(field.path.clone());
			}
		}
	}

	for path in doomed {
		info!("purging {}", path.display());
		fs::remove_file(&path)?;
		report.deleted_files.push(path);
	}

	Ok(report)
}
