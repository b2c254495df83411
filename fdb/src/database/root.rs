use std::path::PathBuf;

use tiny_keccak::sha3_256;

use config::{Config, Root};
use error::{ErrorKind, Result};
use key::Key;

/// Chooses database directories among the configured roots.
///
/// New databases land on one writable root, picked by hashing the
/// canonical database key so the choice is stable across processes.
/// Existing databases are searched across every visitable root. The
/// directory name is the colon-joined canonical database key.
pub struct RootManager<'a> {
	roots: &'a [Root],
}

impl<'a> RootManager<'a> {
	/// A manager over the configured roots.
	pub fn new(config: &'a Config) -> RootManager<'a> {
		RootManager { roots: &config.roots }
	}

	/// The directory a new database for `db_key` is created in.
	pub fn directory_for(&self, db_key: &Key) -> Result<PathBuf> {
		let writable: Vec<&Root> = self.roots.iter().filter(|r| r.writable).collect();
		if writable.is_empty() {
			bail!(ErrorKind::NoWritableRoot);
		}

		// an existing database keeps its root, wherever it is
		if let Some(existing) = self.existing_directory(db_key) {
			return Ok(existing);
		}

		let fingerprint = db_key.fingerprint();
		let hash = sha3_256(fingerprint.as_bytes());
		let mut n = 0u64;
		for byte in &hash[..8] {
			n = (n << 8) | *byte as u64;
		}

		let root = writable[(n % writable.len() as u64) as usize];
		Ok(root.path.join(fingerprint))
	}

	/// The directory of an existing database, searched across the
	/// visitable roots.
	pub fn existing_directory(&self, db_key: &Key) -> Option<PathBuf> {
		let name = db_key.fingerprint();
		self.roots.iter()
			.filter(|r| r.visit)
			.map(|r| r.path.join(&name))
			.find(|p| p.join("toc").exists())
	}

	/// Directories of every database visible under the visitable roots.
	pub fn visitable_directories(&self) -> Vec<PathBuf> {
		let mut out = Vec::new();
		for root in self.roots.iter().filter(|r| r.visit) {
			let entries = match ::std::fs::read_dir(&root.path) {
				Ok(entries) => entries,
				Err(_) => continue,
			};
			for entry in entries.filter_map(|e| e.ok()) {
				let path = entry.path();
				if path.join("toc").exists() {
					out.push(path);
				}
			}
		}
		out.sort();
		out
	}
}

#[cfg(test)]
mod tests {
	extern crate tempdir;

	use self::tempdir::TempDir;
	use std::fs;

	use config::{Config, Root};
	use key::Key;
	use types::TypesRegistry;
	use super::RootManager;

	fn key(s: &str) -> Key {
		Key::parse(s, &TypesRegistry::new()).unwrap()
	}

	#[test]
	fn test_choice_is_deterministic() {
		let temp = TempDir::new("test_roots").unwrap();
		let a = temp.path().join("a");
		let b = temp.path().join("b");
		let mut config = Config::for_tests(temp.path());
		config.roots = vec![Root::new(&a), Root::new(&b)];

		let manager = RootManager::new(&config);
		let db_key = key("class=od,stream=oper,date=20210427");

		let first = manager.directory_for(&db_key).unwrap();
		let second = manager.directory_for(&db_key).unwrap();
		assert_eq!(first, second);
		assert!(first.ends_with("od:oper:20210427"));
	}

	#[test]
	fn test_read_only_roots_are_not_selected() {
		let temp = TempDir::new("test_ro_roots").unwrap();
		let a = temp.path().join("a");
		let b = temp.path().join("b");
		let mut config = Config::for_tests(temp.path());
		config.roots = vec![Root::new(&a).read_only(), Root::new(&b)];

		let manager = RootManager::new(&config);
		for s in &["class=od", "class=rd", "class=ei"] {
			let dir = manager.directory_for(&key(s)).unwrap();
			assert!(dir.starts_with(&b));
		}

		config.roots = vec![Root::new(&a).read_only()];
		let manager = RootManager::new(&config);
		assert!(manager.directory_for(&key("class=od")).is_err());
	}

	#[test]
	fn test_existing_database_is_found_on_any_visitable_root() {
		let temp = TempDir::new("test_existing").unwrap();
		let a = temp.path().join("a");
		let b = temp.path().join("b");
		let db = a.join("od:oper");
		fs::create_dir_all(&db).unwrap();
		fs::write(db.join("toc"), b"").unwrap();

		let mut config = Config::for_tests(temp.path());
		config.roots = vec![Root::new(&a).read_only(), Root::new(&b)];

		let manager = RootManager::new(&config);
		let db_key = key("class=od,stream=oper");
		assert_eq!(manager.existing_directory(&db_key).unwrap(), db);
		// a writer keeps using the existing directory
		assert_eq!(manager.directory_for(&db_key).unwrap(), db);

		let mut hidden = Config::for_tests(temp.path());
		hidden.roots = vec![Root::new(&a).no_visit(), Root::new(&b)];
		let manager = RootManager::new(&hidden);
		assert!(manager.existing_directory(&db_key).is_none());
	}
}
