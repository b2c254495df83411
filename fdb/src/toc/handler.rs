use std::fs;
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};

use hex_slice::AsHex;

use codec;
use config::Config;
use error::{ErrorKind, Result};
use index::{Index, IndexAxis};
use key::Key;
use toc::record::{Tag, TocRecord};
use toc::unique_suffix;

const TOC_FILE: &str = "toc";
const SCHEMA_FILE: &str = "schema";

/// Reads and appends the table of contents of one database directory.
///
/// A fresh database is initialised with `O_CREAT|O_EXCL`; concurrent
/// creators fall through on the existing file. Appends go through a file
/// opened in append mode, one record per write, so concurrent writers
/// interleave at record granularity.
#[derive(Debug)]
pub struct TocHandler {
	directory: PathBuf,
	toc_path: PathBuf,
	schema_path: PathBuf,
	is_sub_toc: bool,
	use_sub_toc: bool,
	round: usize,
	sub_toc_write: Option<Box<TocHandler>>,
}

impl TocHandler {
	/// Handler for the master TOC of a database directory.
	pub fn new(directory: &Path, config: &Config) -> TocHandler {
		TocHandler {
			directory: directory.to_path_buf(),
			toc_path: directory.join(TOC_FILE),
			schema_path: directory.join(SCHEMA_FILE),
			is_sub_toc: false,
			use_sub_toc: config.use_sub_toc,
			round: config.round_toc_records,
			sub_toc_write: None,
		}
	}

	// handler for a per-writer sub-TOC living next to the master
	fn sub_toc(path: PathBuf, round: usize) -> TocHandler {
		let directory = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
		TocHandler {
			schema_path: directory.join(SCHEMA_FILE),
			directory,
			toc_path: path,
			is_sub_toc: true,
			use_sub_toc: false,
			round,
			sub_toc_write: None,
		}
	}

	/// True when the TOC file exists.
	pub fn exists(&self) -> bool {
		self.toc_path.exists()
	}

	/// The database directory.
	pub fn directory(&self) -> &Path {
		&self.directory
	}

	/// Path of the TOC file.
	pub fn toc_path(&self) -> &Path {
		&self.toc_path
	}

	/// Path of the schema copied at initialisation.
	pub fn schema_path(&self) -> &Path {
		&self.schema_path
	}

	/// Creates the TOC and writes its init record. A concurrent creator
	/// losing the race verifies the existing init record instead.
	pub fn initialise(&mut self, key: &Key, schema_source: Option<&Path>) -> Result<()> {
		fs::create_dir_all(&self.directory)?;

		let created = fs::OpenOptions::new()
			.write(true)
			.create_new(true)
			.open(&self.toc_path);

		let mut file = match created {
			Ok(file) => file,
			Err(ref e) if e.kind() == io::ErrorKind::AlreadyExists => {
				let (existing, _) = self.database_key()?;
				if existing != *key {
					bail!(ErrorKind::CorruptedToc(
						self.toc_path.clone(),
						format!("database holds key {}, expected {}", existing, key),
					));
				}
				return Ok(());
			}
			Err(e) => return Err(e.into()),
		};

		info!("initialising TOC in {}", self.toc_path.display());

		// the schema governing this database is fixed at creation time
		if !self.is_sub_toc {
			if let Some(source) = schema_source {
				let tmp = self.directory.join(format!("{}.{}.tmp", SCHEMA_FILE, unique_suffix()));
				fs::copy(source, &tmp)?;
				fs::rename(&tmp, &self.schema_path)?;
			}
		}

		let mut payload = codec::Writer::new();
		key.encode(&mut payload);
		payload.write_bool(self.is_sub_toc);

		let record = TocRecord::new(Tag::Init, payload.into_bytes());
		file.write_all(&record.encode(self.round))?;
		file.sync_all()?;
		Ok(())
	}

	fn append(&self, record: &TocRecord) -> Result<()> {
		let mut file = fs::OpenOptions::new()
			.write(true)
			.append(true)
			.open(&self.toc_path)?;
		file.write_all(&record.encode(self.round))?;
		Ok(())
	}

	/// Enforces the write ACL: only the creator may append, unless the
	/// current user is a configured super user.
	pub fn check_writable(&self, config: &Config) -> Result<()> {
		if !config.only_creator_can_write {
			return Ok(());
		}

		let (_, db_uid) = self.database_key()?;
		let uid = unsafe { ::libc::getuid() as u32 };

		if db_uid == uid || config.super_users.contains(&uid) {
			return Ok(());
		}

		bail!(ErrorKind::PermissionDenied(format!(
			"only user {} can write to {}, current user is {}",
			db_uid,
			self.directory.display(),
			uid
		)))
	}

	/// Records an index as live. With sub-TOCs enabled the record goes to
	/// this writer's sub-TOC, created on first use and announced in the
	/// master TOC with a single `SubToc` record.
	pub fn write_index_record(&mut self, index: &Index, db_key: &Key) -> Result<()> {
		if self.use_sub_toc && !self.is_sub_toc {
			if self.sub_toc_write.is_none() {
				let name = format!("subtoc.{}", unique_suffix());
				let mut sub = TocHandler::sub_toc(self.directory.join(&name), self.round);
				sub.initialise(db_key, None)?;

				let mut payload = codec::Writer::new();
				payload.write_string(&name);
				self.append(&TocRecord::new(Tag::SubToc, payload.into_bytes()))?;
				debug!("TOC_SUB_TOC {}", name);

				self.sub_toc_write = Some(Box::new(sub));
			}
			return self.sub_toc_write
				.as_mut()
				.expect("sub-TOC was just created; qed")
				.write_index_record(index, db_key);
		}

		let basename = index.path()
			.file_name()
			.expect("index paths are regular files; qed")
			.to_string_lossy()
			.into_owned();

		let mut payload = codec::Writer::new();
		payload.write_string(&basename);
		payload.write_u64(index.offset());
		payload.write_string("btree");
		index.key().encode(&mut payload);
		index.axis().encode(&mut payload);

		debug!("TOC_INDEX {} - {}", basename, index.offset());
		self.append(&TocRecord::new(Tag::Index, payload.into_bytes()))
	}

	/// Masks a previously recorded index.
	pub fn write_clear_record(&self, basename: &str, offset: u64) -> Result<()> {
		let mut payload = codec::Writer::new();
		payload.write_string(basename);
		payload.write_u64(offset);

		debug!("TOC_CLEAR {} - {}", basename, offset);
		self.append(&TocRecord::new(Tag::Clear, payload.into_bytes()))
	}

	/// Masks everything recorded before.
	pub fn write_wipe_record(&self) -> Result<()> {
		debug!("TOC_WIPE");
		self.append(&TocRecord::new(Tag::Wipe, Vec::new()))
	}

	/// Iterates the records of this TOC, in file order, optionally
	/// recursing into referenced sub-TOCs as if their records appeared
	/// inline.
	pub fn walk(&self, walk_sub_tocs: bool) -> Result<TocWalker> {
		let file = fs::File::open(&self.toc_path)?;
		Ok(TocWalker {
			directory: self.directory.clone(),
			stack: vec![(file, self.toc_path.clone())],
			walk_sub_tocs,
		})
	}

	/// The database key and creator uid from the init record.
	pub fn database_key(&self) -> Result<(Key, u32)> {
		for record in self.walk(false)? {
			let record = record?;
			if record.tag == Tag::Init {
				let mut reader = codec::Reader::new(&record.payload);
				let key = Key::decode(&mut reader)?;
				return Ok((key, record.uid));
			}
		}
		bail!(ErrorKind::CorruptedToc(self.toc_path.clone(), "no init record".into()))
	}

	/// The live indexes of this database: every `Index` record that is
	/// not masked by a later `Clear` or `Wipe`, walked through sub-TOCs,
	/// reversed so the latest insertion takes precedence on duplicate
	/// datum keys.
	pub fn load_indexes(&self) -> Result<Vec<Index>> {
		if !self.exists() {
			return Ok(Vec::new());
		}

		let mut indexes: Vec<Index> = Vec::new();

		for record in self.walk(true)? {
			let record = record?;
			let mut reader = codec::Reader::new(&record.payload);

			match record.tag {
				Tag::Init => {}
				Tag::Index => {
					let basename = reader.read_string()?;
					let offset = reader.read_u64()?;
					let _type_name = reader.read_string()?;
					let key = Key::decode(&mut reader)?;
					let axis = IndexAxis::decode(&mut reader)?;
					indexes.push(Index::open(key, self.directory.join(basename), offset, axis));
				}
				Tag::Clear => {
					let basename = reader.read_string()?;
					let offset = reader.read_u64()?;
					let path = self.directory.join(basename);
					if let Some(pos) = indexes.iter().position(|i| {
						i.path() == path && i.offset() == offset
					}) {
						indexes.remove(pos);
					}
				}
				Tag::Wipe => indexes.clear(),
				Tag::SubToc => {
					bail!(ErrorKind::CorruptedToc(
						self.toc_path.clone(),
						"unexpected sub-TOC record in linearised walk".into(),
					));
				}
			}
		}

		indexes.reverse();
		Ok(indexes)
	}

	/// Renders every record for inspection.
	pub fn dump<W: io::Write>(&self, out: &mut W, walk_sub_tocs: bool) -> Result<()> {
		for record in self.walk(walk_sub_tocs)? {
			let record = record?;
			let preview = ::std::cmp::min(record.payload.len(), 16);
			write!(
				out,
				"{:?} size={} version={} uid={} pid={} timestamp={} payload[{}]={:02x}",
				record.tag,
				record.size,
				record.version,
				record.uid,
				record.pid,
				record.timestamp,
				record.payload.len(),
				record.payload[..preview].as_hex(),
			)?;

			let mut reader = codec::Reader::new(&record.payload);
			match record.tag {
				Tag::Init => {
					if let Ok(key) = Key::decode(&mut reader) {
						write!(out, "  key: {}", key)?;
					}
				}
				Tag::Index => {
					if let (Ok(path), Ok(offset)) = (reader.read_string(), reader.read_u64()) {
						write!(out, "  path: {}, offset: {}", path, offset)?;
					}
				}
				Tag::Clear => {
					if let (Ok(path), Ok(offset)) = (reader.read_string(), reader.read_u64()) {
						write!(out, "  path: {}, offset: {}", path, offset)?;
					}
				}
				Tag::SubToc => {
					if let Ok(path) = reader.read_string() {
						write!(out, "  path: {}", path)?;
					}
				}
				Tag::Wipe => {}
			}
			writeln!(out)?;
		}
		Ok(())
	}
}

/// Iterator over TOC records with a LIFO stack of open sub-TOCs.
pub struct TocWalker {
	directory: PathBuf,
	stack: Vec<(fs::File, PathBuf)>,
	walk_sub_tocs: bool,
}

impl Iterator for TocWalker {
	type Item = Result<TocRecord>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			let record = {
				let &mut (ref mut file, ref path) = match self.stack.last_mut() {
					Some(top) => top,
					None => return None,
				};
				TocRecord::read(file, path)
			};

			let record = match record {
				Ok(Some(record)) => record,
				Ok(None) => {
					self.stack.pop();
					continue;
				}
				Err(e) => return Some(Err(e)),
			};

			if record.tag == Tag::SubToc && self.walk_sub_tocs {
				if let Err(e) = self.enter_sub_toc(&record) {
					return Some(Err(e));
				}
				continue;
			}

			return Some(Ok(record));
		}
	}
}

impl TocWalker {
	fn enter_sub_toc(&mut self, record: &TocRecord) -> Result<()> {
		let mut reader = codec::Reader::new(&record.payload);
		let name = reader.read_string()?;
		let path = self.directory.join(name);

		let mut file = fs::File::open(&path)?;

		// the first record of a sub-TOC is its init record
		match TocRecord::read(&mut file, &path)? {
			Some(ref first) if first.tag == Tag::Init => {}
			_ => bail!(ErrorKind::CorruptedToc(path, "sub-TOC does not start with init".into())),
		}

		self.stack.push((file, path));
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	extern crate tempdir;

	use self::tempdir::TempDir;
	use std::path::Path;

	use config::Config;
	use key::Key;
	use index::Index;
	use toc::Tag;
	use types::TypesRegistry;
	use super::TocHandler;

	fn key(s: &str) -> Key {
		Key::parse(s, &TypesRegistry::new()).unwrap()
	}

	fn config(root: &Path) -> Config {
		Config::for_tests(root)
	}

	fn flushed_index(dir: &Path, name: &str, datums: &[&str]) -> Index {
		let mut index = Index::create(key("type=pb"), dir.join(name), true);
		for (i, datum) in datums.iter().enumerate() {
			index.put(&key(datum), &dir.join("a.data"), i as u64 * 512, 4).unwrap();
		}
		index.flush().unwrap();
		index
	}

	#[test]
	fn test_init_is_idempotent() {
		let temp = TempDir::new("test_init").unwrap();
		let config = config(temp.path());
		let db_key = key("class=od,stream=oper");

		let mut toc = TocHandler::new(&temp.path().join("db"), &config);
		assert!(!toc.exists());
		toc.initialise(&db_key, None).unwrap();
		assert!(toc.exists());

		// a losing creator falls through and verifies the key
		toc.initialise(&db_key, None).unwrap();
		let (stored, _) = toc.database_key().unwrap();
		assert_eq!(stored, db_key);

		// a different key on the same directory is an error
		let err = toc.initialise(&key("class=rd"), None).unwrap_err();
		assert!(matches!(err.kind(), &::error::ErrorKind::CorruptedToc(_, _)));
	}

	#[test]
	fn test_index_records_and_masking() {
		let temp = TempDir::new("test_masking").unwrap();
		let config = config(temp.path());
		let dir = temp.path().join("db");
		let db_key = key("class=od");

		let mut toc = TocHandler::new(&dir, &config);
		toc.initialise(&db_key, None).unwrap();

		let first = flushed_index(&dir, "a.idx", &["step=0"]);
		let second = flushed_index(&dir, "b.idx", &["step=6"]);
		toc.write_index_record(&first, &db_key).unwrap();
		toc.write_index_record(&second, &db_key).unwrap();

		let live = toc.load_indexes().unwrap();
		assert_eq!(live.len(), 2);
		// reversed: latest first
		assert!(live[0].path().ends_with("b.idx"));

		toc.write_clear_record("a.idx", 0).unwrap();
		let live = toc.load_indexes().unwrap();
		assert_eq!(live.len(), 1);
		assert!(live[0].path().ends_with("b.idx"));

		toc.write_wipe_record().unwrap();
		assert!(toc.load_indexes().unwrap().is_empty());
	}

	#[test]
	fn test_sub_toc_linearisation() {
		let temp = TempDir::new("test_sub_toc").unwrap();
		let mut config = config(temp.path());
		config.use_sub_toc = true;
		let dir = temp.path().join("db");
		let db_key = key("class=od");

		let mut writer_a = TocHandler::new(&dir, &config);
		writer_a.initialise(&db_key, None).unwrap();
		let mut writer_b = TocHandler::new(&dir, &config);
		writer_b.initialise(&db_key, None).unwrap();

		let first = flushed_index(&dir, "a.idx", &["step=0"]);
		let second = flushed_index(&dir, "b.idx", &["step=6"]);
		writer_a.write_index_record(&first, &db_key).unwrap();
		writer_b.write_index_record(&second, &db_key).unwrap();

		// the master toc contains only init and the redirections
		let reader = TocHandler::new(&dir, &config);
		let tags: Vec<Tag> = reader.walk(false).unwrap()
			.map(|r| r.unwrap().tag)
			.collect();
		assert_eq!(tags, [Tag::Init, Tag::SubToc, Tag::SubToc]);

		// the linearised walk sees both indexes
		let live = reader.load_indexes().unwrap();
		assert_eq!(live.len(), 2);
	}
}
