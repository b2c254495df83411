use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use database::EngineRegistry;
use error::{ErrorKind, Result};
use schema::SchemaCache;
use toc::PIPE_BUF;

/// One storage root. New databases are distributed over the writable
/// roots; reads search the visitable ones.
#[derive(Debug, Clone)]
pub struct Root {
	/// Directory holding database directories.
	pub path: PathBuf,
	/// New databases may be created here.
	pub writable: bool,
	/// Reads and tool visits consider this root.
	pub visit: bool,
}

impl Root {
	/// A writable, visitable root.
	pub fn new<P: AsRef<Path>>(path: P) -> Root {
		Root {
			path: path.as_ref().to_path_buf(),
			writable: true,
			visit: true,
		}
	}

	/// Marks the root read-only.
	pub fn read_only(mut self) -> Root {
		self.writable = false;
		self
	}

	/// Hides the root from reads and visits.
	pub fn no_visit(mut self) -> Root {
		self.visit = false;
		self
	}
}

/// Lustre striping settings for one file class.
#[derive(Debug, Clone)]
pub struct LustreStripe {
	/// Number of stripes.
	pub count: u32,
	/// Stripe size in bytes.
	pub size: u64,
}

/// Lustre striping policy. On filesystems without Lustre support the
/// hook only logs.
#[derive(Debug, Clone)]
pub struct LustreConfig {
	/// Striping requested.
	pub handle: bool,
	/// Settings for index files.
	pub index: LustreStripe,
	/// Settings for data files.
	pub data: LustreStripe,
}

impl LustreConfig {
	pub(crate) fn apply(&self, path: &Path, stripe: &LustreStripe) {
		if self.handle {
			debug!(
				"lustre stripe {} with count {} size {}",
				path.display(),
				stripe.count,
				stripe.size
			);
		}
	}
}

/// Engine configuration: every knob plus the process-wide schema cache
/// and engine registry. Cloning shares the caches.
#[derive(Debug, Clone)]
pub struct Config {
	/// Path of the master schema.
	pub schema_path: PathBuf,
	/// The storage roots.
	pub roots: Vec<Root>,
	/// Writer cache size of the archiver.
	pub max_open_dbs: usize,
	/// Backend specification for writing.
	pub writer_engine: String,
	/// Backend specification for reading.
	pub reader_engine: String,
	/// Fatal error on duplicate index insert.
	pub check_double_insert: bool,
	/// Enforce field key completeness on write.
	pub check_missing_keys: bool,
	/// Data-file padding; `<= 0` takes the filesystem block size.
	pub block_size: i64,
	/// Large buffered data-file writes.
	pub async_write: bool,
	/// TOC records are padded to a multiple of this.
	pub round_toc_records: usize,
	/// Write ACL: only the creating user may append.
	pub only_creator_can_write: bool,
	/// Uids allowed to write regardless of ownership.
	pub super_users: Vec<u32>,
	/// Stop at the first matching datum rule.
	pub match_first_rule: bool,
	/// Per-writer sub-TOCs.
	pub use_sub_toc: bool,
	/// Lustre striping policy.
	pub lustre: LustreConfig,
	schemas: Arc<SchemaCache>,
	engines: Arc<EngineRegistry>,
}

fn env_bool(name: &str, default: bool) -> bool {
	match env::var(name) {
		Ok(v) => match v.as_str() {
			"1" | "true" | "on" | "yes" => true,
			"0" | "false" | "off" | "no" => false,
			_ => default,
		},
		Err(_) => default,
	}
}

fn env_parse<T: ::std::str::FromStr>(name: &str, default: T) -> T {
	env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
	/// A configuration with default knobs.
	pub fn new<P: AsRef<Path>>(schema_path: P, roots: Vec<Root>) -> Result<Config> {
		let config = Config {
			schema_path: schema_path.as_ref().to_path_buf(),
			roots,
			max_open_dbs: 64,
			writer_engine: "toc.writer".into(),
			reader_engine: "toc.reader".into(),
			check_double_insert: true,
			check_missing_keys: true,
			block_size: 0,
			async_write: false,
			round_toc_records: 1024,
			only_creator_can_write: true,
			super_users: Vec::new(),
			match_first_rule: true,
			use_sub_toc: false,
			lustre: LustreConfig {
				handle: false,
				index: LustreStripe { count: 1, size: 8 * 1024 * 1024 },
				data: LustreStripe { count: 8, size: 8 * 1024 * 1024 },
			},
			schemas: Arc::new(SchemaCache::new()),
			engines: Arc::new(EngineRegistry::with_defaults()),
		};
		config.validate()?;
		Ok(config)
	}

	/// A configuration from the environment. `FDB_SCHEMA_FILE` and
	/// `FDB_ROOT` (a comma-separated root list) are required; every other
	/// knob has a default:
	///
	/// `FDB_MAX_NB_DBS_OPEN`, `FDB_WRITER_DB`, `FDB_READER_DB`,
	/// `FDB_CHECK_DOUBLE_INSERT`, `FDB_CHECK_MISSING_KEYS_ON_WRITE`,
	/// `FDB_BLOCK_SIZE`, `FDB_ASYNC_WRITE`, `FDB_ROUND_TOC_RECORDS`,
	/// `FDB_ONLY_CREATOR_CAN_WRITE`, `FDB_SUPER_USERS`,
	/// `FDB_MATCH_FIRST_RULE`, `FDB5_SUB_TOCS`,
	/// `FDB_HANDLE_LUSTRE_STRIPE`,
	/// `FDB_INDEX_LUSTRE_STRIPE_{COUNT,SIZE}`,
	/// `FDB_DATA_LUSTRE_STRIPE_{COUNT,SIZE}`.
	pub fn from_env() -> Result<Config> {
		let schema_path = env::var("FDB_SCHEMA_FILE").map_err(|_| {
			ErrorKind::InvalidConfig("fdbSchemaFile", "FDB_SCHEMA_FILE is not set".into())
		})?;
		let roots_var = env::var("FDB_ROOT").map_err(|_| {
			ErrorKind::InvalidConfig("fdbRoot", "FDB_ROOT is not set".into())
		})?;
		let roots = roots_var.split(',')
			.filter(|s| !s.is_empty())
			.map(Root::new)
			.collect();

		let mut config = Config::new(schema_path, roots)?;

		config.max_open_dbs = env_parse("FDB_MAX_NB_DBS_OPEN", config.max_open_dbs);
		config.writer_engine = env_parse("FDB_WRITER_DB", config.writer_engine);
		config.reader_engine = env_parse("FDB_READER_DB", config.reader_engine);
		config.check_double_insert = env_bool("FDB_CHECK_DOUBLE_INSERT", config.check_double_insert);
		config.check_missing_keys = env_bool("FDB_CHECK_MISSING_KEYS_ON_WRITE", config.check_missing_keys);
		config.block_size = env_parse("FDB_BLOCK_SIZE", config.block_size);
		config.async_write = env_bool("FDB_ASYNC_WRITE", config.async_write);
		config.round_toc_records = env_parse("FDB_ROUND_TOC_RECORDS", config.round_toc_records);
		config.only_creator_can_write = env_bool("FDB_ONLY_CREATOR_CAN_WRITE", config.only_creator_can_write);
		config.super_users = env::var("FDB_SUPER_USERS").ok()
			.map(|v| v.split(',').filter_map(|s| s.parse().ok()).collect())
			.unwrap_or_default();
		config.match_first_rule = env_bool("FDB_MATCH_FIRST_RULE", config.match_first_rule);
		config.use_sub_toc = env_bool("FDB5_SUB_TOCS", config.use_sub_toc);
		config.lustre.handle = env_bool("FDB_HANDLE_LUSTRE_STRIPE", config.lustre.handle);
		config.lustre.index.count = env_parse("FDB_INDEX_LUSTRE_STRIPE_COUNT", config.lustre.index.count);
		config.lustre.index.size = env_parse("FDB_INDEX_LUSTRE_STRIPE_SIZE", config.lustre.index.size);
		config.lustre.data.count = env_parse("FDB_DATA_LUSTRE_STRIPE_COUNT", config.lustre.data.count);
		config.lustre.data.size = env_parse("FDB_DATA_LUSTRE_STRIPE_SIZE", config.lustre.data.size);

		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<()> {
		if self.roots.is_empty() {
			bail!(ErrorKind::InvalidConfig("fdbRoot", "at least one root is required".into()));
		}
		if self.max_open_dbs == 0 {
			bail!(ErrorKind::InvalidConfig("fdbMaxNbDBsOpen", "must not be 0".into()));
		}
		if self.round_toc_records == 0 || self.round_toc_records > PIPE_BUF {
			bail!(ErrorKind::InvalidConfig(
				"fdbRoundTocRecords",
				format!("must satisfy 0 < {} <= {}", self.round_toc_records, PIPE_BUF)
			));
		}
		Ok(())
	}

	/// The process-wide schema cache.
	pub fn schemas(&self) -> &SchemaCache {
		&self.schemas
	}

	/// The process-wide engine registry.
	pub fn engines(&self) -> &EngineRegistry {
		&self.engines
	}

	#[cfg(test)]
	pub(crate) fn for_tests(root: &Path) -> Config {
		let mut config = Config::new(root.join("schema"), vec![Root::new(root)])
			.expect("test configuration is valid; qed");
		config.block_size = 1;
		config
	}
}

#[cfg(test)]
mod tests {
	use error::ErrorKind;
	use super::{Config, Root};

	#[test]
	fn test_defaults() {
		let config = Config::new("/etc/fdb/schema", vec![Root::new("/data/fdb")]).unwrap();
		assert_eq!(config.max_open_dbs, 64);
		assert_eq!(config.writer_engine, "toc.writer");
		assert_eq!(config.reader_engine, "toc.reader");
		assert!(config.check_double_insert);
		assert!(config.check_missing_keys);
		assert_eq!(config.round_toc_records, 1024);
		assert!(!config.use_sub_toc);
	}

	#[test]
	fn test_validation() {
		assert_eq!(
			Config::new("schema", vec![]).unwrap_err().kind(),
			&ErrorKind::InvalidConfig("fdbRoot", String::new())
		);

		let mut config = Config::new("schema", vec![Root::new("/data")]).unwrap();
		config.round_toc_records = 0;
		assert!(config.validate().is_err());
		config.round_toc_records = 8192;
		assert!(config.validate().is_err());
		config.round_toc_records = 512;
		assert!(config.validate().is_ok());
	}
}
