use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use config::Config;
use database::DbReader;
use error::Result;
use handle::{MultiHandle, PartHandle};
use key::Key;
use request::Request;
use schema::Schema;
use types::{AxisSource, TypesRegistry, WindNotify};
use visitor::ReadVisitor;
use winds::Winds;

/// The result of a retrieval: the gathered handle plus what the
/// expansion did to the request on the way.
#[derive(Debug)]
pub struct Retrieval {
	/// The located fields, in visit order (or sorted under `_sort=1`).
	pub handle: MultiHandle,
	/// How many parameter expansions substituted VO/D for a requested
	/// wind component. The caller reconstructs U/V when non-zero.
	pub wind_conversions: usize,
}

/// The read driver: enumerates candidate databases with the master
/// schema, then expands the request through each database's own schema
/// and gathers the located fields.
pub struct Retriever {
	config: Config,
	schema: Arc<Schema>,
}

impl Retriever {
	/// Creates a retriever over the master schema of the configuration.
	pub fn new(config: Config) -> Result<Retriever> {
		let schema = config.schemas().load(&config.schema_path)?;
		Ok(Retriever { config, schema })
	}

	/// Answers a request. Missing databases are skipped silently; an
	/// empty handle means nothing matched.
	pub fn retrieve(&self, request: &Request) -> Result<Retrieval> {
		let winds = Winds::from_request(request);

		let mut visitor = MultiRetrieveVisitor {
			config: &self.config,
			winds: &winds,
			databases: HashMap::new(),
			current: None,
			handle: MultiHandle::new(),
		};

		self.schema.expand_read(request, &mut visitor)?;

		let mut handle = visitor.handle;
		if request.wants_sorted() {
			handle.compress();
		}

		Ok(Retrieval {
			handle,
			wind_conversions: winds.conversions(),
		})
	}
}

// the per-request database cache and gathering handle
struct MultiRetrieveVisitor<'a> {
	config: &'a Config,
	winds: &'a Winds,
	databases: HashMap<Key, Box<DbReader>>,
	current: Option<Key>,
	handle: MultiHandle,
}

struct ReaderAxis<'a>(&'a DbReader);

impl<'a> AxisSource for ReaderAxis<'a> {
	fn axis(&self, keyword: &str) -> BTreeSet<String> {
		self.0.axis(keyword)
	}
}

impl<'a> MultiRetrieveVisitor<'a> {
	fn current_db(&mut self) -> &mut Box<DbReader> {
		let key = self.current.as_ref().expect("a database was selected; qed");
		self.databases.get_mut(key).expect("selected databases stay cached; qed")
	}
}

impl<'a> ReadVisitor for MultiRetrieveVisitor<'a> {
	fn select_database(&mut self, key: &Key, _full: &Key) -> Result<bool> {
		if self.databases.contains_key(key) {
			self.current = Some(key.clone());
			return Ok(true);
		}

		let engine = self.config.engines().engine(&self.config.reader_engine)?;
		let master = self.config.schemas().load(&self.config.schema_path)?;

		match engine.open_reader(key, self.config, master)? {
			Some(db) => {
				debug!("selected database {}", key);
				self.databases.insert(key.clone(), db);
				self.current = Some(key.clone());
				Ok(true)
			}
			None => {
				debug!("database does not exist: {}", key);
				Ok(false)
			}
		}
	}

	fn select_index(&mut self, key: &Key, _full: &Key) -> Result<bool> {
		self.current_db().select_index(key)
	}

	fn select_datum(&mut self, key: &Key, _full: &Key) -> Result<bool> {
		match self.current_db().retrieve(key)? {
			Some(field) => {
				self.handle.add(PartHandle {
					path: field.path,
					offset: field.offset,
					length: field.length,
				});
				Ok(true)
			}
			None => Ok(false),
		}
	}

	fn values(&mut self, request: &Request, keyword: &str, registry: &TypesRegistry) -> Result<Vec<String>> {
		let t = registry.lookup(keyword);

		let holder;
		let axis: Option<&AxisSource> = match self.current.as_ref().and_then(|k| self.databases.get(k)) {
			Some(db) => {
				holder = ReaderAxis(&**db);
				Some(&holder)
			}
			None => None,
		};

		t.expand(request, keyword, axis, Some(self.winds as &WindNotify))
	}

	fn database_schema(&self) -> Option<Arc<Schema>> {
		let key = self.current.as_ref()?;
		self.databases.get(key).map(|db| db.schema())
	}
}
