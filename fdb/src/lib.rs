//! Storage engine for meteorological field data.
//!
//! Fields are opaque blobs identified by a small structured key
//! (`class=od,stream=oper,date=20210427,time=1200,param=129.128,step=6`).
//! A declarative schema maps every key onto a three-level hierarchy:
//!
//! - a **database**: one directory holding everything for the outermost
//!   part of the key,
//! - an **index**: one B-tree within the database for the middle part,
//! - a **datum**: one entry within the index for the innermost part.
//!
//! Writes append field bytes to data files and record their locations in
//! indexes; an append-only table of contents (`toc`) lists the indexes
//! that belong to a database. Reads expand a MARS-style request (keyword
//! to set-of-values, a Cartesian product) through the same schema and
//! gather the located fields into one streamable handle.
//!
//! ```text
//!  <root>/od:0001:oper:20210427:1200:g/
//!     toc          append-only table of contents
//!     schema       the schema as copied at creation
//!     *.idx        one index file per index key per writer session
//!     *.data       field payloads, padded to the block size
//!     subtoc.*     per-writer sub-TOCs, when enabled
//! ```
//!
//! Databases are append-only: replacing a field appends a new version and
//! later insertions win on retrieval; `TOC_CLEAR`/`TOC_WIPE` records mask
//! old indexes without rewriting them. Concurrent writers either rely on
//! the atomic O_APPEND of small records or isolate themselves in
//! per-writer sub-TOCs.

#![warn(missing_docs)]

extern crate bit_vec;
extern crate byteorder;
extern crate chrono;
#[macro_use]
extern crate error_chain;
extern crate fs2;
extern crate hex_slice;
extern crate itertools;
extern crate libc;
#[macro_use]
extern crate log;
extern crate memmap;
extern crate parking_lot;
extern crate tiny_keccak;
#[cfg(test)]
#[macro_use]
extern crate matches;
#[cfg(test)]
#[macro_use]
extern crate quickcheck;

mod archive;
mod codec;
mod config;
mod database;
mod error;
mod handle;
mod index;
mod key;
mod purge;
mod request;
mod retrieve;
mod schema;
mod toc;
mod types;
mod visitor;
mod winds;

pub use archive::Archiver;
pub use config::{Config, LustreConfig, LustreStripe, Root};
pub use database::{DbReader, DbWriter, Engine, EngineRegistry, RootManager, TocDbReader, TocDbWriter};
pub use error::{Error, ErrorKind, Result};
pub use handle::{MultiHandle, PartHandle};
pub use index::{Field, FieldRef, FileStore, Index, IndexAxis};
pub use key::{Key, TypedKey};
pub use purge::{purge, PurgeReport};
pub use request::Request;
pub use retrieve::{Retrieval, Retriever};
pub use schema::{Matcher, Predicate, Rule, Schema, SchemaCache};
pub use toc::{Tag, TocHandler, TocRecord, TocWalker};
pub use types::{AxisSource, Type, TypesRegistry, WindNotify};
pub use visitor::{ReadVisitor, WriteVisitor};
pub use winds::Winds;
