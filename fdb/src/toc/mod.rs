//! The append-only table-of-contents protocol.

mod handler;
mod record;

pub use self::handler::{TocHandler, TocWalker};
pub use self::record::{Tag, TocRecord, HEADER_SIZE, PIPE_BUF, TOC_VERSION};

use std::sync::atomic::{AtomicUsize, Ordering};

// process-unique suffix for index, data and sub-TOC file names
pub(crate) fn unique_suffix() -> String {
	static COUNTER: AtomicUsize = AtomicUsize::new(0);
	let n = COUNTER.fetch_add(1, Ordering::Relaxed);
	format!("{}.{}", unsafe { ::libc::getpid() }, n)
}
