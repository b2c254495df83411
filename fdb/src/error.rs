#![allow(unknown_lints)]
#![allow(missing_docs)]

use std::{io, num};
use std::path::PathBuf;

error_chain! {
	foreign_links {
		Io(io::Error);
		Num(num::ParseIntError);
	}

	errors {
		MissingKeyword(keyword: String, key: String) {
			description("Keyword missing from field key")
			display("Keyword `{}` is missing from field key {}", keyword, key),
		}
		InvalidValue(keyword: String, value: String, msg: String) {
			description("Value cannot be canonicalised"),
			display("Invalid value `{}` for keyword `{}`: {}", value, keyword, msg),
		}
		NotFound(what: String) {
			description("No field matches the request"),
			display("Not found: {}", what),
		}
		RuleNotFound(key: String) {
			description("No schema rule matches the field key"),
			display("Could not find a rule to archive {}", key),
		}
		AmbiguousRule(key: String, first: usize, second: usize) {
			description("More than one schema rule matches the field key"),
			display("More than one rule matching {}: rules at lines {} and {}", key, first, second),
		}
		SchemaSyntax(line: usize, msg: String) {
			description("Schema text cannot be parsed"),
			display("Schema syntax error at line {}: {}", line, msg),
		}
		SchemaHasChanged(path: PathBuf) {
			description("Schema stored in the database differs from the master schema"),
			display("Schema has changed: {}", path.display()),
		}
		DoubleInsert(key: String) {
			description("Index already contains an entry for this key"),
			display("Duplicate index entry with key `{}` -- this may be a schema bug", key),
		}
		PermissionDenied(msg: String) {
			description("Write denied by database ownership rules"),
			display("{}", msg),
		}
		VersionMismatch(supported: u16, got: u16) {
			description("Record version is newer than this software"),
			display("Record version mismatch, software handles version <= {}, got {}", supported, got),
		}
		NoEngine(name: String) {
			description("No database engine matches the requested name"),
			display("No database engine registered for `{}`", name),
		}
		NoWritableRoot {
			description("No writable root is configured"),
			display("No writable root is configured"),
		}
		InvalidConfig(field: &'static str, error: String) {
			description("Invalid configuration was provided"),
			display("Invalid value of `{}`: {}", field, error),
		}
		CorruptedToc(path: PathBuf, msg: String) {
			description("Table of contents is damaged"),
			display("Corrupted TOC at {}: {}", path.display(), msg),
		}
		CorruptedIndex(path: PathBuf, msg: String) {
			description("Index file is damaged"),
			display("Corrupted index at {}: {}", path.display(), msg),
		}
		TruncatedStream {
			description("Stream ended in the middle of a value"),
			display("Stream ended in the middle of a value"),
		}
	}
}

impl PartialEq for ErrorKind {
	fn eq(&self, other: &Self) -> bool {
		use self::ErrorKind::*;

		match (self, other) {
			(&MissingKeyword(ref k, ref f), &MissingKeyword(ref k2, ref f2))
				if k == k2 && f == f2 => true,
			(&InvalidValue(ref k, ref v, _), &InvalidValue(ref k2, ref v2, _))
				if k == k2 && v == v2 => true,
			(&NotFound(ref w), &NotFound(ref w2))
				if w == w2 => true,
			(&RuleNotFound(ref k), &RuleNotFound(ref k2))
				if k == k2 => true,
			(&AmbiguousRule(ref k, a, b), &AmbiguousRule(ref k2, a2, b2))
				if k == k2 && a == a2 && b == b2 => true,
			(&SchemaSyntax(line, _), &SchemaSyntax(line2, _))
				if line == line2 => true,
			(&SchemaHasChanged(ref p), &SchemaHasChanged(ref p2))
				if p == p2 => true,
			(&DoubleInsert(ref k), &DoubleInsert(ref k2))
				if k == k2 => true,
			(&PermissionDenied(_), &PermissionDenied(_)) => true,
			(&VersionMismatch(s, g), &VersionMismatch(s2, g2))
				if s == s2 && g == g2 => true,
			(&NoEngine(ref n), &NoEngine(ref n2))
				if n == n2 => true,
			(&NoWritableRoot, &NoWritableRoot) => true,
			(&InvalidConfig(field, _), &InvalidConfig(field2, _))
				if field == field2 => true,
			(&TruncatedStream, &TruncatedStream) => true,
			_ => false,
		}
	}
}
