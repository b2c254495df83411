extern crate clap;
extern crate env_logger;
extern crate fdb;

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::{App, Arg, ArgMatches, SubCommand};
use fdb::{
	purge, Archiver, Config, Error, ErrorKind, Key, Request, Retriever, Root,
	RootManager, TocHandler,
};

fn build_config(matches: &ArgMatches) -> Result<Config, Error> {
	match (matches.value_of("SCHEMA"), matches.value_of("ROOT")) {
		(Some(schema), Some(roots)) => {
			Config::new(schema, roots.split(',').map(Root::new).collect())
		}
		_ => Config::from_env(),
	}
}

fn database_directory(config: &Config, matches: &ArgMatches) -> Result<PathBuf, Error> {
	if let Some(path) = matches.value_of("DB") {
		return Ok(PathBuf::from(path));
	}

	let key_str = matches.value_of("KEY").unwrap_or("");
	let archiver = Archiver::new(config.clone())?;
	let key = Key::parse(key_str, archiver.schema().registry())?;

	RootManager::new(config)
		.existing_directory(&key)
		.ok_or_else(|| ErrorKind::NotFound(format!("no database for {}", key)).into())
}

fn do_archive(matches: &ArgMatches) -> Result<(), Error> {
	let config = build_config(matches)?;
	let mut archiver = Archiver::new(config)?;

	let key_str = matches.value_of("KEY").unwrap_or("");
	let key = Key::parse(key_str, archiver.schema().registry())?;

	let file = matches.value_of("FILE").unwrap_or("");
	let data = fs::read(file)?;

	archiver.archive(&key, &data)?;
	archiver.flush()?;
	println!("archived {} ({} bytes)", key, data.len());
	Ok(())
}

fn do_retrieve(matches: &ArgMatches) -> Result<(), Error> {
	let config = build_config(matches)?;
	let retriever = Retriever::new(config)?;

	let request = Request::parse(matches.value_of("REQUEST").unwrap_or(""))?;
	let retrieval = retriever.retrieve(&request)?;

	if retrieval.handle.is_empty() {
		return Err(ErrorKind::NotFound(request.to_string()).into());
	}
	if retrieval.wind_conversions > 0 {
		eprintln!("note: vorticity and divergence were substituted for wind components");
	}

	let data = retrieval.handle.read_all()?;
	match matches.value_of("OUT") {
		Some(path) => fs::write(path, &data)?,
		None => io::stdout().write_all(&data)?,
	}
	Ok(())
}

fn do_dump_toc(matches: &ArgMatches) -> Result<(), Error> {
	let config = build_config(matches)?;
	let directory = database_directory(&config, matches)?;

	let toc = TocHandler::new(&directory, &config);
	let stdout = io::stdout();
	toc.dump(&mut stdout.lock(), !matches.is_present("NO_SUB_TOCS"))
}

fn do_purge(matches: &ArgMatches) -> Result<(), Error> {
	let config = build_config(matches)?;
	let directory = database_directory(&config, matches)?;

	let doit = matches.is_present("DOIT");
	let report = purge(&directory, &config, doit)?;

	println!("reachable fields: {}", report.reachable);
	println!("duplicate fields: {}", report.duplicates);
	for path in &report.masked_indexes {
		println!("masked index {}", path.display());
	}
	for path in &report.deleted_files {
		println!("deleted {}", path.display());
	}
	if !doit {
		println!("rerun with --doit to delete unused files");
	}
	Ok(())
}

fn exit_code(error: &Error) -> i32 {
	match *error.kind() {
		ErrorKind::NotFound(_) => 2,
		ErrorKind::SchemaHasChanged(_)
		| ErrorKind::SchemaSyntax(_, _)
		| ErrorKind::RuleNotFound(_)
		| ErrorKind::AmbiguousRule(_, _, _)
		| ErrorKind::VersionMismatch(_, _) => 3,
		_ => 1,
	}
}

fn main() {
	env_logger::init();

	let schema_arg = Arg::with_name("SCHEMA")
		.long("schema")
		.takes_value(true)
		.help("Master schema path (defaults to FDB_SCHEMA_FILE)");
	let root_arg = Arg::with_name("ROOT")
		.long("root")
		.takes_value(true)
		.help("Comma-separated root list (defaults to FDB_ROOT)");
	let key_arg = Arg::with_name("KEY")
		.short("k")
		.long("key")
		.takes_value(true)
		.help("Database key, k1=v1,k2=v2,...");
	let db_arg = Arg::with_name("DB")
		.long("db")
		.takes_value(true)
		.help("Database directory (instead of a key)");

	let matches = App::new("fdb")
		.version("0.1.0")
		.about("Store and retrieve meteorological fields")
		.subcommand(SubCommand::with_name("archive")
			.about("Archive one field")
			.arg(schema_arg.clone())
			.arg(root_arg.clone())
			.arg(Arg::with_name("KEY")
				.short("k")
				.long("key")
				.takes_value(true)
				.required(true)
				.help("Field key, k1=v1,k2=v2,..."))
			.arg(Arg::with_name("FILE")
				.short("f")
				.long("file")
				.takes_value(true)
				.required(true)
				.help("File holding the field bytes")))
		.subcommand(SubCommand::with_name("retrieve")
			.about("Retrieve fields for a request")
			.arg(schema_arg.clone())
			.arg(root_arg.clone())
			.arg(Arg::with_name("REQUEST")
				.short("r")
				.long("request")
				.takes_value(true)
				.required(true)
				.help("MARS-style request, k=v1/v2,..."))
			.arg(Arg::with_name("OUT")
				.short("o")
				.long("out")
				.takes_value(true)
				.help("Write the gathered fields here instead of stdout")))
		.subcommand(SubCommand::with_name("dump-toc")
			.about("Dump the table of contents of a database")
			.arg(schema_arg.clone())
			.arg(root_arg.clone())
			.arg(key_arg.clone())
			.arg(db_arg.clone())
			.arg(Arg::with_name("NO_SUB_TOCS")
				.long("no-sub-tocs")
				.help("Do not walk into sub-TOCs")))
		.subcommand(SubCommand::with_name("purge")
			.about("Mask duplicate fields and remove unused files")
			.arg(schema_arg.clone())
			.arg(root_arg.clone())
			.arg(key_arg.clone())
			.arg(db_arg.clone())
			.arg(Arg::with_name("DOIT")
				.long("doit")
				.help("Delete the files (data and indexes)")))
		.get_matches();

	let result = match matches.subcommand() {
		("archive", Some(matches)) => do_archive(matches),
		("retrieve", Some(matches)) => do_retrieve(matches),
		("dump-toc", Some(matches)) => do_dump_toc(matches),
		("purge", Some(matches)) => do_purge(matches),
		_ => {
			eprintln!("{}", matches.usage());
			process::exit(1);
		}
	};

	if let Err(error) = result {
		eprintln!("{}", error);
		process::exit(exit_code(&error));
	}
}
