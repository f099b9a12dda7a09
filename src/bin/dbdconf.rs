//! `dbdconf`: read, list, or dump a GVDB file from the command line.
//!
//! Grounded in spec.md §6.2 for the argument grammar (either positional
//! ordering accepted) and exit codes, and in the `clap`-derive style shown
//! by `koverstreet-bcachefs-tools`' CLI subcommands in the example pack
//! (doc-comment-as-help, `#[command]`/`#[arg]` attributes). `env_logger` is
//! initialized here, and only here: the library crate never touches the
//! global logger.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use gvdb::{parser, path};

/// Inspect a GVDB (GLib variant database) file.
#[derive(Parser, Debug)]
#[command(name = "dbdconf", version, about)]
struct Cli {
    /// GVDB file path, or a command, in either order.
    first: String,
    /// A command (help/read/list/dump), or the GVDB file path, in either order.
    second: String,
    /// The argument the command operates on (a key path or directory path).
    arg: Option<String>,
}

enum Command {
    Help,
    Read,
    List,
    Dump,
}

impl Command {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "help" => Some(Command::Help),
            "read" => Some(Command::Read),
            "list" => Some(Command::List),
            "dump" => Some(Command::Dump),
            _ => None,
        }
    }
}

fn print_help() {
    println!("usage: dbdconf <GVDB_PATH> <command> <arg>");
    println!("       dbdconf <command> <GVDB_PATH> <arg>");
    println!();
    println!("commands:");
    println!("  help             print this message");
    println!("  read <key>       print the value at a key path (e.g. /greeting)");
    println!("  list <dir>/      print the immediate children of a directory path");
    println!("  dump <dir>/      print every key under a directory path, recursively");
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    // Accept either `<path> <command>` or `<command> <path>`.
    let (gvdb_path, command_word) = match Command::parse(&cli.first) {
        Some(_) => (cli.second.clone(), cli.first.clone()),
        None => (cli.first.clone(), cli.second.clone()),
    };

    let Some(command) = Command::parse(&command_word) else {
        error!("no recognized command in {:?} / {:?}", cli.first, cli.second);
        print_help();
        return ExitCode::from(255); // exit code -1 as an unsigned byte
    };

    if matches!(command, Command::Help) {
        print_help();
        return ExitCode::SUCCESS;
    }

    let Some(arg) = cli.arg else {
        error!("command {command_word:?} requires an argument");
        print_help();
        return ExitCode::from(255);
    };

    run(&gvdb_path, command, &arg)
}

fn run(gvdb_path: &str, command: Command, arg: &str) -> ExitCode {
    let file_path = PathBuf::from(gvdb_path);
    let metadata = match std::fs::metadata(&file_path) {
        Ok(metadata) => metadata,
        Err(err) => {
            error!("{gvdb_path}: {err}");
            return ExitCode::from(254); // -2
        }
    };
    if !metadata.is_file() {
        error!("{gvdb_path}: not a regular file");
        return ExitCode::from(254);
    }

    let data = match std::fs::read(&file_path) {
        Ok(data) => data,
        Err(err) => {
            error!("{gvdb_path}: {err}");
            return ExitCode::from(254);
        }
    };

    let root = match parser::parse_file(&data, false) {
        Ok(root) => root,
        Err(err) => {
            error!("{gvdb_path}: {err}");
            return ExitCode::from(254);
        }
    };

    let result = match command {
        Command::Read => path::read(&root, arg),
        Command::List => path::list(&root, arg),
        Command::Dump => path::dump(&root, arg),
        Command::Help => unreachable!("handled above"),
    };

    match result {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{gvdb_path} {arg}: {err}");
            ExitCode::from(253) // -3
        }
    }
}
