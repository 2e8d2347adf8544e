mod ast;
mod error;
mod evaluator;
mod lexer;
mod parser;
mod repl;
mod runner;
mod value;

use clap::{Arg, ArgAction, Command};
use std::fs;
use std::path::Path;
use std::process;

fn main() {
    let matches = Command::new("codelang")
        .about("A small statement language with a tree-walking interpreter")
        .arg(
            Arg::new("file")
                .help("The script file to execute")
                .value_name("FILE")
                .index(1),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Trace the tokenizing, parsing and interpreting stages")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("interactive")
                .short('i')
                .long("interactive")
                .help("Start in interactive REPL mode")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");

    if matches.get_flag("interactive") {
        repl::start();
        return;
    }

    match matches.get_one::<String>("file") {
        Some(file_path) => run_file(file_path, verbose),
        None => repl::start(),
    }
}

fn run_file(path: &str, verbose: bool) {
    let path = Path::new(path);

    if !path.exists() {
        eprintln!("Error: File not found: {}", path.display());
        process::exit(1);
    }

    match fs::read_to_string(path) {
        Ok(source) => {
            if !runner::run(&source, path.to_str(), verbose) {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}
