use clap::{crate_version, App, Arg, ErrorKind};
use std::fs;
use std::io::{self, BufRead, Write};
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use treelox::Lox;

fn main() {
    let matches = App::new("treelox")
        .version(crate_version!())
        .about("Tree-walking interpreter for Lox")
        .arg(
            Arg::with_name("SCRIPT")
                .help("Script to run; starts a prompt when omitted")
                .index(1),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("Raises log verbosity (repeat for more)"),
        )
        .get_matches_safe()
        .unwrap_or_else(|e| match e.kind {
            ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => e.exit(),
            _ => {
                eprintln!("{}", e.message);
                process::exit(64);
            }
        });

    init_logging(matches.occurrences_of("verbose"));

    match matches.value_of("SCRIPT") {
        Some(path) => run_file(path),
        None => run_prompt(),
    }
}

// RUST_LOG wins over -v.
fn init_logging(verbosity: u64) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_file(path: &str) {
    let contents = match fs::read_to_string(path) {
        Ok(x) => x,
        Err(e) => {
            eprintln!("Could not read '{}': {}", path, e);
            process::exit(74);
        }
    };
    debug!(path, bytes = contents.len(), "running script");
    let mut lox = Lox::new();
    if let Err(e) = lox.run(&contents) {
        eprintln!("{}", e);
        process::exit(e.exit_code());
    }
}

fn run_prompt() {
    let mut lox = Lox::new();
    let stdin = io::stdin();
    let mut input = stdin.lock();
    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            return;
        }
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) => return,
            Ok(_) => (),
            Err(e) => {
                eprintln!("{}", e);
                process::exit(74);
            }
        }
        match lox.run_line(&line) {
            Ok(Some(value)) => println!("{}", value),
            Ok(None) => (),
            Err(e) => eprintln!("{}", e),
        }
    }
}
