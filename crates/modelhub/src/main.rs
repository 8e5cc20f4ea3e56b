//! modelhub CLI application
//!
//! Single-operation command-line tool over the artifact cache and the
//! model version registry. Every invocation prints one JSON envelope to
//! stdout; human-readable diagnostics go to stderr.

// CLI binary needs to output to stdout/stderr - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;
mod commands;

use cli::{EXIT_FAILURE, EXIT_OK};
use miette::Report;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = cli::parse();
    init_tracing(cli.verbose);
    std::process::exit(run(cli.command));
}

fn run(command: cli::Commands) -> i32 {
    match commands::run(command) {
        Ok(payload) => {
            println!("{}", commands::ok_envelope(payload));
            EXIT_OK
        }
        Err(err) => {
            println!("{}", commands::error_envelope(&err));
            // Rich rendering on stderr so the envelope on stdout stays
            // machine-parseable
            let report = Report::new(err);
            eprintln!("{report:?}");
            EXIT_FAILURE
        }
    }
}

/// Logs go to stderr. `RUST_LOG` wins over `-v` when set.
fn init_tracing(verbose: u8) {
    let default_directive = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
