//! glaura - port-call task tracking CLI
//!
//! Completes, creates and deletes port-call tasks and rolls their completion
//! up to task headers and port call services.

use clap::Parser;
use glaura::cli::Cli;
use glaura::output::{emit_error, infer_command_name_from_args};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter from RUST_LOG; logging stays off unless asked for.
fn log_filter() -> EnvFilter {
    std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new("off"))
}

fn main() {
    // stdout carries command output and JSON envelopes.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(log_filter())
        .init();

    let command = infer_command_name_from_args();
    let cli = Cli::parse();
    let events_to_stdout = cli
        .events
        .as_deref()
        .is_some_and(|value| value.trim() == "-");
    let json = cli.json && !events_to_stdout;

    if let Err(err) = cli.run() {
        let _ = emit_error(&command, &err, json);
        std::process::exit(err.exit_code());
    }
}
