//! CLI entry point for the harvester.

use pfr_harvester::cli;
use tracing_subscriber::EnvFilter;

/// Exit status for invalid settings or arguments.
const EXIT_CONFIG: i32 = 2;

fn main() {
    // WARN by default so record drops and archive errors still show up
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run() {
        eprintln!("Error: {e}");
        std::process::exit(if e.is_config() { EXIT_CONFIG } else { 1 });
    }
}
