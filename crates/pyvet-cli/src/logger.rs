//! Logging setup for the CLI.
//!
//! `--verbose` turns on debug logging for the pyvet crates, `--quiet`
//! drops everything below errors, and `RUST_LOG` overrides the default in
//! between.

use tracing_subscriber::EnvFilter;

pub fn init(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("info,pyvet_engine=debug,pyvet_registry=debug")
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
