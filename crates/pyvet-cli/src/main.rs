//! The `pyvet` binary: argument parsing, logging setup, and dispatch into
//! the audit engine.

use anyhow::Result;
use clap::{CommandFactory, Parser};

use pyvet_cli::cli::{Cli, Mode};
use pyvet_cli::{logger, output};
use pyvet_engine::{check_package, check_project, KnowledgeBase};
use pyvet_registry::{PyPiClient, RegistryConfig};

fn main() -> Result<()> {
    let args = Cli::parse();
    logger::init(args.verbose, args.quiet);

    let Some(mode) = args.mode() else {
        Cli::command().print_help()?;
        return Ok(());
    };
    tracing::debug!(?mode, "resolved invocation mode");

    let kb = KnowledgeBase::builtin();
    let mut config = RegistryConfig::default();
    if let Some(cache_dir) = args.cache_dir.clone() {
        config.cache_dir = cache_dir;
    }
    let client = PyPiClient::new(config, kb.versions().to_vec())?;

    let findings = match mode {
        Mode::Package { name, version } => {
            check_package(&name, &version, &client, &client, kb)
        }
        Mode::Project {
            root,
            python_requires,
        } => check_project(&root, &python_requires, &client, kb),
    };
    output::print_findings(&findings, args.no_color);
    Ok(())
}
