//! `tame`: multi-session terminal supervisor TUI.

#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]
#![allow(clippy::exit)]

mod app;
mod ui;

use std::path::PathBuf;

use clap::Parser;
use miette::{IntoDiagnostic, Result};

/// Multi-session terminal supervisor.
#[derive(Debug, Parser)]
#[command(name = "tame", version, about = "Multi-session terminal supervisor")]
struct Cli {
    /// Path to the configuration file (default: platform config dir).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the color theme name.
    #[arg(long)]
    theme: Option<String>,
    /// Raise the log level to DEBUG regardless of configuration.
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = tame_core::config::Config::load(cli.config.as_deref()).into_diagnostic()?;
    let log_level = if cli.verbose { "debug" } else { config.general.log_level.as_str() };
    let _guard = (!config.general.log_file.is_empty())
        .then(|| tame_core::logging::init(std::path::Path::new(&config.general.log_file), log_level));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .into_diagnostic()?;
    let local = tokio::task::LocalSet::new();

    let result = local.block_on(&runtime, app::run(config, cli.theme));
    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}
