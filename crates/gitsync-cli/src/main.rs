//! git-sync
//!
//! Keeps local working copies of remote git repositories up to date.

mod app;
mod cli;
mod error;
mod logging;
mod server;

use clap::Parser;
use colored::Colorize;

use cli::{Cli, Settings};
use error::{CliError, Result};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::resolve(cli, |name| std::env::var(name).ok())?;
    logging::init(&settings.log)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Io)?;
    runtime.block_on(app::run(settings))
}
