//! cinder CLI - native toolchain detection and build planning for C/C++

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cinder::builder::errors::{SourceError, TargetError, ToolchainError};
use cinder::util::diagnostic::{emit, Diagnostic};

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        match diagnostic(&e) {
            Some(diag) => emit(&diag, false),
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

/// The user-facing diagnostic of a typed error, if `e` carries one.
fn diagnostic(e: &anyhow::Error) -> Option<Diagnostic> {
    if let Some(e) = e.downcast_ref::<ToolchainError>() {
        return Some(e.to_diagnostic());
    }
    if let Some(e) = e.downcast_ref::<TargetError>() {
        return Some(e.to_diagnostic());
    }
    e.downcast_ref::<SourceError>().map(SourceError::to_diagnostic)
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("cinder=debug")
    } else {
        EnvFilter::new("cinder=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Toolchains(args) => commands::toolchains::execute(args),
        Commands::Plan(args) => commands::plan::execute(args),
    }
}
