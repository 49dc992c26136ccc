//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use cinder::core::TargetKind;

/// cinder - native toolchain detection and build planning for C/C++
#[derive(Parser)]
#[command(name = "cinder")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect native toolchains and list them
    Toolchains(ToolchainsArgs),

    /// Print the command graph for the sources of a directory
    Plan(PlanArgs),
}

#[derive(Args)]
pub struct ToolchainsArgs {
    /// Target architecture (defaults to the host)
    #[arg(long)]
    pub arch: Option<String>,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Source directory
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Target name (defaults to the directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// What the target produces
    #[arg(long, value_enum, default_value_t = KindArg::Exe)]
    pub kind: KindArg,

    /// Regex over paths relative to the source directory
    #[arg(long, default_value = ".*")]
    pub pattern: String,

    /// Only consider files directly in the source directory
    #[arg(long)]
    pub no_recursive: bool,

    /// Regex of files to exclude from the build
    #[arg(long)]
    pub exclude: Option<String>,

    /// Binary directory (defaults to `<dir>/.cinder/build`)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Target architecture (defaults to the host)
    #[arg(long)]
    pub arch: Option<String>,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    Exe,
    Static,
    Shared,
}

impl From<KindArg> for TargetKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Exe => TargetKind::Executable,
            KindArg::Static => TargetKind::StaticLibrary,
            KindArg::Shared => TargetKind::SharedLibrary,
        }
    }
}
