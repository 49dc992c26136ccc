//! Build configuration error types and diagnostics.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::package::PackagePathError;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error during toolchain detection.
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("toolchain not found: {vendor}")]
    NotFound { vendor: String, searched: Vec<String> },

    #[error("cannot parse version of `{tool}` from `{text}`")]
    BadVersion { tool: String, text: String },

    #[error("unknown architecture `{0}`")]
    UnknownArch(String),

    #[error("No Windows Kits 10.0 available")]
    NoWindowsKit10 { searched: PathBuf },

    #[error("no Windows SDK found under `{}`", .root.display())]
    NoWindowsSdk { root: PathBuf },

    #[error("failed to read `{}`", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    PackagePath(#[from] PackagePathError),

    #[error(transparent)]
    Program(#[from] ProgramError),
}

impl ToolchainError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ToolchainError::NotFound { vendor, searched } => {
                let mut diag = Diagnostic::error(format!("toolchain not found: {}", vendor));
                for s in searched {
                    diag = diag.with_context(format!("searched {}", s));
                }
                diag.with_suggestion(suggestions::NO_TOOLCHAIN)
            }

            ToolchainError::BadVersion { tool, text } => {
                Diagnostic::error(format!("cannot determine the version of `{}`", tool))
                    .with_context(format!("version string was `{}`", text.trim()))
            }

            ToolchainError::UnknownArch(arch) => {
                Diagnostic::error(format!("no toolchain directory mapping for architecture `{}`", arch))
                    .with_context("supported architectures: x86_64, x86")
            }

            ToolchainError::NoWindowsKit10 { searched } => {
                Diagnostic::error("No Windows Kits 10.0 available")
                    .with_location(searched)
                    .with_suggestion(suggestions::NO_WINDOWS_SDK)
            }

            ToolchainError::NoWindowsSdk { root } => Diagnostic::error("no Windows SDK found")
                .with_location(root)
                .with_suggestion(suggestions::NO_WINDOWS_SDK),

            ToolchainError::Io { path, source } => {
                Diagnostic::error(format!("failed to read toolchain file: {}", source))
                    .with_location(path)
            }

            ToolchainError::PackagePath(e) => Diagnostic::error(e.to_string()),

            ToolchainError::Program(e) => e.to_diagnostic(),
        }
    }
}

/// Error configuring a program or building its command.
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("Output file is not set")]
    OutputNotSet { program: PathBuf },

    #[error("program `{}` can no longer be configured: its command was already built", .program.display())]
    Frozen { program: PathBuf },

    #[error("`{}` does not accept option `{option}`", .program.display())]
    UnsupportedOption { program: PathBuf, option: &'static str },
}

impl ProgramError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ProgramError::OutputNotSet { program } => Diagnostic::error("Output file is not set")
                .with_context(format!("while building the command for `{}`", program.display()))
                .with_suggestion(suggestions::OUTPUT_NOT_SET),

            ProgramError::Frozen { program } => Diagnostic::error(self.to_string())
                .with_location(program)
                .with_suggestion("Clone the program and configure the copy instead"),

            ProgramError::UnsupportedOption { .. } => Diagnostic::error(self.to_string()),
        }
    }
}

/// Error tracking source files.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Cannot find source file: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("source file is not tracked: {}", .path.display())]
    Untracked { path: PathBuf },

    #[error("source files of target `{target}` are not resolved yet")]
    Postponed { target: String },

    #[error("invalid file pattern `{pattern}`")]
    BadPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    Program(#[from] ProgramError),
}

impl SourceError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            SourceError::NotFound { path } => {
                Diagnostic::error(format!("cannot find source file: {}", path.display()))
                    .with_location(path)
                    .with_context("the file does not exist and no build step generates it")
                    .with_suggestion(suggestions::MISSING_SOURCE)
            }

            SourceError::Untracked { path } => Diagnostic::error(self.to_string())
                .with_location(path)
                .with_suggestion("Add the file to the target before configuring it"),

            SourceError::Postponed { target } => Diagnostic::error(self.to_string())
                .with_suggestion(format!("Call `resolve()` on target `{}` first", target)),

            SourceError::BadPattern { pattern, source } => {
                Diagnostic::error(format!("invalid file pattern `{}`", pattern))
                    .with_context(source.to_string())
            }

            SourceError::Program(e) => e.to_diagnostic(),
        }
    }
}

/// Error producing the commands of a target.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("no {program} registered for {vendor} objects of target `{target}`")]
    NoLinker {
        target: String,
        vendor: String,
        program: &'static str,
    },

    #[error("target `{0}` is already defined")]
    Duplicate(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Program(#[from] ProgramError),
}

impl TargetError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            TargetError::NoLinker { target, .. } => Diagnostic::error(self.to_string())
                .with_context(format!("while building the link command of `{}`", target))
                .with_suggestion(suggestions::NO_TOOLCHAIN),

            TargetError::Duplicate(_) => Diagnostic::error(self.to_string()),

            TargetError::Source(e) => e.to_diagnostic(),

            TargetError::Program(e) => e.to_diagnostic(),
        }
    }
}

/// Error ordering the command graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("cycle detected in command graph at `{command}`")]
    Cycle { command: String },
}
