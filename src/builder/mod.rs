//! C/C++ build configuration.
//!
//! This module detects native toolchains, binds source files to compilers
//! and produces the command graph of a build.

pub mod command;
pub mod errors;
pub mod graph;
pub mod registry;
pub mod source_file;
pub mod storage;
pub mod toolchain;
pub mod tracker;

pub use command::Command;
pub use graph::CommandGraph;
pub use registry::Registry;
pub use source_file::{SourceFile, SourceState};
pub use storage::SourceFileStorage;
pub use toolchain::{Compiler, Linker, Program, Vendor};
pub use tracker::{FileTracker, GeneratedFiles};
