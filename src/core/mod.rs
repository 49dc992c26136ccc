//! Core data structures for cinder.
//!
//! This module contains the foundational types used throughout cinder:
//! - Versions and package identifiers
//! - Typed command-line options and native settings
//! - Languages, targets and the solution that owns them

pub mod dependency;
pub mod language;
pub mod options;
pub mod package;
pub mod solution;
pub mod target;
pub mod version;

pub use dependency::Dependency;
pub use language::Language;
pub use package::{PackageId, PackagePath, UnresolvedPackage};
pub use solution::{BuildSettings, Solution};
pub use target::{Target, TargetInfo, TargetKind};
pub use version::Version;
