//! cinder - native toolchain detection and build command graphs for C/C++
//!
//! This crate provides the core library functionality for cinder:
//! toolchain detection, per-target source tracking and construction of
//! the compile and link command graph.

pub mod builder;
pub mod core;
pub mod util;

pub use builder::{Command, CommandGraph, Registry};
pub use core::{BuildSettings, Solution, Target, TargetKind};
pub use util::config::Config;
