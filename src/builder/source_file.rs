//! Tracked source files and their per-file compilers.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::builder::command::Command;
use crate::builder::errors::ProgramError;
use crate::builder::toolchain::{Compiler, Program};
use crate::util::fs::normalize_path;
use crate::util::hash::sha256_prefix;

/// Hex characters of the target/path hash in object names.
const OBJECT_HASH_LEN: usize = 8;

/// Where a tracked file is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Tracked but not compiled (no extension, header-only target)
    UnresolvedNew,
    /// Bound to a compiler and part of the build
    CreatedCompilable,
    /// Waiting for a language to handle its extension
    Postponed,
    /// Tracked but excluded from the build
    Removed,
}

/// Object file name of `file` compiled for `target`.
///
/// `<file name>.<sha256(target + path)[..8]><ext>`: deterministic, and
/// distinct when the same file is built by several targets.
pub fn object_file_name(target: &str, file: &Path, object_extension: &str) -> String {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let hash = sha256_prefix(&format!("{}{}", target, normalize_path(file)), OBJECT_HASH_LEN);
    format!("{}.{}{}", name, hash, object_extension)
}

/// A compiled source file: its own compiler clone plus the commands that
/// must run before it.
#[derive(Debug)]
pub struct NativeSourceFile {
    compiler: Compiler,
    output: PathBuf,
    dependencies: Vec<Arc<Command>>,
    command: OnceLock<Arc<Command>>,
}

impl NativeSourceFile {
    pub fn new(compiler: Compiler, output: PathBuf) -> Self {
        NativeSourceFile {
            compiler,
            output,
            dependencies: Vec::new(),
            command: OnceLock::new(),
        }
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn compiler_mut(&mut self) -> &mut Compiler {
        &mut self.compiler
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Order this file after `cmd`.
    pub fn add_dependency(&mut self, cmd: Arc<Command>) -> Result<(), ProgramError> {
        if self.command.get().is_some() {
            return Err(ProgramError::Frozen {
                program: self.compiler.path().to_path_buf(),
            });
        }
        self.dependencies.push(cmd);
        Ok(())
    }

    /// The compile command with extra per-file arguments and dependency
    /// edges, built once.
    pub fn command(&self, args: &[String]) -> Result<Option<Arc<Command>>, ProgramError> {
        if let Some(cmd) = self.command.get() {
            return Ok(Some(cmd.clone()));
        }
        let Some(base) = self.compiler.command()? else {
            return Ok(None);
        };
        let cmd = if args.is_empty() && self.dependencies.is_empty() {
            base
        } else {
            Arc::new(
                base.with_extra_args(args)
                    .with_dependencies(self.dependencies.iter().cloned()),
            )
        };
        Ok(Some(self.command.get_or_init(|| cmd).clone()))
    }
}

impl Clone for NativeSourceFile {
    fn clone(&self) -> Self {
        NativeSourceFile {
            compiler: self.compiler.clone(),
            output: self.output.clone(),
            dependencies: self.dependencies.clone(),
            command: OnceLock::new(),
        }
    }
}

/// A tracked source file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    file: PathBuf,
    /// Bound to a compiler
    pub created: bool,
    /// Excluded from the build
    pub skip: bool,
    /// Waiting for its language
    pub postponed: bool,
    args: Vec<String>,
    native: Option<NativeSourceFile>,
}

impl SourceFile {
    /// A tracked file with no compiler.
    pub fn placeholder(file: PathBuf) -> Self {
        SourceFile {
            file,
            created: false,
            skip: false,
            postponed: false,
            args: Vec::new(),
            native: None,
        }
    }

    /// A placeholder waiting for its language.
    pub fn postponed(file: PathBuf) -> Self {
        SourceFile {
            postponed: true,
            ..SourceFile::placeholder(file)
        }
    }

    /// A file bound to its compiler.
    pub fn native(file: PathBuf, native: NativeSourceFile) -> Self {
        SourceFile {
            created: true,
            native: Some(native),
            ..SourceFile::placeholder(file)
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Append extra compiler arguments for this file only.
    pub fn add_args(&mut self, args: impl IntoIterator<Item = String>) -> Result<(), ProgramError> {
        if let Some(native) = &self.native {
            if native.command.get().is_some() {
                return Err(ProgramError::Frozen {
                    program: native.compiler.path().to_path_buf(),
                });
            }
        }
        self.args.extend(args);
        Ok(())
    }

    /// Carry args and skip over from a previous entry for the same path.
    pub(crate) fn inherit(&mut self, previous: &SourceFile) {
        self.args = previous.args.clone();
        self.skip = previous.skip;
    }

    pub fn as_native(&self) -> Option<&NativeSourceFile> {
        self.native.as_ref()
    }

    pub fn as_native_mut(&mut self) -> Option<&mut NativeSourceFile> {
        self.native.as_mut()
    }

    /// Part of the build: bound and not skipped.
    pub fn is_active(&self) -> bool {
        self.created && !self.skip
    }

    pub fn state(&self) -> SourceState {
        if self.postponed {
            SourceState::Postponed
        } else if self.skip {
            SourceState::Removed
        } else if self.created {
            SourceState::CreatedCompilable
        } else {
            SourceState::UnresolvedNew
        }
    }

    /// Object file produced by this file, if compiled.
    pub fn object_file(&self) -> Option<&Path> {
        self.native.as_ref().map(|n| n.output())
    }

    /// The compile command, `None` for files that are not compiled.
    pub fn command(&self) -> Result<Option<Arc<Command>>, ProgramError> {
        match &self.native {
            Some(native) => native.command(&self.args),
            None => Ok(None),
        }
    }
}
