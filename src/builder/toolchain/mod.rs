//! Toolchain abstraction for C/C++ compilers, linkers and librarians.
//!
//! A program is a configured executable: a [`Compiler`] or a [`Linker`]
//! (which also covers librarians) paired with a vendor [`Dialect`] that
//! knows the flag syntax and file naming of MSVC, Clang, Clang-cl or GNU.
//! Programs render their typed options into a memoized [`Command`]; once
//! the command exists the program is frozen and must be cloned to be
//! reconfigured.
//!
//! Toolchain detection:
//! 1. Windows: Visual Studio (vswhere, `VS*COMNTOOLS`, Program Files), the
//!    Windows SDK and an LLVM install
//! 2. POSIX: `ar`, `gcc`, `g++`, `as`, `clang`, `clang++` on PATH

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::builder::command::Command;
use crate::builder::errors::ProgramError;
use crate::builder::tracker::FileTracker;
use crate::core::options::{NativeSettings, OptionSet};
use crate::core::version::Version;

mod clang;
mod compiler;
mod detect;
mod gnu;
mod linker;
mod msvc;
pub mod probe;
pub mod windows;

pub use clang::{ClangClDialect, ClangDialect};
pub use compiler::{Compiler, CompilerKind, InputSlot};
pub use detect::{detect_native_compilers, ids, CPP_EXTENSIONS};
pub use gnu::GnuDialect;
pub use linker::{Linker, LinkerRole};
pub use msvc::MsvcDialect;
pub use probe::VersionProbe;

/// Stable option names shared by every dialect.
pub mod names {
    pub const COMPILE_WITHOUT_LINKING: &str = "CompileWithoutLinking";
    pub const INPUT_FILE: &str = "InputFile";
    pub const C_SOURCE_FILE: &str = "CSourceFile";
    pub const CXX_SOURCE_FILE: &str = "CPPSourceFile";
    pub const OBJECT_FILE: &str = "ObjectFile";
    pub const LANGUAGE: &str = "Language";
    pub const STANDARD: &str = "Standard";
    pub const OPTIMIZATION: &str = "Optimization";
    pub const DEBUG_INFORMATION: &str = "DebugInformation";
    pub const POSITION_INDEPENDENT_CODE: &str = "PositionIndependentCode";
    pub const WRITE_DEPENDENCIES: &str = "WriteDependencies";
    pub const DEPENDENCIES_FILE: &str = "DependenciesFile";
    pub const SAFE_SEH: &str = "SafeSEH";
    pub const NOLOGO: &str = "Nologo";
    pub const CLANG_OPTIONS: &str = "ClangOptions";

    pub const INPUT_FILES: &str = "InputFiles";
    pub const OUTPUT: &str = "Output";
    pub const IMPORT_LIBRARY: &str = "ImportLibrary";
    pub const INPUT_LIBRARY_DEPENDENCIES: &str = "InputLibraryDependencies";
    pub const SHARED: &str = "Shared";
    pub const MACHINE: &str = "Machine";
    pub const OPERATION: &str = "Operation";
    pub const SYSTEM_LIBRARIES: &str = "SystemLibraries";
}

/// The command-line dialect family of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Vendor {
    Msvc,
    Clang,
    ClangCl,
    Gnu,
}

impl Vendor {
    /// Get the vendor name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Msvc => "msvc",
            Vendor::Clang => "clang",
            Vendor::ClangCl => "clang-cl",
            Vendor::Gnu => "gnu",
        }
    }

    /// The dialect strategy for this vendor.
    pub fn dialect(&self) -> &'static dyn Dialect {
        match self {
            Vendor::Msvc => &MsvcDialect,
            Vendor::Clang => &ClangDialect,
            Vendor::ClangCl => &ClangClDialect,
            Vendor::Gnu => &GnuDialect,
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vendor-specific flag syntax and file naming.
///
/// Each dialect knows how to declare the typed options of its compilers
/// and linkers and how to render the vendor-neutral [`NativeSettings`].
pub trait Dialect: Send + Sync {
    /// The vendor this dialect renders for.
    fn vendor(&self) -> Vendor;

    /// Object file extension, with the leading dot.
    fn object_extension(&self) -> &'static str;

    /// How to ask a tool of this dialect for its version.
    fn version_probe(&self) -> VersionProbe;

    /// Typed options of a compiler of the given kind.
    fn compiler_options(&self, kind: CompilerKind) -> OptionSet;

    /// Bind a source file to an input slot.
    fn bind_source(&self, options: &mut OptionSet, slot: InputSlot, input: &Path);

    /// Make-style dependency file written next to `object`.
    fn deps_file(&self, _object: &Path) -> Option<PathBuf> {
        None
    }

    /// Adjust compiler options for a specific executable before rendering.
    fn adjust_compiler_options(&self, _program: &Path, _options: &mut OptionSet) {}

    /// Render defines, include directories and raw compile options.
    fn render_compile_settings(&self, settings: &NativeSettings) -> Vec<String>;

    /// Typed options of a linker or librarian.
    fn linker_options(&self, role: LinkerRole) -> OptionSet;

    /// Render link directories, libraries and raw link options.
    fn render_link_settings(&self, role: LinkerRole, settings: &NativeSettings) -> Vec<String>;

    /// Extension appended by `set_output_file`.
    fn output_extension(&self, role: LinkerRole) -> &'static str;

    /// Extension of shared libraries produced by the linker.
    fn shared_library_extension(&self) -> &'static str;

    /// Import library path for an explicit `set_import_library` call, or
    /// `None` when the dialect has no import libraries.
    fn explicit_import_library(&self, out: &Path) -> Option<PathBuf>;

    /// Import library of an output when none was set explicitly.
    fn default_import_library(&self, role: LinkerRole, output: &Path) -> PathBuf;

    /// Whether static library dependencies are wrapped in a link group.
    fn wraps_library_group(&self) -> bool {
        false
    }
}

/// A configured executable tool able to produce one [`Command`].
pub trait Program: Send + Sync + fmt::Debug {
    fn base(&self) -> &ProgramBase;

    fn base_mut(&mut self) -> &mut ProgramBase;

    /// Absolute path to the executable.
    fn path(&self) -> &Path {
        self.base().file()
    }

    fn vendor(&self) -> Vendor {
        self.base().vendor()
    }

    /// The tool version, probed on first use when not set explicitly.
    fn version(&self) -> Version {
        self.base().version()
    }

    /// The memoized command, or `None` when mandatory inputs are unset.
    fn command(&self) -> Result<Option<Arc<Command>>, ProgramError>;

    /// Deep copy of the configuration with an empty command cache.
    fn clone_program(&self) -> Box<dyn Program>;

    /// Directories this tool's outputs land in.
    fn generated_dirs(&self) -> BTreeSet<PathBuf>;

    fn as_compiler(&self) -> Option<&Compiler> {
        None
    }

    fn as_linker(&self) -> Option<&Linker> {
        None
    }

    /// Attach the session-wide generated-file tracker.
    fn set_file_tracker(&mut self, tracker: Arc<dyn FileTracker>) {
        self.base_mut().tracker = Some(tracker);
    }

    /// Whether the command has been built.
    fn is_frozen(&self) -> bool {
        self.base().is_frozen()
    }
}

/// State shared by every program: executable, version and command cache.
pub struct ProgramBase {
    file: PathBuf,
    vendor: Vendor,
    version: OnceLock<Version>,
    probe: VersionProbe,
    env: Vec<(String, String)>,
    tracker: Option<Arc<dyn FileTracker>>,
    command: OnceLock<Arc<Command>>,
}

impl ProgramBase {
    pub fn new(vendor: Vendor, file: impl Into<PathBuf>) -> Self {
        ProgramBase {
            file: file.into(),
            vendor,
            version: OnceLock::new(),
            probe: vendor.dialect().version_probe(),
            env: Vec::new(),
            tracker: None,
            command: OnceLock::new(),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    pub fn version(&self) -> Version {
        *self
            .version
            .get_or_init(|| probe::probe_version(&self.file, &self.probe))
    }

    /// Fix the version instead of probing.
    pub fn set_version(&mut self, version: Version) {
        self.version = OnceLock::from(version);
    }

    /// Override how the version is probed.
    pub fn set_version_probe(&mut self, probe: VersionProbe) {
        self.probe = probe;
    }

    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn add_env(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<(), ProgramError> {
        self.ensure_mutable()?;
        self.env.push((key.into(), value.into()));
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.command.get().is_some()
    }

    /// Fail once the command has been built.
    pub fn ensure_mutable(&self) -> Result<(), ProgramError> {
        if self.is_frozen() {
            return Err(ProgramError::Frozen {
                program: self.file.clone(),
            });
        }
        Ok(())
    }

    /// Return the cached command, or build, cache and record a new one.
    pub fn memoize(
        &self,
        build: impl FnOnce() -> Result<Option<Command>, ProgramError>,
    ) -> Result<Option<Arc<Command>>, ProgramError> {
        if let Some(cmd) = self.command.get() {
            return Ok(Some(cmd.clone()));
        }

        let Some(mut cmd) = build()? else {
            return Ok(None);
        };
        cmd.env.extend(self.env.iter().cloned());

        let cmd = self.command.get_or_init(|| Arc::new(cmd)).clone();
        if let Some(tracker) = &self.tracker {
            tracker.record(&cmd);
        }
        Ok(Some(cmd))
    }
}

impl Clone for ProgramBase {
    fn clone(&self) -> Self {
        ProgramBase {
            file: self.file.clone(),
            vendor: self.vendor,
            version: self.version.clone(),
            probe: self.probe,
            env: self.env.clone(),
            tracker: self.tracker.clone(),
            command: OnceLock::new(),
        }
    }
}

impl fmt::Debug for ProgramBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramBase")
            .field("file", &self.file)
            .field("vendor", &self.vendor)
            .field("version", &self.version.get())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}
