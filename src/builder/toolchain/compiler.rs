//! Compilers and assemblers.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::builder::command::Command;
use crate::builder::errors::ProgramError;
use crate::core::options::{NativeSettings, OptionSet, OptionValue, Placement};
use crate::core::version::Version;

use super::{names, Dialect, Program, ProgramBase, Vendor};

/// What a compiler consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerKind {
    /// C or C++ compiler driver
    Native,
    /// Assembler (`ml`, `ml64`, `as`)
    Assembler,
}

/// The input slot a source file is bound to.
///
/// C-family drivers can be told the source language explicitly
/// (`/Tc`/`/Tp`, `-x c`/`-x c++`) instead of guessing from the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputSlot {
    #[default]
    Generic,
    C,
    Cxx,
}

/// A compiler bound to at most one source/object pair.
#[derive(Debug, Clone)]
pub struct Compiler {
    base: ProgramBase,
    kind: CompilerKind,
    options: OptionSet,
    settings: NativeSettings,
}

impl Compiler {
    /// Create a compiler of the given vendor and kind.
    pub fn new(vendor: Vendor, kind: CompilerKind, file: impl Into<PathBuf>) -> Self {
        Compiler {
            base: ProgramBase::new(vendor, file),
            kind,
            options: vendor.dialect().compiler_options(kind),
            settings: NativeSettings::default(),
        }
    }

    /// Fix the version instead of probing it.
    pub fn with_version(mut self, version: Version) -> Self {
        self.base.set_version(version);
        self
    }

    pub fn kind(&self) -> CompilerKind {
        self.kind
    }

    pub fn dialect(&self) -> &'static dyn Dialect {
        self.base.vendor().dialect()
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn settings(&self) -> &NativeSettings {
        &self.settings
    }

    /// Mutable settings; fails once the command has been built.
    pub fn settings_mut(&mut self) -> Result<&mut NativeSettings, ProgramError> {
        self.base.ensure_mutable()?;
        Ok(&mut self.settings)
    }

    /// Replace all native settings.
    pub fn set_settings(&mut self, settings: NativeSettings) -> Result<(), ProgramError> {
        *self.settings_mut()? = settings;
        Ok(())
    }

    /// Set a typed option by name.
    pub fn set_option(&mut self, name: &'static str, value: OptionValue) -> Result<(), ProgramError> {
        self.base.ensure_mutable()?;
        if self.options.set(name, value) {
            Ok(())
        } else {
            Err(ProgramError::UnsupportedOption {
                program: self.base.file().to_path_buf(),
                option: name,
            })
        }
    }

    pub fn add_env(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<(), ProgramError> {
        self.base.add_env(key, value)
    }

    /// Object file extension, with the leading dot.
    pub fn object_extension(&self) -> &'static str {
        self.dialect().object_extension()
    }

    /// Bind the generic input slot and the object output.
    pub fn set_source_file(&mut self, input: &Path, output: &Path) -> Result<(), ProgramError> {
        self.set_source_file_in(InputSlot::Generic, input, output)
    }

    /// Bind a specific input slot and the object output.
    pub fn set_source_file_in(
        &mut self,
        slot: InputSlot,
        input: &Path,
        output: &Path,
    ) -> Result<(), ProgramError> {
        self.base.ensure_mutable()?;
        for name in [names::INPUT_FILE, names::C_SOURCE_FILE, names::CXX_SOURCE_FILE] {
            self.options.set(name, OptionValue::Path(None));
        }
        self.dialect().bind_source(&mut self.options, slot, input);
        self.set_output_file(output)
    }

    /// Set the object output, and the deps file derived from it.
    pub fn set_output_file(&mut self, output: &Path) -> Result<(), ProgramError> {
        self.base.ensure_mutable()?;
        self.options
            .set(names::OBJECT_FILE, OptionValue::Path(Some(output.to_path_buf())));
        if self.options.contains(names::DEPENDENCIES_FILE) {
            let deps = self.dialect().deps_file(output);
            self.options.set(names::DEPENDENCIES_FILE, OptionValue::Path(deps));
        }
        Ok(())
    }

    /// The bound source file, whichever slot holds it.
    pub fn source_file(&self) -> Option<&Path> {
        [names::CXX_SOURCE_FILE, names::C_SOURCE_FILE, names::INPUT_FILE]
            .into_iter()
            .find_map(|name| self.options.path(name))
    }

    pub fn output_file(&self) -> Option<&Path> {
        self.options.path(names::OBJECT_FILE)
    }

    pub fn deps_file(&self) -> Option<&Path> {
        self.options.path(names::DEPENDENCIES_FILE)
    }

    fn build_command(&self) -> Option<Command> {
        let input = self.source_file()?;
        let dialect = self.dialect();

        let mut options = self.options.clone();
        dialect.adjust_compiler_options(self.base.file(), &mut options);

        let mut cmd = Command::new(self.base.file()).named(input).input(input);
        if let Some(output) = self.output_file() {
            if let Some(dir) = output.parent() {
                cmd = cmd.working_dir(dir);
            }
            cmd = cmd.output(output);
        }
        if let Some(deps) = self.deps_file() {
            cmd.deps_file = Some(deps.to_path_buf());
        }

        cmd = cmd
            .args(options.render(Placement::Normal))
            .args(dialect.render_compile_settings(&self.settings))
            .args(options.render(Placement::End));
        Some(cmd)
    }
}

impl Program for Compiler {
    fn base(&self) -> &ProgramBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ProgramBase {
        &mut self.base
    }

    fn command(&self) -> Result<Option<Arc<Command>>, ProgramError> {
        self.base.memoize(|| Ok(self.build_command()))
    }

    fn clone_program(&self) -> Box<dyn Program> {
        Box::new(self.clone())
    }

    fn generated_dirs(&self) -> BTreeSet<PathBuf> {
        self.output_file()
            .and_then(Path::parent)
            .map(|d| d.to_path_buf())
            .into_iter()
            .collect()
    }

    fn as_compiler(&self) -> Option<&Compiler> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gcc() -> Compiler {
        let mut c = Compiler::new(Vendor::Gnu, CompilerKind::Native, "/usr/bin/gcc")
            .with_version(Version::new(11, 4, 0));
        c.settings_mut()
            .unwrap()
            .user
            .define("NDEBUG", None)
            .include_dir("/src/include");
        c
    }

    #[test]
    fn test_command_requires_input() {
        let c = gcc();
        assert!(c.command().unwrap().is_none());
        assert!(!c.is_frozen());
    }

    #[test]
    fn test_gnu_command() {
        let mut c = gcc();
        c.set_source_file(Path::new("/src/main.c"), Path::new("/obj/main.c.1234abcd.o"))
            .unwrap();
        let cmd = c.command().unwrap().unwrap();

        assert_eq!(cmd.program, PathBuf::from("/usr/bin/gcc"));
        assert!(cmd.args.contains(&"-c".to_string()));
        assert!(cmd.args.contains(&"-DNDEBUG".to_string()));
        assert!(cmd.args.contains(&"-I/src/include".to_string()));
        assert_eq!(cmd.deps_file, Some(PathBuf::from("/obj/main.c.1234abcd.d")));
        assert_eq!(cmd.working_dir, Some(PathBuf::from("/obj")));
        assert_eq!(cmd.name, "/src/main.c");
        assert!(cmd.outputs.contains(Path::new("/obj/main.c.1234abcd.o")));
    }

    #[test]
    fn test_clone_then_bind_matches_fresh() {
        let template = gcc();
        let mut cloned = template.clone();
        cloned
            .set_source_file(Path::new("/src/a.c"), Path::new("/obj/a.o"))
            .unwrap();

        let mut fresh = gcc();
        fresh
            .set_source_file(Path::new("/src/a.c"), Path::new("/obj/a.o"))
            .unwrap();

        let a = cloned.command().unwrap().unwrap();
        let b = fresh.command().unwrap().unwrap();
        assert_eq!(a.args, b.args);
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!template.is_frozen());
    }

    #[test]
    fn test_clone_of_frozen_compiler_is_independent() {
        let mut c = gcc();
        c.set_source_file(Path::new("/src/a.c"), Path::new("/obj/a.o"))
            .unwrap();
        let first = c.command().unwrap().unwrap();

        let mut copy = c.clone();
        assert!(!copy.is_frozen());
        copy.set_source_file(Path::new("/src/b.c"), Path::new("/obj/b.o"))
            .unwrap();
        let second = copy.command().unwrap().unwrap();
        assert_ne!(first.args, second.args);
    }

    #[test]
    fn test_frozen_after_command() {
        let mut c = gcc();
        c.set_source_file(Path::new("/src/a.c"), Path::new("/obj/a.o"))
            .unwrap();
        let first = c.command().unwrap().unwrap();

        assert!(matches!(
            c.set_output_file(Path::new("/obj/other.o")),
            Err(ProgramError::Frozen { .. })
        ));
        assert!(c.settings_mut().is_err());

        let again = c.command().unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }

    #[test]
    fn test_slots_replace_each_other() {
        let mut c = Compiler::new(Vendor::Msvc, CompilerKind::Native, "cl.exe");
        c.set_source_file_in(InputSlot::Cxx, Path::new("C:/src/a.cpp"), Path::new("C:/obj/a.obj"))
            .unwrap();
        assert_eq!(c.source_file(), Some(Path::new("C:/src/a.cpp")));

        c.set_source_file_in(InputSlot::C, Path::new("C:/src/b.c"), Path::new("C:/obj/b.obj"))
            .unwrap();
        assert_eq!(c.source_file(), Some(Path::new("C:/src/b.c")));
        assert!(c.options().path(names::CXX_SOURCE_FILE).is_none());
    }

    #[test]
    fn test_unsupported_option() {
        let mut c = gcc();
        let err = c
            .set_option(names::SAFE_SEH, OptionValue::Flag(false))
            .unwrap_err();
        assert!(matches!(err, ProgramError::UnsupportedOption { .. }));
    }

    #[test]
    fn test_generated_dirs() {
        let mut c = gcc();
        c.set_source_file(Path::new("/src/a.c"), Path::new("/build/obj/a.o"))
            .unwrap();
        assert_eq!(
            c.generated_dirs().into_iter().collect::<Vec<_>>(),
            vec![PathBuf::from("/build/obj")]
        );
    }
}
