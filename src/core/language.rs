//! Languages: a set of file extensions plus the compiler that builds them.

use std::collections::BTreeSet;
use std::path::Path;

use crate::builder::errors::ProgramError;
use crate::builder::toolchain::{Compiler, InputSlot};

/// A source language as seen by the build.
///
/// The compiler is a template: every source file gets its own clone,
/// bound to that file's input and object output.
#[derive(Debug, Clone)]
pub struct Language {
    extensions: BTreeSet<String>,
    compiler: Compiler,
    slot: InputSlot,
}

impl Language {
    pub fn new(compiler: Compiler) -> Self {
        Language {
            extensions: BTreeSet::new(),
            compiler,
            slot: InputSlot::Generic,
        }
    }

    /// Add recognized extensions (with the leading dot, case-sensitive).
    pub fn with_extensions<'a>(mut self, extensions: impl IntoIterator<Item = &'a str>) -> Self {
        self.extensions
            .extend(extensions.into_iter().map(str::to_string));
        self
    }

    /// Bind sources to a dedicated input slot instead of the generic one.
    pub fn with_slot(mut self, slot: InputSlot) -> Self {
        self.slot = slot;
        self
    }

    pub fn extensions(&self) -> &BTreeSet<String> {
        &self.extensions
    }

    pub fn has_extension(&self, ext: &str) -> bool {
        self.extensions.contains(ext)
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn compiler_mut(&mut self) -> &mut Compiler {
        &mut self.compiler
    }

    /// A fresh compiler bound to `input` and `output`.
    pub fn create_compiler(&self, input: &Path, output: &Path) -> Result<Compiler, ProgramError> {
        let mut compiler = self.compiler.clone();
        compiler.set_source_file_in(self.slot, input, output)?;
        Ok(compiler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::{CompilerKind, Program, Vendor};

    #[test]
    fn test_create_compiler_leaves_template_untouched() {
        let lang = Language::new(Compiler::new(Vendor::Gnu, CompilerKind::Native, "/usr/bin/gcc"))
            .with_extensions([".c"]);
        assert!(lang.has_extension(".c"));
        assert!(!lang.has_extension(".C"));

        let bound = lang
            .create_compiler(Path::new("/src/a.c"), Path::new("/obj/a.o"))
            .unwrap();
        assert!(bound.command().unwrap().is_some());
        assert!(lang.compiler().source_file().is_none());
        assert!(!lang.compiler().is_frozen());
    }

    #[test]
    fn test_slot_selects_source_language() {
        let gxx = Language::new(Compiler::new(Vendor::Gnu, CompilerKind::Native, "/usr/bin/g++"))
            .with_extensions([".C"])
            .with_slot(InputSlot::Cxx);
        let cmd = gxx
            .create_compiler(Path::new("/src/a.C"), Path::new("/obj/a.o"))
            .unwrap()
            .command()
            .unwrap()
            .unwrap();
        let x = cmd.args.iter().position(|a| a == "-x").unwrap();
        assert_eq!(cmd.args[x + 1], "c++");

        let cl = Language::new(Compiler::new(Vendor::Msvc, CompilerKind::Native, "cl.exe"))
            .with_extensions([".c"])
            .with_slot(InputSlot::C);
        let cmd = cl
            .create_compiler(Path::new("C:/src/b.c"), Path::new("C:/obj/b.obj"))
            .unwrap()
            .command()
            .unwrap()
            .unwrap();
        assert!(cmd.args.contains(&"/TcC:/src/b.c".to_string()));
    }
}
