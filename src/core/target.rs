//! Targets - what gets built.
//!
//! A target owns its source file storage and a local registry whose
//! lookups fall through to the solution's. Its commands are one compile
//! command per active source file plus a link (or archive) command that
//! depends on all of them.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::builder::command::Command;
use crate::builder::errors::TargetError;
use crate::builder::registry::Registry;
use crate::builder::storage::SourceFileStorage;
use crate::builder::toolchain::{ids, Linker, LinkerRole, Program, Vendor};
use crate::builder::tracker::FileTracker;
use crate::core::package::PackagePath;

/// The kind of artifact a target produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Executable binary
    #[default]
    #[serde(alias = "bin", alias = "exe")]
    Executable,

    /// Static library (.a / .lib)
    #[serde(alias = "lib", alias = "static")]
    StaticLibrary,

    /// Shared library (.so / .dylib / .dll)
    #[serde(alias = "dylib", alias = "shared")]
    SharedLibrary,
}

impl TargetKind {
    /// Whether a librarian rather than a linker produces the artifact.
    pub fn role(&self) -> LinkerRole {
        match self {
            TargetKind::StaticLibrary => LinkerRole::Librarian,
            TargetKind::Executable | TargetKind::SharedLibrary => LinkerRole::Linker,
        }
    }

    /// File name prefix of the artifact for tools of `vendor`.
    pub fn prefix(&self, vendor: Vendor) -> &'static str {
        match (self, vendor) {
            (TargetKind::Executable, _) => "",
            (_, Vendor::Msvc | Vendor::ClangCl) => "",
            _ => "lib",
        }
    }

    pub fn is_library(&self) -> bool {
        matches!(self, TargetKind::StaticLibrary | TargetKind::SharedLibrary)
    }
}

/// Where a target lives and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInfo {
    pub name: String,
    pub source_dir: PathBuf,
    pub binary_dir: PathBuf,
    pub object_dir: PathBuf,
    /// Sources are tracked but never compiled
    pub header_only: bool,
}

impl TargetInfo {
    /// A target writing objects to `<binary dir>/obj`.
    pub fn new(name: impl Into<String>, source_dir: impl Into<PathBuf>, binary_dir: impl Into<PathBuf>) -> Self {
        let binary_dir = binary_dir.into();
        TargetInfo {
            name: name.into(),
            source_dir: source_dir.into(),
            object_dir: binary_dir.join("obj"),
            binary_dir,
            header_only: false,
        }
    }

    /// Use `<binary dir>/<dir>` for objects.
    pub fn with_object_dir(mut self, dir: &str) -> Self {
        self.object_dir = self.binary_dir.join(dir);
        self
    }
}

/// A build target with its sources and toolchain scope.
#[derive(Debug)]
pub struct Target {
    kind: TargetKind,
    registry: Arc<Registry>,
    storage: SourceFileStorage,
    link_libraries: Vec<PathBuf>,
    link_command: OnceLock<Option<Arc<Command>>>,
}

impl Target {
    /// Create a target whose registry is a child of `parent`.
    pub fn new(
        info: TargetInfo,
        kind: TargetKind,
        parent: &Arc<Registry>,
        tracker: Arc<dyn FileTracker>,
    ) -> Self {
        let registry = Arc::new(Registry::child(parent));
        Target {
            kind,
            storage: SourceFileStorage::new(info, registry.clone(), tracker),
            registry,
            link_libraries: Vec::new(),
            link_command: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.storage.info().name
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn info(&self) -> &TargetInfo {
        self.storage.info()
    }

    /// The target-scope registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn storage(&self) -> &SourceFileStorage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut SourceFileStorage {
        &mut self.storage
    }

    /// Link against a library, by bare name or by path.
    pub fn add_link_library(&mut self, lib: impl Into<PathBuf>) {
        self.link_libraries.push(lib.into());
    }

    /// Replay queued file operations and bind postponed files.
    pub fn resolve(&mut self) -> Result<(), TargetError> {
        self.storage.resolve()?;
        tracing::debug!(
            "target {}: {} files, {} skipped",
            self.name(),
            self.storage.size_known(),
            self.storage.size_skipped()
        );
        Ok(())
    }

    /// Vendor of the first active compiled file.
    fn vendor(&self) -> Option<Vendor> {
        self.storage
            .iter()
            .filter(|f| f.is_active())
            .find_map(|f| f.as_native())
            .map(|n| n.compiler().vendor())
    }

    /// Base path of the artifact, before the linker appends its extension.
    pub fn output_base(&self, vendor: Vendor) -> PathBuf {
        let info = self.storage.info();
        info.binary_dir
            .join(format!("{}{}", self.kind.prefix(vendor), info.name))
    }

    pub fn compile_commands(&self) -> Result<Vec<Arc<Command>>, TargetError> {
        Ok(self.storage.commands()?)
    }

    /// The link or archive command, `None` when nothing is compiled.
    ///
    /// Built once; later calls return the same command.
    pub fn link_command(&self) -> Result<Option<Arc<Command>>, TargetError> {
        if let Some(cmd) = self.link_command.get() {
            return Ok(cmd.clone());
        }
        let cmd = self.build_link_command()?;
        Ok(self.link_command.get_or_init(|| cmd).clone())
    }

    fn build_link_command(&self) -> Result<Option<Arc<Command>>, TargetError> {
        if self.storage.info().header_only {
            return Ok(None);
        }
        let Some(vendor) = self.vendor() else {
            return Ok(None);
        };

        let mut linker = self.configured_linker(vendor)?;
        linker.set_object_files(self.storage.object_files())?;
        if self.kind == TargetKind::SharedLibrary {
            linker.set_shared(true)?;
        }
        linker.set_output_file(&self.output_base(vendor))?;
        if self.kind.role() == LinkerRole::Linker && !self.link_libraries.is_empty() {
            linker.set_link_libraries(self.link_libraries.iter().cloned())?;
        }

        let Some(cmd) = linker.command()? else {
            return Ok(None);
        };
        let compiles = self.compile_commands()?;
        Ok(Some(Arc::new(cmd.with_dependencies(compiles))))
    }

    /// A fresh copy of the registered linker or librarian for `vendor`.
    fn configured_linker(&self, vendor: Vendor) -> Result<Linker, TargetError> {
        let (linker_id, librarian_id) = ids::link_programs(vendor);
        let (id, program) = match self.kind.role() {
            LinkerRole::Linker => (linker_id, "linker"),
            LinkerRole::Librarian => (librarian_id, "librarian"),
        };
        let no_linker = || TargetError::NoLinker {
            target: self.name().to_string(),
            vendor: vendor.to_string(),
            program,
        };

        let path = PackagePath::parse(id).map_err(|_| no_linker())?;
        self.registry
            .get_program(&path, None)
            .and_then(|p| p.as_linker().cloned())
            .ok_or_else(no_linker)
    }

    /// Compile commands followed by the link command.
    pub fn commands(&self) -> Result<Vec<Arc<Command>>, TargetError> {
        let mut commands = self.compile_commands()?;
        commands.extend(self.link_command()?);
        Ok(commands)
    }

    /// The produced artifact, once the link command exists.
    pub fn artifact(&self) -> Option<&Path> {
        self.link_command
            .get()
            .and_then(|c| c.as_ref())
            .map(|c| Path::new(&c.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::{Compiler, CompilerKind};
    use crate::builder::tracker::GeneratedFiles;
    use crate::core::language::Language;
    use crate::core::version::Version;
    use std::fs;
    use tempfile::TempDir;

    fn gnu_registry() -> Arc<Registry> {
        let registry = Registry::new();
        let v = Version::new(11, 4, 0);

        let gcc = PackagePath::parse(ids::GNU_GCC).unwrap();
        registry.register_program_and_language(
            gcc.clone(),
            Language::new(Compiler::new(Vendor::Gnu, CompilerKind::Native, "/usr/bin/gcc").with_version(v))
                .with_extensions([".c"]),
        );
        registry.activate_language(&gcc, None);
        registry.register_program(
            PackagePath::parse(ids::GNU_LD).unwrap(),
            Linker::new(Vendor::Gnu, LinkerRole::Linker, "/usr/bin/gcc").with_version(v),
        );
        registry.register_program(
            PackagePath::parse(ids::GNU_AR).unwrap(),
            Linker::new(Vendor::Gnu, LinkerRole::Librarian, "/usr/bin/ar").with_version(v),
        );
        Arc::new(registry)
    }

    fn target(tmp: &TempDir, name: &str, kind: TargetKind, registry: &Arc<Registry>) -> Target {
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("main.c"), "int main(void) { return 0; }").unwrap();
        fs::write(src.join("util.c"), "").unwrap();
        let info = TargetInfo::new(name, &src, tmp.path().join("build"));
        Target::new(info, kind, registry, Arc::new(GeneratedFiles::new()))
    }

    #[test]
    fn test_target_kind_prefix_and_role() {
        assert_eq!(TargetKind::Executable.prefix(Vendor::Gnu), "");
        assert_eq!(TargetKind::StaticLibrary.prefix(Vendor::Gnu), "lib");
        assert_eq!(TargetKind::SharedLibrary.prefix(Vendor::Msvc), "");
        assert_eq!(TargetKind::StaticLibrary.role(), LinkerRole::Librarian);
        assert!(TargetKind::SharedLibrary.is_library());
        assert!(!TargetKind::Executable.is_library());
    }

    #[test]
    fn test_link_depends_on_every_compile() {
        let tmp = TempDir::new().unwrap();
        let registry = gnu_registry();
        let mut t = target(&tmp, "app", TargetKind::Executable, &registry);
        t.storage_mut().add("main.c").unwrap();
        t.storage_mut().add("util.c").unwrap();
        t.resolve().unwrap();

        let link = t.link_command().unwrap().unwrap();
        let compiles = t.compile_commands().unwrap();
        assert_eq!(compiles.len(), 2);
        assert_eq!(link.dependencies.len(), 2);
        for c in &compiles {
            assert!(link.dependencies.iter().any(|d| Arc::ptr_eq(d, c)));
        }
        assert!(link.outputs.contains(&tmp.path().join("build").join("app")));
        assert!(Arc::ptr_eq(&link, &t.link_command().unwrap().unwrap()));
        assert_eq!(t.commands().unwrap().len(), 3);
    }

    #[test]
    fn test_registered_linker_is_not_frozen() {
        let tmp = TempDir::new().unwrap();
        let registry = gnu_registry();
        let mut t = target(&tmp, "z", TargetKind::StaticLibrary, &registry);
        t.storage_mut().add("util.c").unwrap();

        let link = t.link_command().unwrap().unwrap();
        assert!(link.outputs.contains(&tmp.path().join("build").join("libz.a")));
        assert_eq!(link.args[0], "rcs");

        let ar = registry
            .get_program(&PackagePath::parse(ids::GNU_AR).unwrap(), None)
            .unwrap();
        assert!(!ar.is_frozen());
    }

    #[test]
    fn test_no_sources_no_link() {
        let tmp = TempDir::new().unwrap();
        let registry = gnu_registry();
        let t = target(&tmp, "empty", TargetKind::Executable, &registry);
        assert!(t.link_command().unwrap().is_none());
    }

    #[test]
    fn test_missing_linker_is_reported() {
        let tmp = TempDir::new().unwrap();
        let registry = Registry::new();
        let gcc = PackagePath::parse(ids::GNU_GCC).unwrap();
        registry.register_program_and_language(
            gcc.clone(),
            Language::new(
                Compiler::new(Vendor::Gnu, CompilerKind::Native, "/usr/bin/gcc")
                    .with_version(Version::new(11, 4, 0)),
            )
            .with_extensions([".c"]),
        );
        registry.activate_language(&gcc, None);
        let registry = Arc::new(registry);

        let mut t = target(&tmp, "app", TargetKind::SharedLibrary, &registry);
        t.storage_mut().add("main.c").unwrap();
        let err = t.link_command().unwrap_err();
        assert!(matches!(err, TargetError::NoLinker { program: "linker", .. }));
    }

    #[test]
    fn test_target_registry_falls_back_to_solution() {
        let tmp = TempDir::new().unwrap();
        let registry = gnu_registry();
        let t = target(&tmp, "app", TargetKind::Executable, &registry);
        assert!(t.registry().is_local());
        assert!(t.registry().find_language_by_extension(".c").is_some());
    }
}
