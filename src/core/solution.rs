//! A build session: detected toolchains plus the targets built with them.

use std::path::PathBuf;
use std::sync::Arc;

use rayon::prelude::*;

use crate::builder::errors::{TargetError, ToolchainError};
use crate::builder::graph::CommandGraph;
use crate::builder::registry::Registry;
use crate::builder::toolchain::detect_native_compilers;
use crate::builder::tracker::GeneratedFiles;
use crate::core::target::{Target, TargetInfo, TargetKind};
use crate::util::config::Config;

/// Host and target architecture of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    pub host_arch: String,
    pub target_arch: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        BuildSettings {
            host_arch: std::env::consts::ARCH.to_string(),
            target_arch: std::env::consts::ARCH.to_string(),
        }
    }
}

impl BuildSettings {
    /// Build for `target_arch` on this host.
    pub fn for_target(target_arch: impl Into<String>) -> Self {
        BuildSettings {
            target_arch: target_arch.into(),
            ..Default::default()
        }
    }
}

/// The solution-scope registry, the generated-file tracker and the targets.
#[derive(Debug)]
pub struct Solution {
    settings: BuildSettings,
    config: Config,
    tracker: Arc<GeneratedFiles>,
    registry: Arc<Registry>,
    targets: Vec<Target>,
}

impl Solution {
    pub fn new(settings: BuildSettings, config: Config) -> Self {
        let tracker = Arc::new(GeneratedFiles::new());
        let registry = Arc::new(Registry::new().with_tracker(tracker.clone()));
        Solution {
            settings,
            config,
            tracker,
            registry,
            targets: Vec::new(),
        }
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn tracker(&self) -> &Arc<GeneratedFiles> {
        &self.tracker
    }

    /// Detect native toolchains into the solution registry.
    pub fn detect_compilers(&self) -> Result<(), ToolchainError> {
        detect_native_compilers(&self.registry, &self.settings, &self.config)
    }

    /// Add a target building sources of `source_dir` into `binary_dir`.
    pub fn add_target(
        &mut self,
        name: &str,
        kind: TargetKind,
        source_dir: impl Into<PathBuf>,
        binary_dir: impl Into<PathBuf>,
    ) -> Result<&mut Target, TargetError> {
        if self.target(name).is_some() {
            return Err(TargetError::Duplicate(name.to_string()));
        }
        let info = TargetInfo::new(name, source_dir, binary_dir).with_object_dir(self.config.object_dir());
        let target = Target::new(info, kind, &self.registry, self.tracker.clone());
        self.targets.push(target);
        let index = self.targets.len() - 1;
        Ok(&mut self.targets[index])
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name() == name)
    }

    pub fn target_mut(&mut self, name: &str) -> Option<&mut Target> {
        self.targets.iter_mut().find(|t| t.name() == name)
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Resolve every target in parallel.
    pub fn resolve_targets(&mut self) -> Result<(), TargetError> {
        self.targets.par_iter_mut().try_for_each(|t| t.resolve())
    }

    /// Every command of every target, ordered by dependency edges.
    pub fn command_graph(&self) -> Result<CommandGraph, TargetError> {
        let mut roots = Vec::new();
        for target in &self.targets {
            roots.extend(target.commands()?);
        }
        let graph = CommandGraph::from_roots(roots);
        tracing::debug!("command graph has {} commands", graph.len());
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::{ids, Compiler, CompilerKind, Linker, LinkerRole, Vendor};
    use crate::core::language::Language;
    use crate::core::package::PackagePath;
    use crate::core::version::Version;
    use std::fs;
    use tempfile::TempDir;

    fn register_gnu(registry: &Registry) {
        let v = Version::new(12, 2, 0);
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
    }

    #[test]
    fn test_default_settings_use_host() {
        let s = BuildSettings::default();
        assert_eq!(s.host_arch, std::env::consts::ARCH);
        assert_eq!(s.host_arch, s.target_arch);
        assert_eq!(BuildSettings::for_target("x86").target_arch, "x86");
    }

    #[test]
    fn test_duplicate_target() {
        let tmp = TempDir::new().unwrap();
        let mut sln = Solution::new(BuildSettings::default(), Config::default());
        sln.add_target("app", TargetKind::Executable, tmp.path(), tmp.path().join("out"))
            .unwrap();
        assert!(matches!(
            sln.add_target("app", TargetKind::Executable, tmp.path(), tmp.path()),
            Err(TargetError::Duplicate(_))
        ));
    }

    #[test]
    fn test_object_dir_from_config() {
        let tmp = TempDir::new().unwrap();
        let config = Config::parse("[build]\nobject_dir = \"objects\"\n").unwrap();
        let mut sln = Solution::new(BuildSettings::default(), config);
        let t = sln
            .add_target("app", TargetKind::Executable, tmp.path(), tmp.path().join("out"))
            .unwrap();
        assert_eq!(t.info().object_dir, tmp.path().join("out").join("objects"));
    }

    #[test]
    fn test_resolve_and_graph() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        for f in ["main.c", "lib.c", "gen.cpp"] {
            fs::write(src.join(f), "").unwrap();
        }

        let mut sln = Solution::new(BuildSettings::default(), Config::default());
        register_gnu(sln.registry());
        let out = tmp.path().join("out");

        let app = sln
            .add_target("app", TargetKind::Executable, &src, &out)
            .unwrap();
        app.storage_mut().postpone();
        app.storage_mut().add_pattern(".", r".*\.(c|cpp)", false).unwrap();
        app.storage_mut().remove("lib.c").unwrap();

        let lib = sln
            .add_target("util", TargetKind::StaticLibrary, &src, &out)
            .unwrap();
        lib.storage_mut().add("lib.c").unwrap();

        sln.resolve_targets().unwrap();

        let app = sln.target("app").unwrap();
        assert_eq!(app.storage().size_known(), 2);
        assert_eq!(app.storage().size_skipped(), 1);

        let graph = sln.command_graph().unwrap();
        // main.c, app link, lib.c, util archive; gen.cpp has no language
        assert_eq!(graph.len(), 4);

        let order = graph.topological_order().unwrap();
        let link = order.iter().position(|c| c.outputs.contains(&out.join("app"))).unwrap();
        let compile = order
            .iter()
            .position(|c| c.inputs.contains(&src.join("main.c")))
            .unwrap();
        assert!(compile < link);

        // outputs of produced commands are known to the session tracker
        assert!(sln.tracker().len() >= 4);
    }
}
