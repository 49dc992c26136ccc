//! Per-target source file storage.
//!
//! Files are added and removed by path, by set of paths, or by regex over
//! a directory tree. While the target postpones resolution every operation
//! is queued and replayed in order by [`SourceFileStorage::resolve`].
//!
//! Each added file is checked to exist (or to be generated by some build
//! step) and dispatched by extension to a language. A file whose extension
//! no language handles yet is kept as a postponed placeholder and bound
//! later, keeping its extra arguments and skip flag.

use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use regex::Regex;

use crate::builder::command::Command;
use crate::builder::errors::SourceError;
use crate::builder::registry::Registry;
use crate::builder::source_file::{object_file_name, NativeSourceFile, SourceFile};
use crate::builder::toolchain::Program;
use crate::builder::tracker::FileTracker;
use crate::core::target::TargetInfo;
use crate::util::fs::{absolute, enumerate_files, normalize_path};

/// A regex over paths relative to a root directory.
#[derive(Debug, Clone)]
pub struct FilePattern {
    root: PathBuf,
    pattern: String,
    regex: Regex,
    recursive: bool,
}

impl FilePattern {
    /// Compile a pattern; it must match the whole relative path.
    pub fn new(root: impl Into<PathBuf>, pattern: &str, recursive: bool) -> Result<Self, SourceError> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| SourceError::BadPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(FilePattern {
            root: root.into(),
            pattern: pattern.to_string(),
            regex,
            recursive,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether `file`, under `root`, matches.
    fn matches(&self, root: &Path, file: &Path) -> bool {
        let root = format!("{}/", normalize_path(root));
        let file = normalize_path(file);
        match file.strip_prefix(&root) {
            Some(rel) => self.regex.is_match(rel),
            None => false,
        }
    }
}

/// A queued file operation.
#[derive(Debug, Clone)]
pub enum FileOp {
    Add(PathBuf),
    Remove(PathBuf),
    AddPattern(FilePattern),
    RemovePattern(FilePattern),
}

/// The source files of one target.
#[derive(Debug)]
pub struct SourceFileStorage {
    info: TargetInfo,
    registry: Arc<Registry>,
    tracker: Arc<dyn FileTracker>,
    files: BTreeMap<PathBuf, SourceFile>,
    file_ops: Vec<FileOp>,
    postpone: bool,
    autodetect: bool,
    glob_cache: HashMap<(PathBuf, bool), Vec<PathBuf>>,
    enumerations: usize,
}

impl SourceFileStorage {
    pub fn new(info: TargetInfo, registry: Arc<Registry>, tracker: Arc<dyn FileTracker>) -> Self {
        SourceFileStorage {
            info,
            registry,
            tracker,
            files: BTreeMap::new(),
            file_ops: Vec::new(),
            postpone: false,
            autodetect: false,
            glob_cache: HashMap::new(),
            enumerations: 0,
        }
    }

    pub fn info(&self) -> &TargetInfo {
        &self.info
    }

    /// Queue add/remove operations until [`resolve`](Self::resolve).
    pub fn postpone(&mut self) {
        self.postpone = true;
    }

    pub fn is_postponed(&self) -> bool {
        self.postpone
    }

    /// Accumulate skip flags instead of overwriting them.
    pub fn set_autodetect(&mut self, autodetect: bool) {
        self.autodetect = autodetect;
    }

    pub fn add(&mut self, file: impl Into<PathBuf>) -> Result<(), SourceError> {
        self.apply(FileOp::Add(file.into()))
    }

    pub fn add_all(&mut self, files: impl IntoIterator<Item = PathBuf>) -> Result<(), SourceError> {
        for file in files {
            self.add(file)?;
        }
        Ok(())
    }

    /// Add every file under `root` whose relative path matches `pattern`.
    pub fn add_pattern(&mut self, root: impl Into<PathBuf>, pattern: &str, recursive: bool) -> Result<(), SourceError> {
        let pattern = FilePattern::new(root, pattern, recursive)?;
        self.apply(FileOp::AddPattern(pattern))
    }

    /// Mark a file skipped; it stays tracked.
    pub fn remove(&mut self, file: impl Into<PathBuf>) -> Result<(), SourceError> {
        self.apply(FileOp::Remove(file.into()))
    }

    pub fn remove_all(&mut self, files: impl IntoIterator<Item = PathBuf>) -> Result<(), SourceError> {
        for file in files {
            self.remove(file)?;
        }
        Ok(())
    }

    pub fn remove_pattern(&mut self, root: impl Into<PathBuf>, pattern: &str, recursive: bool) -> Result<(), SourceError> {
        let pattern = FilePattern::new(root, pattern, recursive)?;
        self.apply(FileOp::RemovePattern(pattern))
    }

    /// Erase a file from the storage. Never queued.
    pub fn remove_exclude(&mut self, file: impl AsRef<Path>) -> Result<(), SourceError> {
        self.remove_full(file.as_ref())
    }

    /// Erase every matching file from the storage. Never queued.
    pub fn remove_exclude_pattern(
        &mut self,
        root: impl Into<PathBuf>,
        pattern: &str,
        recursive: bool,
    ) -> Result<(), SourceError> {
        let pattern = FilePattern::new(root, pattern, recursive)?;
        for file in self.glob(&pattern) {
            self.remove_full(&file)?;
        }
        Ok(())
    }

    fn remove_full(&mut self, file: &Path) -> Result<(), SourceError> {
        if let Some(path) = self.check_absolute(file, true)? {
            self.files.remove(&path);
        }
        Ok(())
    }

    fn apply(&mut self, op: FileOp) -> Result<(), SourceError> {
        if self.postpone {
            self.file_ops.push(op);
            return Ok(());
        }
        self.run(&op)
    }

    fn run(&mut self, op: &FileOp) -> Result<(), SourceError> {
        match op {
            FileOp::Add(file) => self.add_unchecked(file, false),
            FileOp::Remove(file) => self.add_unchecked(file, true),
            FileOp::AddPattern(pattern) => {
                for file in self.glob(pattern) {
                    self.add_unchecked(&file, false)?;
                }
                Ok(())
            }
            FileOp::RemovePattern(pattern) => {
                for file in self.glob(pattern) {
                    self.add_unchecked(&file, true)?;
                }
                Ok(())
            }
        }
    }

    /// Stop queueing, replay queued operations in order and retry postponed
    /// files.
    ///
    /// A failing operation is dropped; the ones queued after it are kept and
    /// the storage keeps queueing until `resolve` succeeds.
    pub fn resolve(&mut self) -> Result<(), SourceError> {
        self.postpone = false;
        while !self.file_ops.is_empty() {
            let op = self.file_ops.remove(0);
            if let Err(err) = self.run(&op) {
                // later operations stay queued for the next resolve
                self.postpone = true;
                return Err(err);
            }
        }

        let postponed: Vec<(PathBuf, bool)> = self
            .files
            .values()
            .filter(|f| f.postponed)
            .map(|f| (f.file().to_path_buf(), f.skip))
            .collect();
        for (file, skip) in postponed {
            self.add_unchecked(&file, skip)?;
        }
        Ok(())
    }

    /// Files of `pattern`, enumerating each (directory, recursive) pair once.
    fn glob(&mut self, pattern: &FilePattern) -> Vec<PathBuf> {
        let root: PathBuf = if pattern.root.is_absolute() {
            pattern.root.clone()
        } else {
            self.info.source_dir.join(&pattern.root)
        }
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

        let key = (root.clone(), pattern.recursive);
        let files = match self.glob_cache.get(&key) {
            Some(files) => files,
            None => {
                self.enumerations += 1;
                let files = enumerate_files(&root, pattern.recursive);
                tracing::debug!("enumerated {} files under {}", files.len(), root.display());
                self.glob_cache.entry(key).or_insert(files)
            }
        };
        files
            .iter()
            .filter(|f| pattern.matches(&root, f))
            .cloned()
            .collect()
    }

    /// Directory enumerations performed so far.
    pub fn enumerations(&self) -> usize {
        self.enumerations
    }

    /// Resolve `file` to an absolute path that exists or will be generated.
    ///
    /// Relative paths are tried against the source directory, then the
    /// binary directory. With `ignore_errors` a miss yields `None`.
    pub fn check_absolute(&self, file: &Path, ignore_errors: bool) -> Result<Option<PathBuf>, SourceError> {
        let candidates = if file.is_absolute() {
            vec![file.to_path_buf()]
        } else {
            vec![
                self.info.source_dir.join(file),
                self.info.binary_dir.join(file),
            ]
        };

        for candidate in &candidates {
            if candidate.exists() {
                return Ok(Some(absolute(candidate)));
            }
        }
        if let Some(generated) = candidates
            .iter()
            .find(|c| self.tracker.is_generated_at_all(c))
        {
            return Ok(Some(generated.clone()));
        }

        if ignore_errors {
            return Ok(None);
        }
        Err(SourceError::NotFound {
            path: candidates.into_iter().next().unwrap_or_default(),
        })
    }

    fn object_path(&self, file: &Path, object_extension: &str) -> PathBuf {
        self.info
            .object_dir
            .join(object_file_name(&self.info.name, file, object_extension))
    }

    fn add_unchecked(&mut self, file: &Path, skip: bool) -> Result<(), SourceError> {
        let Some(path) = self.check_absolute(file, skip)? else {
            return Ok(());
        };

        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()));

        let was_postponed = self.files.get(&path).is_some_and(|f| f.postponed);
        let needs_binding = was_postponed || !self.files.contains_key(&path);
        if self.info.header_only || ext.is_none() {
            self.files
                .entry(path.clone())
                .or_insert_with(|| SourceFile::placeholder(path.clone()));
        } else if needs_binding {
            let ext = ext.unwrap_or_default();
            let entry = match self.registry.find_language_by_extension(&ext) {
                None => {
                    tracing::debug!("no language for {} yet, postponing {}", ext, path.display());
                    SourceFile::postponed(path.clone())
                }
                Some(language) => {
                    let output = self.object_path(&path, language.compiler().object_extension());
                    let compiler = language.create_compiler(&path, &output)?;
                    SourceFile::native(path.clone(), NativeSourceFile::new(compiler, output))
                }
            };
            let entry = match self.files.get(&path) {
                Some(previous) => {
                    let mut entry = entry;
                    entry.inherit(previous);
                    entry
                }
                None => entry,
            };
            self.files.insert(path.clone(), entry);
        }

        if let Some(entry) = self.files.get_mut(&path) {
            if self.autodetect || was_postponed {
                entry.skip |= skip;
            } else {
                entry.skip = skip;
            }
        }
        Ok(())
    }

    /// A tracked file. Fails while operations are queued.
    pub fn get(&self, file: &Path) -> Result<&SourceFile, SourceError> {
        if self.postpone {
            return Err(SourceError::Postponed {
                target: self.info.name.clone(),
            });
        }
        let path = self.check_absolute(file, true)?.unwrap_or_else(|| file.to_path_buf());
        self.files
            .get(&path)
            .ok_or_else(|| SourceError::Untracked { path })
    }

    pub fn get_mut(&mut self, file: &Path) -> Result<&mut SourceFile, SourceError> {
        if self.postpone {
            return Err(SourceError::Postponed {
                target: self.info.name.clone(),
            });
        }
        let path = self.check_absolute(file, true)?.unwrap_or_else(|| file.to_path_buf());
        self.files
            .get_mut(&path)
            .ok_or_else(|| SourceError::Untracked { path })
    }

    pub fn contains(&self, file: &Path) -> bool {
        self.files.contains_key(file)
    }

    /// Tracked files whose normalized path matches `regex`.
    pub fn matching(&self, regex: &Regex) -> Vec<&SourceFile> {
        self.files
            .values()
            .filter(|f| regex.is_match(&normalize_path(f.file())))
            .collect()
    }

    /// Adopt entries of `other` that are not tracked here.
    pub fn merge(&mut self, other: &SourceFileStorage) -> Result<(), SourceError> {
        let missing: Vec<PathBuf> = other
            .files
            .keys()
            .filter(|f| !self.files.contains_key(*f))
            .cloned()
            .collect();
        for file in missing {
            self.add(file)?;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Tracked files that are not skipped.
    pub fn size_known(&self) -> usize {
        self.files.values().filter(|f| !f.skip).count()
    }

    pub fn size_skipped(&self) -> usize {
        self.files.values().filter(|f| f.skip).count()
    }

    /// Compile commands of every active file.
    pub fn commands(&self) -> Result<Vec<Arc<Command>>, SourceError> {
        let mut commands = Vec::new();
        for file in self.files.values().filter(|f| f.is_active()) {
            if let Some(cmd) = file.command()? {
                commands.push(cmd);
            }
        }
        Ok(commands)
    }

    /// Object files of every active file.
    pub fn object_files(&self) -> Vec<PathBuf> {
        self.files
            .values()
            .filter(|f| f.is_active())
            .filter_map(|f| f.object_file().map(Path::to_path_buf))
            .collect()
    }

    /// Directories the compilers of active files write to.
    pub fn generated_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self
            .files
            .values()
            .filter(|f| f.is_active())
            .filter_map(|f| f.as_native())
            .flat_map(|n| n.compiler().generated_dirs())
            .collect();
        dirs.sort();
        dirs.dedup();
        dirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::source_file::SourceState;
    use crate::builder::toolchain::{Compiler, CompilerKind, Vendor};
    use crate::builder::tracker::GeneratedFiles;
    use crate::core::language::Language;
    use crate::core::package::PackagePath;
    use crate::core::version::Version;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        src: PathBuf,
        registry: Arc<Registry>,
        tracker: Arc<GeneratedFiles>,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("sub")).unwrap();
        for f in ["main.c", "util.c", "impl.cpp", "sub/deep.c", "README"] {
            fs::write(src.join(f), "").unwrap();
        }
        Fixture {
            src,
            registry: Arc::new(Registry::new()),
            tracker: Arc::new(GeneratedFiles::new()),
            _tmp: tmp,
        }
    }

    fn storage(fx: &Fixture, name: &str) -> SourceFileStorage {
        let info = TargetInfo::new(name, &fx.src, fx.src.parent().unwrap().join("build"));
        SourceFileStorage::new(info, fx.registry.clone(), fx.tracker.clone())
    }

    fn register_gcc(registry: &Registry, ext: &str) {
        let path = PackagePath::parse(if ext == ".c" { "org.gnu.gcc.gcc" } else { "org.gnu.gcc.gpp" }).unwrap();
        registry.register_program_and_language(
            path.clone(),
            Language::new(
                Compiler::new(Vendor::Gnu, CompilerKind::Native, "/usr/bin/gcc")
                    .with_version(Version::new(11, 4, 0)),
            )
            .with_extensions([ext]),
        );
        registry.activate_language(&path, None);
    }

    #[test]
    fn test_add_binds_compiler() {
        let fx = fixture();
        register_gcc(&fx.registry, ".c");
        let mut s = storage(&fx, "app");

        s.add("main.c").unwrap();
        let f = s.get(Path::new("main.c")).unwrap();
        assert_eq!(f.state(), SourceState::CreatedCompilable);

        let obj = f.object_file().unwrap();
        assert!(obj.starts_with(fx.src.parent().unwrap().join("build").join("obj")));
        let compiler = f.as_native().unwrap().compiler();
        assert_eq!(compiler.source_file(), Some(fx.src.join("main.c").as_path()));
        assert_eq!(s.commands().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_file_is_fatal_unless_generated() {
        let fx = fixture();
        let mut s = storage(&fx, "app");

        let err = s.add("missing.c").unwrap_err();
        assert!(err.to_string().starts_with("Cannot find source file: "));

        // removing a file that does not exist is tolerated
        s.remove("missing.c").unwrap();
        assert!(s.is_empty());

        let generated = fx.src.parent().unwrap().join("build").join("version.c");
        fx.tracker.add(generated.clone());
        s.add("version.c").unwrap();
        assert!(s.contains(&generated));
    }

    #[test]
    fn test_postponed_file_binds_later_and_keeps_skip() {
        let fx = fixture();
        let mut s = storage(&fx, "app");

        s.add("impl.cpp").unwrap();
        s.remove("impl.cpp").unwrap();
        let f = s.get(Path::new("impl.cpp")).unwrap();
        assert_eq!(f.state(), SourceState::Postponed);
        assert!(f.skip);

        register_gcc(&fx.registry, ".cpp");
        s.resolve().unwrap();

        let f = s.get(Path::new("impl.cpp")).unwrap();
        assert!(f.created);
        assert!(!f.postponed);
        assert!(f.skip);
        assert_eq!(f.state(), SourceState::Removed);
        assert_eq!(f.as_native().unwrap().compiler().vendor(), Vendor::Gnu);
    }

    #[test]
    fn test_readd_after_register_keeps_skip() {
        let fx = fixture();
        let mut s = storage(&fx, "app");

        s.remove("impl.cpp").unwrap();
        let f = s.get(Path::new("impl.cpp")).unwrap();
        assert!(f.postponed);
        assert!(f.skip);

        register_gcc(&fx.registry, ".cpp");
        s.add("impl.cpp").unwrap();

        let f = s.get(Path::new("impl.cpp")).unwrap();
        assert!(f.created);
        assert!(!f.postponed);
        assert!(f.skip);
        assert_eq!(f.state(), SourceState::Removed);

        // once bound, an explicit add clears the skip again
        s.add("impl.cpp").unwrap();
        assert!(!s.get(Path::new("impl.cpp")).unwrap().skip);
    }

    #[test]
    fn test_failed_resolve_keeps_later_ops() {
        let fx = fixture();
        register_gcc(&fx.registry, ".c");
        let mut s = storage(&fx, "app");

        s.postpone();
        s.add("main.c").unwrap();
        s.add("missing.c").unwrap();
        s.add("util.c").unwrap();

        assert!(matches!(s.resolve(), Err(SourceError::NotFound { .. })));
        assert!(s.is_postponed());

        s.resolve().unwrap();
        assert!(s.contains(&fx.src.join("main.c")));
        assert!(s.contains(&fx.src.join("util.c")));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_queued_ops_match_immediate() {
        let ops = |s: &mut SourceFileStorage| {
            s.add("main.c").unwrap();
            s.add_pattern(".", r".*\.c", true).unwrap();
            s.remove("util.c").unwrap();
            s.remove_pattern("sub", r".*", false).unwrap();
            s.add("util.c").unwrap();
        };
        let snapshot = |s: &SourceFileStorage| {
            s.iter()
                .map(|f| (f.file().to_path_buf(), f.skip, f.created))
                .collect::<Vec<_>>()
        };

        let fx = fixture();
        register_gcc(&fx.registry, ".c");

        let mut immediate = storage(&fx, "app");
        ops(&mut immediate);
        immediate.resolve().unwrap();

        let mut queued = storage(&fx, "app");
        queued.postpone();
        ops(&mut queued);
        assert!(queued.is_empty());
        assert!(queued.get(Path::new("main.c")).is_err());
        queued.resolve().unwrap();

        assert_eq!(snapshot(&immediate), snapshot(&queued));
        assert_eq!(immediate.size_known(), 2);
        assert_eq!(immediate.size_skipped(), 1);
    }

    #[test]
    fn test_glob_enumerates_once_per_root() {
        let fx = fixture();
        register_gcc(&fx.registry, ".c");
        let mut s = storage(&fx, "app");

        s.add_pattern(".", r"main\.c", true).unwrap();
        s.add_pattern(".", r"sub/.*\.c", true).unwrap();
        assert_eq!(s.enumerations(), 1);
        assert_eq!(s.len(), 2);

        s.add_pattern(".", r".*\.c", false).unwrap();
        assert_eq!(s.enumerations(), 2);
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn test_pattern_must_match_whole_path() {
        let fx = fixture();
        register_gcc(&fx.registry, ".c");
        let mut s = storage(&fx, "app");

        s.add_pattern(".", r"ain\.c", true).unwrap();
        assert!(s.is_empty());
        assert!(matches!(
            s.add_pattern(".", r"(", true),
            Err(SourceError::BadPattern { .. })
        ));
    }

    #[test]
    fn test_remove_exclude_erases() {
        let fx = fixture();
        register_gcc(&fx.registry, ".c");
        let mut s = storage(&fx, "app");

        s.add_all(vec![PathBuf::from("main.c"), PathBuf::from("util.c")])
            .unwrap();
        s.remove("util.c").unwrap();
        assert_eq!(s.len(), 2);

        s.remove_exclude("util.c").unwrap();
        assert_eq!(s.len(), 1);
        assert!(s.get(Path::new("util.c")).is_err());

        s.remove_exclude_pattern(".", r".*", true).unwrap();
        assert!(s.is_empty());
    }

    #[test]
    fn test_files_without_extension_are_placeholders() {
        let fx = fixture();
        let mut s = storage(&fx, "app");
        s.add("README").unwrap();
        assert_eq!(
            s.get(Path::new("README")).unwrap().state(),
            SourceState::UnresolvedNew
        );
        assert!(s.commands().unwrap().is_empty());
    }

    #[test]
    fn test_autodetect_accumulates_skip() {
        let fx = fixture();
        register_gcc(&fx.registry, ".c");
        let mut s = storage(&fx, "app");
        s.set_autodetect(true);

        s.remove("main.c").unwrap();
        s.add("main.c").unwrap();
        assert!(s.get(Path::new("main.c")).unwrap().skip);

        s.set_autodetect(false);
        s.add("main.c").unwrap();
        assert!(!s.get(Path::new("main.c")).unwrap().skip);
    }

    #[test]
    fn test_merge_and_per_target_objects() {
        let fx = fixture();
        register_gcc(&fx.registry, ".c");
        let mut app = storage(&fx, "app");
        let mut lib = storage(&fx, "lib");

        app.add("main.c").unwrap();
        lib.add_all(vec![PathBuf::from("main.c"), PathBuf::from("util.c")])
            .unwrap();
        app.merge(&lib).unwrap();
        assert_eq!(app.len(), 2);

        let a = app.get(Path::new("main.c")).unwrap().object_file().unwrap().to_path_buf();
        let b = lib.get(Path::new("main.c")).unwrap().object_file().unwrap().to_path_buf();
        assert_ne!(a, b);
    }

    #[test]
    fn test_matching() {
        let fx = fixture();
        register_gcc(&fx.registry, ".c");
        let mut s = storage(&fx, "app");
        s.add_pattern(".", r".*\.c", true).unwrap();

        let deep = s.matching(&Regex::new(r"/sub/").unwrap());
        assert_eq!(deep.len(), 1);
        assert!(deep[0].file().ends_with("sub/deep.c"));
    }

    #[test]
    fn test_header_only_does_not_compile() {
        let fx = fixture();
        register_gcc(&fx.registry, ".c");
        let mut info = TargetInfo::new("hdr", &fx.src, fx.src.parent().unwrap().join("build"));
        info.header_only = true;
        let mut s = SourceFileStorage::new(info, fx.registry.clone(), fx.tracker.clone());

        s.add("main.c").unwrap();
        assert!(!s.get(Path::new("main.c")).unwrap().created);
        assert!(s.object_files().is_empty());
    }
}
