//! Program and language registry.
//!
//! Two maps keyed by package path and version hold every registered
//! [`Program`] and [`Language`]; a flat extension table says which package
//! currently handles each source extension. Registries form a two-level
//! chain: a target's registry is consulted first and falls through to the
//! solution's on a miss.
//!
//! The solution registry may be written by one target's detection while
//! other targets read through it. Fallthrough reads never block: a parent
//! that is being written reports "not found", and callers retry later
//! (the file stays postponed).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

use crate::builder::toolchain::Program;
use crate::builder::tracker::FileTracker;
use crate::core::dependency::{Dependency, DependencyTarget};
use crate::core::language::Language;
use crate::core::package::{PackageId, PackagePath, PackageResolver, UnresolvedPackage};
use crate::core::version::Version;

/// Namespace of synthetic language packages.
const LOCAL_LANGUAGE_PREFIX: &str = "loc.cinder.lang";

/// How an extension maps to its providing package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionBinding {
    Resolved(PackageId),
    /// Resolved at lookup time to the latest matching version so far
    Unresolved(UnresolvedPackage),
}

#[derive(Default)]
struct State {
    programs: BTreeMap<PackagePath, BTreeMap<Version, Arc<dyn Program>>>,
    languages: BTreeMap<PackagePath, BTreeMap<Version, Arc<Language>>>,
    extensions: BTreeMap<String, ExtensionBinding>,
    dependencies: Vec<Dependency>,
    next_local_language: usize,
}

/// Registered programs and languages of one scope.
pub struct Registry {
    state: RwLock<State>,
    parent: Option<Arc<Registry>>,
    tracker: Option<Arc<dyn FileTracker>>,
    resolver: Option<Arc<dyn PackageResolver>>,
}

impl Registry {
    /// A solution-level registry.
    pub fn new() -> Self {
        Registry {
            state: RwLock::new(State::default()),
            parent: None,
            tracker: None,
            resolver: None,
        }
    }

    /// Attach the session-wide generated-file tracker to every program
    /// registered here.
    pub fn with_tracker(mut self, tracker: Arc<dyn FileTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Resolve late-bound extension packages with an external resolver.
    pub fn with_resolver(mut self, resolver: Arc<dyn PackageResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// A target-level registry falling through to `parent`.
    pub fn child(parent: &Arc<Registry>) -> Self {
        Registry {
            state: RwLock::new(State::default()),
            parent: Some(parent.clone()),
            tracker: parent.tracker.clone(),
            resolver: parent.resolver.clone(),
        }
    }

    /// Whether this registry belongs to a target.
    pub fn is_local(&self) -> bool {
        self.parent.is_some()
    }

    pub fn parent(&self) -> Option<&Arc<Registry>> {
        self.parent.as_ref()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` on the state; without `blocking`, a locked state is a miss.
    fn with_state<T>(&self, blocking: bool, f: impl FnOnce(&State) -> Option<T>) -> Option<T> {
        if blocking {
            return f(&self.read());
        }
        match self.state.try_read() {
            Ok(state) => f(&state),
            Err(TryLockError::Poisoned(p)) => f(&p.into_inner()),
            Err(TryLockError::WouldBlock) => {
                tracing::debug!("solution registry is busy, treating lookup as a miss");
                None
            }
        }
    }

    /// Register a program under its own version.
    ///
    /// Probes the version when it was not set explicitly.
    pub fn register_program<P: Program + 'static>(&self, path: PackagePath, mut program: P) -> PackageId {
        if let Some(tracker) = &self.tracker {
            program.set_file_tracker(tracker.clone());
        }
        let id = PackageId::new(path, program.version());
        tracing::debug!("registered program {} ({})", id, program.path().display());
        self.write()
            .programs
            .entry(id.path.clone())
            .or_default()
            .insert(id.version, Arc::new(program));
        id
    }

    /// Register a language at `id`, replacing any previous one.
    pub fn register_language(&self, id: PackageId, mut language: Language) {
        if let Some(tracker) = &self.tracker {
            language.compiler_mut().set_file_tracker(tracker.clone());
        }
        tracing::debug!("registered language {} for {:?}", id, language.extensions());
        self.write()
            .languages
            .entry(id.path)
            .or_default()
            .insert(id.version, Arc::new(language));
    }

    /// Register a language's compiler as a program and the language itself
    /// under the same id.
    pub fn register_program_and_language(&self, path: PackagePath, language: Language) -> PackageId {
        let id = self.register_program(path, language.compiler().clone());
        self.register_language(id.clone(), language);
        id
    }

    /// Bind an extension to a package whose version is picked at lookup.
    pub fn set_extension_package(&self, ext: &str, package: UnresolvedPackage) {
        let mut state = self.write();
        if self.is_local() {
            state
                .dependencies
                .push(Dependency::dummy(DependencyTarget::Unresolved(package.clone())));
        }
        state
            .extensions
            .insert(ext.to_string(), ExtensionBinding::Unresolved(package));
    }

    /// Bind an extension to an in-memory language.
    ///
    /// The language is stored under the package already handling `ext`, or
    /// under a fresh `loc.cinder.lang<N>` id when there is none.
    pub fn set_extension_language(&self, ext: &str, language: Language) -> PackageId {
        let id = match self.find_package_id_by_extension(ext) {
            Some(id) => id,
            None => {
                let n = {
                    let mut state = self.write();
                    state.next_local_language += 1;
                    state.next_local_language
                };
                let path = PackagePath::parse(&format!("{}{}", LOCAL_LANGUAGE_PREFIX, n))
                    .unwrap_or_default();
                PackageId::new(path, Version::zero())
            }
        };

        self.register_language(id.clone(), language);

        let mut state = self.write();
        if self.is_local() {
            state
                .dependencies
                .push(Dependency::dummy(DependencyTarget::Resolved(id.clone())));
        }
        state
            .extensions
            .insert(ext.to_string(), ExtensionBinding::Resolved(id.clone()));
        id
    }

    /// Make a language the handler of every extension it declares.
    ///
    /// Without a version the greatest registered one is used. Returns
    /// `false` when no such language is known.
    pub fn activate_language(&self, path: &PackagePath, version: Option<&Version>) -> bool {
        let Some((id, language)) = self.get_language_entry(path, version) else {
            tracing::debug!("cannot activate unknown language {}", path);
            return false;
        };

        let mut state = self.write();
        for ext in language.extensions() {
            state
                .extensions
                .insert(ext.clone(), ExtensionBinding::Resolved(id.clone()));
        }
        tracing::debug!("activated {} for {:?}", id, language.extensions());
        true
    }

    /// The program at `path`, by exact version or the greatest one.
    pub fn get_program(&self, path: &PackagePath, version: Option<&Version>) -> Option<Arc<dyn Program>> {
        self.get_program_in(true, path, version)
    }

    fn get_program_in(
        &self,
        blocking: bool,
        path: &PackagePath,
        version: Option<&Version>,
    ) -> Option<Arc<dyn Program>> {
        self.with_state(blocking, |state| pick(state.programs.get(path)?, version).map(|(_, p)| p))
            .or_else(|| {
                self.parent
                    .as_ref()
                    .and_then(|p| p.get_program_in(false, path, version))
            })
    }

    /// The language at `path`, by exact version or the greatest one.
    pub fn get_language(&self, path: &PackagePath, version: Option<&Version>) -> Option<Arc<Language>> {
        self.get_language_entry(path, version).map(|(_, l)| l)
    }

    fn get_language_entry(
        &self,
        path: &PackagePath,
        version: Option<&Version>,
    ) -> Option<(PackageId, Arc<Language>)> {
        self.get_language_in(true, path, version)
    }

    fn get_language_in(
        &self,
        blocking: bool,
        path: &PackagePath,
        version: Option<&Version>,
    ) -> Option<(PackageId, Arc<Language>)> {
        self.with_state(blocking, |state| {
            pick(state.languages.get(path)?, version)
                .map(|(v, l)| (PackageId::new(path.clone(), v), l))
        })
        .or_else(|| {
            self.parent
                .as_ref()
                .and_then(|p| p.get_language_in(false, path, version))
        })
    }

    /// The package currently handling `ext`.
    pub fn find_package_id_by_extension(&self, ext: &str) -> Option<PackageId> {
        self.find_package_id_in(true, ext)
    }

    fn find_package_id_in(&self, blocking: bool, ext: &str) -> Option<PackageId> {
        match self.with_state(blocking, |state| state.extensions.get(ext).cloned()) {
            Some(ExtensionBinding::Resolved(id)) => Some(id),
            Some(ExtensionBinding::Unresolved(package)) => match &self.resolver {
                Some(resolver) => resolver.resolve(&package),
                None => self.resolve_in(blocking, &package),
            },
            None => self
                .parent
                .as_ref()
                .and_then(|p| p.find_package_id_in(false, ext)),
        }
    }

    pub fn find_language_by_extension(&self, ext: &str) -> Option<Arc<Language>> {
        let id = self.find_package_id_by_extension(ext)?;
        self.get_language(&id.path, Some(&id.version))
    }

    pub fn find_program_by_extension(&self, ext: &str) -> Option<Arc<dyn Program>> {
        let id = self.find_package_id_by_extension(ext)?;
        self.get_program(&id.path, Some(&id.version))
    }

    /// Dummy dependencies recorded by target-scope extension bindings.
    pub fn dependencies(&self) -> Vec<Dependency> {
        self.read().dependencies.clone()
    }

    /// Every program registered in this scope.
    pub fn programs(&self) -> Vec<(PackageId, Arc<dyn Program>)> {
        let state = self.read();
        state
            .programs
            .iter()
            .flat_map(|(path, versions)| {
                versions
                    .iter()
                    .map(move |(v, p)| (PackageId::new(path.clone(), *v), p.clone()))
            })
            .collect()
    }

    /// The effective extension table, local bindings over the parent's.
    pub fn active_extensions(&self) -> BTreeMap<String, PackageId> {
        let mut table = self
            .parent
            .as_ref()
            .map(|p| p.active_extensions())
            .unwrap_or_default();
        let exts: Vec<String> = self.read().extensions.keys().cloned().collect();
        for ext in exts {
            if let Some(id) = self.find_package_id_by_extension(&ext) {
                table.insert(ext, id);
            }
        }
        table
    }
}

/// Exact version, or the greatest.
fn pick<T: Clone>(versions: &BTreeMap<Version, T>, version: Option<&Version>) -> Option<(Version, T)> {
    match version {
        Some(v) => versions.get_key_value(v).map(|(k, t)| (*k, t.clone())),
        None => versions.iter().next_back().map(|(k, t)| (*k, t.clone())),
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    fn resolve_in(&self, blocking: bool, package: &UnresolvedPackage) -> Option<PackageId> {
        let local = self.with_state(blocking, |state| {
            let languages = state.languages.get(&package.path).map(|m| m.keys());
            let programs = state.programs.get(&package.path).map(|m| m.keys());
            languages
                .into_iter()
                .flatten()
                .chain(programs.into_iter().flatten())
                .filter(|v| package.matches(v))
                .max()
                .copied()
        });
        match local {
            Some(v) => Some(PackageId::new(package.path.clone(), v)),
            None => self
                .parent
                .as_ref()
                .and_then(|p| p.resolve_in(false, package)),
        }
    }
}

impl PackageResolver for Registry {
    /// The greatest registered version matching the range, local first.
    fn resolve(&self, package: &UnresolvedPackage) -> Option<PackageId> {
        self.resolve_in(true, package)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("Registry")
            .field("programs", &state.programs.len())
            .field("languages", &state.languages.len())
            .field("extensions", &state.extensions.keys().collect::<Vec<_>>())
            .field("local", &self.is_local())
            .finish()
    }
}
