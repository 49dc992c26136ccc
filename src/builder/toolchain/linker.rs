//! Linkers and librarians.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::builder::command::Command;
use crate::builder::errors::ProgramError;
use crate::core::options::{NativeSettings, OptionSet, OptionValue, Placement};
use crate::core::version::Version;
use crate::util::fs::append_extension;

use super::{names, Dialect, Program, ProgramBase, Vendor};

/// Markers wrapping static libraries so the GNU linker rescans them.
pub const START_GROUP: &str = "-Wl,--start-group";
pub const END_GROUP: &str = "-Wl,--end-group";

/// Whether the tool links executables/shared libraries or archives objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkerRole {
    Linker,
    Librarian,
}

/// A linker or librarian.
#[derive(Debug, Clone)]
pub struct Linker {
    base: ProgramBase,
    role: LinkerRole,
    options: OptionSet,
    settings: NativeSettings,
    extension: String,
    import_library: Option<PathBuf>,
}

impl Linker {
    /// Create a linker or librarian of the given vendor.
    pub fn new(vendor: Vendor, role: LinkerRole, file: impl Into<PathBuf>) -> Self {
        let dialect = vendor.dialect();
        Linker {
            base: ProgramBase::new(vendor, file),
            role,
            options: dialect.linker_options(role),
            settings: NativeSettings::default(),
            extension: dialect.output_extension(role).to_string(),
            import_library: None,
        }
    }

    /// Fix the version instead of probing it.
    pub fn with_version(mut self, version: Version) -> Self {
        self.base.set_version(version);
        self
    }

    pub fn role(&self) -> LinkerRole {
        self.role
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

    /// Extension appended by [`set_output_file`](Self::set_output_file).
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn set_extension(&mut self, extension: impl Into<String>) -> Result<(), ProgramError> {
        self.base.ensure_mutable()?;
        self.extension = extension.into();
        Ok(())
    }

    /// Produce a shared library instead of an executable.
    ///
    /// Also switches the output extension to the dialect's shared library
    /// extension. Librarians have no shared mode.
    pub fn set_shared(&mut self, shared: bool) -> Result<(), ProgramError> {
        self.base.ensure_mutable()?;
        if self.role == LinkerRole::Librarian {
            return Err(ProgramError::UnsupportedOption {
                program: self.base.file().to_path_buf(),
                option: names::SHARED,
            });
        }
        self.options.set(names::SHARED, OptionValue::Flag(shared));
        self.extension = if shared {
            self.dialect().shared_library_extension()
        } else {
            self.dialect().output_extension(self.role)
        }
        .to_string();
        Ok(())
    }

    pub fn is_shared(&self) -> bool {
        self.options.flag(names::SHARED)
    }

    /// Add object files. Inputs are kept sorted and unique.
    pub fn set_object_files(&mut self, files: impl IntoIterator<Item = PathBuf>) -> Result<(), ProgramError> {
        self.base.ensure_mutable()?;
        let mut all: BTreeSet<PathBuf> = self.options.paths(names::INPUT_FILES).iter().cloned().collect();
        all.extend(files);
        self.options
            .set(names::INPUT_FILES, OptionValue::Paths(all.into_iter().collect()));
        Ok(())
    }

    pub fn object_files(&self) -> &[PathBuf] {
        self.options.paths(names::INPUT_FILES)
    }

    /// Set the output; the current extension is appended.
    pub fn set_output_file(&mut self, out: &Path) -> Result<(), ProgramError> {
        self.base.ensure_mutable()?;
        let output = append_extension(out, &self.extension);
        self.options.set(names::OUTPUT, OptionValue::Path(Some(output)));
        Ok(())
    }

    pub fn output_file(&self) -> Option<&Path> {
        self.options.path(names::OUTPUT)
    }

    /// Set the import library; ignored by dialects without them.
    pub fn set_import_library(&mut self, out: &Path) -> Result<(), ProgramError> {
        self.base.ensure_mutable()?;
        if let Some(implib) = self.dialect().explicit_import_library(out) {
            self.options
                .set(names::IMPORT_LIBRARY, OptionValue::Path(Some(implib.clone())));
            self.import_library = Some(implib);
        }
        Ok(())
    }

    /// The import library other targets link against.
    pub fn import_library(&self) -> Option<PathBuf> {
        if let Some(implib) = &self.import_library {
            return Some(implib.clone());
        }
        self.output_file()
            .map(|out| self.dialect().default_import_library(self.role, out))
    }

    /// Append libraries to the user link libraries.
    pub fn set_link_libraries(&mut self, libs: impl IntoIterator<Item = PathBuf>) -> Result<(), ProgramError> {
        self.base.ensure_mutable()?;
        self.settings.user.link_libraries.extend(libs);
        Ok(())
    }

    /// Append library files this link depends on, in order.
    ///
    /// Librarians take no library inputs and reject a non-empty list.
    pub fn set_input_library_dependencies(
        &mut self,
        files: impl IntoIterator<Item = PathBuf>,
    ) -> Result<(), ProgramError> {
        self.base.ensure_mutable()?;
        let files: Vec<PathBuf> = files.into_iter().collect();
        if files.is_empty() || self.options.extend_paths(names::INPUT_LIBRARY_DEPENDENCIES, files) {
            return Ok(());
        }
        Err(ProgramError::UnsupportedOption {
            program: self.base.file().to_path_buf(),
            option: names::INPUT_LIBRARY_DEPENDENCIES,
        })
    }

    pub fn input_library_dependencies(&self) -> &[PathBuf] {
        self.options.paths(names::INPUT_LIBRARY_DEPENDENCIES)
    }

    fn build_command(&self) -> Result<Option<Command>, ProgramError> {
        let inputs = self.object_files();
        if inputs.is_empty() {
            return Ok(None);
        }
        let output = self.output_file().ok_or_else(|| ProgramError::OutputNotSet {
            program: self.base.file().to_path_buf(),
        })?;
        let dialect = self.dialect();

        let mut cmd = Command::new(self.base.file()).named(output).output(output);
        if let Some(dir) = output.parent() {
            cmd = cmd.working_dir(dir);
        }
        for input in inputs.iter().chain(self.input_library_dependencies()) {
            cmd = cmd.input(input);
        }
        if self.is_shared() {
            if let Some(implib) = self.import_library().filter(|i| i.as_path() != output) {
                cmd = cmd.output(implib);
            }
        }

        cmd = cmd.args(self.options.render(Placement::Normal));

        let deps = self.input_library_dependencies();
        if dialect.wraps_library_group() && !deps.is_empty() {
            cmd = cmd
                .arg(START_GROUP)
                .args(deps.iter().map(|d| d.display().to_string()))
                .arg(END_GROUP);
        }

        cmd = cmd
            .args(dialect.render_link_settings(self.role, &self.settings))
            .args(self.options.render(Placement::End));
        Ok(Some(cmd))
    }
}

impl Program for Linker {
    fn base(&self) -> &ProgramBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ProgramBase {
        &mut self.base
    }

    fn command(&self) -> Result<Option<Arc<Command>>, ProgramError> {
        self.base.memoize(|| self.build_command())
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

    fn as_linker(&self) -> Option<&Linker> {
        Some(self)
    }
}
