//! GNU dialect: gcc, g++, as, ar and the gcc link driver.

use std::path::{Path, PathBuf};

use crate::core::options::{
    is_bare_library_name, CommandLineOption, NativeSettings, OptionGroup, OptionSet, OptionValue,
};

use super::{names, CompilerKind, Dialect, InputSlot, LinkerRole, Vendor, VersionProbe};

/// GNU-style command lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct GnuDialect;

/// Compiler options shared by gcc and clang drivers.
pub(super) fn driver_options(kind: CompilerKind) -> OptionSet {
    match kind {
        CompilerKind::Native => OptionSet::new(vec![OptionGroup::new(
            "compile",
            vec![
                CommandLineOption::flag(names::COMPILE_WITHOUT_LINKING, "-c", true),
                CommandLineOption::text(names::LANGUAGE, "-x").separate(),
                CommandLineOption::text(names::STANDARD, "-std="),
                CommandLineOption::text(names::OPTIMIZATION, "-O"),
                CommandLineOption::flag(names::DEBUG_INFORMATION, "-g", false),
                CommandLineOption::flag(names::POSITION_INDEPENDENT_CODE, "-fPIC", false),
                CommandLineOption::flag(names::WRITE_DEPENDENCIES, "-MD", true),
                CommandLineOption::path(names::DEPENDENCIES_FILE, "-MF").separate(),
                CommandLineOption::path(names::OBJECT_FILE, "-o").separate(),
                CommandLineOption::path(names::INPUT_FILE, ""),
            ],
        )]),
        CompilerKind::Assembler => OptionSet::new(vec![OptionGroup::new(
            "assemble",
            vec![
                CommandLineOption::path(names::OBJECT_FILE, "-o").separate(),
                CommandLineOption::path(names::INPUT_FILE, ""),
            ],
        )]),
    }
}

/// Bind a source through `-x` instead of separate slots.
pub(super) fn driver_bind_source(options: &mut OptionSet, slot: InputSlot, input: &Path) {
    let language = match slot {
        InputSlot::Generic => None,
        InputSlot::C => Some("c".to_string()),
        InputSlot::Cxx => Some("c++".to_string()),
    };
    options.set(names::LANGUAGE, OptionValue::Text(language));
    options.set(names::INPUT_FILE, OptionValue::Path(Some(input.to_path_buf())));
}

pub(super) fn driver_compile_settings(settings: &NativeSettings) -> Vec<String> {
    let mut args = Vec::new();

    // Defines
    for (name, value) in settings.system.definitions.iter().chain(&settings.user.definitions) {
        match value {
            Some(v) => args.push(format!("-D{}={}", name, v)),
            None => args.push(format!("-D{}", name)),
        }
    }

    // Include directories
    for dir in &settings.user.include_directories {
        args.push(format!("-I{}", dir.display()));
    }
    for dir in &settings.system.include_directories {
        args.push("-isystem".to_string());
        args.push(dir.display().to_string());
    }

    // Custom flags
    args.extend(settings.system.compile_options.iter().cloned());
    args.extend(settings.user.compile_options.iter().cloned());
    args
}

pub(super) fn driver_linker_options(role: LinkerRole) -> OptionSet {
    match role {
        LinkerRole::Linker => OptionSet::new(vec![OptionGroup::new(
            "link",
            vec![
                CommandLineOption::flag(names::SHARED, "-shared", false),
                CommandLineOption::path(names::OUTPUT, "-o").separate(),
                CommandLineOption::paths(names::INPUT_FILES, ""),
                // wrapped in a link group by the linker itself
                CommandLineOption::paths(names::INPUT_LIBRARY_DEPENDENCIES, "").manual(),
                // toolchain baseline, after every user library
                CommandLineOption::texts(names::SYSTEM_LIBRARIES, "-l").at_end().system(),
            ],
        )]),
        LinkerRole::Librarian => OptionSet::new(vec![OptionGroup::new(
            "archive",
            vec![
                // Create archive with symbol index, replace files
                CommandLineOption::text(names::OPERATION, "")
                    .with_value(OptionValue::Text(Some("rcs".to_string()))),
                CommandLineOption::path(names::OUTPUT, ""),
                CommandLineOption::paths(names::INPUT_FILES, ""),
            ],
        )]),
    }
}

pub(super) fn driver_link_settings(role: LinkerRole, settings: &NativeSettings) -> Vec<String> {
    if role == LinkerRole::Librarian {
        return Vec::new();
    }

    let mut args = Vec::new();

    // Library search paths
    for dir in settings.gather_link_directories() {
        args.push(format!("-L{}", dir.display()));
    }

    // Libraries
    for lib in settings.gather_link_libraries() {
        if is_bare_library_name(&lib) {
            args.push(format!("-l{}", lib.display()));
        } else {
            args.push(lib.display().to_string());
        }
    }

    // Custom flags
    args.extend(settings.system.link_options.iter().cloned());
    args.extend(settings.user.link_options.iter().cloned());
    args
}

pub(super) fn unix_output_extension(role: LinkerRole) -> &'static str {
    match role {
        LinkerRole::Linker => "",
        LinkerRole::Librarian => ".a",
    }
}

pub(super) fn unix_shared_library_extension() -> &'static str {
    if cfg!(target_os = "macos") {
        ".dylib"
    } else {
        ".so"
    }
}

/// Make-style deps file: `dir/stem.d` next to the object.
pub(super) fn make_deps_file(object: &Path) -> Option<PathBuf> {
    let stem = object.file_stem()?;
    let mut name = stem.to_os_string();
    name.push(".d");
    Some(object.with_file_name(name))
}

pub(super) fn unix_default_import_library(role: LinkerRole, output: &Path) -> PathBuf {
    match role {
        // The linked output itself is what dependents link against
        LinkerRole::Linker => output.to_path_buf(),
        LinkerRole::Librarian => match output.file_stem() {
            Some(stem) => {
                let mut name = stem.to_os_string();
                name.push(".a");
                output.with_file_name(name)
            }
            None => output.to_path_buf(),
        },
    }
}

impl Dialect for GnuDialect {
    fn vendor(&self) -> Vendor {
        Vendor::Gnu
    }

    fn object_extension(&self) -> &'static str {
        ".o"
    }

    fn version_probe(&self) -> VersionProbe {
        VersionProbe::GNU
    }

    fn compiler_options(&self, kind: CompilerKind) -> OptionSet {
        driver_options(kind)
    }

    fn bind_source(&self, options: &mut OptionSet, slot: InputSlot, input: &Path) {
        driver_bind_source(options, slot, input);
    }

    fn deps_file(&self, object: &Path) -> Option<PathBuf> {
        make_deps_file(object)
    }

    fn render_compile_settings(&self, settings: &NativeSettings) -> Vec<String> {
        driver_compile_settings(settings)
    }

    fn linker_options(&self, role: LinkerRole) -> OptionSet {
        driver_linker_options(role)
    }

    fn render_link_settings(&self, role: LinkerRole, settings: &NativeSettings) -> Vec<String> {
        driver_link_settings(role, settings)
    }

    fn output_extension(&self, role: LinkerRole) -> &'static str {
        unix_output_extension(role)
    }

    fn shared_library_extension(&self) -> &'static str {
        unix_shared_library_extension()
    }

    fn explicit_import_library(&self, _out: &Path) -> Option<PathBuf> {
        None
    }

    fn default_import_library(&self, role: LinkerRole, output: &Path) -> PathBuf {
        unix_default_import_library(role, output)
    }

    fn wraps_library_group(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::options::Placement;

    #[test]
    fn test_bind_source_sets_language() {
        let mut opts = GnuDialect.compiler_options(CompilerKind::Native);
        GnuDialect.bind_source(&mut opts, InputSlot::Cxx, Path::new("/src/a.cc"));
        opts.set(names::OBJECT_FILE, OptionValue::Path(Some("/obj/a.o".into())));

        assert_eq!(
            opts.render(Placement::Normal),
            vec!["-c", "-x", "c++", "-MD", "-o", "/obj/a.o", "/src/a.cc"]
        );

        GnuDialect.bind_source(&mut opts, InputSlot::Generic, Path::new("/src/b.c"));
        assert!(opts.text(names::LANGUAGE).is_none());
    }

    #[test]
    fn test_compile_settings() {
        let mut settings = NativeSettings::default();
        settings.user.define("A", Some("1".into())).include_dir("/inc");
        settings.system.include_dir("/usr/include/sys");
        settings.user.compile_option("-Wall");

        assert_eq!(
            GnuDialect.render_compile_settings(&settings),
            vec!["-DA=1", "-I/inc", "-isystem", "/usr/include/sys", "-Wall"]
        );
    }

    #[test]
    fn test_link_settings() {
        let mut settings = NativeSettings::default();
        settings.system.link_dir("/lib").link_library("pthread");
        settings.user.link_library("/opt/lib/libz.a");

        assert_eq!(
            GnuDialect.render_link_settings(LinkerRole::Linker, &settings),
            vec!["-L/lib", "-lpthread", "/opt/lib/libz.a"]
        );
        assert!(GnuDialect
            .render_link_settings(LinkerRole::Librarian, &settings)
            .is_empty());
    }

    #[test]
    fn test_deps_file() {
        assert_eq!(
            make_deps_file(Path::new("/obj/main.c.1234abcd.o")),
            Some(PathBuf::from("/obj/main.c.1234abcd.d"))
        );
    }
}
