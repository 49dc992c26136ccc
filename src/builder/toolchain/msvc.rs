//! MSVC dialect: cl.exe, ml/ml64, link.exe and lib.exe.

use std::path::{Path, PathBuf};

use crate::core::options::{
    is_bare_library_name, CommandLineOption, NativeSettings, OptionGroup, OptionSet, OptionValue,
};

use super::{names, CompilerKind, Dialect, InputSlot, LinkerRole, Vendor, VersionProbe};

/// MSVC-style command lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsvcDialect;

pub(super) fn cl_options(kind: CompilerKind) -> OptionSet {
    match kind {
        CompilerKind::Native => OptionSet::new(vec![OptionGroup::new(
            "cl",
            vec![
                CommandLineOption::flag(names::NOLOGO, "/nologo", true),
                CommandLineOption::flag(names::COMPILE_WITHOUT_LINKING, "/c", true),
                CommandLineOption::text(names::STANDARD, "/std:"),
                CommandLineOption::text(names::OPTIMIZATION, "/O"),
                CommandLineOption::flag(names::DEBUG_INFORMATION, "/Zi", false),
                CommandLineOption::path(names::OBJECT_FILE, "/Fo"),
                CommandLineOption::path(names::INPUT_FILE, ""),
                CommandLineOption::path(names::C_SOURCE_FILE, "/Tc"),
                CommandLineOption::path(names::CXX_SOURCE_FILE, "/Tp"),
            ],
        )]),
        CompilerKind::Assembler => OptionSet::new(vec![OptionGroup::new(
            "ml",
            vec![
                CommandLineOption::flag(names::NOLOGO, "/nologo", true),
                CommandLineOption::flag(names::COMPILE_WITHOUT_LINKING, "/c", true),
                CommandLineOption::flag(names::SAFE_SEH, "/safeseh", true),
                CommandLineOption::path(names::OBJECT_FILE, "/Fo"),
                CommandLineOption::path(names::INPUT_FILE, ""),
            ],
        )]),
    }
}

/// Bind a source to its dedicated slot, or the generic one when the
/// tool has no such slot (assemblers).
pub(super) fn cl_bind_source(options: &mut OptionSet, slot: InputSlot, input: &Path) {
    let name = match slot {
        InputSlot::Generic => names::INPUT_FILE,
        InputSlot::C => names::C_SOURCE_FILE,
        InputSlot::Cxx => names::CXX_SOURCE_FILE,
    };
    let value = OptionValue::Path(Some(input.to_path_buf()));
    if !options.set(name, value.clone()) {
        options.set(names::INPUT_FILE, value);
    }
}

/// ml64 rejects `/safeseh`.
pub(super) fn cl_adjust(program: &Path, options: &mut OptionSet) {
    let is_ml64 = program
        .file_name()
        .map(|n| n.to_string_lossy().eq_ignore_ascii_case("ml64.exe"))
        .unwrap_or(false);
    if is_ml64 {
        options.set(names::SAFE_SEH, OptionValue::Flag(false));
    }
}

pub(super) fn cl_compile_settings(settings: &NativeSettings) -> Vec<String> {
    let mut args = Vec::new();

    // Defines
    for (name, value) in settings.system.definitions.iter().chain(&settings.user.definitions) {
        match value {
            Some(v) => args.push(format!("/D{}={}", name, v)),
            None => args.push(format!("/D{}", name)),
        }
    }

    // Include directories
    for dir in settings
        .user
        .include_directories
        .iter()
        .chain(&settings.system.include_directories)
    {
        args.push(format!("/I{}", dir.display()));
    }

    // Custom flags
    args.extend(settings.system.compile_options.iter().cloned());
    args.extend(settings.user.compile_options.iter().cloned());
    args
}

pub(super) fn link_exe_options(role: LinkerRole) -> OptionSet {
    match role {
        LinkerRole::Linker => OptionSet::new(vec![OptionGroup::new(
            "link",
            vec![
                CommandLineOption::flag(names::NOLOGO, "/NOLOGO", true),
                CommandLineOption::flag(names::SHARED, "/DLL", false),
                CommandLineOption::text(names::MACHINE, "/MACHINE:").system(),
                CommandLineOption::path(names::OUTPUT, "/OUT:"),
                CommandLineOption::path(names::IMPORT_LIBRARY, "/IMPLIB:"),
                CommandLineOption::paths(names::INPUT_FILES, ""),
                CommandLineOption::paths(names::INPUT_LIBRARY_DEPENDENCIES, ""),
            ],
        )]),
        LinkerRole::Librarian => OptionSet::new(vec![OptionGroup::new(
            "lib",
            vec![
                CommandLineOption::flag(names::NOLOGO, "/NOLOGO", true),
                CommandLineOption::text(names::MACHINE, "/MACHINE:").system(),
                CommandLineOption::path(names::OUTPUT, "/OUT:"),
                CommandLineOption::paths(names::INPUT_FILES, ""),
            ],
        )]),
    }
}

pub(super) fn link_exe_settings(role: LinkerRole, settings: &NativeSettings) -> Vec<String> {
    let mut args = Vec::new();

    // Library search paths
    for dir in settings.gather_link_directories() {
        args.push(format!("/LIBPATH:{}", dir.display()));
    }
    if role == LinkerRole::Librarian {
        return args;
    }

    // Libraries
    for lib in settings.gather_link_libraries() {
        if is_bare_library_name(&lib) {
            args.push(format!("{}.lib", lib.display()));
        } else {
            args.push(lib.display().to_string());
        }
    }

    // Custom flags
    args.extend(settings.system.link_options.iter().cloned());
    args.extend(settings.user.link_options.iter().cloned());
    args
}

pub(super) fn windows_output_extension(role: LinkerRole) -> &'static str {
    match role {
        LinkerRole::Linker => ".exe",
        LinkerRole::Librarian => ".lib",
    }
}

/// `dir/stem.lib` next to the output.
pub(super) fn windows_import_library(output: &Path) -> PathBuf {
    match output.file_stem() {
        Some(stem) => {
            let mut name = stem.to_os_string();
            name.push(".lib");
            output.with_file_name(name)
        }
        None => output.to_path_buf(),
    }
}

impl Dialect for MsvcDialect {
    fn vendor(&self) -> Vendor {
        Vendor::Msvc
    }

    fn object_extension(&self) -> &'static str {
        ".obj"
    }

    fn version_probe(&self) -> VersionProbe {
        VersionProbe::MSVC
    }

    fn compiler_options(&self, kind: CompilerKind) -> OptionSet {
        cl_options(kind)
    }

    fn bind_source(&self, options: &mut OptionSet, slot: InputSlot, input: &Path) {
        cl_bind_source(options, slot, input);
    }

    fn adjust_compiler_options(&self, program: &Path, options: &mut OptionSet) {
        cl_adjust(program, options);
    }

    fn render_compile_settings(&self, settings: &NativeSettings) -> Vec<String> {
        cl_compile_settings(settings)
    }

    fn linker_options(&self, role: LinkerRole) -> OptionSet {
        link_exe_options(role)
    }

    fn render_link_settings(&self, role: LinkerRole, settings: &NativeSettings) -> Vec<String> {
        link_exe_settings(role, settings)
    }

    fn output_extension(&self, role: LinkerRole) -> &'static str {
        windows_output_extension(role)
    }

    fn shared_library_extension(&self) -> &'static str {
        ".dll"
    }

    fn explicit_import_library(&self, out: &Path) -> Option<PathBuf> {
        let mut s = out.as_os_str().to_os_string();
        s.push(".lib");
        Some(PathBuf::from(s))
    }

    fn default_import_library(&self, _role: LinkerRole, output: &Path) -> PathBuf {
        windows_import_library(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::{Compiler, Program};
    use crate::core::options::Placement;

    #[test]
    fn test_ml64_drops_safeseh() {
        let mut ml64 = Compiler::new(Vendor::Msvc, CompilerKind::Assembler, "C:/VC/bin/ml64.exe");
        ml64.set_source_file(Path::new("C:/src/a.asm"), Path::new("C:/obj/a.obj"))
            .unwrap();
        let cmd = ml64.command().unwrap().unwrap();
        assert!(!cmd.args.contains(&"/safeseh".to_string()));
        // the configured option is untouched
        assert!(ml64.options().flag(names::SAFE_SEH));

        let mut ml = Compiler::new(Vendor::Msvc, CompilerKind::Assembler, "C:/VC/bin/ml.exe");
        ml.set_source_file(Path::new("C:/src/a.asm"), Path::new("C:/obj/a.obj"))
            .unwrap();
        let cmd = ml.command().unwrap().unwrap();
        assert!(cmd.args.contains(&"/safeseh".to_string()));
    }

    #[test]
    fn test_assembler_falls_back_to_generic_slot() {
        let mut opts = MsvcDialect.compiler_options(CompilerKind::Assembler);
        MsvcDialect.bind_source(&mut opts, InputSlot::C, Path::new("a.asm"));
        assert_eq!(opts.path(names::INPUT_FILE), Some(Path::new("a.asm")));
    }

    #[test]
    fn test_cl_rendering() {
        let mut opts = MsvcDialect.compiler_options(CompilerKind::Native);
        MsvcDialect.bind_source(&mut opts, InputSlot::C, Path::new("b.c"));
        opts.set(names::OBJECT_FILE, OptionValue::Path(Some("b.obj".into())));
        assert_eq!(
            opts.render(Placement::Normal),
            vec!["/nologo", "/c", "/Fob.obj", "/Tcb.c"]
        );
    }

    #[test]
    fn test_link_settings() {
        let mut settings = NativeSettings::default();
        settings.system.link_dir("C:/kits/lib").link_library("kernel32");
        settings.user.link_library("C:/deps/z.lib");

        assert_eq!(
            MsvcDialect.render_link_settings(LinkerRole::Linker, &settings),
            vec!["/LIBPATH:C:/kits/lib", "kernel32.lib", "C:/deps/z.lib"]
        );
        assert_eq!(
            MsvcDialect.render_link_settings(LinkerRole::Librarian, &settings),
            vec!["/LIBPATH:C:/kits/lib"]
        );
    }
}
