//! LLVM dialects: the GNU-compatible `clang` driver and MSVC-compatible `clang-cl`.

use std::path::{Path, PathBuf};

use crate::core::options::{CommandLineOption, NativeSettings, OptionGroup, OptionSet};

use super::{gnu, msvc, names, CompilerKind, Dialect, InputSlot, LinkerRole, Vendor, VersionProbe};

/// `clang`/`clang++` and the clang link driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClangDialect;

/// `clang-cl`: MSVC syntax plus raw clang options passed via `-Xclang`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClangClDialect;

impl Dialect for ClangDialect {
    fn vendor(&self) -> Vendor {
        Vendor::Clang
    }

    fn object_extension(&self) -> &'static str {
        ".o"
    }

    fn version_probe(&self) -> VersionProbe {
        VersionProbe::CLANG
    }

    fn compiler_options(&self, kind: CompilerKind) -> OptionSet {
        gnu::driver_options(kind)
    }

    fn bind_source(&self, options: &mut OptionSet, slot: InputSlot, input: &Path) {
        gnu::driver_bind_source(options, slot, input);
    }

    fn deps_file(&self, object: &Path) -> Option<PathBuf> {
        gnu::make_deps_file(object)
    }

    fn render_compile_settings(&self, settings: &NativeSettings) -> Vec<String> {
        gnu::driver_compile_settings(settings)
    }

    fn linker_options(&self, role: LinkerRole) -> OptionSet {
        gnu::driver_linker_options(role)
    }

    fn render_link_settings(&self, role: LinkerRole, settings: &NativeSettings) -> Vec<String> {
        gnu::driver_link_settings(role, settings)
    }

    fn output_extension(&self, role: LinkerRole) -> &'static str {
        gnu::unix_output_extension(role)
    }

    fn shared_library_extension(&self) -> &'static str {
        gnu::unix_shared_library_extension()
    }

    fn explicit_import_library(&self, _out: &Path) -> Option<PathBuf> {
        None
    }

    fn default_import_library(&self, role: LinkerRole, output: &Path) -> PathBuf {
        gnu::unix_default_import_library(role, output)
    }

    fn wraps_library_group(&self) -> bool {
        true
    }
}

impl Dialect for ClangClDialect {
    fn vendor(&self) -> Vendor {
        Vendor::ClangCl
    }

    fn object_extension(&self) -> &'static str {
        ".obj"
    }

    fn version_probe(&self) -> VersionProbe {
        VersionProbe::CLANG
    }

    fn compiler_options(&self, kind: CompilerKind) -> OptionSet {
        let mut options = msvc::cl_options(kind);
        if kind == CompilerKind::Native {
            options.push(
                OptionGroup::new(
                    "clang",
                    vec![CommandLineOption::texts(names::CLANG_OPTIONS, "")],
                )
                .with_prefix("-Xclang"),
            );
        }
        options
    }

    fn bind_source(&self, options: &mut OptionSet, slot: InputSlot, input: &Path) {
        msvc::cl_bind_source(options, slot, input);
    }

    fn render_compile_settings(&self, settings: &NativeSettings) -> Vec<String> {
        msvc::cl_compile_settings(settings)
    }

    fn linker_options(&self, role: LinkerRole) -> OptionSet {
        msvc::link_exe_options(role)
    }

    fn render_link_settings(&self, role: LinkerRole, settings: &NativeSettings) -> Vec<String> {
        msvc::link_exe_settings(role, settings)
    }

    fn output_extension(&self, role: LinkerRole) -> &'static str {
        msvc::windows_output_extension(role)
    }

    fn shared_library_extension(&self) -> &'static str {
        ".dll"
    }

    fn explicit_import_library(&self, out: &Path) -> Option<PathBuf> {
        msvc::MsvcDialect.explicit_import_library(out)
    }

    fn default_import_library(&self, _role: LinkerRole, output: &Path) -> PathBuf {
        msvc::windows_import_library(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::{Compiler, Linker, Program};
    use crate::core::options::OptionValue;

    #[test]
    fn test_clang_cl_prefixes_clang_options() {
        let mut cl = Compiler::new(Vendor::ClangCl, CompilerKind::Native, "clang-cl.exe");
        cl.set_option(
            names::CLANG_OPTIONS,
            OptionValue::Texts(vec!["-fno-color-diagnostics".to_string()]),
        )
        .unwrap();
        cl.set_source_file(Path::new("a.c"), Path::new("a.obj")).unwrap();

        let cmd = cl.command().unwrap().unwrap();
        let pos = cmd.args.iter().position(|a| a == "-Xclang").unwrap();
        assert_eq!(cmd.args[pos + 1], "-fno-color-diagnostics");
        assert!(cmd.args.contains(&"/Foa.obj".to_string()));
    }

    #[test]
    fn test_clang_linker_is_gnu_style() {
        let mut ld = Linker::new(Vendor::Clang, LinkerRole::Linker, "/usr/bin/clang");
        ld.set_object_files(vec![PathBuf::from("/obj/a.o")]).unwrap();
        ld.set_output_file(Path::new("/out/app")).unwrap();
        ld.set_input_library_dependencies(vec![PathBuf::from("/lib/libq.a")])
            .unwrap();

        let cmd = ld.command().unwrap().unwrap();
        assert_eq!(
            cmd.args,
            vec![
                "-o",
                "/out/app",
                "/obj/a.o",
                "-Wl,--start-group",
                "/lib/libq.a",
                "-Wl,--end-group"
            ]
        );
    }
}
