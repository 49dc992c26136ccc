//! Native toolchain detection.
//!
//! Detection registers every program it finds into a [`Registry`] under a
//! stable package path, then activates one default provider per source
//! extension.

use std::path::{Path, PathBuf};

use crate::builder::errors::ToolchainError;
use crate::builder::registry::Registry;
use crate::core::language::Language;
use crate::core::options::{NativeOptions, NativeSettings, OptionValue};
use crate::core::package::PackagePath;
use crate::core::solution::BuildSettings;
use crate::util::config::{Config, PreferredVendor};
use crate::util::process::find_executable;

use super::windows;
use super::{names, Compiler, CompilerKind, InputSlot, Linker, LinkerRole, Program, Vendor, VersionProbe};

/// C++ source extensions (case-sensitive).
pub const CPP_EXTENSIONS: &[&str] = &[".cpp", ".cxx", ".c++", ".cc", ".CPP", ".C++", ".CXX", ".C", ".CC"];

/// Stable package paths of detected programs.
pub mod ids {
    pub const MSVC_LINK: &str = "com.Microsoft.VisualStudio.VC.link";
    pub const MSVC_LIB: &str = "com.Microsoft.VisualStudio.VC.lib";
    pub const MSVC_ML: &str = "com.Microsoft.VisualStudio.VC.ml";
    pub const MSVC_CL: &str = "com.Microsoft.VisualStudio.VC.cl";
    pub const MSVC_CLPP: &str = "com.Microsoft.VisualStudio.VC.clpp";
    pub const LLVM_CLANG: &str = "org.LLVM.clang";
    pub const LLVM_CLANGPP: &str = "org.LLVM.clangpp";
    pub const LLVM_CLANG_CL: &str = "org.LLVM.clang_cl";
    pub const LLVM_CLANG_LD: &str = "org.LLVM.clang.ld";
    pub const GNU_AR: &str = "org.gnu.binutils.ar";
    pub const GNU_LD: &str = "org.gnu.gcc.ld";
    pub const GNU_AS: &str = "org.gnu.gcc.as";
    pub const GNU_GCC: &str = "org.gnu.gcc.gcc";
    pub const GNU_GPP: &str = "org.gnu.gcc.gpp";

    use super::Vendor;

    /// Linker and librarian used with compilers of a vendor.
    pub fn link_programs(vendor: Vendor) -> (&'static str, &'static str) {
        match vendor {
            Vendor::Gnu => (GNU_LD, GNU_AR),
            Vendor::Clang => (LLVM_CLANG_LD, GNU_AR),
            Vendor::Msvc | Vendor::ClangCl => (MSVC_LINK, MSVC_LIB),
        }
    }
}

/// Default LLVM install location on Windows.
const DEFAULT_LLVM_ROOT: &str = r"c:\Program Files\LLVM";

/// Baseline libraries of every POSIX linker.
const POSIX_LIBRARIES: &[&str] = &["stdc++", "stdc++fs", "pthread", "dl", "m"];

fn package(id: &str) -> Result<PackagePath, ToolchainError> {
    Ok(PackagePath::parse(id)?)
}

/// Detect native compilers, linkers and librarians into `registry` and
/// activate the default provider of each extension.
///
/// On POSIX a missing tool is skipped. On Windows a missing Visual Studio
/// or SDK is fatal.
pub fn detect_native_compilers(
    registry: &Registry,
    settings: &BuildSettings,
    config: &Config,
) -> Result<(), ToolchainError> {
    if cfg!(windows) {
        detect_windows(registry, settings, config)?;
    } else {
        detect_posix(registry, settings, config)?;
    }
    activate_defaults(registry, config);

    tracing::info!(
        "detected {} programs, {} active extensions",
        registry.programs().len(),
        registry.active_extensions().len()
    );
    Ok(())
}

/// Activate one provider per extension.
///
/// The platform default goes first so a preferred vendor that is not
/// installed leaves the default in place.
fn activate_defaults(registry: &Registry, config: &Config) {
    let native: &[&str] = if cfg!(windows) {
        &[ids::MSVC_ML, ids::MSVC_CL, ids::MSVC_CLPP]
    } else {
        &[ids::GNU_AS, ids::GNU_GCC, ids::GNU_GPP]
    };
    let preferred: &[&str] = match config.preferred_vendor() {
        PreferredVendor::Native => &[],
        PreferredVendor::Gnu => &[ids::GNU_AS, ids::GNU_GCC, ids::GNU_GPP],
        PreferredVendor::Clang => &[ids::LLVM_CLANG, ids::LLVM_CLANGPP],
        PreferredVendor::ClangCl => &[ids::LLVM_CLANG_CL],
        PreferredVendor::Msvc => &[ids::MSVC_ML, ids::MSVC_CL, ids::MSVC_CLPP],
    };

    for id in native.iter().chain(preferred) {
        match PackagePath::parse(id) {
            Ok(path) => {
                if !registry.activate_language(&path, None) {
                    tracing::debug!("{} is not available", id);
                }
            }
            Err(e) => tracing::debug!("invalid package path {}: {}", id, e),
        }
    }
}

fn resolve_tool(name: &str, config: &Config) -> Option<PathBuf> {
    let Some(path) = find_executable(name) else {
        tracing::debug!("{} not found on PATH", name);
        return None;
    };
    if config.resolve_executables() {
        return Some(std::fs::canonicalize(&path).unwrap_or(path));
    }
    Some(path)
}

/// Link directories added to every POSIX linker and librarian.
pub fn posix_link_options(settings: &BuildSettings, config: &Config) -> NativeOptions {
    let mut opts = NativeOptions::default();
    opts.link_dir("/lib")
        .link_dir(format!("/lib/{}-linux-gnu", settings.target_arch));
    for dir in &config.toolchain.extra_link_dirs {
        opts.link_dir(dir.clone());
    }
    opts
}

/// A GNU-style link driver carrying the POSIX baseline libraries.
fn posix_linker(vendor: Vendor, driver: &Path, lopts: &NativeOptions) -> Result<Linker, ToolchainError> {
    let mut ld = Linker::new(vendor, LinkerRole::Linker, driver);
    ld.set_settings(with_system(lopts))?;
    ld.set_option(
        names::SYSTEM_LIBRARIES,
        OptionValue::Texts(POSIX_LIBRARIES.iter().map(|l| l.to_string()).collect()),
    )?;
    Ok(ld)
}

fn with_system(system: &NativeOptions) -> NativeSettings {
    NativeSettings {
        user: NativeOptions::default(),
        system: system.clone(),
    }
}

fn detect_posix(registry: &Registry, settings: &BuildSettings, config: &Config) -> Result<(), ToolchainError> {
    let lopts = posix_link_options(settings, config);

    if let Some(ar) = resolve_tool("ar", config) {
        let mut lib = Linker::new(Vendor::Gnu, LinkerRole::Librarian, ar);
        lib.base_mut().set_version_probe(VersionProbe::BINUTILS);
        lib.set_settings(with_system(&lopts))?;
        registry.register_program(package(ids::GNU_AR)?, lib);
    }

    if let Some(gcc) = resolve_tool("gcc", config) {
        registry.register_program(package(ids::GNU_LD)?, posix_linker(Vendor::Gnu, &gcc, &lopts)?);

        let cc = Compiler::new(Vendor::Gnu, CompilerKind::Native, &gcc);
        registry.register_program_and_language(
            package(ids::GNU_GCC)?,
            Language::new(cc).with_extensions([".c"]).with_slot(InputSlot::C),
        );
    }

    if let Some(gpp) = resolve_tool("g++", config) {
        let cxx = Compiler::new(Vendor::Gnu, CompilerKind::Native, gpp);
        registry.register_program_and_language(
            package(ids::GNU_GPP)?,
            Language::new(cxx)
                .with_extensions(CPP_EXTENSIONS.iter().copied())
                .with_slot(InputSlot::Cxx),
        );
    }

    if let Some(gas) = resolve_tool("as", config) {
        let mut asm = Compiler::new(Vendor::Gnu, CompilerKind::Assembler, gas);
        // `as -v` waits for input on stdin
        asm.base_mut().set_version_probe(VersionProbe::BINUTILS);
        registry.register_program_and_language(
            package(ids::GNU_AS)?,
            Language::new(asm).with_extensions([".s", ".S"]),
        );
    }

    if let Some(clang) = resolve_tool("clang", config) {
        registry.register_program(package(ids::LLVM_CLANG_LD)?, posix_linker(Vendor::Clang, &clang, &lopts)?);

        let cc = Compiler::new(Vendor::Clang, CompilerKind::Native, &clang);
        registry.register_program_and_language(
            package(ids::LLVM_CLANG)?,
            Language::new(cc).with_extensions([".c"]).with_slot(InputSlot::C),
        );
    }

    if let Some(clangpp) = resolve_tool("clang++", config) {
        let cxx = Compiler::new(Vendor::Clang, CompilerKind::Native, clangpp);
        registry.register_program_and_language(
            package(ids::LLVM_CLANGPP)?,
            Language::new(cxx)
                .with_extensions(CPP_EXTENSIONS.iter().copied())
                .with_slot(InputSlot::Cxx),
        );
    }

    Ok(())
}

fn program_files_x86(config: &Config) -> PathBuf {
    config
        .toolchain
        .program_files_x86
        .clone()
        .or_else(|| std::env::var_os("ProgramFiles(x86)").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(r"C:\Program Files (x86)"))
}

fn detect_windows(registry: &Registry, settings: &BuildSettings, config: &Config) -> Result<(), ToolchainError> {
    let target = windows::arch_dir(&settings.target_arch)?;
    let host = match target {
        "x86" => "x86",
        _ => windows::arch_dir(&settings.host_arch)?,
    };

    let pf86 = program_files_x86(config);
    let vs = windows::find_visual_studio(&pf86)?;
    let toolset = windows::vc_toolset(&vs, host, target)?;
    let kit = windows::find_windows_kit(&pf86, windows::windows_os_version().as_deref())?;
    tracing::info!(
        "using Visual Studio {} at {}",
        vs.version,
        vs.vc_root.display()
    );

    // Windows SDK include directories, shared with clang
    let mut kit_copts = NativeOptions::default();
    for dir in kit.include_dirs() {
        kit_copts.include_dir(dir);
    }
    let mut copts = NativeOptions::default();
    for dir in &toolset.include_dirs {
        copts.include_dir(dir.clone());
    }
    copts.include_directories.extend(kit_copts.include_directories.iter().cloned());

    let mut lopts = NativeOptions::default();
    for dir in toolset.link_dirs.iter().chain(&kit.link_dirs(target)) {
        lopts.link_dir(dir.clone());
    }
    for dir in &config.toolchain.extra_link_dirs {
        lopts.link_dir(dir.clone());
    }

    let bin = toolset
        .compiler
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    for (id, role, exe) in [
        (ids::MSVC_LINK, LinkerRole::Linker, "link.exe"),
        (ids::MSVC_LIB, LinkerRole::Librarian, "lib.exe"),
    ] {
        let mut tool = Linker::new(Vendor::Msvc, role, bin.join(exe));
        tool.set_settings(with_system(&lopts))?;
        if target == "x86" {
            tool.set_option(names::MACHINE, OptionValue::Text(Some("X86".to_string())))?;
        }
        registry.register_program(package(id)?, tool);
    }

    let ml = if host == "x64" { "ml64.exe" } else { "ml.exe" };
    let mut asm = Compiler::new(Vendor::Msvc, CompilerKind::Assembler, bin.join(ml));
    asm.set_settings(with_system(&copts))?;
    registry.register_program_and_language(
        package(ids::MSVC_ML)?,
        Language::new(asm).with_extensions([".asm"]),
    );

    let mut cl = Compiler::new(Vendor::Msvc, CompilerKind::Native, &toolset.compiler);
    cl.set_settings(with_system(&copts))?;
    let clpp = cl.clone();
    registry.register_program_and_language(
        package(ids::MSVC_CL)?,
        Language::new(cl).with_extensions([".c"]).with_slot(InputSlot::C),
    );
    registry.register_program_and_language(
        package(ids::MSVC_CLPP)?,
        Language::new(clpp)
            .with_extensions(CPP_EXTENSIONS.iter().copied())
            .with_slot(InputSlot::Cxx),
    );

    let llvm_root = config
        .toolchain
        .llvm_root
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LLVM_ROOT));
    detect_windows_llvm(registry, &llvm_root, &copts, &kit_copts)
}

fn detect_windows_llvm(
    registry: &Registry,
    llvm_root: &Path,
    copts: &NativeOptions,
    kit_copts: &NativeOptions,
) -> Result<(), ToolchainError> {
    let bin = llvm_root.join("bin");

    for (id, exe, extensions, slot) in [
        (ids::LLVM_CLANG, "clang.exe", &[".c"][..], InputSlot::C),
        (ids::LLVM_CLANGPP, "clang++.exe", CPP_EXTENSIONS, InputSlot::Cxx),
    ] {
        let path = bin.join(exe);
        if !path.exists() {
            tracing::debug!("{} not found", path.display());
            continue;
        }
        let mut cc = Compiler::new(Vendor::Clang, CompilerKind::Native, path);
        let mut system = kit_copts.clone();
        system.include_dir(clang_include_dir(llvm_root, &cc));
        system.compile_option("-Wno-everything");
        cc.set_settings(with_system(&system))?;
        registry.register_program_and_language(
            package(id)?,
            Language::new(cc)
                .with_extensions(extensions.iter().copied())
                .with_slot(slot),
        );
    }

    let clang_cl = bin.join("clang-cl.exe");
    if clang_cl.exists() {
        let mut cc = Compiler::new(Vendor::ClangCl, CompilerKind::Native, clang_cl);
        cc.set_settings(with_system(copts))?;
        registry.register_program_and_language(
            package(ids::LLVM_CLANG_CL)?,
            Language::new(cc).with_extensions(std::iter::once(".c").chain(CPP_EXTENSIONS.iter().copied())),
        );
    }
    Ok(())
}

/// `lib/clang/<version>/include`, or `lib/clang/<major>/include` as
/// newer LLVM releases lay it out.
fn clang_include_dir(llvm_root: &Path, clang: &Compiler) -> PathBuf {
    let version = clang.version();
    let lib = llvm_root.join("lib").join("clang");
    let full = lib.join(version.to_string()).join("include");
    if full.exists() {
        return full;
    }
    lib.join(version.major().to_string()).join("include")
}
