//! Visual Studio and Windows SDK discovery.
//!
//! The lookups take their roots as arguments so they can be exercised on
//! any host against a fake directory tree.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::builder::errors::ToolchainError;
use crate::core::version::Version;
use crate::util::process::ProcessBuilder;

use super::VersionProbe;

/// `VS{n}COMNTOOLS` variables, newest first.
const COMNTOOLS_VERSIONS: &[u64] = &[150, 140, 120, 110, 100, 90, 80];

/// Visual Studio 2017 editions probed under Program Files.
const VS2017_EDITIONS: &[&str] = &["Enterprise", "Professional", "Community"];

/// Windows SDK majors, newest first.
const WINDOWS_KITS: &[&str] = &["10", "8.1", "8.0", "7.1A", "7.0A", "6.0A"];

/// A located Visual Studio installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualStudio {
    /// The `VC` directory
    pub vc_root: PathBuf,
    pub version: Version,
}

/// Tool and library locations of one VC toolset for a host/target pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcToolset {
    pub compiler: PathBuf,
    pub include_dirs: Vec<PathBuf>,
    pub link_dirs: Vec<PathBuf>,
}

/// A located Windows SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowsKit {
    pub root: PathBuf,
    /// Versioned subdirectory (`10.0.22621.0`), Windows 10+ kits only
    pub version: Option<String>,
}

/// Toolchain directory suffix of an architecture.
pub fn arch_dir(arch: &str) -> Result<&'static str, ToolchainError> {
    match arch {
        "x86_64" => Ok("x64"),
        "x86" => Ok("x86"),
        other => Err(ToolchainError::UnknownArch(other.to_string())),
    }
}

/// Parse a Visual Studio version string, failing when it does not look
/// like one.
pub fn parse_vs_version(text: &str) -> Result<Version, ToolchainError> {
    let bad = || ToolchainError::BadVersion {
        tool: "Visual Studio".to_string(),
        text: text.to_string(),
    };
    let re = Regex::new(VersionProbe::MSVC.pattern).map_err(|_| bad())?;
    let caps = re.captures(text).ok_or_else(bad)?;
    Version::from_captures(&caps, VersionProbe::MSVC.tweak_group).ok_or_else(bad)
}

/// Find the newest Visual Studio.
///
/// Tries `vswhere`, then the `VS{n}COMNTOOLS` variables, then the
/// VS 2017 editions under `program_files_x86`.
pub fn find_visual_studio(program_files_x86: &Path) -> Result<VisualStudio, ToolchainError> {
    let mut searched = Vec::new();

    let vswhere = program_files_x86
        .join("Microsoft Visual Studio")
        .join("Installer")
        .join("vswhere.exe");
    searched.push(vswhere.display().to_string());
    if vswhere.exists() {
        if let Some(vs) = query_vswhere(&vswhere)? {
            return Ok(vs);
        }
    }

    for n in COMNTOOLS_VERSIONS {
        let var = format!("VS{}COMNTOOLS", n);
        searched.push(format!("${}", var));
        let Ok(tools) = std::env::var(&var) else {
            continue;
        };
        // %VSxxxCOMNTOOLS% is <install>/Common7/Tools
        let vc_root = Path::new(&tools).join("..").join("..").join("VC");
        if vc_root.exists() {
            tracing::debug!("found Visual Studio via {}", var);
            return Ok(VisualStudio {
                vc_root,
                version: Version::new(n / 10, 0, 0),
            });
        }
    }

    let vs2017 = program_files_x86.join("Microsoft Visual Studio").join("2017");
    for edition in VS2017_EDITIONS {
        let vc_root = vs2017.join(edition).join("VC");
        searched.push(vc_root.display().to_string());
        if vc_root.exists() {
            return Ok(VisualStudio {
                vc_root,
                version: Version::new(15, 0, 0),
            });
        }
    }

    Err(ToolchainError::NotFound {
        vendor: "msvc".to_string(),
        searched,
    })
}

fn query_vswhere(vswhere: &Path) -> Result<Option<VisualStudio>, ToolchainError> {
    let property = |name: &str| -> Option<String> {
        let output = ProcessBuilder::new(vswhere)
            .args(["-latest", "-products", "*", "-property", name])
            .exec()
            .ok()?;
        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (output.status.success() && !value.is_empty()).then_some(value)
    };

    let Some(path) = property("installationPath") else {
        tracing::debug!("vswhere reported no installation");
        return Ok(None);
    };
    let text = property("installationVersion").unwrap_or_default();
    let version = parse_vs_version(&text)?;

    tracing::debug!("found Visual Studio {} at {}", version, path);
    Ok(Some(VisualStudio {
        vc_root: PathBuf::from(path).join("VC"),
        version,
    }))
}

/// Locate the compiler and VC directories for a host/target pair.
///
/// `host` and `target` are directory suffixes from [`arch_dir`].
pub fn vc_toolset(vs: &VisualStudio, host: &str, target: &str) -> Result<VcToolset, ToolchainError> {
    if vs.version.major() >= 15 {
        let version_file = vs
            .vc_root
            .join("Auxiliary")
            .join("Build")
            .join("Microsoft.VCToolsVersion.default.txt");
        let tools_version = std::fs::read_to_string(&version_file).map_err(|source| ToolchainError::Io {
            path: version_file.clone(),
            source,
        })?;
        let root = vs
            .vc_root
            .join("Tools")
            .join("MSVC")
            .join(tools_version.trim());
        let host_dir = format!("Host{}", host);

        return Ok(VcToolset {
            compiler: root.join("bin").join(host_dir).join(target).join("cl.exe"),
            include_dirs: vec![root.join("include"), root.join("ATLMFC").join("include")],
            link_dirs: vec![
                root.join("lib").join(target),
                root.join("ATLMFC").join("lib").join(target),
            ],
        });
    }

    // VS 2015 and older: bin/, bin/amd64/, bin/x86_amd64/
    let root = &vs.vc_root;
    let bin = match (host, target) {
        ("x86", "x86") => root.join("bin"),
        ("x64", "x64") => root.join("bin").join("amd64"),
        (h, t) => root.join("bin").join(format!("{}_{}", legacy_arch(h), legacy_arch(t))),
    };
    let lib = match target {
        "x86" => root.join("lib"),
        t => root.join("lib").join(legacy_arch(t)),
    };
    let atl_lib = match target {
        "x86" => root.join("ATLMFC").join("lib"),
        t => root.join("ATLMFC").join("lib").join(legacy_arch(t)),
    };
    Ok(VcToolset {
        compiler: bin.join("cl.exe"),
        include_dirs: vec![root.join("include"), root.join("ATLMFC").join("include")],
        link_dirs: vec![lib, atl_lib],
    })
}

fn legacy_arch(dir: &str) -> &str {
    match dir {
        "x64" => "amd64",
        other => other,
    }
}

/// Find the newest installed Windows SDK under `program_files_x86`.
pub fn find_windows_kit(program_files_x86: &Path, os_version: Option<&str>) -> Result<WindowsKit, ToolchainError> {
    let kits = program_files_x86.join("Windows Kits");
    for major in WINDOWS_KITS {
        let root = kits.join(major);
        if !root.exists() {
            continue;
        }
        let version = if *major == "10" {
            Some(windows_kit10_version(&root.join("Include"), os_version)?)
        } else {
            None
        };
        tracing::debug!("found Windows SDK {} at {}", major, root.display());
        return Ok(WindowsKit { root, version });
    }
    Err(ToolchainError::NoWindowsSdk { root: kits })
}

/// Pick the Windows 10 SDK version directory.
///
/// The directory matching the running OS wins; otherwise the greatest
/// parseable version. Directories whose names are not versions are skipped.
pub fn windows_kit10_version(include_dir: &Path, os_version: Option<&str>) -> Result<String, ToolchainError> {
    if let Some(os) = os_version {
        if include_dir.join(os).is_dir() {
            return Ok(os.to_string());
        }
    }

    let entries = std::fs::read_dir(include_dir).map_err(|source| ToolchainError::Io {
        path: include_dir.to_path_buf(),
        source,
    })?;
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let version: Version = name.parse().ok()?;
            Some((version, name))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, name)| name)
        .ok_or_else(|| ToolchainError::NoWindowsKit10 {
            searched: include_dir.to_path_buf(),
        })
}

impl WindowsKit {
    /// System include directories of the kit.
    pub fn include_dirs(&self) -> Vec<PathBuf> {
        let include = self.root.join("Include");
        match &self.version {
            Some(v) => ["ucrt", "um", "shared", "winrt"]
                .iter()
                .map(|d| include.join(v).join(d))
                .collect(),
            None => vec![include.join("um"), include.join("shared")],
        }
    }

    /// Library directories of the kit for a target suffix.
    pub fn link_dirs(&self, target: &str) -> Vec<PathBuf> {
        let lib = self.root.join("Lib");
        match &self.version {
            Some(v) => ["ucrt", "um"]
                .iter()
                .map(|d| lib.join(v).join(d).join(target))
                .collect(),
            None => vec![lib.join("um").join(target)],
        }
    }
}

/// The running Windows version as a kit directory name (`10.0.22631.0`).
pub fn windows_os_version() -> Option<String> {
    if !cfg!(windows) {
        return None;
    }
    let output = ProcessBuilder::new("cmd").args(["/c", "ver"]).exec().ok()?;
    let text = String::from_utf8_lossy(&output.stdout);
    let re = Regex::new(r"(\d+)\.(\d+)\.(\d+)").ok()?;
    let caps = re.captures(&text)?;
    Some(format!("{}.{}.{}.0", &caps[1], &caps[2], &caps[3]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_arch_dir() {
        assert_eq!(arch_dir("x86_64").unwrap(), "x64");
        assert_eq!(arch_dir("x86").unwrap(), "x86");
        assert!(matches!(arch_dir("amd64"), Err(ToolchainError::UnknownArch(_))));
        assert!(matches!(arch_dir("i686"), Err(ToolchainError::UnknownArch(_))));
        assert!(matches!(
            arch_dir("aarch64"),
            Err(ToolchainError::UnknownArch(a)) if a == "aarch64"
        ));
    }

    #[test]
    fn test_parse_vs_version() {
        assert_eq!(
            parse_vs_version("17.8.34330.188").unwrap(),
            Version::with_tweak(17, 8, 34330, 188)
        );
        assert!(matches!(
            parse_vs_version("preview"),
            Err(ToolchainError::BadVersion { .. })
        ));
    }

    #[test]
    fn test_kit10_prefers_os_version() {
        let tmp = TempDir::new().unwrap();
        for d in ["10.0.19041.0", "10.0.22621.0", "wdf"] {
            fs::create_dir_all(tmp.path().join(d)).unwrap();
        }
        assert_eq!(
            windows_kit10_version(tmp.path(), Some("10.0.19041.0")).unwrap(),
            "10.0.19041.0"
        );
        assert_eq!(
            windows_kit10_version(tmp.path(), Some("10.0.99999.0")).unwrap(),
            "10.0.22621.0"
        );
        assert_eq!(windows_kit10_version(tmp.path(), None).unwrap(), "10.0.22621.0");
    }

    #[test]
    fn test_kit10_without_versions() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("wdf")).unwrap();
        assert!(matches!(
            windows_kit10_version(tmp.path(), None),
            Err(ToolchainError::NoWindowsKit10 { .. })
        ));
    }

    #[test]
    fn test_find_windows_kit() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            find_windows_kit(tmp.path(), None),
            Err(ToolchainError::NoWindowsSdk { .. })
        ));

        fs::create_dir_all(tmp.path().join("Windows Kits/8.1")).unwrap();
        let kit = find_windows_kit(tmp.path(), None).unwrap();
        assert!(kit.version.is_none());

        fs::create_dir_all(tmp.path().join("Windows Kits/10/Include/10.0.22621.0")).unwrap();
        let kit = find_windows_kit(tmp.path(), None).unwrap();
        assert_eq!(kit.version.as_deref(), Some("10.0.22621.0"));
        assert_eq!(
            kit.link_dirs("x64")[1],
            tmp.path().join("Windows Kits/10/Lib/10.0.22621.0/um/x64")
        );
    }

    #[test]
    fn test_vs2017_layout() {
        let tmp = TempDir::new().unwrap();
        let vc = tmp.path().join("Microsoft Visual Studio/2017/Community/VC");
        let build = vc.join("Auxiliary/Build");
        fs::create_dir_all(&build).unwrap();
        fs::write(build.join("Microsoft.VCToolsVersion.default.txt"), "14.16.27023\r\n").unwrap();

        let vs = find_visual_studio(tmp.path()).unwrap();
        assert_eq!(vs.vc_root, vc);
        assert_eq!(vs.version.major(), 15);

        let toolset = vc_toolset(&vs, "x64", "x86").unwrap();
        assert_eq!(
            toolset.compiler,
            vc.join("Tools/MSVC/14.16.27023/bin/Hostx64/x86/cl.exe")
        );
        assert_eq!(toolset.link_dirs[0], vc.join("Tools/MSVC/14.16.27023/lib/x86"));
    }

    #[test]
    fn test_missing_tools_version_file() {
        let vs = VisualStudio {
            vc_root: PathBuf::from("/nonexistent/VC"),
            version: Version::new(16, 0, 0),
        };
        assert!(matches!(
            vc_toolset(&vs, "x64", "x64"),
            Err(ToolchainError::Io { .. })
        ));
    }

    #[test]
    fn test_legacy_layout() {
        let vs = VisualStudio {
            vc_root: PathBuf::from("/vs14/VC"),
            version: Version::new(14, 0, 0),
        };
        let toolset = vc_toolset(&vs, "x86", "x64").unwrap();
        assert_eq!(toolset.compiler, PathBuf::from("/vs14/VC/bin/x86_amd64/cl.exe"));
        assert_eq!(toolset.link_dirs[0], PathBuf::from("/vs14/VC/lib/amd64"));
    }
}
