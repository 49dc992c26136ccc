//! Configuration file support for cinder.
//!
//! Two configuration file locations are consulted:
//! - Global: `~/.cinder/config.toml` - User-wide defaults
//! - Project: `.cinder/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// cinder configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Toolchain detection settings
    pub toolchain: ToolchainSettings,

    /// Build layout settings
    pub build: BuildConfig,
}

/// Which vendor provides the default compilers after detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreferredVendor {
    /// GNU on POSIX, MSVC on Windows
    #[default]
    Native,
    Gnu,
    Clang,
    ClangCl,
    Msvc,
}

/// Toolchain detection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// Vendor whose compilers become active for each extension
    pub prefer: Option<PreferredVendor>,

    /// Resolve detected executables through symlinks
    pub resolve_executables: Option<bool>,

    /// LLVM installation root (Windows only; defaults to `C:\Program Files\LLVM`)
    pub llvm_root: Option<PathBuf>,

    /// Override for `Program Files (x86)` used by Visual Studio discovery
    pub program_files_x86: Option<PathBuf>,

    /// Link directories appended to every detected linker
    #[serde(default)]
    pub extra_link_dirs: Vec<PathBuf>,
}

/// Build layout configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Object directory name relative to the binary directory
    pub object_dir: Option<String>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration with fallback to defaults if the file is missing
    /// or malformed.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        let tc = other.toolchain;
        if tc.prefer.is_some() {
            self.toolchain.prefer = tc.prefer;
        }
        if tc.resolve_executables.is_some() {
            self.toolchain.resolve_executables = tc.resolve_executables;
        }
        if tc.llvm_root.is_some() {
            self.toolchain.llvm_root = tc.llvm_root;
        }
        if tc.program_files_x86.is_some() {
            self.toolchain.program_files_x86 = tc.program_files_x86;
        }
        if !tc.extra_link_dirs.is_empty() {
            self.toolchain.extra_link_dirs = tc.extra_link_dirs;
        }
        if other.build.object_dir.is_some() {
            self.build.object_dir = other.build.object_dir;
        }
    }

    /// Preferred vendor, `Native` when unset.
    pub fn preferred_vendor(&self) -> PreferredVendor {
        self.toolchain.prefer.unwrap_or_default()
    }

    /// Whether detected executable paths are canonicalized.
    pub fn resolve_executables(&self) -> bool {
        self.toolchain.resolve_executables.unwrap_or(false)
    }

    /// Object directory name under the binary directory.
    pub fn object_dir(&self) -> &str {
        self.build.object_dir.as_deref().unwrap_or("obj")
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.cinder/config.toml)
/// 2. Global config (~/.cinder/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        if global_path.exists() {
            config.merge(Config::load_or_default(global_path));
        }
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global cinder config directory (~/.cinder).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".cinder"))
}

/// Get the global config path (~/.cinder/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.cinder/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".cinder").join("config.toml")
}

/// Load the merged configuration for a project directory.
pub fn load_for_project(project_root: &Path) -> Config {
    let global = global_config_path();
    load_config(global.as_deref(), &project_config_path(project_root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_config() {
        let config = Config::parse(
            r#"
[toolchain]
prefer = "clang"
resolve_executables = true
extra_link_dirs = ["/opt/lib"]

[build]
object_dir = "objects"
"#,
        )
        .unwrap();

        assert_eq!(config.preferred_vendor(), PreferredVendor::Clang);
        assert!(config.resolve_executables());
        assert_eq!(config.toolchain.extra_link_dirs, vec![PathBuf::from("/opt/lib")]);
        assert_eq!(config.object_dir(), "objects");
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.preferred_vendor(), PreferredVendor::Native);
        assert!(!config.resolve_executables());
        assert_eq!(config.object_dir(), "obj");
    }

    #[test]
    fn test_project_overrides_global() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global.toml");
        let project = tmp.path().join("project.toml");

        std::fs::write(
            &global,
            "[toolchain]\nprefer = \"gnu\"\nllvm_root = \"/llvm\"\n",
        )
        .unwrap();
        std::fs::write(&project, "[toolchain]\nprefer = \"clang-cl\"\n").unwrap();

        let config = load_config(Some(&global), &project);
        assert_eq!(config.preferred_vendor(), PreferredVendor::ClangCl);
        assert_eq!(config.toolchain.llvm_root, Some(PathBuf::from("/llvm")));
    }

    #[test]
    fn test_malformed_config_falls_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[toolchain\nprefer = ").unwrap();

        let config = Config::load_or_default(&path);
        assert_eq!(config.preferred_vendor(), PreferredVendor::Native);
    }
}
