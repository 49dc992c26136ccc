//! Tool version probing.
//!
//! A probe runs the tool with a vendor flag and extracts a dotted version
//! from its output. Failures are soft: the zero version is returned.

use std::path::Path;

use regex::Regex;

use crate::core::version::Version;
use crate::util::process::ProcessBuilder;

/// How to query a tool for its version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionProbe {
    pub args: &'static [&'static str],
    /// Regex whose groups 1-3 are major, minor and patch
    pub pattern: &'static str,
    /// Capture group of an optional fourth component
    pub tweak_group: Option<usize>,
    /// The tool reports its version while exiting with an error (cl.exe)
    pub expect_failure: bool,
}

impl VersionProbe {
    /// `cl.exe`, `link.exe` and friends.
    pub const MSVC: VersionProbe = VersionProbe {
        args: &["--version"],
        pattern: r"(\d+)\.(\d+)\.(\d+)(\.(\d+))?",
        tweak_group: Some(5),
        expect_failure: true,
    };

    /// `clang -v`.
    pub const CLANG: VersionProbe = VersionProbe {
        args: &["-v"],
        pattern: r"clang version (\d+)\.(\d+)\.(\d+)",
        tweak_group: None,
        expect_failure: false,
    };

    /// `gcc -v`.
    pub const GNU: VersionProbe = VersionProbe {
        args: &["-v"],
        pattern: r"(\d+)\.(\d+)\.(\d+)",
        tweak_group: None,
        expect_failure: false,
    };

    /// binutils tools (`ar`, `as`) report `major.minor` on `--version`.
    pub const BINUTILS: VersionProbe = VersionProbe {
        args: &["--version"],
        pattern: r"(\d+)\.(\d+)(?:\.(\d+))?",
        tweak_group: None,
        expect_failure: false,
    };

    /// Extract a version from captured output.
    ///
    /// stderr is searched first, stdout when stderr is empty. Returns
    /// `None` when the exit status is not the expected one or nothing
    /// matches.
    pub fn parse(&self, success: bool, stdout: &str, stderr: &str) -> Option<Version> {
        if success == self.expect_failure {
            return None;
        }

        let text = if stderr.trim().is_empty() { stdout } else { stderr };
        let re = Regex::new(self.pattern).ok()?;
        let caps = re.captures(text)?;
        Version::from_captures(&caps, self.tweak_group)
    }
}

/// Run `program` and extract its version, or the zero version on failure.
pub fn probe_version(program: &Path, probe: &VersionProbe) -> Version {
    let output = match ProcessBuilder::new(program).args(probe.args).exec() {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!("version probe of {} failed: {:#}", program.display(), e);
            return Version::zero();
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    match probe.parse(output.status.success(), &stdout, &stderr) {
        Some(v) => {
            tracing::debug!("{} reports version {}", program.display(), v);
            v
        }
        None => {
            tracing::debug!("no version found in output of {}", program.display());
            Version::zero()
        }
    }
}
