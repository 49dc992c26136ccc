//! Build commands: one executable invocation plus its dependency edges.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::util::fs::normalize_path;
use crate::util::hash::Fingerprint;

/// A command to execute, with program, arguments, environment and the
/// commands that must run before it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Command {
    /// The program to run (e.g., "gcc", "cl.exe")
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
    /// Environment variables to set
    pub env: Vec<(String, String)>,
    /// Directory to run in
    pub working_dir: Option<PathBuf>,
    /// Display name (normalized path of the main input or output)
    pub name: String,
    /// Short display name (file name only)
    pub name_short: String,
    /// Make-style dependency file written by the tool
    pub deps_file: Option<PathBuf>,
    pub inputs: BTreeSet<PathBuf>,
    pub outputs: BTreeSet<PathBuf>,
    /// Commands that must complete first
    #[serde(skip)]
    pub dependencies: Vec<Arc<Command>>,
}

impl Command {
    /// Create a new command.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Command {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Name the command after a file.
    pub fn named(mut self, file: &Path) -> Self {
        self.name = normalize_path(file);
        self.name_short = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self
    }

    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.insert(path.into());
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.outputs.insert(path.into());
        self
    }

    /// A copy of this command that additionally depends on `deps`.
    pub fn with_dependencies(&self, deps: impl IntoIterator<Item = Arc<Command>>) -> Command {
        let mut cmd = self.clone();
        for dep in deps {
            if !cmd.dependencies.iter().any(|d| Arc::ptr_eq(d, &dep)) {
                cmd.dependencies.push(dep);
            }
        }
        cmd
    }

    /// A copy of this command with extra trailing arguments.
    pub fn with_extra_args(&self, extra: &[String]) -> Command {
        let mut cmd = self.clone();
        cmd.args.extend(extra.iter().cloned());
        cmd
    }

    /// Render the command line for display.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    /// Content hash of what the command would execute.
    pub fn fingerprint(&self) -> String {
        let mut fp = Fingerprint::new();
        fp.update_str(&self.program.to_string_lossy());
        fp.update_strs(self.args.iter().map(String::as_str));
        for (k, v) in &self.env {
            fp.update_str(k).update_str(v);
        }
        let cwd = self.working_dir.as_ref().map(|d| d.to_string_lossy());
        fp.update_opt(cwd.as_deref());
        fp.finish_short()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let cmd = Command::new("/usr/bin/gcc")
            .args(["-c", "main.c"])
            .arg("-o")
            .arg("main.o")
            .named(Path::new("/src/main.c"))
            .input("/src/main.c")
            .output("/obj/main.o");

        assert_eq!(cmd.display_command(), "/usr/bin/gcc -c main.c -o main.o");
        assert_eq!(cmd.name, "/src/main.c");
        assert_eq!(cmd.name_short, "main.c");
        assert!(cmd.outputs.contains(Path::new("/obj/main.o")));
    }

    #[test]
    fn test_with_dependencies_dedups() {
        let dep = Arc::new(Command::new("gen"));
        let cmd = Command::new("cc").with_dependencies(vec![dep.clone(), dep.clone()]);
        assert_eq!(cmd.dependencies.len(), 1);

        let again = cmd.with_dependencies(vec![dep]);
        assert_eq!(again.dependencies.len(), 1);
    }

    #[test]
    fn test_fingerprint_tracks_args() {
        let a = Command::new("cc").arg("-O2");
        let b = Command::new("cc").arg("-O2");
        let c = Command::new("cc").arg("-O0");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
    }
}
