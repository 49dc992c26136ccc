//! Generated-file bookkeeping shared across a build session.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::command::Command;

/// Answers whether some build step will eventually produce a path.
pub trait FileTracker: Send + Sync + std::fmt::Debug {
    /// Whether any known command generates `path`.
    fn is_generated_at_all(&self, path: &Path) -> bool;

    /// Learn the outputs of a freshly built command.
    fn record(&self, cmd: &Command);
}

/// Default tracker: remembers every output of every recorded command.
#[derive(Debug, Default)]
pub struct GeneratedFiles {
    files: RwLock<HashSet<PathBuf>>,
}

impl GeneratedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a path as generated.
    pub fn add(&self, path: impl Into<PathBuf>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(path.into());
        }
    }

    pub fn len(&self) -> usize {
        self.files.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FileTracker for GeneratedFiles {
    fn is_generated_at_all(&self, path: &Path) -> bool {
        self.files
            .read()
            .map(|f| f.contains(path))
            .unwrap_or(false)
    }

    fn record(&self, cmd: &Command) {
        if let Ok(mut files) = self.files.write() {
            files.extend(cmd.outputs.iter().cloned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_outputs() {
        let tracker = GeneratedFiles::new();
        assert!(!tracker.is_generated_at_all(Path::new("/gen/version.h")));

        let cmd = Command::new("python").output("/gen/version.h");
        tracker.record(&cmd);
        assert!(tracker.is_generated_at_all(Path::new("/gen/version.h")));

        tracker.add("/gen/config.h");
        assert_eq!(tracker.len(), 2);
    }
}
