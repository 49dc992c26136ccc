//! Filesystem utilities.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Enumerate regular files under `dir`.
///
/// Symlinks are not followed and are not reported. A missing directory
/// yields an empty list. Results are sorted.
pub fn enumerate_files(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let mut walker = WalkDir::new(dir).follow_links(false).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
            Err(e) => {
                tracing::debug!("skipping unreadable entry under {}: {}", dir.display(), e);
            }
        }
    }

    files.sort();
    files
}

/// Render a path with forward slashes and no trailing separator.
pub fn normalize_path(path: &Path) -> String {
    let mut s = path.to_string_lossy().replace('\\', "/");
    while s.len() > 1 && s.ends_with('/') {
        s.pop();
    }
    s
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Make a path absolute against the current directory without touching the
/// filesystem.
pub fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Append a suffix to the final component of a path (`out` + `.exe`).
pub fn append_extension(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_enumerate_files() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("main.c"), "int main() {}").unwrap();
        fs::write(src.join("nested/util.c"), "void util() {}").unwrap();

        assert_eq!(enumerate_files(&src, true).len(), 2);
        assert_eq!(enumerate_files(&src, false), vec![src.join("main.c")]);
        assert!(enumerate_files(&tmp.path().join("missing"), true).is_empty());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("C:\\src\\lib\\")), "C:/src/lib");
        assert_eq!(normalize_path(Path::new("/usr/src/")), "/usr/src");
        assert_eq!(normalize_path(Path::new("/")), "/");
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/a/b"), Path::new("/a/b/c/d.c")),
            PathBuf::from("c/d.c")
        );
    }

    #[test]
    fn test_append_extension() {
        assert_eq!(
            append_extension(Path::new("/out/app"), ".exe"),
            PathBuf::from("/out/app.exe")
        );
        assert_eq!(
            append_extension(Path::new("/out/libz.so"), ".a"),
            PathBuf::from("/out/libz.so.a")
        );
    }
}
