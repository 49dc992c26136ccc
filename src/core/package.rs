//! Package identification: dotted paths, concrete ids and unresolved
//! references.
//!
//! Toolchains are registered under stable vendor-qualified paths such as
//! `org.gnu.gcc.gpp` or `com.Microsoft.VisualStudio.VC.cl`. Paths are
//! case-insensitive and stored lower-cased.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::VersionReq;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::core::version::Version;

/// Maximum length of a package path in bytes.
pub const MAX_PATH_LEN: usize = 2048;

/// Error parsing a package path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackagePathError {
    #[error("package path is too long ({0} bytes, must be <= 2048)")]
    TooLong(usize),

    #[error("bad symbol `{symbol}` in package path `{path}`")]
    BadSymbol { path: String, symbol: char },

    #[error("empty element in package path `{0}`")]
    EmptyElement(String),
}

/// A dotted package path, e.g. `org.llvm.clang`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PackagePath {
    elements: Vec<String>,
}

impl PackagePath {
    /// Parse a dotted path. Upper-case letters are folded to lower case.
    pub fn parse(s: &str) -> Result<Self, PackagePathError> {
        if s.len() > MAX_PATH_LEN {
            return Err(PackagePathError::TooLong(s.len()));
        }
        if s.is_empty() {
            return Ok(PackagePath::default());
        }

        if let Some(symbol) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '.' || *c == '_'))
        {
            return Err(PackagePathError::BadSymbol {
                path: s.to_string(),
                symbol,
            });
        }

        let elements: Vec<String> = s.split('.').map(|e| e.to_ascii_lowercase()).collect();
        if elements.iter().any(|e| e.is_empty()) {
            return Err(PackagePathError::EmptyElement(s.to_string()));
        }

        Ok(PackagePath { elements })
    }

    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The first element (`org`, `com`, `pvt`, `loc`, ...).
    pub fn namespace(&self) -> Option<&str> {
        self.elements.first().map(String::as_str)
    }

    /// Whether `self` is a strict prefix of `other`.
    pub fn is_root_of(&self, other: &PackagePath) -> bool {
        self.elements.len() < other.elements.len()
            && self.elements.iter().zip(&other.elements).all(|(a, b)| a == b)
    }

    /// Append an element, returning the extended path.
    pub fn join(&self, element: &str) -> Result<Self, PackagePathError> {
        if self.is_empty() {
            return PackagePath::parse(element);
        }
        PackagePath::parse(&format!("{}.{}", self, element))
    }

    fn namespace_rank(&self) -> u8 {
        match self.namespace() {
            Some("org") => 0,
            Some("pvt") => 1,
            _ => 2,
        }
    }
}

/// Paths order by namespace priority first (`org`, then `pvt`, then
/// everything else), then element-wise. Empty paths sort first.
impl Ord for PackagePath {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
        self.namespace_rank()
            .cmp(&other.namespace_rank())
            .then_with(|| self.elements.cmp(&other.elements))
    }
}

impl PartialOrd for PackagePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for PackagePath {
    type Err = PackagePathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PackagePath::parse(s)
    }
}

impl fmt::Display for PackagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.elements.join("."))
    }
}

impl Serialize for PackagePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A concrete package: path plus version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId {
    pub path: PackagePath,
    pub version: Version,
}

impl PackageId {
    pub fn new(path: PackagePath, version: Version) -> Self {
        PackageId { path, version }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.path, self.version)
    }
}

impl Serialize for PackageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A package reference whose version is resolved late.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedPackage {
    pub path: PackagePath,
    pub range: VersionReq,
}

impl UnresolvedPackage {
    pub fn new(path: PackagePath, range: VersionReq) -> Self {
        UnresolvedPackage { path, range }
    }

    /// Any version of `path`.
    pub fn any(path: PackagePath) -> Self {
        UnresolvedPackage {
            path,
            range: VersionReq::STAR,
        }
    }

    /// Whether a concrete version satisfies the range.
    pub fn matches(&self, version: &Version) -> bool {
        self.range.matches(&version.to_semver())
    }

    /// Whether a concrete id satisfies this reference.
    pub fn contains(&self, id: &PackageId) -> bool {
        self.path == id.path && self.matches(&id.version)
    }
}

impl fmt::Display for UnresolvedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.path, self.range)
    }
}

/// Resolves an unresolved package reference to a concrete id.
pub trait PackageResolver: Send + Sync {
    fn resolve(&self, package: &UnresolvedPackage) -> Option<PackageId>;
}
