//! Dependency markers between a target and the packages it builds with.
//!
//! A Dependency names the package providing something a target needs.
//! Dummy dependencies exist for build ordering only: the target needs the
//! package's tools to exist, but links nothing from it.

use std::fmt;

use serde::Serialize;

use crate::core::package::{PackageId, UnresolvedPackage};

/// What a dependency points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyTarget {
    Resolved(PackageId),
    Unresolved(UnresolvedPackage),
}

impl fmt::Display for DependencyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyTarget::Resolved(id) => write!(f, "{}", id),
            DependencyTarget::Unresolved(pkg) => write!(f, "{}", pkg),
        }
    }
}

impl Serialize for DependencyTarget {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A dependency specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    /// The package depended upon
    package: DependencyTarget,

    /// Present for ordering only, not for linking
    dummy: bool,
}

impl Dependency {
    /// Create a new (linking) dependency.
    pub fn new(package: DependencyTarget) -> Self {
        Dependency {
            package,
            dummy: false,
        }
    }

    /// Create an ordering-only dependency.
    pub fn dummy(package: DependencyTarget) -> Self {
        Dependency {
            package,
            dummy: true,
        }
    }

    pub fn package(&self) -> &DependencyTarget {
        &self.package
    }

    pub fn is_dummy(&self) -> bool {
        self.dummy
    }
}

impl From<PackageId> for DependencyTarget {
    fn from(id: PackageId) -> Self {
        DependencyTarget::Resolved(id)
    }
}

impl From<UnresolvedPackage> for DependencyTarget {
    fn from(pkg: UnresolvedPackage) -> Self {
        DependencyTarget::Unresolved(pkg)
    }
}
