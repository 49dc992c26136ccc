//! Dotted numeric tool versions (`19.36.32532`, `14.0.0`, `10.0.22621.0`).
//!
//! Toolchain versions are not semver: MSVC reports four components and
//! GNU binutils two. A zero version means "unknown" and is what a failed
//! probe yields.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use regex::Captures;
use thiserror::Error;

/// Error parsing a version string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version `{0}`")]
pub struct VersionParseError(pub String);

/// A `major.minor.patch[.tweak]` version.
///
/// Ordering and equality are numeric over all four components, so `1.2.3`
/// and `1.2.3.0` compare equal.
#[derive(Debug, Clone, Copy, Default)]
pub struct Version {
    parts: [u64; 4],
    has_tweak: bool,
}

impl Version {
    /// Create a three-component version.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            parts: [major, minor, patch, 0],
            has_tweak: false,
        }
    }

    /// Create a four-component version.
    pub const fn with_tweak(major: u64, minor: u64, patch: u64, tweak: u64) -> Self {
        Version {
            parts: [major, minor, patch, tweak],
            has_tweak: true,
        }
    }

    /// The `0.0.0` version.
    pub const fn zero() -> Self {
        Version::new(0, 0, 0)
    }

    pub fn major(&self) -> u64 {
        self.parts[0]
    }

    pub fn minor(&self) -> u64 {
        self.parts[1]
    }

    pub fn patch(&self) -> u64 {
        self.parts[2]
    }

    pub fn tweak(&self) -> Option<u64> {
        self.has_tweak.then_some(self.parts[3])
    }

    /// Whether this is the zero ("unknown") version.
    pub fn is_zero(&self) -> bool {
        self.parts.iter().all(|&p| p == 0)
    }

    /// Build a version from regex captures: groups 1-3 are major, minor,
    /// patch (patch may be absent), and `tweak_group` an optional fourth.
    pub fn from_captures(caps: &Captures<'_>, tweak_group: Option<usize>) -> Option<Self> {
        let num = |i: usize| -> Option<u64> { caps.get(i).and_then(|m| m.as_str().parse().ok()) };

        let major = num(1)?;
        let minor = num(2)?;
        let patch = num(3).unwrap_or(0);
        match tweak_group.and_then(num) {
            Some(tweak) => Some(Version::with_tweak(major, minor, patch, tweak)),
            None => Some(Version::new(major, minor, patch)),
        }
    }

    /// Convert to a semver version for requirement matching (tweak dropped).
    pub fn to_semver(&self) -> semver::Version {
        semver::Version::new(self.parts[0], self.parts[1], self.parts[2])
    }
}

impl From<semver::Version> for Version {
    fn from(v: semver::Version) -> Self {
        Version::new(v.major, v.minor, v.patch)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts.cmp(&other.parts)
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || VersionParseError(s.to_string());

        let pieces: Vec<&str> = s.trim().split('.').collect();
        if pieces.is_empty() || pieces.len() > 4 {
            return Err(err());
        }

        let mut parts = [0u64; 4];
        for (slot, piece) in parts.iter_mut().zip(&pieces) {
            if piece.is_empty() || !piece.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            *slot = piece.parse().map_err(|_| err())?;
        }

        Ok(Version {
            parts,
            has_tweak: pieces.len() == 4,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.parts[0], self.parts[1], self.parts[2])?;
        if self.has_tweak {
            write!(f, ".{}", self.parts[3])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_parse() {
        assert_eq!("14.0.0".parse::<Version>().unwrap(), Version::new(14, 0, 0));
        assert_eq!(
            "10.0.22621.0".parse::<Version>().unwrap(),
            Version::with_tweak(10, 0, 22621, 0)
        );
        assert_eq!("2.38".parse::<Version>().unwrap(), Version::new(2, 38, 0));
        assert!("rs5_release".parse::<Version>().is_err());
        assert!("1.2.3.4.5".parse::<Version>().is_err());
        assert!("1..2".parse::<Version>().is_err());
    }

    #[test]
    fn test_ordering_is_numeric() {
        let a: Version = "10.0.9600".parse().unwrap();
        let b: Version = "10.0.17763".parse().unwrap();
        assert!(a < b);
        assert_eq!(Version::new(1, 2, 3), Version::with_tweak(1, 2, 3, 0));
        assert!(Version::new(1, 2, 3) < Version::with_tweak(1, 2, 3, 1));
    }

    #[test]
    fn test_display() {
        assert_eq!(Version::new(9, 4, 0).to_string(), "9.4.0");
        assert_eq!(Version::with_tweak(19, 36, 32532, 1).to_string(), "19.36.32532.1");
        assert!(Version::default().is_zero());
    }

    #[test]
    fn test_from_captures() {
        let re = Regex::new(r"(\d+)\.(\d+)\.(\d+)(\.(\d+))?").unwrap();
        let caps = re.captures("Version 19.36.32532.1 for x64").unwrap();
        assert_eq!(
            Version::from_captures(&caps, Some(5)),
            Some(Version::with_tweak(19, 36, 32532, 1))
        );

        let caps = re.captures("gcc version 11.4.0").unwrap();
        let v = Version::from_captures(&caps, Some(5)).unwrap();
        assert_eq!(v, Version::new(11, 4, 0));
        assert_eq!(v.tweak(), None);
    }

    #[test]
    fn test_to_semver() {
        let v = Version::with_tweak(19, 36, 1, 7);
        assert_eq!(v.to_semver(), semver::Version::new(19, 36, 1));
    }
}
