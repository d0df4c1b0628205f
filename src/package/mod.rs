//! Package model
//!
//! Targets to pack, dependencies to fetch, version handling and the archive
//! naming convention shared by publishers and consumers.

mod selector;
mod version;

pub use selector::FileSelector;
pub use version::{Version, VersionConstraint, VersionError, VersionRequirement, VersionResolver};

use std::fmt;

/// Extension of every published archive. Part of the naming contract with
/// the remote repository: `<name>-<version>.zip`.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// A glob pattern selecting local files, with an optional exclusion pattern
/// matched against the base name of each match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageTarget {
    pub pattern: String,
    pub exclude: Option<String>,
}

impl PackageTarget {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            exclude: None,
        }
    }

    pub fn excluding(mut self, exclude: impl Into<String>) -> Self {
        self.exclude = Some(exclude.into());
        self
    }
}

/// A package name plus the versions acceptable for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub requirement: VersionRequirement,
}

impl Dependency {
    pub fn new(name: impl Into<String>, requirement: VersionRequirement) -> Self {
        Self {
            name: name.into(),
            requirement,
        }
    }

    /// Extract the version part of `file_name` if it is an archive of this package.
    pub fn archive_version<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        archive_version(&self.name, file_name)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.requirement)
    }
}

/// Archive file name for a package version.
pub fn archive_name(name: &str, version: &str) -> String {
    format!("{}-{}.{}", name, version, ARCHIVE_EXTENSION)
}

/// Recover the version from `<name>-<version>.zip`. Returns `None` when the
/// file does not follow the convention for `name` or the version part is empty.
pub fn archive_version<'a>(name: &str, file_name: &'a str) -> Option<&'a str> {
    let version = file_name
        .strip_prefix(name)?
        .strip_prefix('-')?
        .strip_suffix(ARCHIVE_EXTENSION)?
        .strip_suffix('.')?;
    (!version.is_empty()).then_some(version)
}

/// Check that a package name can be used in an archive name: it must not be
/// empty and must not contain path separators.
pub fn validate_package_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("package name is empty".to_string());
    }
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(format!("package name {:?} must not contain path separators", name));
    }
    Ok(())
}
