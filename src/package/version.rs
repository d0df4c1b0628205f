//! Version parsing and constraint matching.
//!
//! Versions are dotted sequences of unsigned integers (`1`, `1.10`, `2.0.3`),
//! compared segment by segment with trailing zero segments ignored, so
//! `1.10 > 1.9` and `1.0 == 1`. For two-segment versions whose minor part is
//! below 100 this is the same order as the historical `major + minor / 100`
//! folding, which keeps previously published archive names comparable.
//!
//! A constraint is an optional operator (`>=`, `<=`, `>`, `<`, `=`) followed
//! by a reference version; no operator means exact equality. A requirement is
//! a comma separated list of constraints that must all hold (`>=1.10,<=2.0`),
//! and an empty requirement matches every version.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("version string is empty")]
    Empty,
    #[error("invalid version {version:?}: segment {segment:?} is not a non-negative integer")]
    InvalidSegment { version: String, segment: String },
    #[error("empty constraint in requirement {0:?}")]
    EmptyConstraint(String),
}

/// A parsed version. Equality and ordering only consider the numeric
/// segments; the original text is kept so archive names can be rebuilt
/// exactly as they were published.
#[derive(Debug, Clone)]
pub struct Version {
    segments: Vec<u64>,
    raw: String,
}

impl Version {
    pub fn parse(text: &str) -> Result<Self, VersionError> {
        let raw = text.trim();
        if raw.is_empty() {
            return Err(VersionError::Empty);
        }

        let mut segments = raw
            .split('.')
            .map(|segment| {
                if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(VersionError::InvalidSegment {
                        version: raw.to_string(),
                        segment: segment.to_string(),
                    });
                }
                segment.parse::<u64>().map_err(|_| VersionError::InvalidSegment {
                    version: raw.to_string(),
                    segment: segment.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        while segments.len() > 1 && segments.last() == Some(&0) {
            segments.pop();
        }

        Ok(Version {
            segments,
            raw: raw.to_string(),
        })
    }

    /// The version exactly as it was written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments.cmp(&other.segments)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

/// A single operator + reference version.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionConstraint {
    /// Matches every version
    #[default]
    Any,
    /// `=1.0` or a bare `1.0`
    Exact(Version),
    /// `>1.0`
    Greater(Version),
    /// `>=1.0`
    AtLeast(Version),
    /// `<1.0`
    Less(Version),
    /// `<=1.0`
    AtMost(Version),
}

impl VersionConstraint {
    /// Parse a single constraint. Two-character operators are checked before
    /// single-character ones; an empty string yields [`VersionConstraint::Any`].
    pub fn parse(text: &str) -> Result<Self, VersionError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(VersionConstraint::Any);
        }

        let constraint = if let Some(rest) = text.strip_prefix(">=") {
            VersionConstraint::AtLeast(Version::parse(rest)?)
        } else if let Some(rest) = text.strip_prefix("<=") {
            VersionConstraint::AtMost(Version::parse(rest)?)
        } else if let Some(rest) = text.strip_prefix('>') {
            VersionConstraint::Greater(Version::parse(rest)?)
        } else if let Some(rest) = text.strip_prefix('<') {
            VersionConstraint::Less(Version::parse(rest)?)
        } else if let Some(rest) = text.strip_prefix('=') {
            VersionConstraint::Exact(Version::parse(rest)?)
        } else {
            VersionConstraint::Exact(Version::parse(text)?)
        };

        Ok(constraint)
    }

    pub fn matches(&self, version: &Version) -> bool {
        match self {
            VersionConstraint::Any => true,
            VersionConstraint::Exact(v) => version == v,
            VersionConstraint::Greater(v) => version > v,
            VersionConstraint::AtLeast(v) => version >= v,
            VersionConstraint::Less(v) => version < v,
            VersionConstraint::AtMost(v) => version <= v,
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => write!(f, "*"),
            VersionConstraint::Exact(v) => write!(f, "{}", v),
            VersionConstraint::Greater(v) => write!(f, ">{}", v),
            VersionConstraint::AtLeast(v) => write!(f, ">={}", v),
            VersionConstraint::Less(v) => write!(f, "<{}", v),
            VersionConstraint::AtMost(v) => write!(f, "<={}", v),
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionConstraint::parse(s)
    }
}

/// All constraints of a dependency; a version must satisfy each of them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionRequirement {
    constraints: Vec<VersionConstraint>,
}

impl VersionRequirement {
    pub fn parse(text: &str) -> Result<Self, VersionError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        let constraints = text
            .split(',')
            .map(|part| {
                if part.trim().is_empty() {
                    Err(VersionError::EmptyConstraint(text.to_string()))
                } else {
                    VersionConstraint::parse(part)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { constraints })
    }

    pub fn constraints(&self) -> &[VersionConstraint] {
        &self.constraints
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.constraints
            .iter()
            .all(|c| VersionResolver::satisfies(c, version))
    }
}

impl From<VersionConstraint> for VersionRequirement {
    fn from(constraint: VersionConstraint) -> Self {
        Self {
            constraints: vec![constraint],
        }
    }
}

impl fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraints.is_empty() {
            return write!(f, "*");
        }
        let parts: Vec<String> = self.constraints.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl FromStr for VersionRequirement {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionRequirement::parse(s)
    }
}

/// Version resolver - pure functions for version selection.
pub struct VersionResolver;

impl VersionResolver {
    /// Check whether `version` satisfies `constraint`.
    pub fn satisfies(constraint: &VersionConstraint, version: &Version) -> bool {
        constraint.matches(version)
    }

    /// The greatest version, or `None` for an empty sequence.
    ///
    /// Versions that compare equal (`1.0` and `1.00`) resolve to the first one
    /// encountered, so selection follows the order of the input.
    pub fn max<'a, I>(versions: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        versions.into_iter().fold(None, |best, v| match best {
            Some(b) if v <= b => Some(b),
            _ => Some(v),
        })
    }

    /// The candidate with the greatest version that satisfies `requirement`.
    ///
    /// Each candidate pairs a version with whatever it was recovered from.
    /// Among equal versions the earliest candidate wins.
    pub fn resolve<'a, T>(
        candidates: &'a [(Version, T)],
        requirement: &VersionRequirement,
    ) -> Option<&'a (Version, T)> {
        let best = Self::max(
            candidates
                .iter()
                .map(|(v, _)| v)
                .filter(|v| requirement.matches(v)),
        )?;
        candidates.iter().find(|(v, _)| v == best)
    }
}
