//! Semantic version triple and change severity.
//!
//! Version strings are user data, so parsing never fails: anything that is
//! not a well-formed `major.minor.patch` degrades segment by segment to the
//! positional defaults of `1.0.0`.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ChangeType
// ---------------------------------------------------------------------------

/// Severity of a change between two revisions.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    #[default]
    None,
    Patch,
    Minor,
    Major,
}

impl ChangeType {
    /// Parse a change type string. Unknown values map to `None`.
    pub fn from_str_val(s: &str) -> Self {
        match s {
            "major" => Self::Major,
            "minor" => Self::Minor,
            "patch" => Self::Patch,
            _ => Self::None,
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Patch => write!(f, "patch"),
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
        }
    }
}

// ---------------------------------------------------------------------------
// SemVer
// ---------------------------------------------------------------------------

/// A `{major, minor, patch}` version triple.
///
/// Serializes as its string form (`"1.2.3"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Default for SemVer {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

impl SemVer {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version string, degrading to `1.0.0` defaults.
    ///
    /// `None`, empty, and whitespace-only input yield `1.0.0`. Otherwise the
    /// string is split on `.` and each of the first three segments is parsed
    /// as a non-negative integer; a segment that is missing or invalid takes
    /// its positional default (1 for major, 0 for minor and patch). A single
    /// leading `v` is ignored.
    pub fn parse(s: Option<&str>) -> Self {
        let defaults = Self::default();
        let Some(raw) = s.map(str::trim).filter(|s| !s.is_empty()) else {
            return defaults;
        };
        let raw = raw.strip_prefix('v').unwrap_or(raw);

        let mut segments = raw.split('.');
        let mut next = |fallback: u64| {
            segments
                .next()
                .and_then(|seg| seg.trim().parse::<u64>().ok())
                .unwrap_or(fallback)
        };

        Self {
            major: next(defaults.major),
            minor: next(defaults.minor),
            patch: next(defaults.patch),
        }
    }

    /// Return the version that follows `self` for a change of `kind`.
    pub fn increment(self, kind: ChangeType) -> Self {
        match kind {
            ChangeType::Major => Self::new(self.major.saturating_add(1), 0, 0),
            ChangeType::Minor => Self::new(self.major, self.minor.saturating_add(1), 0),
            ChangeType::Patch => Self::new(self.major, self.minor, self.patch.saturating_add(1)),
            ChangeType::None => self,
        }
    }
}

impl std::fmt::Display for SemVer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl std::str::FromStr for SemVer {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(Some(s)))
    }
}

impl Serialize for SemVer {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemVer {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(Self::parse(raw.as_deref()))
    }
}
