//! Host version compatibility check.
//!
//! Host releases were year-numbered (`2018.3.1`) before switching to plain
//! majors (`7.2.0`, `10.2.0`). Any major below 2000 belongs to the newer
//! scheme and sorts after every year-numbered release.

use std::cmp::Ordering;
use std::fmt;

/// Oldest host release the engine runs against.
pub const MIN_SUPPORTED_VERSION: HostVersion = HostVersion {
    major: 2018,
    minor: 3,
};

const YEAR_NUMBERED_FROM: u32 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostVersion {
    pub major: u32,
    pub minor: u32,
}

impl HostVersion {
    /// Parse `major[.minor[.patch...]]`, ignoring everything past the minor.
    pub fn parse(version: &str) -> Option<Self> {
        let mut parts = version.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(minor) => minor.parse().ok()?,
            None => 0,
        };
        Some(Self { major, minor })
    }

    pub fn is_year_numbered(&self) -> bool {
        self.major >= YEAR_NUMBERED_FROM
    }
}

impl Ord for HostVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_year_numbered(), other.is_year_numbered()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => (self.major, self.minor).cmp(&(other.major, other.minor)),
        }
    }
}

impl PartialOrd for HostVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    Supported,
    /// Newer than the tested release. Runs, with a warning.
    Untested { show_dialog: bool },
    Unsupported,
    /// Version string could not be read.
    Unknown,
}

#[derive(Debug, Clone, Copy)]
pub struct CompatibilityPolicy {
    pub minimum: HostVersion,
    pub tested: HostVersion,
    /// Year-numbered majors below this never show the dialog.
    pub dialog_min_major: u32,
}

impl CompatibilityPolicy {
    /// `dialog_shown` is true when the warning was already shown this session.
    pub fn check(&self, version: &str, dialog_shown: bool) -> Compatibility {
        let Some(parsed) = HostVersion::parse(version) else {
            return Compatibility::Unknown;
        };

        if parsed < self.minimum {
            return Compatibility::Unsupported;
        }
        if parsed <= self.tested {
            return Compatibility::Supported;
        }

        let below_dialog_min = parsed.is_year_numbered() && parsed.major < self.dialog_min_major;
        Compatibility::Untested {
            show_dialog: !dialog_shown && !below_dialog_min,
        }
    }
}
