//! The feed version marker.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use feedx_blob::Metadata;
use serde::{Deserialize, Serialize};

/// Metadata key carrying the version marker. Written in this case; read in
/// this case or lower-cased.
pub const META_VERSION: &str = "X-Feedx-Version";

/// Lower-cased form of [`META_VERSION`], as reported by some backends.
pub const META_VERSION_LOWER: &str = "x-feedx-version";

/// A monotonic feed version. Larger is newer; zero means unknown.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// No known version.
    pub const NONE: Version = Version(0);

    pub const fn new(value: u64) -> Self {
        Version(value)
    }

    /// A version from epoch milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Version(millis)
    }

    /// A version from a wall-clock time, as integer epoch milliseconds.
    /// Times before the epoch map to [`Version::NONE`].
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(d) => Version(u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            Err(_) => Version::NONE,
        }
    }

    /// Parse a stored marker. Anything that is not a non-negative integer
    /// reads as [`Version::NONE`].
    pub fn parse(value: &str) -> Self {
        value.trim().parse().map(Version).unwrap_or(Version::NONE)
    }

    /// The marker stored in blob metadata, checking both key cases.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        metadata
            .get(META_VERSION)
            .or_else(|| metadata.get(META_VERSION_LOWER))
            .map(|v| Version::parse(v))
            .unwrap_or(Version::NONE)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns `true` for a positive marker.
    pub const fn is_set(self) -> bool {
        self.0 > 0
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Version(value)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
