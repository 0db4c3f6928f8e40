//! Firmware version resolution from C header metadata
//!
//! The firmware declares its version with three preprocessor constants:
//!
//! ```text
//! #define FIRMWARE_VERSION_MAJOR 1
//! #define FIRMWARE_VERSION_MINOR 0
//! #define FIRMWARE_VERSION_PATCH 0
//! ```
//!
//! Tokens are extracted lexically and are not checked for being numeric.
//! Whatever follows the constant name is carried into the rendered version.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Version reported when the metadata source is missing or unreadable
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Names of the three version constants in the metadata source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMarkers {
    pub major: String,
    pub minor: String,
    pub patch: String,
}

impl Default for VersionMarkers {
    fn default() -> Self {
        Self {
            major: "FIRMWARE_VERSION_MAJOR".to_string(),
            minor: "FIRMWARE_VERSION_MINOR".to_string(),
            patch: "FIRMWARE_VERSION_PATCH".to_string(),
        }
    }
}

/// Three-part firmware version
///
/// Components are stored as the raw tokens found in the metadata source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    major: String,
    minor: String,
    patch: String,
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major: major.to_string(),
            minor: minor.to_string(),
            patch: patch.to_string(),
        }
    }

    /// The documented fallback, `1.0.0`
    pub fn fallback() -> Self {
        Self::new(1, 0, 0)
    }

    pub fn major(&self) -> &str {
        &self.major
    }

    pub fn minor(&self) -> &str {
        &self.minor
    }

    pub fn patch(&self) -> &str {
        &self.patch
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// How a version was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Read from the metadata source
    Resolved(Version),
    /// Metadata source missing or unreadable; the fallback was used
    UsedDefault(Version),
}

impl Resolution {
    pub fn version(&self) -> &Version {
        match self {
            Resolution::Resolved(v) | Resolution::UsedDefault(v) => v,
        }
    }

    pub fn into_version(self) -> Version {
        match self {
            Resolution::Resolved(v) | Resolution::UsedDefault(v) => v,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Resolution::UsedDefault(_))
    }
}

/// Resolve the firmware version from a metadata file.
///
/// Never fails: a missing or unreadable file yields
/// [`Resolution::UsedDefault`] and a warning.
pub fn resolve(metadata: &Path, markers: &VersionMarkers) -> Resolution {
    if !metadata.exists() {
        warn!("Version metadata not found at {:?}, using {}", metadata, DEFAULT_VERSION);
        return Resolution::UsedDefault(Version::fallback());
    }

    match std::fs::read_to_string(metadata) {
        Ok(content) => {
            let version = parse(&content, markers);
            debug!("Resolved firmware version {} from {:?}", version, metadata);
            Resolution::Resolved(version)
        }
        Err(e) => {
            warn!("Could not read version from {:?}: {}", metadata, e);
            Resolution::UsedDefault(Version::fallback())
        }
    }
}

/// Extract the version from header text.
///
/// A component whose constant is absent stays at `0`. When a constant is
/// defined more than once the last definition wins.
pub fn parse(content: &str, markers: &VersionMarkers) -> Version {
    let mut version = Version::new(0, 0, 0);

    for line in content.lines() {
        if !line.contains("#define") {
            continue;
        }
        let Some(token) = line.split_whitespace().last() else {
            continue;
        };

        if line.contains(&markers.major) {
            version.major = token.to_string();
        } else if line.contains(&markers.minor) {
            version.minor = token.to_string();
        } else if line.contains(&markers.patch) {
            version.patch = token.to_string();
        }
    }

    version
}
