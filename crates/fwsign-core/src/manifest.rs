//! OTA update manifest
//!
//! The update client polls a JSON document of the form:
//!
//! ```json
//! {
//!   "type": "esp32-fota-http",
//!   "version": "2.3.1",
//!   "bin": "firmware.img"
//! }
//! ```

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::release::write_atomically;
use crate::version::Version;

/// Update scheme discriminator understood by the device update client
pub const MANIFEST_TYPE: &str = "esp32-fota-http";

/// Release description consumed by the update client.
///
/// Field order is part of the output format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub bin: String,
}

impl Manifest {
    pub fn new(kind: impl Into<String>, version: &Version, bin: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            version: version.to_string(),
            bin: bin.into(),
        }
    }

    /// Pretty JSON with two-space indentation and a trailing newline
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the manifest to `dest`, replacing any existing file.
    ///
    /// Failures are [`Error::ManifestWrite`].
    pub fn write(&self, dest: &Path) -> Result<()> {
        let json = self.to_json()?;
        write_atomically(dest, |file| file.write_all(json.as_bytes()))
            .map_err(Error::ManifestWrite)?;
        debug!("Wrote manifest to {:?}", dest);
        Ok(())
    }
}
