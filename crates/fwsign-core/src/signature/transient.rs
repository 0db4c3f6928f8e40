//! Short-lived on-disk copy of a detached signature

use std::path::{Path, PathBuf};

use std::io::Write;

use tracing::{debug, warn};

use super::Signature;
use crate::error::Result;
use crate::release::write_atomically;

/// A signature file that is removed when dropped
///
/// The file never outlives the pipeline run that created it.
#[derive(Debug)]
pub struct TransientSignature {
    path: PathBuf,
    armed: bool,
}

impl TransientSignature {
    /// Write `signature` to `path`.
    ///
    /// The bytes are staged next to `path` and renamed into place, so a
    /// failed write leaves no partial file behind.
    pub fn write(path: impl Into<PathBuf>, signature: &Signature) -> Result<Self> {
        let path = path.into();
        write_atomically(&path, |file| file.write_all(signature.as_bytes()))?;
        debug!("Wrote transient signature to {:?}", path);
        Ok(Self { path, armed: true })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now. A deletion failure is logged, not returned.
    pub fn discard(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;

        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed transient signature {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove transient signature {:?}: {}", self.path, e),
        }
    }
}

impl Drop for TransientSignature {
    fn drop(&mut self) {
        self.remove();
    }
}
