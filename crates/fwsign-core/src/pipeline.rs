//! Release pipeline orchestration
//!
//! A run moves through these states:
//!
//! ```text
//! NotStarted -> PrerequisitesChecked -> VersionResolved -> Signed
//!            -> Verified -> Assembled -> ManifestWritten -> Complete
//! ```
//!
//! A missing key or binary ends the run in `Skipped`, which is not an
//! error. Any other failure ends it in `Failed(stage)`. The signature
//! stays in memory; a backend that needs it on disk stages and removes
//! the file within its own `verify` call.

use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::image;
use crate::manifest::{Manifest, MANIFEST_TYPE};
use crate::release::{check_prerequisites, KeyPairPaths, Prerequisite, ReleaseTarget};
use crate::signature::{verify_signature, SignatureEngine};
use crate::version::{self, Version, VersionMarkers};

/// Step of the pipeline that can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Sign,
    Verify,
    Assemble,
    Manifest,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Sign => write!(f, "signing"),
            Stage::Verify => write!(f, "verification"),
            Stage::Assemble => write!(f, "image assembly"),
            Stage::Manifest => write!(f, "manifest generation"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    NotStarted,
    PrerequisitesChecked,
    VersionResolved,
    Signed,
    Verified,
    Assembled,
    ManifestWritten,
    Complete,
    Skipped,
    Failed(Stage),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Complete | PipelineState::Skipped | PipelineState::Failed(_)
        )
    }
}

/// What a successful run published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSummary {
    pub version: Version,
    /// The version came from the fallback rather than the metadata file
    pub used_default_version: bool,
    pub release_dir: PathBuf,
    pub image_path: PathBuf,
    pub manifest_path: PathBuf,
    pub image_size: u64,
    /// Signature length, needed to split the image
    pub signature_size: usize,
    pub firmware_size: u64,
    /// Hex SHA-256 of the signed image
    pub image_sha256: String,
}

impl ReleaseSummary {
    pub fn next_steps(&self) -> Vec<String> {
        vec![
            format!(
                "Upload {}/ contents to your web server",
                self.release_dir.display()
            ),
            format!("Devices will auto-update to version {}", self.version),
        ]
    }
}

#[derive(Debug)]
pub enum PipelineOutcome {
    Complete(ReleaseSummary),
    /// Signing is not configured for this build
    Skipped(Prerequisite),
    Failed { stage: Stage, error: Error },
}

/// Result of one pipeline run with the states it passed through
#[derive(Debug)]
pub struct PipelineReport {
    pub states: Vec<PipelineState>,
    pub outcome: PipelineOutcome,
}

impl PipelineReport {
    pub fn final_state(&self) -> PipelineState {
        self.states
            .last()
            .copied()
            .unwrap_or(PipelineState::NotStarted)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, PipelineOutcome::Complete(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, PipelineOutcome::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, PipelineOutcome::Failed { .. })
    }
}

enum Halt {
    Skipped(Prerequisite),
    Failed(Stage, Error),
}

fn at(stage: Stage) -> impl FnOnce(Error) -> Halt {
    move |e| Halt::Failed(stage, e)
}

/// Signs a firmware binary and publishes the image and manifest
pub struct Pipeline {
    keys: KeyPairPaths,
    target: ReleaseTarget,
    metadata: PathBuf,
    markers: VersionMarkers,
    manifest_type: String,
    engine: Box<dyn SignatureEngine>,
}

impl Pipeline {
    pub fn new(
        keys: KeyPairPaths,
        target: ReleaseTarget,
        metadata: impl Into<PathBuf>,
        engine: Box<dyn SignatureEngine>,
    ) -> Self {
        Self {
            keys,
            target,
            metadata: metadata.into(),
            markers: VersionMarkers::default(),
            manifest_type: MANIFEST_TYPE.to_string(),
            engine,
        }
    }

    /// Build a pipeline from a config whose paths are already resolved
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            config.keys(),
            config.release_target(),
            &config.metadata,
            config.release_engine(),
        )
        .with_markers(config.version_markers.clone())
        .with_manifest_type(config.manifest_type.clone()))
    }

    pub fn with_markers(mut self, markers: VersionMarkers) -> Self {
        self.markers = markers;
        self
    }

    pub fn with_manifest_type(mut self, manifest_type: impl Into<String>) -> Self {
        self.manifest_type = manifest_type.into();
        self
    }

    pub fn target(&self) -> &ReleaseTarget {
        &self.target
    }

    /// Run the pipeline for the unsigned binary at `binary`.
    ///
    /// Never returns an error; every outcome is reported in the
    /// [`PipelineReport`].
    pub fn run(&self, binary: &Path) -> PipelineReport {
        let mut states = vec![PipelineState::NotStarted];

        let outcome = match self.execute(binary, &mut states) {
            Ok(summary) => {
                states.push(PipelineState::Complete);
                info!(
                    "Firmware signing complete: version {}, {} byte image",
                    summary.version, summary.image_size
                );
                PipelineOutcome::Complete(summary)
            }
            Err(Halt::Skipped(missing)) => {
                states.push(PipelineState::Skipped);
                warn!("{} not found; skipping firmware signing", missing.kind);
                PipelineOutcome::Skipped(missing)
            }
            Err(Halt::Failed(stage, error)) => {
                states.push(PipelineState::Failed(stage));
                error!("Firmware {} failed: {}", stage, error);
                PipelineOutcome::Failed { stage, error }
            }
        };

        PipelineReport { states, outcome }
    }

    fn execute(
        &self,
        binary: &Path,
        states: &mut Vec<PipelineState>,
    ) -> std::result::Result<ReleaseSummary, Halt> {
        if let Some(missing) = check_prerequisites(&self.keys, binary) {
            return Err(Halt::Skipped(missing));
        }
        states.push(PipelineState::PrerequisitesChecked);

        let resolution = version::resolve(&self.metadata, &self.markers);
        let used_default_version = resolution.is_default();
        let version = resolution.into_version();
        info!("Firmware version: {}", version);
        states.push(PipelineState::VersionResolved);

        self.target.ensure_dir().map_err(at(Stage::Sign))?;
        let payload = std::fs::read(binary)
            .map_err(|e| Error::read(binary, e))
            .map_err(at(Stage::Sign))?;
        info!(
            "Firmware size: {} bytes ({:.2} KB)",
            payload.len(),
            payload.len() as f64 / 1024.0
        );

        info!("Generating signature with {} backend", self.engine.name());
        let signature = self
            .engine
            .sign(&self.keys.private_key, &payload)
            .map_err(at(Stage::Sign))?;
        let signature_size = signature.len();
        info!("Signature generated: {} bytes", signature_size);
        states.push(PipelineState::Signed);

        let verified = verify_signature(
            &*self.engine,
            &self.keys.public_key,
            &payload,
            signature,
        )
        .map_err(at(Stage::Verify))?;
        info!("Signature verification successful");
        states.push(PipelineState::Verified);

        let image_path = self.target.image_path();
        let image_size =
            image::write_image(&image_path, &verified, &payload).map_err(at(Stage::Assemble))?;
        info!("Signed firmware created: {} bytes", image_size);
        states.push(PipelineState::Assembled);

        let manifest_path = self.target.manifest_path();
        Manifest::new(&self.manifest_type, &version, &self.target.image_name)
            .write(&manifest_path)
            .map_err(at(Stage::Manifest))?;
        info!("Manifest generated");
        states.push(PipelineState::ManifestWritten);

        let mut hasher = Sha256::new();
        hasher.update(verified.as_bytes());
        hasher.update(&payload);

        Ok(ReleaseSummary {
            version,
            used_default_version,
            release_dir: self.target.dir.clone(),
            image_path,
            manifest_path,
            image_size,
            signature_size,
            firmware_size: payload.len() as u64,
            image_sha256: hex::encode(hasher.finalize()),
        })
    }
}
