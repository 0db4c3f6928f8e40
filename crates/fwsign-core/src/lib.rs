//! fwsign core - firmware release signing for OTA updates
//!
//! After a firmware build this crate resolves the firmware version, signs
//! the binary, re-verifies the signature, assembles the signature-prefixed
//! image and writes the update manifest consumed by devices.

pub mod config;
pub mod error;
pub mod image;
pub mod manifest;
pub mod pipeline;
pub mod release;
pub mod signature;
pub mod version;

pub use config::{Backend, PipelineConfig};
pub use error::{Error, Result};
pub use image::SignedImage;
pub use manifest::{Manifest, MANIFEST_TYPE};
pub use pipeline::{
    Pipeline, PipelineOutcome, PipelineReport, PipelineState, ReleaseSummary, Stage,
};
pub use release::{KeyPairPaths, Prerequisite, PrerequisiteKind, ReleaseTarget};
pub use signature::{
    OpensslEngine, RsaPkcs1Engine, Signature, SignatureEngine, VerifiedSignature,
    RSA_4096_SIGNATURE_LEN,
};
pub use version::{Resolution, Version, VersionMarkers, DEFAULT_VERSION};
