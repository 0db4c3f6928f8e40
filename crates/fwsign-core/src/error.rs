//! Error types for firmware signing

use std::path::PathBuf;

use thiserror::Error;

use crate::release::Prerequisite;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A key or the unsigned binary is absent; signing is not configured
    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(Prerequisite),

    #[error("Signing error: {0}")]
    Signing(String),

    /// The signature was produced but does not verify against the payload
    #[error("Signature verification failed: {0}")]
    Verification(String),

    /// The verification mechanism itself could not run
    #[error("Verification tool error: {0}")]
    VerificationTool(String),

    #[error("Failed to assemble signed image: {0}")]
    Assembly(#[source] std::io::Error),

    #[error("Failed to write manifest: {0}")]
    ManifestWrite(#[source] std::io::Error),

    #[error("Malformed signed image: {0}")]
    Container(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Read {
            path: path.into(),
            source,
        }
    }
}
