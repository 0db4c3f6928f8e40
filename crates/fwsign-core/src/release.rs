//! Release locations and signing prerequisites

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Default signed image filename
pub const DEFAULT_IMAGE_NAME: &str = "firmware.img";

/// Default manifest filename
pub const DEFAULT_MANIFEST_NAME: &str = "manifest.json";

/// Default filename of the transient detached signature
pub const DEFAULT_SIGNATURE_NAME: &str = "firmware.sign";

/// Where one pipeline run publishes its artifacts
///
/// Each run replaces the image and manifest of the previous run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTarget {
    pub dir: PathBuf,
    pub image_name: String,
    pub manifest_name: String,
    pub signature_name: String,
}

impl ReleaseTarget {
    /// Target `dir` with the default artifact filenames
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            image_name: DEFAULT_IMAGE_NAME.to_string(),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            signature_name: DEFAULT_SIGNATURE_NAME.to_string(),
        }
    }

    pub fn image_path(&self) -> PathBuf {
        self.dir.join(&self.image_name)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(&self.manifest_name)
    }

    pub fn signature_path(&self) -> PathBuf {
        self.dir.join(&self.signature_name)
    }

    /// Create the release directory if it does not exist
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }
}

/// Locations of the signing key pair
///
/// Only the paths are carried; key material is read by the signature
/// engine for the duration of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPairPaths {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
}

impl KeyPairPaths {
    pub fn new(private_key: impl Into<PathBuf>, public_key: impl Into<PathBuf>) -> Self {
        Self {
            private_key: private_key.into(),
            public_key: public_key.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrerequisiteKind {
    PrivateKey,
    PublicKey,
    Binary,
}

impl fmt::Display for PrerequisiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrerequisiteKind::PrivateKey => write!(f, "Private key"),
            PrerequisiteKind::PublicKey => write!(f, "Public key"),
            PrerequisiteKind::Binary => write!(f, "Firmware binary"),
        }
    }
}

/// A missing input that makes the pipeline skip signing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prerequisite {
    pub kind: PrerequisiteKind,
    pub path: PathBuf,
}

impl Prerequisite {
    pub fn new(kind: PrerequisiteKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Steps a developer can take to enable signing
    pub fn remediation(&self) -> Vec<String> {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string());

        match self.kind {
            PrerequisiteKind::PrivateKey => vec![
                format!("Ensure {} exists in the project root", file_name),
                format!("Run: openssl genrsa -out {} 4096", file_name),
            ],
            PrerequisiteKind::PublicKey => vec![
                format!("Ensure {} exists in the project root", file_name),
                format!("Run: openssl rsa -in priv_key.pem -pubout -out {}", file_name),
            ],
            PrerequisiteKind::Binary => {
                vec!["Build the firmware before running the signing step".to_string()]
            }
        }
    }
}

/// Names only the kind; key locations stay out of logs and error text
impl fmt::Display for Prerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} not found", self.kind)
    }
}

/// Find the first missing prerequisite, in the order private key,
/// public key, binary
pub fn check_prerequisites(keys: &KeyPairPaths, binary: &Path) -> Option<Prerequisite> {
    [
        (PrerequisiteKind::PrivateKey, keys.private_key.as_path()),
        (PrerequisiteKind::PublicKey, keys.public_key.as_path()),
        (PrerequisiteKind::Binary, binary),
    ]
    .into_iter()
    .find(|(_, path)| !path.is_file())
    .map(|(kind, path)| Prerequisite::new(kind, path))
}

/// Write `dest` through a temporary file in the same directory, then
/// rename it over `dest`
pub(crate) fn write_atomically<F>(dest: &Path, write: F) -> std::io::Result<()>
where
    F: FnOnce(&mut File) -> std::io::Result<()>,
{
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    write(staged.as_file_mut())?;
    staged.as_file().sync_all()?;
    staged.persist(dest).map_err(|e| e.error)?;
    Ok(())
}
