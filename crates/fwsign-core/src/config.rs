//! Pipeline configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::manifest::MANIFEST_TYPE;
use crate::release::{
    KeyPairPaths, ReleaseTarget, DEFAULT_IMAGE_NAME, DEFAULT_MANIFEST_NAME,
    DEFAULT_SIGNATURE_NAME,
};
use crate::signature::{OpensslEngine, RsaPkcs1Engine, SignatureEngine};
use crate::version::VersionMarkers;

/// Config file looked up in the project directory
pub const CONFIG_FILE_NAME: &str = "fwsign.json";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "FWSIGN_CONFIG";

/// Which implementation produces and checks signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process RSA
    #[default]
    Rsa,
    /// External `openssl` binary
    Openssl,
}

/// Signing pipeline configuration
///
/// Relative paths are resolved against the project directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// PEM private signing key
    pub private_key: PathBuf,

    /// PEM public verification key
    pub public_key: PathBuf,

    /// Header declaring the firmware version constants
    pub metadata: PathBuf,

    /// Directory receiving the signed image and manifest
    pub release_dir: PathBuf,

    pub image_name: String,
    pub manifest_name: String,

    /// Name of the file the openssl backend verifies from, inside the
    /// release directory
    pub signature_name: String,

    /// `type` field of the manifest
    pub manifest_type: String,

    pub version_markers: VersionMarkers,

    pub backend: Backend,

    /// Program used by the openssl backend
    pub openssl_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            private_key: PathBuf::from("priv_key.pem"),
            public_key: PathBuf::from("rsa_key.pub"),
            metadata: PathBuf::from("include").join("OTA.h"),
            release_dir: PathBuf::from("firmware_release"),
            image_name: DEFAULT_IMAGE_NAME.to_string(),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            signature_name: DEFAULT_SIGNATURE_NAME.to_string(),
            manifest_type: MANIFEST_TYPE.to_string(),
            version_markers: VersionMarkers::default(),
            backend: Backend::default(),
            openssl_path: PathBuf::from("openssl"),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load the config for a project.
    ///
    /// Uses `explicit` if given, then `$FWSIGN_CONFIG`, then
    /// `<project_dir>/fwsign.json`, falling back to defaults.
    pub fn discover(project_dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Self::load(Path::new(&path));
        }
        let local = project_dir.join(CONFIG_FILE_NAME);
        if local.is_file() {
            return Self::load(&local);
        }
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<()> {
        for (field, name) in [
            ("image_name", &self.image_name),
            ("manifest_name", &self.manifest_name),
            ("signature_name", &self.signature_name),
        ] {
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(Error::Config(format!(
                    "{} must be a plain file name, got {:?}",
                    field, name
                )));
            }
        }

        let names = [&self.image_name, &self.manifest_name, &self.signature_name];
        if names[0] == names[1] || names[0] == names[2] || names[1] == names[2] {
            return Err(Error::Config(
                "image, manifest and signature names must differ".to_string(),
            ));
        }

        if self.manifest_type.is_empty() {
            return Err(Error::Config("manifest_type must not be empty".to_string()));
        }
        Ok(())
    }

    /// Make every relative path absolute under `project_dir`
    pub fn resolve_paths(mut self, project_dir: &Path) -> Self {
        let resolve = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                project_dir.join(p)
            }
        };
        self.private_key = resolve(&self.private_key);
        self.public_key = resolve(&self.public_key);
        self.metadata = resolve(&self.metadata);
        self.release_dir = resolve(&self.release_dir);
        self
    }

    pub fn keys(&self) -> KeyPairPaths {
        KeyPairPaths::new(&self.private_key, &self.public_key)
    }

    pub fn release_target(&self) -> ReleaseTarget {
        ReleaseTarget {
            dir: self.release_dir.clone(),
            image_name: self.image_name.clone(),
            manifest_name: self.manifest_name.clone(),
            signature_name: self.signature_name.clone(),
        }
    }

    /// Build the configured signature engine
    pub fn engine(&self) -> Box<dyn SignatureEngine> {
        match self.backend {
            Backend::Rsa => Box::new(RsaPkcs1Engine::new()),
            Backend::Openssl => Box::new(OpensslEngine::new(&self.openssl_path)),
        }
    }

    /// Engine for a release run. The openssl backend stages its signature
    /// at `<release_dir>/<signature_name>` while verifying.
    pub fn release_engine(&self) -> Box<dyn SignatureEngine> {
        match self.backend {
            Backend::Rsa => Box::new(RsaPkcs1Engine::new()),
            Backend::Openssl => Box::new(
                OpensslEngine::new(&self.openssl_path)
                    .with_signature_file(self.release_target().signature_path()),
            ),
        }
    }
}
