//! Signing through the `openssl` command-line tool

use std::ffi::OsStr;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tracing::debug;

use super::{Signature, SignatureEngine, TransientSignature};
use crate::error::{Error, Result};

/// Default program name, resolved through `PATH`
pub const DEFAULT_OPENSSL: &str = "openssl";

/// Runs `openssl dgst -sha256` as a child process
///
/// The payload is streamed over stdin; the process blocks until openssl
/// exits. `openssl dgst -verify` reads the signature from a file, which is
/// staged at the configured signature file or in the system temp
/// directory and removed before `verify` returns.
#[derive(Debug, Clone)]
pub struct OpensslEngine {
    program: PathBuf,
    signature_file: Option<PathBuf>,
}

impl Default for OpensslEngine {
    fn default() -> Self {
        Self::new(DEFAULT_OPENSSL)
    }
}

impl OpensslEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            signature_file: None,
        }
    }

    /// Stage signatures for `-verify` at `path` instead of a temp file
    pub fn with_signature_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.signature_file = Some(path.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn signature_file(&self) -> Option<&Path> {
        self.signature_file.as_deref()
    }

    fn run<I, S>(&self, args: I, stdin: &[u8]) -> std::io::Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut pipe) = child.stdin.take() {
            // openssl exits early on a bad key without draining stdin
            if let Err(e) = pipe.write_all(stdin) {
                if e.kind() != ErrorKind::BrokenPipe {
                    return Err(e);
                }
            }
        }

        child.wait_with_output()
    }

    fn run_verify(
        &self,
        public_key: &Path,
        payload: &[u8],
        signature_path: &Path,
    ) -> Result<bool> {
        let args: [&OsStr; 6] = [
            OsStr::new("dgst"),
            OsStr::new("-sha256"),
            OsStr::new("-verify"),
            public_key.as_os_str(),
            OsStr::new("-signature"),
            signature_path.as_os_str(),
        ];

        let output = self.run(args, payload).map_err(|e| {
            Error::VerificationTool(format!("failed to run {}: {}", self.program.display(), e))
        })?;

        if output.status.success() {
            Ok(true)
        } else {
            debug!(
                "openssl verify rejected signature: {}",
                redact(&stderr_text(&output), public_key, "<public key>")
            );
            Ok(false)
        }
    }
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Replace every occurrence of `path` in tool output with `label`
fn redact(text: &str, path: &Path, label: &str) -> String {
    let needle = path.to_string_lossy();
    if needle.is_empty() {
        return text.to_string();
    }
    text.replace(needle.as_ref(), label)
}

impl SignatureEngine for OpensslEngine {
    fn name(&self) -> &'static str {
        "openssl"
    }

    fn sign(&self, private_key: &Path, payload: &[u8]) -> Result<Signature> {
        let args: [&OsStr; 7] = [
            OsStr::new("dgst"),
            OsStr::new("-sha256"),
            OsStr::new("-sign"),
            private_key.as_os_str(),
            OsStr::new("-keyform"),
            OsStr::new("PEM"),
            OsStr::new("-binary"),
        ];

        let output = self.run(args, payload).map_err(|e| {
            Error::Signing(format!("failed to run {}: {}", self.program.display(), e))
        })?;

        if !output.status.success() {
            return Err(Error::Signing(format!(
                "openssl dgst exited with {}: {}",
                output.status,
                redact(&stderr_text(&output), private_key, "<private key>")
            )));
        }
        if output.stdout.is_empty() {
            return Err(Error::Signing("openssl produced an empty signature".to_string()));
        }

        Ok(Signature::new(output.stdout))
    }

    fn verify(&self, public_key: &Path, payload: &[u8], signature: &Signature) -> Result<bool> {
        let stage_error =
            |e: Error| Error::VerificationTool(format!("cannot stage signature for openssl: {}", e));

        if let Some(path) = &self.signature_file {
            let staged = TransientSignature::write(path, signature).map_err(stage_error)?;
            let verified = self.run_verify(public_key, payload, staged.path());
            staged.discard();
            return verified;
        }

        let mut sig_file = tempfile::NamedTempFile::new().map_err(|e| stage_error(e.into()))?;
        sig_file
            .write_all(signature.as_bytes())
            .and_then(|_| sig_file.flush())
            .map_err(|e| stage_error(e.into()))?;

        self.run_verify(public_key, payload, sig_file.path())
    }
}
