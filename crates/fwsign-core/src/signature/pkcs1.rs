//! In-process RSA PKCS#1 v1.5 signing

use std::path::Path;

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

use super::{digest, Signature, SignatureEngine};
use crate::error::{Error, Result};

/// Signs with the `rsa` crate, no external tooling required
#[derive(Debug, Clone, Copy, Default)]
pub struct RsaPkcs1Engine;

impl RsaPkcs1Engine {
    pub fn new() -> Self {
        Self
    }
}

fn read_pem(path: &Path) -> std::result::Result<Zeroizing<String>, String> {
    std::fs::read_to_string(path)
        .map(Zeroizing::new)
        .map_err(|e| format!("cannot read key file: {}", e))
}

/// Load a PEM private key in PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1
/// (`BEGIN RSA PRIVATE KEY`) form
fn load_private_key(path: &Path) -> std::result::Result<RsaPrivateKey, String> {
    let pem = read_pem(path)?;
    if let Ok(key) = RsaPrivateKey::from_pkcs8_pem(pem.as_str()) {
        return Ok(key);
    }
    RsaPrivateKey::from_pkcs1_pem(pem.as_str())
        .map_err(|e| format!("malformed private key: {}", e))
}

/// Load a PEM public key in SubjectPublicKeyInfo (`BEGIN PUBLIC KEY`) or
/// PKCS#1 (`BEGIN RSA PUBLIC KEY`) form
pub fn load_public_key(path: &Path) -> std::result::Result<RsaPublicKey, String> {
    let pem = read_pem(path)?;
    if let Ok(key) = RsaPublicKey::from_public_key_pem(pem.as_str()) {
        return Ok(key);
    }
    RsaPublicKey::from_pkcs1_pem(pem.as_str())
        .map_err(|e| format!("malformed public key: {}", e))
}

impl SignatureEngine for RsaPkcs1Engine {
    fn name(&self) -> &'static str {
        "rsa"
    }

    fn sign(&self, private_key: &Path, payload: &[u8]) -> Result<Signature> {
        let key = load_private_key(private_key).map_err(Error::Signing)?;
        debug!("Signing {} bytes with {}-bit RSA key", payload.len(), key.size() * 8);

        let hashed = digest(payload);
        let bytes = key
            .sign_with_rng(&mut rand::thread_rng(), Pkcs1v15Sign::new::<Sha256>(), &hashed)
            .map_err(|e| Error::Signing(format!("RSA signing failed: {}", e)))?;

        Ok(Signature::new(bytes))
    }

    fn verify(&self, public_key: &Path, payload: &[u8], signature: &Signature) -> Result<bool> {
        let key = load_public_key(public_key).map_err(Error::VerificationTool)?;
        let hashed = digest(payload);

        match key.verify(Pkcs1v15Sign::new::<Sha256>(), &hashed, signature.as_bytes()) {
            Ok(()) => Ok(true),
            Err(e) => {
                debug!("RSA verification rejected signature: {}", e);
                Ok(false)
            }
        }
    }
}
