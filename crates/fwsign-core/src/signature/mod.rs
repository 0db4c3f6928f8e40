//! Detached firmware signatures
//!
//! Signatures are RSASSA-PKCS1-v1_5 over the SHA-256 digest of the
//! unsigned firmware binary, the format produced by
//! `openssl dgst -sha256 -sign`. The signature is raw bytes with no
//! container, so its length equals the RSA modulus size.

mod openssl;
mod pkcs1;
mod transient;

use std::fmt;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

pub use openssl::OpensslEngine;
pub use pkcs1::{load_public_key, RsaPkcs1Engine};
pub use transient::TransientSignature;

/// Signature length of a 4096-bit RSA key in bytes
pub const RSA_4096_SIGNATURE_LEN: usize = 512;

/// SHA-256 digest size in bytes
pub const DIGEST_SIZE: usize = 32;

/// SHA-256 digest of a payload
pub fn digest(payload: &[u8]) -> [u8; DIGEST_SIZE] {
    let hash = Sha256::digest(payload);
    let mut out = [0u8; DIGEST_SIZE];
    out.copy_from_slice(&hash);
    out
}

/// Raw detached signature bytes
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({} bytes)", self.0.len())
    }
}

/// Produces and checks detached signatures
pub trait SignatureEngine {
    /// Short backend name for diagnostics
    fn name(&self) -> &'static str;

    /// Sign the SHA-256 digest of `payload` with the private key at
    /// `private_key`.
    ///
    /// Fails with [`Error::Signing`] when the key cannot be read or parsed,
    /// or the signing operation fails.
    fn sign(&self, private_key: &Path, payload: &[u8]) -> Result<Signature>;

    /// Check `signature` against `payload` with the public key.
    ///
    /// A cryptographic mismatch is `Ok(false)`. [`Error::VerificationTool`]
    /// is reserved for a verification mechanism that cannot run.
    fn verify(&self, public_key: &Path, payload: &[u8], signature: &Signature) -> Result<bool>;

    /// Length in bytes of signatures checked by `public_key`
    fn signature_len(&self, public_key: &Path) -> Result<usize> {
        use rsa::traits::PublicKeyParts;

        let key = load_public_key(public_key).map_err(Error::VerificationTool)?;
        Ok(key.size())
    }
}

/// A signature that has been checked against its payload
///
/// Only [`verify_signature`] produces this type, so holding one proves the
/// verification gate was passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSignature(Signature);

impl VerifiedSignature {
    pub fn signature(&self) -> &Signature {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Re-verify a fresh signature before it may be assembled into an image.
///
/// Returns [`Error::Verification`] if the signature does not match.
pub fn verify_signature(
    engine: &dyn SignatureEngine,
    public_key: &Path,
    payload: &[u8],
    signature: Signature,
) -> Result<VerifiedSignature> {
    if engine.verify(public_key, payload, &signature)? {
        Ok(VerifiedSignature(signature))
    } else {
        Err(Error::Verification(format!(
            "{} signature does not match the payload under the configured public key",
            engine.name()
        )))
    }
}
