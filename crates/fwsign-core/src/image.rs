//! Signed firmware image format
//!
//! Image layout:
//! ```text
//! OFFSET      SIZE        FIELD
//! ──────────────────────────────────────────────────────
//! 0x0000      N           signature (RSA PKCS#1 v1.5, SHA-256)
//! N           rest        firmware binary, unmodified
//! ```
//!
//! There is no header, delimiter, length field or padding. `N` equals the
//! RSA modulus size of the signing key (512 for RSA-4096), so a reader
//! must know the key size to split an image. The OTA update client depends
//! on this exact layout.

use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::release::write_atomically;
use crate::signature::VerifiedSignature;

/// Stream `[signature][payload]` into `out`, returning the bytes written
pub fn assemble_into<W: Write>(
    signature: &VerifiedSignature,
    payload: &[u8],
    out: &mut W,
) -> std::io::Result<u64> {
    out.write_all(signature.as_bytes())?;
    out.write_all(payload)?;
    out.flush()?;
    Ok((signature.len() + payload.len()) as u64)
}

/// Assemble the signed image at `dest`.
///
/// The image is staged next to `dest` and renamed into place, so `dest`
/// holds either the previous image or the complete new one.
pub fn write_image(dest: &Path, signature: &VerifiedSignature, payload: &[u8]) -> Result<u64> {
    let mut written = 0;
    write_atomically(dest, |file| {
        written = assemble_into(signature, payload, file)?;
        Ok(())
    })
    .map_err(Error::Assembly)?;

    debug!("Wrote {} byte signed image to {:?}", written, dest);
    Ok(written)
}

/// Split an image into `(signature, payload)`
pub fn split(image: &[u8], signature_len: usize) -> Result<(&[u8], &[u8])> {
    if signature_len == 0 {
        return Err(Error::Container("signature length must be non-zero".to_string()));
    }
    if image.len() < signature_len {
        return Err(Error::Container(format!(
            "image is {} bytes, shorter than the {} byte signature",
            image.len(),
            signature_len
        )));
    }
    Ok(image.split_at(signature_len))
}

/// An in-memory signed image with a known signature length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedImage {
    bytes: Vec<u8>,
    signature_len: usize,
}

impl SignedImage {
    /// Concatenate a verified signature and its payload
    pub fn assemble(signature: &VerifiedSignature, payload: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(signature.len() + payload.len());
        bytes.extend_from_slice(signature.as_bytes());
        bytes.extend_from_slice(payload);
        Self {
            bytes,
            signature_len: signature.len(),
        }
    }

    /// Interpret raw image bytes whose signature is `signature_len` long
    pub fn from_bytes(bytes: Vec<u8>, signature_len: usize) -> Result<Self> {
        split(&bytes, signature_len)?;
        Ok(Self {
            bytes,
            signature_len,
        })
    }

    /// Read an image file whose signature is `signature_len` long
    pub fn read(path: &Path, signature_len: usize) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| Error::read(path, e))?;
        Self::from_bytes(bytes, signature_len)
    }

    pub fn signature(&self) -> &[u8] {
        &self.bytes[..self.signature_len]
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[self.signature_len..]
    }

    pub fn signature_len(&self) -> usize {
        self.signature_len
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_rejects_short_image() {
        let err = split(&[0u8; 100], 512).unwrap_err();
        assert!(matches!(err, Error::Container(_)));
    }

    #[test]
    fn test_split_rejects_zero_length_signature() {
        assert!(split(&[0u8; 16], 0).is_err());
    }

    #[test]
    fn test_split_signature_only_image() {
        let image = vec![0x5Au8; 512];
        let (sig, payload) = split(&image, 512).unwrap();
        assert_eq!(sig.len(), 512);
        assert!(payload.is_empty());
    }

    #[test]
    fn test_from_bytes_accessors() {
        let mut bytes = vec![0xEEu8; 4];
        bytes.extend_from_slice(b"firmware");

        let image = SignedImage::from_bytes(bytes, 4).unwrap();
        assert_eq!(image.signature(), &[0xEE; 4]);
        assert_eq!(image.payload(), b"firmware");
        assert_eq!(image.len(), 12);
    }
}
