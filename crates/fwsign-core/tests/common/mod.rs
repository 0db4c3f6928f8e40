//! Shared fixtures for fwsign-core integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use fwsign_core::{KeyPairPaths, Signature, SignatureEngine};
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;

/// Key size used for most tests
pub const TEST_KEY_BITS: usize = 2048;

/// One RSA key per test binary; generating keys is the slowest part
pub fn test_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| {
        RsaPrivateKey::new(&mut rand::thread_rng(), TEST_KEY_BITS).expect("generate RSA key")
    })
}

/// A second, unrelated key for wrong-key checks
pub fn other_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| {
        RsaPrivateKey::new(&mut rand::thread_rng(), TEST_KEY_BITS).expect("generate RSA key")
    })
}

/// Write `key` as `priv_key.pem` / `rsa_key.pub` into `dir`
pub fn write_keypair(dir: &Path, key: &RsaPrivateKey) -> KeyPairPaths {
    let private_key = dir.join("priv_key.pem");
    let public_key = dir.join("rsa_key.pub");

    let private_pem = key.to_pkcs8_pem(LineEnding::LF).expect("encode private key");
    std::fs::write(&private_key, private_pem.as_bytes()).expect("write private key");

    let public_pem = key
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .expect("encode public key");
    std::fs::write(&public_key, public_pem).expect("write public key");

    KeyPairPaths::new(private_key, public_key)
}

/// Write an OTA header declaring `major.minor.patch`
pub fn write_ota_header(dir: &Path, major: &str, minor: &str, patch: &str) -> PathBuf {
    let include = dir.join("include");
    std::fs::create_dir_all(&include).expect("create include dir");
    let header = include.join("OTA.h");
    std::fs::write(
        &header,
        format!(
            "#ifndef OTA_H\n#define OTA_H\n\n\
             #define FIRMWARE_VERSION_MAJOR {}\n\
             #define FIRMWARE_VERSION_MINOR {}\n\
             #define FIRMWARE_VERSION_PATCH {}\n\n\
             #define FIRMWARE_NAME \"mdb-cashless\"\n#endif\n",
            major, minor, patch
        ),
    )
    .expect("write OTA header");
    header
}

/// Deterministic pseudo-firmware of `len` bytes
pub fn firmware(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Signs correctly but flips a bit of every signature it returns
pub struct CorruptingEngine<E>(pub E);

impl<E: SignatureEngine> SignatureEngine for CorruptingEngine<E> {
    fn name(&self) -> &'static str {
        "corrupting"
    }

    fn sign(&self, private_key: &Path, payload: &[u8]) -> fwsign_core::Result<Signature> {
        let mut bytes = self.0.sign(private_key, payload)?.as_bytes().to_vec();
        bytes[0] ^= 0x01;
        Ok(Signature::new(bytes))
    }

    fn verify(
        &self,
        public_key: &Path,
        payload: &[u8],
        signature: &Signature,
    ) -> fwsign_core::Result<bool> {
        self.0.verify(public_key, payload, signature)
    }
}

/// Shared sink for formatted log lines
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run `f` with every tracing event, down to TRACE, captured as text
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
    (result, logs)
}

/// Records whether the signature file exists when `verify` runs
pub struct ObservingEngine<E> {
    pub inner: E,
    pub signature_file: PathBuf,
    pub seen_on_disk: Arc<Mutex<Option<bool>>>,
}

impl<E> ObservingEngine<E> {
    pub fn new(inner: E, signature_file: PathBuf) -> Self {
        Self {
            inner,
            signature_file,
            seen_on_disk: Arc::default(),
        }
    }
}

impl<E: SignatureEngine> SignatureEngine for ObservingEngine<E> {
    fn name(&self) -> &'static str {
        "observing"
    }

    fn sign(&self, private_key: &Path, payload: &[u8]) -> fwsign_core::Result<Signature> {
        self.inner.sign(private_key, payload)
    }

    fn verify(
        &self,
        public_key: &Path,
        payload: &[u8],
        signature: &Signature,
    ) -> fwsign_core::Result<bool> {
        *self.seen_on_disk.lock().unwrap() = Some(self.signature_file.exists());
        self.inner.verify(public_key, payload, signature)
    }
}
