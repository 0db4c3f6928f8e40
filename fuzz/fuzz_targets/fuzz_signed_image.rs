#![no_main]

use fwsign_core::image::split;
use fwsign_core::SignedImage;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    // First two bytes pick the signature length
    let signature_len = u16::from_le_bytes([data[0], data[1]]) as usize;
    let image = &data[2..];

    match split(image, signature_len) {
        Ok((sig, payload)) => {
            assert_eq!(sig.len(), signature_len);
            assert_eq!(sig.len() + payload.len(), image.len());

            let parsed = SignedImage::from_bytes(image.to_vec(), signature_len).unwrap();
            assert_eq!(parsed.signature(), sig);
            assert_eq!(parsed.payload(), payload);
        }
        Err(_) => assert!(signature_len == 0 || image.len() < signature_len),
    }
});
