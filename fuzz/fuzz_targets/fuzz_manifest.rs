#![no_main]

use fwsign_core::Manifest;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(manifest) = Manifest::from_json(text) {
            // Round-trip
            let json = manifest.to_json().unwrap();
            let manifest2 = Manifest::from_json(&json).unwrap();
            assert_eq!(manifest, manifest2);
        }
    }
});
