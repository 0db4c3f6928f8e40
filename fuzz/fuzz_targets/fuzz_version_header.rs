#![no_main]

use fwsign_core::version::{parse, VersionMarkers};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // Any header text yields a three-part version
        let version = parse(text, &VersionMarkers::default());
        let rendered = version.to_string();
        assert!(rendered.starts_with(version.major()));
        assert!(rendered.ends_with(version.patch()));
    }
});
