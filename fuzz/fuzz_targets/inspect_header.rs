#![no_main]

use libfuzzer_sys::fuzz_target;
use pixelsmith::engine::{inspect_header, MAX_DIMENSION};

fuzz_target!(|data: &[u8]| {
    if let Ok(info) = inspect_header(data) {
        assert!(info.width <= MAX_DIMENSION && info.height <= MAX_DIMENSION);
        assert_eq!(info.size_bytes, data.len());
    }
});
