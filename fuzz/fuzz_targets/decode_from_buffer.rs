#![no_main]

use libfuzzer_sys::fuzz_target;
use pixelsmith::engine::{decode_image, encode};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // Anything that decodes must re-encode in its own format.
    if let Ok((raster, format)) = decode_image(data) {
        if raster.area() <= 1 << 20 {
            let _ = encode(&raster, format, Some(75));
        }
    }
});
