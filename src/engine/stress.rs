// src/engine/stress.rs
//
// Stress test utilities for leak hunting and performance testing.
// Enabled with `--features stress`.

use crate::codecs::FormatKind;
use crate::engine::decoder::decode_image;
use crate::engine::diff::diff;
use crate::engine::encoder::encode;
use crate::engine::pipeline::{crop, resize};
use crate::error::Result;
use crate::ops::{CropSpec, ResizeSpec};

/// Run a single stress test iteration.
///
/// Decodes `data` once, then runs every operation and encodes the results into every
/// format. Outputs are dropped; the harness only cares that nothing fails or leaks.
pub fn run_stress_iteration(data: &[u8]) -> Result<()> {
    let (img, _) = decode_image(data)?;
    let (w, h) = img.dimensions();

    let cropped = crop(&img, &CropSpec::new(w / 4, h / 4, (w / 2).max(1), (h / 2).max(1)))?;
    let fitted = resize(&img, &ResizeSpec::fit(1200, 800))?;
    let stretched = resize(&cropped, &ResizeSpec::exact(w, h))?;
    let compared = diff(&img, &stretched)?;

    for format in FormatKind::ALL {
        let quality = format.is_lossy().then_some(80);
        for raster in [&cropped, &fitted, &compared.buffer] {
            let encoded = encode(raster, format, quality)?;
            let (roundtrip, detected) = decode_image(&encoded.data)?;
            debug_assert_eq!(detected, format);
            debug_assert_eq!(roundtrip.dimensions(), raster.dimensions());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::raster::RasterBuffer;

    #[test]
    fn stress_iteration_runs_on_small_png() {
        let raster = RasterBuffer::from_fn(40, 30, |x, y| [x as u8 * 6, y as u8 * 8, 77, 255]).unwrap();
        let data = encode(&raster, FormatKind::Png, None).unwrap().into_bytes();
        run_stress_iteration(&data).unwrap();
    }

    #[test]
    fn stress_iteration_reports_garbage() {
        assert!(run_stress_iteration(b"garbage").is_err());
    }
}
