// src/engine/diff.rs
//
// Visual diff of two rasters. Unchanged pixels render white, changed pixels render
// on a red ramp that saturates with the size of the channel delta.

use crate::engine::pipeline::resize_bilinear;
use crate::engine::raster::{RasterBuffer, CHANNELS};
use crate::error::Result;
use rayon::prelude::*;
use tracing::debug;

/// Channel delta below which a pixel counts as unchanged.
pub const DEFAULT_DIFF_THRESHOLD: u8 = 10;

/// Intensity of the faintest red used for a changed pixel.
const RAMP_FLOOR: u32 = 64;

const UNCHANGED: [u8; 4] = [255, 255, 255, 255];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffOutcome {
    pub buffer: RasterBuffer,
    pub changed_pixels: u64,
}

/// Largest absolute difference over R, G, B and A.
#[inline]
pub fn pixel_delta(a: &[u8], b: &[u8]) -> u8 {
    a.iter()
        .zip(b)
        .take(CHANNELS)
        .map(|(&x, &y)| x.abs_diff(y))
        .max()
        .unwrap_or(0)
}

/// Color for one pixel given its delta. A non-zero `delta >= threshold` is always a
/// shade of red; identical pixels are white whatever the threshold.
#[inline]
pub fn ramp_color(delta: u8, threshold: u8) -> [u8; 4] {
    if delta == 0 || delta < threshold {
        return UNCHANGED;
    }
    let span = 255 - threshold as u32;
    let over = (delta - threshold) as u32;
    let intensity = if span == 0 {
        255
    } else {
        RAMP_FLOOR + over * (255 - RAMP_FLOOR) / span
    };
    let fade = (255 - intensity) as u8;
    [255, fade, fade, 255]
}

/// Bring both inputs to a common size: the smaller one (by area, then width) is stretched
/// to the larger one's exact dimensions.
fn align<'a>(
    a: &'a RasterBuffer,
    b: &'a RasterBuffer,
) -> Result<(std::borrow::Cow<'a, RasterBuffer>, std::borrow::Cow<'a, RasterBuffer>)> {
    use std::borrow::Cow;

    if a.dimensions() == b.dimensions() {
        return Ok((Cow::Borrowed(a), Cow::Borrowed(b)));
    }
    let a_is_smaller = (a.area(), a.width()) < (b.area(), b.width());
    if a_is_smaller {
        let stretched = resize_bilinear(a, b.width(), b.height())?;
        Ok((Cow::Owned(stretched), Cow::Borrowed(b)))
    } else {
        let stretched = resize_bilinear(b, a.width(), a.height())?;
        Ok((Cow::Borrowed(a), Cow::Owned(stretched)))
    }
}

/// Diff with an explicit threshold.
pub fn diff_with_threshold(a: &RasterBuffer, b: &RasterBuffer, threshold: u8) -> Result<DiffOutcome> {
    let (left, right) = align(a, b)?;
    let (width, height) = left.dimensions();
    let stride = left.row_stride();
    let mut pixels = vec![0u8; left.pixels().len()];

    let changed_pixels: u64 = pixels
        .par_chunks_mut(stride)
        .zip(left.pixels().par_chunks(stride))
        .zip(right.pixels().par_chunks(stride))
        .map(|((out_row, l_row), r_row)| {
            let mut changed = 0u64;
            for ((out, l), r) in out_row
                .chunks_exact_mut(CHANNELS)
                .zip(l_row.chunks_exact(CHANNELS))
                .zip(r_row.chunks_exact(CHANNELS))
            {
                let delta = pixel_delta(l, r);
                if delta >= threshold {
                    changed += 1;
                }
                out.copy_from_slice(&ramp_color(delta, threshold));
            }
            changed
        })
        .sum();

    debug!(width, height, threshold, changed_pixels, "diff computed");
    Ok(DiffOutcome {
        buffer: RasterBuffer::new(width, height, pixels)?,
        changed_pixels,
    })
}

/// Diff with the default threshold.
pub fn diff(a: &RasterBuffer, b: &RasterBuffer) -> Result<DiffOutcome> {
    diff_with_threshold(a, b, DEFAULT_DIFF_THRESHOLD)
}
