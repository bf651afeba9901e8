// src/codecs/flatten.rs
//
// Channel-model adapters applied right before encoding into formats that
// cannot carry a full alpha channel.

use crate::engine::RasterBuffer;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Colors a GIF palette can hold, the transparent entry included.
pub const GIF_PALETTE_SIZE: usize = 256;

/// Alpha values at or above this are kept opaque when reducing to binary transparency.
pub const GIF_ALPHA_CUTOFF: u8 = 128;

/// Opaque color that transparent pixels are composited onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Background(pub [u8; 3]);

impl Background {
    pub const WHITE: Background = Background([255, 255, 255]);
    pub const BLACK: Background = Background([0, 0, 0]);
}

impl Default for Background {
    fn default() -> Self {
        Self::WHITE
    }
}

#[inline]
fn blend(channel: u8, background: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    ((channel as u32 * a + background as u32 * (255 - a) + 127) / 255) as u8
}

/// Composite every pixel onto `background`, dropping alpha. Returns packed RGB8.
pub fn flatten_onto(raster: &RasterBuffer, background: Background) -> Vec<u8> {
    let [br, bg, bb] = background.0;
    let mut rgb = Vec::with_capacity(raster.area() as usize * 3);
    for px in raster.pixels().chunks_exact(4) {
        match px[3] {
            255 => rgb.extend_from_slice(&px[..3]),
            0 => rgb.extend_from_slice(&[br, bg, bb]),
            a => rgb.extend_from_slice(&[blend(px[0], br, a), blend(px[1], bg, a), blend(px[2], bb, a)]),
        }
    }
    rgb
}

/// Reduce alpha to fully transparent / fully opaque. Transparent pixels are zeroed
/// so the palette quantizer sees a single transparent color.
pub fn binarize_alpha(raster: &RasterBuffer) -> Vec<u8> {
    let mut rgba = raster.pixels().to_vec();
    for px in rgba.chunks_exact_mut(4) {
        if px[3] >= GIF_ALPHA_CUTOFF {
            px[3] = 255;
        } else {
            px.copy_from_slice(&[0, 0, 0, 0]);
        }
    }
    rgba
}

/// Whether a GIF can store `raster` without quantizing: alpha is already binary and the
/// opaque colors plus one transparent entry fit the palette.
pub fn fits_gif_palette(raster: &RasterBuffer) -> bool {
    let mut colors = HashSet::new();
    let mut transparent = false;
    for px in raster.pixels().chunks_exact(4) {
        match px[3] {
            0 => transparent = true,
            255 => {
                colors.insert([px[0], px[1], px[2]]);
            }
            _ => return false,
        }
        if colors.len() + usize::from(transparent) > GIF_PALETTE_SIZE {
            return false;
        }
    }
    true
}
