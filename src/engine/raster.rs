// src/engine/raster.rs
//
// Canonical decoded image: tightly packed RGBA8, row-major, top-to-bottom.

use crate::error::{EngineError, Result};
use image::{DynamicImage, RgbaImage};
use std::fmt;

pub const CHANNELS: usize = 4;

/// Decoded image owned by a single request.
///
/// Invariant: `pixels.len() == width * height * 4` and both dimensions are non-zero.
/// Operations never mutate a buffer in place; they return a new one.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RasterBuffer {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(EngineError::invalid_dimensions(width, height));
        }
        let expected = width as u64 * height as u64 * CHANNELS as u64;
        if pixels.len() as u64 != expected {
            return Err(EngineError::buffer_size_mismatch(
                expected,
                pixels.len() as u64,
            ));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Buffer where every pixel has the same RGBA value.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(EngineError::invalid_dimensions(width, height));
        }
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * CHANNELS);
        for _ in 0..count {
            pixels.extend_from_slice(&rgba);
        }
        Self::new(width, height, pixels)
    }

    /// Build a buffer by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [u8; 4]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(EngineError::invalid_dimensions(width, height));
        }
        let mut pixels = Vec::with_capacity(width as usize * height as usize * CHANNELS);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&f(x, y));
            }
        }
        Self::new(width, height, pixels)
    }

    /// Normalize any decoded image to RGBA8.
    pub fn from_dynamic(img: DynamicImage) -> Result<Self> {
        let rgba = match img {
            DynamicImage::ImageRgba8(rgba) => rgba,
            other => other.to_rgba8(),
        };
        Self::from_rgba_image(rgba)
    }

    pub fn from_rgba_image(img: RgbaImage) -> Result<Self> {
        let (width, height) = img.dimensions();
        Self::new(width, height, img.into_raw())
    }

    /// Expand packed RGB8 into RGBA8 with opaque alpha.
    pub fn from_rgb(width: u32, height: u32, rgb: &[u8]) -> Result<Self> {
        let expected = width as u64 * height as u64 * 3;
        if rgb.len() as u64 != expected {
            return Err(EngineError::buffer_size_mismatch(expected, rgb.len() as u64));
        }
        let mut pixels = Vec::with_capacity(rgb.len() / 3 * CHANNELS);
        for px in rgb.chunks_exact(3) {
            pixels.extend_from_slice(&[px[0], px[1], px[2], 255]);
        }
        Self::new(width, height, pixels)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Total pixel count.
    #[inline]
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn row_stride(&self) -> usize {
        self.width as usize * CHANNELS
    }

    /// RGBA value at `(x, y)`. Panics when out of bounds, like slice indexing.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = y as usize * self.row_stride() + x as usize * CHANNELS;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.row_stride();
        let start = y as usize * stride;
        &self.pixels[start..start + stride]
    }

    /// True when every alpha sample is 255.
    pub fn is_opaque(&self) -> bool {
        self.pixels.chunks_exact(CHANNELS).all(|px| px[3] == 255)
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .unwrap_or_else(|| unreachable!("RasterBuffer invariant violated"))
    }
}

impl fmt::Debug for RasterBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}
