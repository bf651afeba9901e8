// src/ops.rs
//
// Strongly typed operation parameters.
// These are plain values validated against a specific RasterBuffer when the operation runs.

use crate::codecs::FormatKind;
use crate::error::{EngineError, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// Crop rectangle in source pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropSpec {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropSpec {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Check the rectangle against source dimensions. Never clamps.
    pub fn validate(&self, image_width: u32, image_height: u32) -> Result<()> {
        let fits_x = (self.x as u64 + self.width as u64) <= image_width as u64;
        let fits_y = (self.y as u64 + self.height as u64) <= image_height as u64;
        if self.width == 0 || self.height == 0 || !fits_x || !fits_y {
            return Err(EngineError::invalid_crop_region(
                self.x,
                self.y,
                self.width,
                self.height,
                image_width,
                image_height,
            ));
        }
        Ok(())
    }
}

/// Resize target. With `maintain_aspect_ratio` the target is a bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeSpec {
    #[serde(alias = "width")]
    pub target_width: u32,
    #[serde(alias = "height")]
    pub target_height: u32,
    #[serde(default)]
    pub maintain_aspect_ratio: bool,
}

impl ResizeSpec {
    pub fn exact(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
            maintain_aspect_ratio: false,
        }
    }

    pub fn fit(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
            maintain_aspect_ratio: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_width == 0 || self.target_height == 0 {
            return Err(EngineError::invalid_dimensions(
                self.target_width,
                self.target_height,
            ));
        }
        Ok(())
    }
}

/// Validated conversion target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ConvertSpec {
    pub target_format: FormatKind,
    /// Ignored for PNG, BMP and GIF.
    pub quality: Option<u8>,
}

impl ConvertSpec {
    pub fn new(target_format: FormatKind, quality: Option<u8>) -> Self {
        Self {
            target_format,
            quality: quality.map(|q| q.min(100)),
        }
    }

    /// Quality that actually reaches the encoder.
    pub fn effective_quality(&self) -> Option<u8> {
        if self.target_format.is_lossy() {
            self.quality
        } else {
            None
        }
    }
}

/// Untrusted conversion request as it arrives at the boundary.
/// The format is still a free-form name and the quality may be out of range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertParams {
    #[serde(alias = "format")]
    pub target_format: String,
    /// Any JSON number is accepted here and clamped later; fractions round to nearest.
    #[serde(default, deserialize_with = "any_number_quality")]
    pub quality: Option<i32>,
}

/// `f64 as i32` saturates, so huge values land on the bounds `clamp_quality` expects.
fn any_number_quality<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<i32>, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.map(|q| q.round() as i32))
}

impl ConvertParams {
    pub fn new(target_format: impl Into<String>, quality: Option<i32>) -> Self {
        Self {
            target_format: target_format.into(),
            quality,
        }
    }
}

impl TryFrom<ConvertParams> for ConvertSpec {
    type Error = EngineError;

    fn try_from(params: ConvertParams) -> Result<Self> {
        let target_format: FormatKind = params.target_format.parse()?;
        Ok(ConvertSpec::new(target_format, params.quality.map(clamp_quality)))
    }
}

/// Clamp a caller-supplied quality into 0-100.
pub fn clamp_quality(quality: i32) -> u8 {
    quality.clamp(0, 100) as u8
}
