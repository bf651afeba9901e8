// src/codecs/format.rs
//
// The closed set of formats the engine reads and writes, plus magic-byte detection.

use crate::error::{EngineError, Result};
use image::ImageFormat;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Encoded image formats understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    Png,
    Jpeg,
    WebP,
    Bmp,
    Gif,
}

impl FormatKind {
    pub const ALL: [FormatKind; 5] = [
        FormatKind::Png,
        FormatKind::Jpeg,
        FormatKind::WebP,
        FormatKind::Bmp,
        FormatKind::Gif,
    ];

    /// Canonical lowercase name (`png`, `jpeg`, `webp`, `bmp`, `gif`).
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatKind::Png => "png",
            FormatKind::Jpeg => "jpeg",
            FormatKind::WebP => "webp",
            FormatKind::Bmp => "bmp",
            FormatKind::Gif => "gif",
        }
    }

    /// Parse a user-supplied format name. Case-insensitive, accepts `jpg`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "png" => Some(FormatKind::Png),
            "jpeg" | "jpg" => Some(FormatKind::Jpeg),
            "webp" => Some(FormatKind::WebP),
            "bmp" => Some(FormatKind::Bmp),
            "gif" => Some(FormatKind::Gif),
            _ => None,
        }
    }

    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(FormatKind::Png),
            ImageFormat::Jpeg => Some(FormatKind::Jpeg),
            ImageFormat::WebP => Some(FormatKind::WebP),
            ImageFormat::Bmp => Some(FormatKind::Bmp),
            ImageFormat::Gif => Some(FormatKind::Gif),
            _ => None,
        }
    }

    pub fn to_image_format(self) -> ImageFormat {
        match self {
            FormatKind::Png => ImageFormat::Png,
            FormatKind::Jpeg => ImageFormat::Jpeg,
            FormatKind::WebP => ImageFormat::WebP,
            FormatKind::Bmp => ImageFormat::Bmp,
            FormatKind::Gif => ImageFormat::Gif,
        }
    }

    /// Whether the quality parameter changes the encoded output.
    pub fn is_lossy(&self) -> bool {
        matches!(self, FormatKind::Jpeg | FormatKind::WebP)
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| EngineError::invalid_format(s.to_string()))
    }
}

impl Serialize for FormatKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FormatKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        FormatKind::from_name(&name).ok_or_else(|| {
            serde::de::Error::custom(format!("unknown image format '{name}'"))
        })
    }
}

/// Detect input format using magic bytes.
///
/// Signatures outside the supported set (TIFF, AVIF, ...) and inputs too short to carry
/// any signature are reported as `UnsupportedFormat`.
pub fn detect_format(bytes: &[u8]) -> Result<FormatKind> {
    if bytes.is_empty() {
        return Err(EngineError::unsupported_format("empty input"));
    }
    let guessed = image::guess_format(bytes)
        .map_err(|_| EngineError::unsupported_format("unrecognized signature"))?;
    FormatKind::from_image_format(guessed).ok_or_else(|| {
        EngineError::unsupported_format(format!(
            "{} input is not supported",
            guessed.to_mime_type()
        ))
    })
}
