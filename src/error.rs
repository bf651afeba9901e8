// src/error.rs
//
// Unified error handling for pixelsmith
// Uses thiserror for simple, type-safe error handling
//
// Two views of every failure:
// - ErrorKind: the stable, programmatic kind carried across the command boundary
// - ErrorCategory: the coarse tier (user / codec / resource / internal)

use serde::Serialize;
use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy tiers.
///
/// - UserError: Invalid input, recoverable by user
/// - CodecError: Format/encoding issues
/// - ResourceLimit: Memory/dimension limits
/// - InternalBug: Library bugs (should not happen)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u32)]
pub enum ErrorCategory {
    UserError,
    CodecError,
    ResourceLimit,
    InternalBug,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "UserError",
            ErrorCategory::CodecError => "CodecError",
            ErrorCategory::ResourceLimit => "ResourceLimit",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }

    /// Get the PIXELSMITH_* error code string for this category
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "PIXELSMITH_USER_ERROR",
            ErrorCategory::CodecError => "PIXELSMITH_CODEC_ERROR",
            ErrorCategory::ResourceLimit => "PIXELSMITH_RESOURCE_LIMIT",
            ErrorCategory::InternalBug => "PIXELSMITH_INTERNAL_BUG",
        }
    }
}

/// Programmatic error kind preserved across the command boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Input signature matches no registered codec.
    UnsupportedFormat,
    /// Signature recognized but payload fails to parse.
    CorruptData,
    /// Crop rectangle out of source bounds or non-positive size.
    InvalidCropRegion,
    /// Resize target width/height non-positive.
    InvalidDimensions,
    /// Convert target format not in the enumerated set.
    InvalidFormat,
    /// Encoder rejected a buffer.
    EncodeFailure,
    /// Input exceeds a configured or hard resource limit.
    LimitExceeded,
    /// The request envelope itself is malformed.
    InvalidRequest,
    /// Library bug or lost worker.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedFormat => "UnsupportedFormat",
            ErrorKind::CorruptData => "CorruptData",
            ErrorKind::InvalidCropRegion => "InvalidCropRegion",
            ErrorKind::InvalidDimensions => "InvalidDimensions",
            ErrorKind::InvalidFormat => "InvalidFormat",
            ErrorKind::EncodeFailure => "EncodeFailure",
            ErrorKind::LimitExceeded => "LimitExceeded",
            ErrorKind::InvalidRequest => "InvalidRequest",
            ErrorKind::Internal => "Internal",
        }
    }
}

/// pixelsmith error types
///
/// Every operation returns one of these instead of panicking. Variants carry the
/// offending values so the boundary can render an actionable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    // Decode Errors
    #[error("Unsupported image format: {detail}")]
    UnsupportedFormat { detail: Cow<'static, str> },

    #[error("Corrupt {format} data: {message}")]
    CorruptData {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    // Operation Errors
    #[error(
        "Crop region {width}x{height} at ({x}, {y}) does not fit inside the {image_width}x{image_height} image"
    )]
    InvalidCropRegion {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("Invalid dimensions: width={width}, height={height}. Both must be at least 1")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Unknown target format: '{name}'. Expected png, jpeg, webp, bmp or gif")]
    InvalidFormat { name: Cow<'static, str> },

    // Encode Errors
    #[error("Failed to encode as {format}: {message}")]
    EncodeFailure {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    // Size Limit Errors
    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    #[error("Image Firewall blocked the image: {reason}")]
    FirewallViolation { reason: Cow<'static, str> },

    // Buffer Errors
    #[error("Raster buffer holds {actual} bytes, expected {expected}")]
    BufferSizeMismatch { expected: u64, actual: u64 },

    // Request/Configuration Errors
    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidArgument {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    #[error("Malformed request: {message}")]
    InvalidRequest { message: Cow<'static, str> },

    // Internal Errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },

    #[error("Worker stopped before replying to {command}")]
    WorkerLost { command: Cow<'static, str> },
}

// Constructor Helpers
impl EngineError {
    pub fn unsupported_format(detail: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat {
            detail: detail.into(),
        }
    }

    pub fn corrupt_data(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::CorruptData {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn invalid_crop_region(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    ) -> Self {
        Self::InvalidCropRegion {
            x,
            y,
            width,
            height,
            image_width,
            image_height,
        }
    }

    pub fn invalid_dimensions(width: u32, height: u32) -> Self {
        Self::InvalidDimensions { width, height }
    }

    pub fn invalid_format(name: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidFormat { name: name.into() }
    }

    pub fn encode_failure(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailure {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn firewall_violation(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::FirewallViolation {
            reason: reason.into(),
        }
    }

    pub fn buffer_size_mismatch(expected: u64, actual: u64) -> Self {
        Self::BufferSizeMismatch { expected, actual }
    }

    pub fn invalid_argument(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    pub fn worker_lost(command: impl Into<Cow<'static, str>>) -> Self {
        Self::WorkerLost {
            command: command.into(),
        }
    }

    /// The programmatic kind exposed across the command boundary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Self::CorruptData { .. } => ErrorKind::CorruptData,
            Self::InvalidCropRegion { .. } => ErrorKind::InvalidCropRegion,
            Self::InvalidDimensions { .. } => ErrorKind::InvalidDimensions,
            Self::InvalidFormat { .. } => ErrorKind::InvalidFormat,
            Self::EncodeFailure { .. } => ErrorKind::EncodeFailure,
            Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::FirewallViolation { .. } => ErrorKind::LimitExceeded,
            Self::InvalidArgument { .. } | Self::InvalidRequest { .. } => {
                ErrorKind::InvalidRequest
            }
            Self::BufferSizeMismatch { .. }
            | Self::InternalPanic { .. }
            | Self::WorkerLost { .. } => ErrorKind::Internal,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self.kind() {
            ErrorKind::InvalidCropRegion
            | ErrorKind::InvalidDimensions
            | ErrorKind::InvalidFormat
            | ErrorKind::InvalidRequest => ErrorCategory::UserError,

            ErrorKind::UnsupportedFormat | ErrorKind::CorruptData | ErrorKind::EncodeFailure => {
                ErrorCategory::CodecError
            }

            ErrorKind::LimitExceeded => ErrorCategory::ResourceLimit,

            ErrorKind::Internal => ErrorCategory::InternalBug,
        }
    }

    /// Check if this error is recoverable (user can fix it)
    ///
    /// Consistent with category(): UserError and ResourceLimit are recoverable
    /// (fix the parameters, shrink the image), CodecError and InternalBug are not.
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::UserError | ErrorCategory::ResourceLimit => true,
            ErrorCategory::CodecError | ErrorCategory::InternalBug => false,
        }
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_bounds() {
        let err = EngineError::invalid_crop_region(10, 20, 100, 50, 64, 64);
        let msg = err.to_string();
        assert!(msg.contains("100x50"));
        assert!(msg.contains("(10, 20)"));
        assert!(msg.contains("64x64"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            EngineError::unsupported_format("tiff").kind(),
            ErrorKind::UnsupportedFormat
        );
        assert_eq!(
            EngineError::corrupt_data("png", "bad crc").kind(),
            ErrorKind::CorruptData
        );
        assert_eq!(
            EngineError::invalid_dimensions(0, 10).kind(),
            ErrorKind::InvalidDimensions
        );
        assert_eq!(
            EngineError::invalid_format("tga").kind(),
            ErrorKind::InvalidFormat
        );
        assert_eq!(
            EngineError::encode_failure("gif", "too wide").kind(),
            ErrorKind::EncodeFailure
        );
        assert_eq!(
            EngineError::dimension_exceeds_limit(40000, 32768).kind(),
            ErrorKind::LimitExceeded
        );
        assert_eq!(
            EngineError::firewall_violation("too big").kind(),
            ErrorKind::LimitExceeded
        );
        assert_eq!(
            EngineError::invalid_argument("quality", "x", "not a number").kind(),
            ErrorKind::InvalidRequest
        );
        assert_eq!(
            EngineError::buffer_size_mismatch(16, 15).kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            EngineError::worker_lost("crop_image").kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_error_recoverable() {
        assert!(EngineError::invalid_crop_region(0, 0, 100, 100, 50, 50).is_recoverable());
        assert!(EngineError::invalid_dimensions(0, 0).is_recoverable());
        assert!(EngineError::pixel_count_exceeds_limit(1_000_000_000, 100_000_000).is_recoverable());
        assert!(!EngineError::corrupt_data("jpeg", "truncated").is_recoverable());
        assert!(!EngineError::internal_panic("boom").is_recoverable());
    }

    #[test]
    fn test_error_category_mapping() {
        assert_eq!(
            EngineError::invalid_format("tga").category(),
            ErrorCategory::UserError
        );
        assert_eq!(
            EngineError::encode_failure("webp", "x").category(),
            ErrorCategory::CodecError
        );
        assert_eq!(
            EngineError::firewall_violation("x").category(),
            ErrorCategory::ResourceLimit
        );
        assert_eq!(
            EngineError::internal_panic("x").category(),
            ErrorCategory::InternalBug
        );
    }

    #[test]
    fn test_category_codes() {
        assert_eq!(ErrorCategory::UserError.code(), "PIXELSMITH_USER_ERROR");
        assert_eq!(ErrorCategory::CodecError.as_str(), "CodecError");
        assert_eq!(ErrorKind::InvalidCropRegion.as_str(), "InvalidCropRegion");
    }
}
