// src/engine.rs
//
// The core of pixelsmith. Stateless operations over a canonical RGBA8 buffer:
// 1. Decode encoded bytes (format sniffed from the signature)
// 2. Run one operation (crop, resize, convert, diff, inspect)
// 3. Encode the result
//
// This file is a facade over the modules in engine/

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA. Beyond this is likely malicious.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod api;
pub(crate) mod common;
pub(crate) mod decoder;
pub(crate) mod diff;
pub(crate) mod encoder;
pub(crate) mod firewall;
pub(crate) mod inspect;
pub(crate) mod memory;
pub(crate) mod pipeline;
mod pool;
mod raster;
#[cfg(any(test, feature = "stress"))]
mod stress;
pub(crate) mod tasks;

pub use api::{CommandTicket, ImageEngine};
pub use common::{run_with_panic_policy, PanicPolicy};
pub use decoder::{check_dimensions, decode, decode_image, read_header};
pub use diff::{diff, diff_with_threshold, DiffOutcome, DEFAULT_DIFF_THRESHOLD};
pub use encoder::{
    encode, encode_with, EncodeOptions, EncodedImage, QualitySettings, DEFAULT_PNG_OPTIMIZATION,
    DEFAULT_QUALITY,
};
pub use firewall::{FirewallConfig, FirewallPolicy};
pub use inspect::{inspect, inspect_header, ImageInfo};
pub use memory::{detect_available_memory, estimate_command_bytes, MemoryPermit, WeightedSemaphore};
pub use pipeline::{calc_resize_dimensions, convert, convert_with, crop, resize, resize_bilinear};
pub use raster::RasterBuffer;
pub use tasks::run_command;

#[cfg(feature = "stress")]
pub use stress::run_stress_iteration;
