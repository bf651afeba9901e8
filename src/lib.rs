// lib.rs
//
// pixelsmith: a stateless image transformation engine.
//
// Encoded bytes in (PNG, JPEG, WebP, BMP, GIF), one of crop / resize / convert /
// compare / inspect, encoded bytes plus metadata out. Work runs on a bounded pool
// under a byte-weighted memory budget, behind a typed command boundary.

// Memory allocator optimization - jemalloc for better performance
// Note: jemalloc is not supported on Windows/MSVC, so we exclude it on that platform
#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

pub mod codecs;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod ops;
pub mod wire;

pub use codecs::{Background, FormatKind};
pub use command::{Command, CommandFailure, CommandOutput, CommandResult, ProcessedImage};
pub use config::EngineConfig;
pub use engine::{
    CommandTicket, DiffOutcome, EncodedImage, FirewallConfig, FirewallPolicy, ImageEngine,
    ImageInfo, RasterBuffer,
};
pub use error::{EngineError, ErrorCategory, ErrorKind, Result};
pub use ops::{ConvertParams, ConvertSpec, CropSpec, ResizeSpec};

/// Crate version string.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Canonical names of every format the engine can read and write.
pub fn supported_formats() -> Vec<&'static str> {
    FormatKind::ALL.iter().map(FormatKind::as_str).collect()
}
