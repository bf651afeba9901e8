// src/codecs/mod.rs
//
// Format tags, signature detection and the channel-model adapters
// (alpha flattening, binary transparency) that encoders need.

pub mod flatten;
pub mod format;

pub use flatten::{binarize_alpha, fits_gif_palette, flatten_onto, Background};
pub use format::{detect_format, FormatKind};
