// src/engine/encoder.rs
//
// Encoder operations: JPEG (mozjpeg), PNG (image + oxipng), WebP (libwebp), BMP and GIF (image crate)

use crate::codecs::{binarize_alpha, flatten_onto, Background, FormatKind};
use crate::engine::common::{run_with_panic_policy, PanicPolicy};
use crate::engine::raster::RasterBuffer;
use crate::engine::MAX_DIMENSION;
use crate::error::{EngineError, Result};
use image::codecs::bmp::BmpEncoder;
use image::codecs::gif::GifEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, Frame, ImageEncoder, RgbaImage};
use mozjpeg::{ColorSpace, Compress, ScanMode};
use std::fmt;
use tracing::debug;

/// Quality used for JPEG/WebP when the caller does not pass one.
pub const DEFAULT_QUALITY: u8 = 85;

/// Default oxipng preset. Level 2 keeps re-encoding cheap enough for interactive use.
pub const DEFAULT_PNG_OPTIMIZATION: u8 = 2;

/// GIF quantizer speed (1 = best palette, 30 = fastest).
const GIF_QUANTIZER_SPEED: i32 = 10;

/// Encoded bytes plus the format they are in.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub format: FormatKind,
    pub data: Vec<u8>,
}

impl EncodedImage {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Everything an encoder needs besides the pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub format: FormatKind,
    /// JPEG/WebP only. For WebP, `None` selects lossless mode.
    pub quality: Option<u8>,
    /// Color that alpha is composited onto for JPEG and BMP.
    pub background: Background,
    /// oxipng preset for PNG output; `None` skips re-compression.
    pub png_optimization: Option<u8>,
}

impl EncodeOptions {
    pub fn new(format: FormatKind) -> Self {
        Self {
            format,
            quality: None,
            background: Background::default(),
            png_optimization: Some(DEFAULT_PNG_OPTIMIZATION),
        }
    }

    pub fn with_quality(mut self, quality: Option<u8>) -> Self {
        self.quality = quality.map(|q| q.min(100));
        self
    }

    pub fn with_background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    pub fn with_png_optimization(mut self, level: Option<u8>) -> Self {
        self.png_optimization = level;
        self
    }
}

/// Quality bands that drive the per-codec tuning knobs.
/// - High (>=85): visual quality first
/// - Balanced (70-84)
/// - Fast (50-69)
/// - Fastest (<50)
#[derive(Debug, Clone, Copy)]
pub struct QualitySettings {
    quality: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QualityBand {
    High,
    Balanced,
    Fast,
    Fastest,
}

impl QualitySettings {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.min(100) as f32,
        }
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    fn band(&self) -> QualityBand {
        if self.quality >= 85.0 {
            QualityBand::High
        } else if self.quality >= 70.0 {
            QualityBand::Balanced
        } else if self.quality >= 50.0 {
            QualityBand::Fast
        } else {
            QualityBand::Fastest
        }
    }

    pub fn jpeg_smoothing(&self) -> u8 {
        if self.quality >= 90.0 {
            0
        } else if self.quality >= 70.0 {
            5
        } else if self.quality >= 60.0 {
            10
        } else {
            18
        }
    }

    pub fn webp_method(&self) -> i32 {
        4
    }

    pub fn webp_sns_strength(&self) -> i32 {
        match self.band() {
            QualityBand::High => 50,
            QualityBand::Balanced => 70,
            QualityBand::Fast | QualityBand::Fastest => 80,
        }
    }

    pub fn webp_filter_strength(&self) -> i32 {
        if self.quality >= 80.0 {
            20
        } else if self.quality >= 60.0 {
            30
        } else {
            40
        }
    }

    pub fn webp_filter_sharpness(&self) -> i32 {
        match self.band() {
            QualityBand::High => 2,
            QualityBand::Balanced | QualityBand::Fast | QualityBand::Fastest => 0,
        }
    }
}

/// Encode to JPEG using mozjpeg. Alpha is composited onto `background` first.
pub fn encode_jpeg(raster: &RasterBuffer, quality: u8, background: Background) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:jpeg", PanicPolicy::Encode, || {
        let (w, h) = raster.dimensions();
        if w > MAX_DIMENSION || h > MAX_DIMENSION {
            return Err(EngineError::encode_failure(
                "jpeg",
                format!("{w}x{h} exceeds the encoder limit of {MAX_DIMENSION}"),
            ));
        }

        let rgb = flatten_onto(raster, background);
        let settings = QualitySettings::new(quality);

        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(w as usize, h as usize);
        comp.set_color_space(ColorSpace::JCS_YCbCr);
        comp.set_quality(settings.quality());
        comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);
        comp.set_optimize_scans(true);
        comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);
        comp.set_smoothing_factor(settings.jpeg_smoothing());

        let estimated_size = (w as usize * h as usize * 3 / 10).max(4096);
        let mut output = Vec::with_capacity(estimated_size);
        {
            let mut writer = comp.start_compress(&mut output).map_err(|e| {
                EngineError::encode_failure("jpeg", format!("failed to start compress: {e:?}"))
            })?;

            let stride = w as usize * 3;
            for row in rgb.chunks(stride) {
                writer.write_scanlines(row).map_err(|e| {
                    EngineError::encode_failure("jpeg", format!("failed to write scanlines: {e:?}"))
                })?;
            }

            writer.finish().map_err(|e| {
                EngineError::encode_failure("jpeg", format!("failed to finish: {e:?}"))
            })?;
        }
        Ok(output)
    })
}

/// Encode to PNG using the image crate, then losslessly re-compress with oxipng.
pub fn encode_png(raster: &RasterBuffer, optimization: Option<u8>) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:png", PanicPolicy::Encode, || {
        let (w, h) = raster.dimensions();
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(raster.pixels(), w, h, ExtendedColorType::Rgba8)
            .map_err(|e| EngineError::encode_failure("png", e.to_string()))?;

        let Some(level) = optimization else {
            return Ok(buf);
        };

        let mut options = oxipng::Options::from_preset(level);
        options.strip = oxipng::StripChunks::None;
        oxipng::optimize_from_memory(&buf, &options).map_err(|e| {
            EngineError::encode_failure("png", format!("oxipng optimization failed: {e}"))
        })
    })
}

/// Encode to WebP. `Some(quality)` is lossy, `None` is lossless.
/// Fully opaque images are handed to libwebp as RGB to avoid an alpha plane.
pub fn encode_webp(raster: &RasterBuffer, quality: Option<u8>) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:webp", PanicPolicy::Encode, || {
        let (w, h) = raster.dimensions();
        let opaque = raster.is_opaque();
        let rgb;
        let encoder = if opaque {
            rgb = flatten_onto(raster, Background::BLACK);
            webp::Encoder::from_rgb(&rgb, w, h)
        } else {
            webp::Encoder::from_rgba(raster.pixels(), w, h)
        };

        let mut config = webp::WebPConfig::new()
            .map_err(|_| EngineError::internal_panic("failed to create WebPConfig"))?;

        match quality {
            Some(q) => {
                let settings = QualitySettings::new(q);
                config.quality = settings.quality();
                config.method = settings.webp_method();
                config.pass = 1;
                config.preprocessing = 0;
                config.sns_strength = settings.webp_sns_strength();
                config.autofilter = 1;
                config.filter_strength = settings.webp_filter_strength();
                config.filter_sharpness = settings.webp_filter_sharpness();
            }
            None => {
                config.lossless = 1;
                config.quality = 75.0;
                config.method = 4;
                // Keep RGB under fully transparent pixels.
                config.exact = 1;
            }
        }

        let mem = encoder
            .encode_advanced(&config)
            .map_err(|e| EngineError::encode_failure("webp", format!("{e:?}")))?;
        Ok(mem.to_vec())
    })
}

/// Encode to uncompressed 24-bit BMP. Alpha is composited onto `background`.
pub fn encode_bmp(raster: &RasterBuffer, background: Background) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:bmp", PanicPolicy::Encode, || {
        let (w, h) = raster.dimensions();
        let rgb = flatten_onto(raster, background);
        let mut buf = Vec::with_capacity(rgb.len() + 54 + h as usize * 4);
        BmpEncoder::new(&mut buf)
            .write_image(&rgb, w, h, ExtendedColorType::Rgb8)
            .map_err(|e| EngineError::encode_failure("bmp", e.to_string()))?;
        Ok(buf)
    })
}

/// Encode to a single-frame GIF: palette quantized to 256 colors, binary transparency.
pub fn encode_gif(raster: &RasterBuffer) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:gif", PanicPolicy::Encode, || {
        let (w, h) = raster.dimensions();
        let rgba = RgbaImage::from_raw(w, h, binarize_alpha(raster))
            .ok_or_else(|| EngineError::buffer_size_mismatch(raster.area() * 4, 0))?;

        let mut buf = Vec::new();
        {
            let mut encoder = GifEncoder::new_with_speed(&mut buf, GIF_QUANTIZER_SPEED);
            encoder
                .encode_frame(Frame::new(rgba))
                .map_err(|e| EngineError::encode_failure("gif", e.to_string()))?;
        }
        Ok(buf)
    })
}

/// Encode with full control over per-format options.
pub fn encode_with(raster: &RasterBuffer, options: &EncodeOptions) -> Result<EncodedImage> {
    let quality = options.quality.map(|q| q.min(100));
    let data = match options.format {
        FormatKind::Jpeg => encode_jpeg(
            raster,
            quality.unwrap_or(DEFAULT_QUALITY),
            options.background,
        )?,
        FormatKind::Png => encode_png(raster, options.png_optimization)?,
        FormatKind::WebP => encode_webp(raster, quality)?,
        FormatKind::Bmp => encode_bmp(raster, options.background)?,
        FormatKind::Gif => encode_gif(raster)?,
    };

    debug!(
        format = options.format.as_str(),
        width = raster.width(),
        height = raster.height(),
        bytes = data.len(),
        "encoded"
    );
    Ok(EncodedImage {
        format: options.format,
        data,
    })
}

/// Codec-layer encode. Quality applies to JPEG and WebP only and is clamped to 0-100.
pub fn encode(raster: &RasterBuffer, format: FormatKind, quality: Option<u8>) -> Result<EncodedImage> {
    encode_with(raster, &EncodeOptions::new(format).with_quality(quality))
}
