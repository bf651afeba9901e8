// src/engine/decoder.rs
//
// Decoder operations: JPEG (mozjpeg), PNG (zune-png), WebP (libwebp), BMP/GIF (image crate).
// Every path ends in the canonical RGBA8 RasterBuffer.

use crate::codecs::{detect_format, FormatKind};
use crate::engine::common::{run_with_panic_policy, PanicPolicy};
use crate::engine::raster::RasterBuffer;
use crate::engine::{MAX_DIMENSION, MAX_PIXELS};
use crate::error::{EngineError, Result};
use image::error::{ImageError, LimitErrorKind};
use image::ImageReader;
use mozjpeg::Decompress;
use std::io::Cursor;
use tracing::debug;
use webp::{BitstreamFeatures, Decoder as WebPDecoder};
use zune_core::bytestream::ZCursor;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_core::result::DecodingResult;
use zune_png::PngDecoder;

/// Map an `image` crate failure on recognized input to the engine taxonomy.
pub(crate) fn map_decode_error(format: FormatKind, err: ImageError) -> EngineError {
    match err {
        ImageError::Limits(limit) => match limit.kind() {
            LimitErrorKind::DimensionError => {
                EngineError::dimension_exceeds_limit(MAX_DIMENSION + 1, MAX_DIMENSION)
            }
            _ => EngineError::firewall_violation(format!("{format} decoder limit: {limit}")),
        },
        ImageError::Unsupported(e) => {
            EngineError::unsupported_format(format!("{format} variant not supported: {e}"))
        }
        other => EngineError::corrupt_data(format.as_str(), other.to_string()),
    }
}

/// Check if image dimensions are within safe limits.
/// Returns an error if the image is too large (potential decompression bomb).
pub fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(EngineError::dimension_exceeds_limit(
            width.max(height),
            MAX_DIMENSION,
        ));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(EngineError::pixel_count_exceeds_limit(pixels, MAX_PIXELS));
    }
    Ok(())
}

/// Read width, height and format from the header without decoding pixels.
pub fn read_header(bytes: &[u8]) -> Result<(u32, u32, FormatKind)> {
    let format = detect_format(bytes)?;
    let reader = ImageReader::with_format(Cursor::new(bytes), format.to_image_format());
    let (width, height) = run_with_panic_policy("header:image", PanicPolicy::Decode, || {
        reader
            .into_dimensions()
            .map_err(|e| map_decode_error(format, e))
    })?;
    Ok((width, height, format))
}

/// Reject decompression bombs from the header alone. Headers that cannot be parsed
/// are let through; the full decode reports the real error.
pub fn ensure_dimensions_safe(bytes: &[u8]) -> Result<()> {
    match read_header(bytes) {
        Ok((width, height, _)) => check_dimensions(width, height),
        Err(_) => Ok(()),
    }
}

/// Decode JPEG using mozjpeg (backed by libjpeg-turbo).
pub fn decode_jpeg_mozjpeg(data: &[u8]) -> Result<RasterBuffer> {
    run_with_panic_policy("decode:jpeg", PanicPolicy::Decode, || {
        if !data.windows(2).any(|pair| pair == [0xFF, 0xD9]) {
            return Err(EngineError::corrupt_data("jpeg", "missing EOI marker"));
        }

        let decompress = Decompress::new_mem(data).map_err(|e| {
            EngineError::corrupt_data("jpeg", format!("decompress init failed: {e:?}"))
        })?;

        let mut decompress = decompress.rgb().map_err(|e| {
            EngineError::corrupt_data("jpeg", format!("rgb conversion failed: {e:?}"))
        })?;

        let width = decompress.width();
        let height = decompress.height();
        if width > MAX_DIMENSION as usize || height > MAX_DIMENSION as usize {
            return Err(EngineError::dimension_exceeds_limit(
                width.max(height).min(u32::MAX as usize) as u32,
                MAX_DIMENSION,
            ));
        }
        let (width, height) = (width as u32, height as u32);
        check_dimensions(width, height)?;

        let scanlines: Vec<[u8; 3]> = decompress.read_scanlines().map_err(|e| {
            EngineError::corrupt_data("jpeg", format!("failed to read scanlines: {e:?}"))
        })?;
        let rgb: Vec<u8> = scanlines.into_iter().flatten().collect();

        RasterBuffer::from_rgb(width, height, &rgb)
            .map_err(|e| EngineError::corrupt_data("jpeg", e.to_string()))
    })
}

/// Decode PNG using zune-png. 16-bit input is stripped to 8-bit.
pub fn decode_png_zune(data: &[u8]) -> Result<RasterBuffer> {
    let decoded = run_with_panic_policy("decode:png", PanicPolicy::Decode, || {
        let options = DecoderOptions::default().png_set_strip_to_8bit(true);
        let mut decoder = PngDecoder::new_with_options(ZCursor::new(data), options);
        let pixels = decoder
            .decode()
            .map_err(|e| EngineError::corrupt_data("png", format!("{e:?}")))?;

        let info = decoder
            .info()
            .ok_or_else(|| EngineError::corrupt_data("png", "missing header info"))?;
        let width = info.width as u32;
        let height = info.height as u32;
        check_dimensions(width, height)?;

        let colorspace = decoder.colorspace();
        let buf = match pixels {
            DecodingResult::U8(v) => v,
            _ => return Ok(None),
        };

        let raster = match colorspace {
            Some(ColorSpace::RGBA) => RasterBuffer::new(width, height, buf)?,
            Some(ColorSpace::RGB) => RasterBuffer::from_rgb(width, height, &buf)?,
            Some(ColorSpace::Luma) => {
                let rgb: Vec<u8> = buf.iter().flat_map(|&l| [l, l, l]).collect();
                RasterBuffer::from_rgb(width, height, &rgb)?
            }
            Some(ColorSpace::LumaA) => {
                let rgba: Vec<u8> = buf
                    .chunks_exact(2)
                    .flat_map(|la| [la[0], la[0], la[0], la[1]])
                    .collect();
                RasterBuffer::new(width, height, rgba)?
            }
            _ => return Ok(None),
        };
        Ok(Some(raster))
    })?;

    match decoded {
        Some(raster) => Ok(raster),
        None => {
            debug!("zune-png produced an unexpected layout; using image crate");
            decode_with_image_crate(data, FormatKind::Png)
        }
    }
}

/// Decode WebP using libwebp (via webp crate). Animated WebP goes through the image crate.
pub fn decode_webp_libwebp(data: &[u8]) -> Result<RasterBuffer> {
    let features = BitstreamFeatures::new(data)
        .ok_or_else(|| EngineError::corrupt_data("webp", "failed to read bitstream features"))?;

    if features.has_animation() {
        return decode_with_image_crate(data, FormatKind::WebP);
    }
    check_dimensions(features.width(), features.height())?;

    run_with_panic_policy("decode:webp", PanicPolicy::Decode, || {
        let decoded = WebPDecoder::new(data)
            .decode()
            .ok_or_else(|| EngineError::corrupt_data("webp", "decode failed"))?;
        let (width, height) = (decoded.width(), decoded.height());
        check_dimensions(width, height)?;

        if decoded.is_alpha() {
            RasterBuffer::new(width, height, decoded.to_vec())
        } else {
            RasterBuffer::from_rgb(width, height, &decoded)
        }
    })
}

/// Decode with the image crate under the panic policy. Used for BMP, GIF (first frame)
/// and as the fallback for layouts the specialized decoders reject.
pub fn decode_with_image_crate(data: &[u8], format: FormatKind) -> Result<RasterBuffer> {
    run_with_panic_policy("decode:image", PanicPolicy::Decode, || {
        let img = image::load_from_memory_with_format(data, format.to_image_format())
            .map_err(|e| map_decode_error(format, e))?;
        check_dimensions(img.width(), img.height())?;
        RasterBuffer::from_dynamic(img)
    })
}

/// Unified decode entrypoint:
/// - Detect format once (magic bytes)
/// - Reject oversized images from the header
/// - Route to the specialized decoder
pub fn decode_image(bytes: &[u8]) -> Result<(RasterBuffer, FormatKind)> {
    let format = detect_format(bytes)?;
    ensure_dimensions_safe(bytes)?;

    let raster = match format {
        FormatKind::Jpeg => decode_jpeg_mozjpeg(bytes).or_else(|err| {
            // CMYK and some progressive variants trip mozjpeg's RGB path.
            debug!(%err, "mozjpeg failed; retrying with image crate");
            decode_with_image_crate(bytes, FormatKind::Jpeg).map_err(|_| err)
        })?,
        FormatKind::Png => decode_png_zune(bytes)?,
        FormatKind::WebP => decode_webp_libwebp(bytes)?,
        FormatKind::Bmp | FormatKind::Gif => decode_with_image_crate(bytes, format)?,
    };

    debug!(
        format = format.as_str(),
        width = raster.width(),
        height = raster.height(),
        "decoded"
    );
    Ok((raster, format))
}

/// Codec-layer decode: bytes in, canonical buffer out.
pub fn decode(bytes: &[u8]) -> Result<RasterBuffer> {
    decode_image(bytes).map(|(raster, _)| raster)
}
