// src/engine/pipeline.rs
//
// Raster operations: crop, resize (bilinear), convert.
// Each operation borrows its input and returns a new buffer; nothing is mutated in place.

use crate::engine::decoder::check_dimensions;
use crate::engine::encoder::{encode_with, EncodeOptions, EncodedImage};
use crate::engine::raster::{RasterBuffer, CHANNELS};
use crate::error::{EngineError, Result};
use crate::ops::{ConvertSpec, CropSpec, ResizeSpec};
use rayon::prelude::*;

/// Fit `orig` inside the `target_w x target_h` box keeping the aspect ratio.
/// Each output axis is rounded, at least 1 and never larger than the box.
pub fn calc_resize_dimensions(
    orig_w: u32,
    orig_h: u32,
    target_w: u32,
    target_h: u32,
) -> Result<(u32, u32)> {
    if target_w == 0 || target_h == 0 {
        return Err(EngineError::invalid_dimensions(target_w, target_h));
    }
    if orig_w == 0 || orig_h == 0 {
        return Err(EngineError::invalid_dimensions(orig_w, orig_h));
    }

    let orig_ratio = orig_w as f64 / orig_h as f64;
    let target_ratio = target_w as f64 / target_h as f64;

    let (w, h) = if orig_ratio > target_ratio {
        // wider than the box: width is the binding axis
        let ratio = target_w as f64 / orig_w as f64;
        (target_w, (orig_h as f64 * ratio).round() as u32)
    } else {
        let ratio = target_h as f64 / orig_h as f64;
        ((orig_w as f64 * ratio).round() as u32, target_h)
    };

    Ok((w.clamp(1, target_w), h.clamp(1, target_h)))
}

/// Copy the `spec` rectangle out of `src`. Out-of-bounds rectangles are rejected, never clamped.
pub fn crop(src: &RasterBuffer, spec: &CropSpec) -> Result<RasterBuffer> {
    spec.validate(src.width(), src.height())?;

    let row_bytes = spec.width as usize * CHANNELS;
    let x_offset = spec.x as usize * CHANNELS;
    let mut pixels = Vec::with_capacity(row_bytes * spec.height as usize);
    for y in spec.y..spec.y + spec.height {
        let row = src.row(y);
        pixels.extend_from_slice(&row[x_offset..x_offset + row_bytes]);
    }
    RasterBuffer::new(spec.width, spec.height, pixels)
}

/// Resize according to `spec`. See [`calc_resize_dimensions`] for the aspect-fit rule.
pub fn resize(src: &RasterBuffer, spec: &ResizeSpec) -> Result<RasterBuffer> {
    spec.validate()?;
    let (tw, th) = if spec.maintain_aspect_ratio {
        calc_resize_dimensions(
            src.width(),
            src.height(),
            spec.target_width,
            spec.target_height,
        )?
    } else {
        (spec.target_width, spec.target_height)
    };
    check_dimensions(tw, th)?;
    resize_bilinear(src, tw, th)
}

/// Source sample position and weight for one output coordinate.
#[derive(Clone, Copy, Debug)]
struct Tap {
    lo: usize,
    hi: usize,
    frac: f32,
}

/// Pixel-center mapping: `src = (dst + 0.5) * src_len / dst_len - 0.5`, clamped to the edge.
fn taps(src_len: u32, dst_len: u32) -> Vec<Tap> {
    let scale = src_len as f64 / dst_len as f64;
    let last = (src_len - 1) as f64;
    (0..dst_len)
        .map(|d| {
            let pos = ((d as f64 + 0.5) * scale - 0.5).clamp(0.0, last);
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(src_len as usize - 1);
            Tap {
                lo,
                hi,
                frac: (pos - lo as f64) as f32,
            }
        })
        .collect()
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Bilinear interpolation over the four nearest source pixels on straight
/// (non-premultiplied) channels. Rows are computed in parallel.
pub fn resize_bilinear(src: &RasterBuffer, dst_w: u32, dst_h: u32) -> Result<RasterBuffer> {
    if dst_w == 0 || dst_h == 0 {
        return Err(EngineError::invalid_dimensions(dst_w, dst_h));
    }
    if src.dimensions() == (dst_w, dst_h) {
        return Ok(src.clone());
    }

    let x_taps = taps(src.width(), dst_w);
    let y_taps = taps(src.height(), dst_h);
    let dst_stride = dst_w as usize * CHANNELS;
    let mut pixels = vec![0u8; dst_stride * dst_h as usize];

    pixels
        .par_chunks_mut(dst_stride)
        .zip(y_taps.par_iter())
        .for_each(|(out_row, ty)| {
            let top = src.row(ty.lo as u32);
            let bottom = src.row(ty.hi as u32);
            for (out_px, tx) in out_row.chunks_exact_mut(CHANNELS).zip(&x_taps) {
                let l = tx.lo * CHANNELS;
                let r = tx.hi * CHANNELS;
                for c in 0..CHANNELS {
                    let upper = lerp(top[l + c] as f32, top[r + c] as f32, tx.frac);
                    let lower = lerp(bottom[l + c] as f32, bottom[r + c] as f32, tx.frac);
                    out_px[c] = lerp(upper, lower, ty.frac).round().clamp(0.0, 255.0) as u8;
                }
            }
        });

    RasterBuffer::new(dst_w, dst_h, pixels)
}

/// Re-encode into the requested format using default encoder options.
pub fn convert(src: &RasterBuffer, spec: &ConvertSpec) -> Result<EncodedImage> {
    convert_with(src, spec, EncodeOptions::new(spec.target_format))
}

/// Re-encode with caller-provided background and PNG settings. The quality in `spec`
/// wins over the one in `base`; neither reaches lossless targets.
pub fn convert_with(
    src: &RasterBuffer,
    spec: &ConvertSpec,
    base: EncodeOptions,
) -> Result<EncodedImage> {
    let options = EncodeOptions {
        format: spec.target_format,
        ..base
    }
    .with_quality(
        spec.effective_quality()
            .or(base.quality.filter(|_| spec.target_format.is_lossy())),
    );
    encode_with(src, &options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::FormatKind;
    use crate::engine::decoder::decode_image;
    use crate::error::ErrorKind;

    fn gradient(width: u32, height: u32) -> RasterBuffer {
        RasterBuffer::from_fn(width, height, |x, y| {
            [(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8, 255]
        })
        .unwrap()
    }

    mod resize_calc_tests {
        use super::*;

        #[test]
        fn test_fit_wide_source_into_square() {
            assert_eq!(calc_resize_dimensions(200, 100, 50, 50).unwrap(), (50, 25));
        }

        #[test]
        fn test_fit_tall_source_into_square() {
            assert_eq!(calc_resize_dimensions(100, 400, 100, 100).unwrap(), (25, 100));
        }

        #[test]
        fn test_upscale_fits_box() {
            assert_eq!(calc_resize_dimensions(10, 5, 100, 100).unwrap(), (100, 50));
        }

        #[test]
        fn test_extreme_ratio_never_collapses_to_zero() {
            assert_eq!(calc_resize_dimensions(10_000, 1, 100, 100).unwrap(), (100, 1));
            assert_eq!(calc_resize_dimensions(1, 10_000, 100, 100).unwrap(), (1, 100));
        }

        #[test]
        fn test_zero_target_is_invalid() {
            let err = calc_resize_dimensions(10, 10, 0, 10).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidDimensions);
        }
    }

    mod crop_tests {
        use super::*;

        #[test]
        fn test_crop_copies_exact_region() {
            let src = gradient(10, 8);
            let out = crop(&src, &CropSpec::new(2, 3, 4, 2)).unwrap();
            assert_eq!(out.dimensions(), (4, 2));
            assert_eq!(out.pixel(0, 0), src.pixel(2, 3));
            assert_eq!(out.pixel(3, 1), src.pixel(5, 4));
        }

        #[test]
        fn test_crop_full_image_is_identity() {
            let src = gradient(6, 6);
            assert_eq!(crop(&src, &CropSpec::new(0, 0, 6, 6)).unwrap(), src);
        }

        #[test]
        fn test_crop_out_of_bounds_is_rejected() {
            let src = gradient(100, 50);
            let err = crop(&src, &CropSpec::new(10, 0, 95, 10)).unwrap_err();
            match err {
                EngineError::InvalidCropRegion {
                    x,
                    width,
                    image_width,
                    image_height,
                    ..
                } => {
                    assert_eq!((x, width), (10, 95));
                    assert_eq!((image_width, image_height), (100, 50));
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    mod bilinear_tests {
        use super::*;

        #[test]
        fn test_same_size_is_identity() {
            let src = gradient(9, 7);
            assert_eq!(resize_bilinear(&src, 9, 7).unwrap(), src);
        }

        #[test]
        fn test_constant_image_stays_constant() {
            let src = RasterBuffer::filled(13, 9, [40, 80, 120, 200]).unwrap();
            let out = resize_bilinear(&src, 31, 4).unwrap();
            assert!(out
                .pixels()
                .chunks_exact(4)
                .all(|px| px == [40, 80, 120, 200]));
        }

        #[test]
        fn test_upscale_two_pixels_interpolates_midpoints() {
            let src = RasterBuffer::new(2, 1, vec![0, 0, 0, 255, 200, 200, 200, 255]).unwrap();
            let out = resize_bilinear(&src, 4, 1).unwrap();
            // positions -0.25, 0.25, 0.75, 1.25 clamp to 0, 0.25, 0.75, 1
            assert_eq!(out.pixel(0, 0)[0], 0);
            assert_eq!(out.pixel(1, 0)[0], 50);
            assert_eq!(out.pixel(2, 0)[0], 150);
            assert_eq!(out.pixel(3, 0)[0], 200);
        }

        #[test]
        fn test_downscale_by_two_averages_pairs() {
            let src = RasterBuffer::new(
                4,
                1,
                vec![0, 0, 0, 0, 100, 100, 100, 100, 200, 200, 200, 200, 250, 250, 250, 250],
            )
            .unwrap();
            let out = resize_bilinear(&src, 2, 1).unwrap();
            assert_eq!(out.pixel(0, 0), [50, 50, 50, 50]);
            assert_eq!(out.pixel(1, 0), [225, 225, 225, 225]);
        }

        #[test]
        fn test_single_pixel_source() {
            let src = RasterBuffer::filled(1, 1, [1, 2, 3, 4]).unwrap();
            let out = resize_bilinear(&src, 5, 3).unwrap();
            assert_eq!(out.dimensions(), (5, 3));
            assert_eq!(out.pixel(4, 2), [1, 2, 3, 4]);
        }
    }

    mod resize_tests {
        use super::*;
        use crate::engine::MAX_DIMENSION;

        #[test]
        fn test_oversized_target_is_rejected_before_allocating() {
            let err = resize(&gradient(4, 4), &ResizeSpec::exact(MAX_DIMENSION + 1, 1))
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::LimitExceeded);
            let err = resize(&gradient(4, 4), &ResizeSpec::exact(20_000, 20_000)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::LimitExceeded);
        }

        #[test]
        fn test_exact_resize_hits_target() {
            let out = resize(&gradient(100, 50), &ResizeSpec::exact(30, 70)).unwrap();
            assert_eq!(out.dimensions(), (30, 70));
        }

        #[test]
        fn test_aspect_resize_fits_box() {
            let out = resize(&gradient(100, 50), &ResizeSpec::fit(40, 40)).unwrap();
            assert_eq!(out.dimensions(), (40, 20));
        }

        #[test]
        fn test_zero_target_rejected() {
            let err = resize(&gradient(4, 4), &ResizeSpec::fit(0, 4)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidDimensions);
        }
    }

    mod convert_tests {
        use super::*;
        use crate::codecs::Background;

        #[test]
        fn test_convert_png_to_jpeg_drops_alpha() {
            let src = RasterBuffer::filled(8, 8, [0, 0, 0, 0]).unwrap();
            let out = convert(&src, &ConvertSpec::new(FormatKind::Jpeg, Some(90))).unwrap();
            assert_eq!(out.format, FormatKind::Jpeg);
            let (decoded, _) = decode_image(&out.data).unwrap();
            assert!(decoded.pixel(4, 4)[0] > 245);
        }

        #[test]
        fn test_convert_with_black_background() {
            let src = RasterBuffer::filled(4, 4, [255, 255, 255, 0]).unwrap();
            let base = EncodeOptions::new(FormatKind::Png).with_background(Background::BLACK);
            let out = convert_with(&src, &ConvertSpec::new(FormatKind::Bmp, None), base).unwrap();
            assert_eq!(out.format, FormatKind::Bmp);
            let (decoded, _) = decode_image(&out.data).unwrap();
            assert_eq!(decoded.pixel(0, 0), [0, 0, 0, 255]);
        }

        #[test]
        fn test_convert_lossless_ignores_quality() {
            let src = gradient(5, 5);
            let out = convert(&src, &ConvertSpec::new(FormatKind::Png, Some(1))).unwrap();
            let (decoded, _) = decode_image(&out.data).unwrap();
            assert_eq!(decoded, src);
        }
    }
}
