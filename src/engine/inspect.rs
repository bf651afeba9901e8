// src/engine/inspect.rs
//
// Metadata inspection: full-decode `inspect` and header-only `inspect_header`.

use crate::codecs::FormatKind;
use crate::engine::decoder::{check_dimensions, decode_image, read_header};
use crate::error::Result;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: FormatKind,
    /// Length of the encoded input.
    pub size_bytes: usize,
}

/// Decode-backed inspection: succeeds exactly when `decode` succeeds.
pub fn inspect(bytes: &[u8]) -> Result<ImageInfo> {
    let (raster, format) = decode_image(bytes)?;
    Ok(ImageInfo {
        width: raster.width(),
        height: raster.height(),
        format,
        size_bytes: bytes.len(),
    })
}

/// Header-only inspection. Cheap, but a corrupt payload behind a valid header passes.
pub fn inspect_header(bytes: &[u8]) -> Result<ImageInfo> {
    let (width, height, format) = read_header(bytes)?;
    check_dimensions(width, height)?;
    Ok(ImageInfo {
        width,
        height,
        format,
        size_bytes: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::{DynamicImage, ImageFormat, RgbaImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(RgbaImage::new(width, height))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn inspect_reports_input_length() {
        let data = png(50, 80);
        let info = inspect(&data).unwrap();
        assert_eq!(
            info,
            ImageInfo {
                width: 50,
                height: 80,
                format: FormatKind::Png,
                size_bytes: data.len(),
            }
        );
    }

    #[test]
    fn header_matches_full_inspect() {
        let data = png(7, 3);
        assert_eq!(inspect_header(&data).unwrap(), inspect(&data).unwrap());
    }

    #[test]
    fn truncated_body_only_fails_full_inspect() {
        let noisy = RgbaImage::from_fn(64, 64, |x, y| {
            image::Rgba([(x * 31 % 256) as u8, (y * 17 % 256) as u8, (x ^ y) as u8, 255])
        });
        let mut data = Vec::new();
        DynamicImage::ImageRgba8(noisy)
            .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
            .unwrap();
        let cut = &data[..data.len() / 2];
        assert!(inspect_header(cut).is_ok());
        assert_eq!(inspect(cut).unwrap_err().kind(), ErrorKind::CorruptData);
    }

    #[test]
    fn info_serializes_with_canonical_format_name() {
        let info = inspect(&png(2, 2)).unwrap();
        let json = serde_json::to_value(info).unwrap();
        assert_eq!(json["format"], "png");
        assert_eq!(json["width"], 2);
    }

    #[test]
    fn garbage_is_unsupported() {
        let err = inspect(b"hello world").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
        let err = inspect_header(b"hello world").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }
}
