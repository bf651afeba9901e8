// src/engine/tasks.rs
//
// Command handlers. One function per command: guard the input, decode, run the
// operation, encode, and report per-stage timings.

use crate::codecs::{fits_gif_palette, FormatKind};
use crate::command::{Command, CommandOutput, ProcessedImage};
use crate::config::EngineConfig;
use crate::engine::decoder::{decode_image, read_header};
use crate::engine::diff::diff_with_threshold;
use crate::engine::encoder::{encode_with, EncodeOptions, EncodedImage};
use crate::engine::firewall::FirewallConfig;
use crate::engine::inspect::ImageInfo;
use crate::engine::pipeline::{convert_with, crop, resize};
use crate::engine::raster::RasterBuffer;
use crate::error::Result;
use crate::ops::{ConvertParams, ConvertSpec, CropSpec, ResizeSpec};
use std::time::Instant;
use tracing::debug;

/// Logs decode -> op -> encode durations in milliseconds for one command.
struct StageTimer {
    command: &'static str,
    start_total: Instant,
    stage_start: Instant,
}

impl StageTimer {
    fn new(command: &'static str) -> Self {
        let now = Instant::now();
        Self {
            command,
            start_total: now,
            stage_start: now,
        }
    }

    fn mark(&mut self, stage: &'static str) {
        let ms = self.stage_start.elapsed().as_secs_f64() * 1000.0;
        debug!(command = self.command, stage, ms, "stage done");
        self.stage_start = Instant::now();
    }

    fn finish(self, output_bytes: usize) {
        let total_ms = self.start_total.elapsed().as_secs_f64() * 1000.0;
        debug!(command = self.command, total_ms, output_bytes, "command done");
    }
}

/// Firewall checks on the encoded input and its header, then a full decode.
/// Header failures fall through so decode reports the real error kind.
pub(crate) fn decode_guarded(
    bytes: &[u8],
    firewall: &FirewallConfig,
) -> Result<(RasterBuffer, FormatKind)> {
    firewall.enforce_source_len(bytes.len())?;
    if let Ok((width, height, _)) = read_header(bytes) {
        firewall.enforce_pixels(width, height)?;
    }
    let (raster, format) = decode_image(bytes)?;
    firewall.enforce_pixels(raster.width(), raster.height())?;
    Ok((raster, format))
}

/// Encoder options for `format` under this engine's config. `quality: None` keeps WebP
/// lossless.
fn output_options(
    config: &EngineConfig,
    format: FormatKind,
    quality: Option<u8>,
) -> EncodeOptions {
    EncodeOptions::new(format)
        .with_quality(quality)
        .with_background(config.background)
        .with_png_optimization(config.png_optimization)
}

/// Format for crop and resize results: the source format when it can hold `raster`
/// without loss, PNG otherwise. JPEG never can.
fn lossless_target(source: FormatKind, raster: &RasterBuffer) -> FormatKind {
    match source {
        FormatKind::Png | FormatKind::WebP => source,
        FormatKind::Bmp if raster.is_opaque() => source,
        FormatKind::Gif if fits_gif_palette(raster) => source,
        _ => FormatKind::Png,
    }
}

fn lossless_options(
    config: &EngineConfig,
    source: FormatKind,
    raster: &RasterBuffer,
) -> EncodeOptions {
    output_options(config, lossless_target(source, raster), None)
}

fn processed(encoded: EncodedImage, width: u32, height: u32) -> ProcessedImage {
    let size_bytes = encoded.len();
    ProcessedImage {
        format: encoded.format,
        data: encoded.into_bytes(),
        width,
        height,
        size_bytes,
    }
}

fn handle_crop(data: &[u8], spec: &CropSpec, config: &EngineConfig) -> Result<ProcessedImage> {
    let mut timer = StageTimer::new("crop_image");
    let (raster, format) = decode_guarded(data, &config.firewall)?;
    timer.mark("decode");
    let cropped = crop(&raster, spec)?;
    drop(raster);
    timer.mark("crop");
    let encoded = encode_with(&cropped, &lossless_options(config, format, &cropped))?;
    timer.mark("encode");
    timer.finish(encoded.len());
    Ok(processed(encoded, cropped.width(), cropped.height()))
}

fn handle_resize(data: &[u8], spec: &ResizeSpec, config: &EngineConfig) -> Result<ProcessedImage> {
    let mut timer = StageTimer::new("resize_image");
    spec.validate()?;
    let (raster, format) = decode_guarded(data, &config.firewall)?;
    timer.mark("decode");
    let resized = resize(&raster, spec)?;
    drop(raster);
    timer.mark("resize");
    let encoded = encode_with(&resized, &lossless_options(config, format, &resized))?;
    timer.mark("encode");
    timer.finish(encoded.len());
    Ok(processed(encoded, resized.width(), resized.height()))
}

fn handle_convert(
    data: &[u8],
    params: &ConvertParams,
    config: &EngineConfig,
) -> Result<ProcessedImage> {
    let mut timer = StageTimer::new("convert_image");
    // An unknown target fails before any decode work.
    let spec = ConvertSpec::try_from(params.clone())?;
    let (raster, _) = decode_guarded(data, &config.firewall)?;
    timer.mark("decode");
    // an explicit quality wins; JPEG falls back to the configured default
    let default_quality =
        (spec.target_format == FormatKind::Jpeg).then_some(config.default_quality);
    let base = output_options(config, spec.target_format, default_quality);
    let encoded = convert_with(&raster, &spec, base)?;
    timer.mark("encode");
    timer.finish(encoded.len());
    Ok(processed(encoded, raster.width(), raster.height()))
}

fn handle_compare(first: &[u8], second: &[u8], config: &EngineConfig) -> Result<ProcessedImage> {
    let mut timer = StageTimer::new("compare_images");
    let (a, _) = decode_guarded(first, &config.firewall)?;
    let (b, _) = decode_guarded(second, &config.firewall)?;
    timer.mark("decode");
    let outcome = diff_with_threshold(&a, &b, config.diff_threshold)?;
    drop((a, b));
    timer.mark("diff");
    let diff_image = outcome.buffer;
    let encoded = encode_with(&diff_image, &output_options(config, FormatKind::Png, None))?;
    timer.mark("encode");
    timer.finish(encoded.len());
    Ok(processed(encoded, diff_image.width(), diff_image.height()))
}

fn handle_info(data: &[u8], config: &EngineConfig) -> Result<ImageInfo> {
    let mut timer = StageTimer::new("get_image_info");
    let (raster, format) = decode_guarded(data, &config.firewall)?;
    timer.mark("decode");
    timer.finish(0);
    Ok(ImageInfo {
        width: raster.width(),
        height: raster.height(),
        format,
        size_bytes: data.len(),
    })
}

/// Run one command to completion on the current thread.
pub fn run_command(command: &Command, config: &EngineConfig) -> Result<CommandOutput> {
    match command {
        Command::CropImage { data, spec } => handle_crop(data, spec, config).map(CommandOutput::Image),
        Command::ResizeImage { data, spec } => {
            handle_resize(data, spec, config).map(CommandOutput::Image)
        }
        Command::ConvertImage { data, params } => {
            handle_convert(data, params, config).map(CommandOutput::Image)
        }
        Command::CompareImages { first, second } => {
            handle_compare(first, second, config).map(CommandOutput::Image)
        }
        Command::GetImageInfo { data } => handle_info(data, config).map(CommandOutput::Info),
    }
}
