// src/command.rs
//
// Typed command boundary: one variant per operation, one output shape per result kind,
// and a failure object that keeps the programmatic kind next to a readable message.

use crate::codecs::FormatKind;
use crate::engine::ImageInfo;
use crate::error::{EngineError, ErrorKind};
use crate::ops::{ConvertParams, CropSpec, ResizeSpec};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A unit of work. Each command owns its input bytes.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    CropImage { data: Vec<u8>, spec: CropSpec },
    ResizeImage { data: Vec<u8>, spec: ResizeSpec },
    ConvertImage { data: Vec<u8>, params: ConvertParams },
    CompareImages { first: Vec<u8>, second: Vec<u8> },
    GetImageInfo { data: Vec<u8> },
}

impl Command {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::CropImage { .. } => "crop_image",
            Command::ResizeImage { .. } => "resize_image",
            Command::ConvertImage { .. } => "convert_image",
            Command::CompareImages { .. } => "compare_images",
            Command::GetImageInfo { .. } => "get_image_info",
        }
    }

    /// Total encoded input bytes carried by the command.
    pub fn input_len(&self) -> usize {
        match self {
            Command::CropImage { data, .. }
            | Command::ResizeImage { data, .. }
            | Command::ConvertImage { data, .. }
            | Command::GetImageInfo { data } => data.len(),
            Command::CompareImages { first, second } => first.len() + second.len(),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Command");
        s.field("name", &self.name());
        match self {
            Command::CropImage { spec, .. } => s.field("spec", spec),
            Command::ResizeImage { spec, .. } => s.field("spec", spec),
            Command::ConvertImage { params, .. } => s.field("params", params),
            Command::CompareImages { .. } | Command::GetImageInfo { .. } => &mut s,
        };
        s.field("input_bytes", &self.input_len()).finish()
    }
}

/// Encoded result of an image-producing command.
#[derive(Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    pub data: Vec<u8>,
    pub format: FormatKind,
    pub width: u32,
    pub height: u32,
    /// Length of `data`.
    pub size_bytes: usize,
}

impl fmt::Debug for ProcessedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessedImage")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("size_bytes", &self.size_bytes)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutput {
    Image(ProcessedImage),
    Info(ImageInfo),
}

impl CommandOutput {
    pub fn into_image(self) -> Option<ProcessedImage> {
        match self {
            CommandOutput::Image(image) => Some(image),
            CommandOutput::Info(_) => None,
        }
    }

    pub fn into_info(self) -> Option<ImageInfo> {
        match self {
            CommandOutput::Info(info) => Some(info),
            CommandOutput::Image(_) => None,
        }
    }
}

/// What the boundary reports when a command fails. No partial results accompany it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Error)]
#[error("[{code}] {message}")]
pub struct CommandFailure {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
    pub recoverable: bool,
}

impl From<EngineError> for CommandFailure {
    fn from(err: EngineError) -> Self {
        Self::from(&err)
    }
}

impl From<&EngineError> for CommandFailure {
    fn from(err: &EngineError) -> Self {
        Self {
            kind: err.kind(),
            code: err.category().code(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        }
    }
}

pub type CommandResult = std::result::Result<CommandOutput, CommandFailure>;
