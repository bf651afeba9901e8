// src/wire.rs
//
// JSON envelope for hosts that move images as base64 text.
//
// Request:  {"command": "resize_image", "data": "<base64>", "params": {...}}
// Response: {"ok": true, "result": {...}} or {"ok": false, "error": {...}}

use crate::codecs::FormatKind;
use crate::command::{Command, CommandFailure, CommandOutput, CommandResult, ProcessedImage};
use crate::engine::{ImageEngine, ImageInfo};
use crate::error::{EngineError, Result};
use crate::ops::{ConvertParams, CropSpec, ResizeSpec};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WireRequest {
    CropImage {
        #[serde(alias = "base64_data")]
        data: String,
        params: CropSpec,
    },
    ResizeImage {
        #[serde(alias = "base64_data")]
        data: String,
        params: ResizeSpec,
    },
    ConvertImage {
        #[serde(alias = "base64_data")]
        data: String,
        params: ConvertParams,
    },
    CompareImages {
        #[serde(alias = "base64_data1")]
        first: String,
        #[serde(alias = "base64_data2")]
        second: String,
    },
    GetImageInfo {
        #[serde(alias = "base64_data")]
        data: String,
    },
}

impl WireRequest {
    pub fn into_command(self) -> Result<Command> {
        Ok(match self {
            WireRequest::CropImage { data, params } => Command::CropImage {
                data: decode_base64(&data)?,
                spec: params,
            },
            WireRequest::ResizeImage { data, params } => Command::ResizeImage {
                data: decode_base64(&data)?,
                spec: params,
            },
            WireRequest::ConvertImage { data, params } => Command::ConvertImage {
                data: decode_base64(&data)?,
                params,
            },
            WireRequest::CompareImages { first, second } => Command::CompareImages {
                first: decode_base64(&first)?,
                second: decode_base64(&second)?,
            },
            WireRequest::GetImageInfo { data } => Command::GetImageInfo {
                data: decode_base64(&data)?,
            },
        })
    }
}

/// Decode standard base64, tolerating a `data:<mime>;base64,` prefix and line breaks.
pub fn decode_base64(text: &str) -> Result<Vec<u8>> {
    let payload = match text.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => text,
    };
    let cleaned: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| EngineError::invalid_request(format!("invalid base64 payload: {e}")))
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Image result as it travels back to the host.
#[derive(Debug, Serialize)]
pub struct WireImage {
    pub data: String,
    pub format: FormatKind,
    pub width: u32,
    pub height: u32,
    pub size_bytes: usize,
}

impl From<&ProcessedImage> for WireImage {
    fn from(image: &ProcessedImage) -> Self {
        Self {
            data: encode_base64(&image.data),
            format: image.format,
            width: image.width,
            height: image.height,
            size_bytes: image.size_bytes,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum WireResult {
    Image(WireImage),
    Info(ImageInfo),
}

#[derive(Debug, Serialize)]
pub struct WireResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<WireResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandFailure>,
}

impl From<&CommandResult> for WireResponse {
    fn from(result: &CommandResult) -> Self {
        match result {
            Ok(CommandOutput::Image(image)) => Self {
                ok: true,
                result: Some(WireResult::Image(WireImage::from(image))),
                error: None,
            },
            Ok(CommandOutput::Info(info)) => Self {
                ok: true,
                result: Some(WireResult::Info(*info)),
                error: None,
            },
            Err(failure) => Self {
                ok: false,
                result: None,
                error: Some(failure.clone()),
            },
        }
    }
}

/// Parse a JSON request into a command. Malformed JSON or base64 is `InvalidRequest`.
pub fn parse_request(json: &str) -> Result<Command> {
    let request: WireRequest = serde_json::from_str(json)
        .map_err(|e| EngineError::invalid_request(format!("malformed request: {e}")))?;
    request.into_command()
}

pub fn render_response(result: &CommandResult) -> String {
    serde_json::to_string(&WireResponse::from(result)).unwrap_or_else(|e| {
        format!(
            r#"{{"ok":false,"error":{{"kind":"Internal","code":"PIXELSMITH_INTERNAL_BUG","message":"failed to serialize response: {}","recoverable":false}}}}"#,
            e.to_string().replace('"', "'")
        )
    })
}

/// Blocking request/response round trip.
pub fn handle_json(engine: &ImageEngine, json: &str) -> String {
    let result = match parse_request(json) {
        Ok(command) => engine.execute(command),
        Err(err) => Err(CommandFailure::from(err)),
    };
    render_response(&result)
}

/// Non-blocking variant: `reply` receives the response JSON on a worker thread.
pub fn submit_json<F>(engine: &ImageEngine, json: &str, reply: F)
where
    F: FnOnce(String) + Send + 'static,
{
    match parse_request(json) {
        Ok(command) => engine.submit_with(command, move |result| reply(render_response(&result))),
        Err(err) => reply(render_response(&Err(CommandFailure::from(err)))),
    }
}
