// src/engine/common.rs
//
// Common utilities shared across engine modules.

use crate::error::{EngineError, Result};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// What a caught panic turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanicPolicy {
    /// Decoder panicked on hostile input: report `CorruptData`.
    Decode,
    /// Encoder panicked: report `EncodeFailure`.
    Encode,
    /// Anything else: report an internal bug.
    Internal,
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run codec code that may panic (libjpeg error handlers unwind, some pure-Rust
/// decoders assert on malformed input) and convert a panic into a typed error.
///
/// `stage` is `"<action>:<format>"`, e.g. `"decode:jpeg"`.
pub fn run_with_panic_policy<T, F>(stage: &'static str, policy: PanicPolicy, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(stage, %message, "codec panicked; converting to error");
            let format = stage.split(':').nth(1).unwrap_or("image");
            Err(match policy {
                PanicPolicy::Decode => {
                    EngineError::corrupt_data(format, format!("decoder panicked: {message}"))
                }
                PanicPolicy::Encode => {
                    EngineError::encode_failure(format, format!("encoder panicked: {message}"))
                }
                PanicPolicy::Internal => {
                    EngineError::internal_panic(format!("{stage}: {message}"))
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn passes_through_ok_and_err() {
        let ok = run_with_panic_policy("decode:png", PanicPolicy::Decode, || Ok(3));
        assert_eq!(ok.unwrap(), 3);
        let err: Result<()> = run_with_panic_policy("decode:png", PanicPolicy::Decode, || {
            Err(EngineError::corrupt_data("png", "bad"))
        });
        assert_eq!(err.unwrap_err().kind(), ErrorKind::CorruptData);
    }

    #[test]
    fn decode_panic_becomes_corrupt_data() {
        let err: Result<()> = run_with_panic_policy("decode:jpeg", PanicPolicy::Decode, || {
            panic!("huffman table overflow")
        });
        match err.unwrap_err() {
            EngineError::CorruptData { format, message } => {
                assert_eq!(format, "jpeg");
                assert!(message.contains("huffman table overflow"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn encode_and_internal_policies() {
        let err: Result<()> =
            run_with_panic_policy("encode:gif", PanicPolicy::Encode, || panic!("boom"));
        assert_eq!(err.unwrap_err().kind(), ErrorKind::EncodeFailure);
        let err: Result<()> =
            run_with_panic_policy("task:crop_image", PanicPolicy::Internal, || panic!("boom"));
        assert_eq!(err.unwrap_err().kind(), ErrorKind::Internal);
    }
}
