#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pixelsmith::engine::run_command;
use pixelsmith::wire::parse_request;
use pixelsmith::{Command, ConvertParams, CropSpec, EngineConfig, FirewallConfig, ResizeSpec};
use std::sync::OnceLock;

#[derive(Arbitrary, Debug)]
enum Input {
    Json(String),
    Crop { data: Vec<u8>, x: u16, y: u16, w: u16, h: u16 },
    Resize { data: Vec<u8>, w: u16, h: u16, fit: bool },
    Convert { data: Vec<u8>, format: String, quality: Option<i32> },
    Compare { first: Vec<u8>, second: Vec<u8> },
    Info { data: Vec<u8> },
}

fn config() -> &'static EngineConfig {
    static CONFIG: OnceLock<EngineConfig> = OnceLock::new();
    CONFIG.get_or_init(|| {
        EngineConfig::default().with_firewall(FirewallConfig::custom(Some(4_000_000), None))
    })
}

fn to_command(input: Input) -> Option<Command> {
    let command = match input {
        Input::Json(json) => return parse_request(&json).ok(),
        Input::Crop { data, x, y, w, h } => Command::CropImage {
            data,
            spec: CropSpec::new(x.into(), y.into(), w.into(), h.into()),
        },
        Input::Resize { data, w, h, fit } => Command::ResizeImage {
            data,
            // keep output allocations small enough for the fuzzer's RSS limit
            spec: if fit {
                ResizeSpec::fit(u32::from(w % 2048), u32::from(h % 2048))
            } else {
                ResizeSpec::exact(u32::from(w % 2048), u32::from(h % 2048))
            },
        },
        Input::Convert {
            data,
            format,
            quality,
        } => Command::ConvertImage {
            data,
            params: ConvertParams::new(format, quality),
        },
        Input::Compare { first, second } => Command::CompareImages { first, second },
        Input::Info { data } => Command::GetImageInfo { data },
    };
    Some(command)
}

fuzz_target!(|input: Input| {
    if let Some(command) = to_command(input) {
        // Errors are expected; panics are the bug.
        let _ = run_command(&command, config());
    }
});
