// src/config.rs
//
// Engine configuration: builder-style setters, defaults from the host, env overrides.

use crate::codecs::Background;
use crate::engine::encoder::{DEFAULT_PNG_OPTIMIZATION, DEFAULT_QUALITY};
use crate::engine::firewall::{FirewallConfig, FirewallPolicy};
use crate::engine::memory;
use crate::engine::DEFAULT_DIFF_THRESHOLD;
use crate::error::{EngineError, Result};

pub const ENV_THREADS: &str = "PIXELSMITH_THREADS";
pub const ENV_MEMORY_BUDGET_MB: &str = "PIXELSMITH_MEMORY_BUDGET_MB";
pub const ENV_FIREWALL: &str = "PIXELSMITH_FIREWALL";

/// Highest oxipng preset.
const MAX_PNG_OPTIMIZATION: u8 = 6;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Worker threads in the engine's pool.
    pub worker_threads: usize,
    /// Total bytes of decoded pixels allowed in flight.
    pub memory_budget_bytes: u64,
    pub firewall: FirewallConfig,
    /// Flattening color for JPEG and BMP output.
    pub background: Background,
    /// Quality used when crop/resize re-encode a lossy source.
    pub default_quality: u8,
    /// Per-pixel channel delta below which the diff reports "unchanged".
    pub diff_threshold: u8,
    /// oxipng preset for PNG output; `None` disables re-compression.
    pub png_optimization: Option<u8>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            memory_budget_bytes: memory::default_memory_budget(),
            firewall: FirewallConfig::default(),
            background: Background::default(),
            default_quality: DEFAULT_QUALITY,
            diff_threshold: DEFAULT_DIFF_THRESHOLD,
            png_optimization: Some(DEFAULT_PNG_OPTIMIZATION),
        }
    }
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn parse_env<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| {
        EngineError::invalid_argument(name, raw.to_string(), "Expected a positive integer")
    })
}

impl EngineConfig {
    /// Defaults with `PIXELSMITH_*` environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`EngineConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_THREADS) {
            config.worker_threads = parse_env::<usize>(ENV_THREADS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MEMORY_BUDGET_MB) {
            let mb = parse_env::<u64>(ENV_MEMORY_BUDGET_MB, &raw)?;
            config.memory_budget_bytes = mb.saturating_mul(1024 * 1024);
        }
        if let Some(raw) = lookup(ENV_FIREWALL) {
            config.firewall = FirewallConfig::apply_policy(FirewallPolicy::from_name(&raw)?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    pub fn with_memory_budget_bytes(mut self, bytes: u64) -> Self {
        self.memory_budget_bytes = bytes;
        self
    }

    pub fn with_firewall(mut self, firewall: FirewallConfig) -> Self {
        self.firewall = firewall;
        self
    }

    pub fn with_background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    pub fn with_default_quality(mut self, quality: u8) -> Self {
        self.default_quality = quality.min(100);
        self
    }

    pub fn with_diff_threshold(mut self, threshold: u8) -> Self {
        self.diff_threshold = threshold;
        self
    }

    pub fn with_png_optimization(mut self, level: Option<u8>) -> Self {
        self.png_optimization = level;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(EngineError::invalid_argument(
                "worker_threads",
                "0",
                "At least one worker thread is required",
            ));
        }
        if self.memory_budget_bytes == 0 {
            return Err(EngineError::invalid_argument(
                "memory_budget_bytes",
                "0",
                "Memory budget must be positive",
            ));
        }
        if self.default_quality > 100 {
            return Err(EngineError::invalid_argument(
                "default_quality",
                self.default_quality.to_string(),
                "Quality must be between 0 and 100",
            ));
        }
        if self.diff_threshold == 0 || self.diff_threshold == u8::MAX {
            return Err(EngineError::invalid_argument(
                "diff_threshold",
                self.diff_threshold.to_string(),
                "Threshold must be between 1 and 254",
            ));
        }
        if let Some(level) = self.png_optimization {
            if level > MAX_PNG_OPTIMIZATION {
                return Err(EngineError::invalid_argument(
                    "png_optimization",
                    level.to_string(),
                    "oxipng presets range from 0 to 6",
                ));
            }
        }
        Ok(())
    }
}
