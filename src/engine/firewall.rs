// src/engine/firewall.rs
//
// Image Firewall configuration and enforcement helpers.
// Limits are checked against the encoded input length and the header dimensions
// before any pixel buffer is allocated.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

const STRICT_MAX_PIXELS: u64 = 40_000_000; // ~8K x 5K
const LENIENT_MAX_PIXELS: u64 = 75_000_000; // generous but below global MAX_PIXELS
const STRICT_MAX_BYTES: u64 = 32 * 1024 * 1024; // 32MB input cap
const LENIENT_MAX_BYTES: u64 = 48 * 1024 * 1024; // 48MB input cap

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirewallPolicy {
    Disabled,
    Strict,
    Lenient,
    Custom,
}

impl FirewallPolicy {
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "disabled" | "off" | "none" => Ok(Self::Disabled),
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            "custom" => Ok(Self::Custom),
            _ => Err(EngineError::invalid_argument(
                "firewall policy",
                name.to_string(),
                "Expected disabled, strict, lenient or custom",
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Strict => "strict",
            Self::Lenient => "lenient",
            Self::Custom => "custom",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FirewallConfig {
    pub enabled: bool,
    pub policy: FirewallPolicy,
    pub max_pixels: Option<u64>,
    pub max_bytes: Option<u64>,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self::lenient()
    }
}

impl FirewallConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            policy: FirewallPolicy::Disabled,
            max_pixels: None,
            max_bytes: None,
        }
    }

    pub fn strict() -> Self {
        Self {
            enabled: true,
            policy: FirewallPolicy::Strict,
            max_pixels: Some(STRICT_MAX_PIXELS),
            max_bytes: Some(STRICT_MAX_BYTES),
        }
    }

    pub fn lenient() -> Self {
        Self {
            enabled: true,
            policy: FirewallPolicy::Lenient,
            max_pixels: Some(LENIENT_MAX_PIXELS),
            max_bytes: Some(LENIENT_MAX_BYTES),
        }
    }

    /// Custom policy with explicit limits; `None` leaves that axis unbounded.
    pub fn custom(max_pixels: Option<u64>, max_bytes: Option<u64>) -> Self {
        Self {
            enabled: true,
            policy: FirewallPolicy::Custom,
            max_pixels,
            max_bytes,
        }
    }

    pub fn apply_policy(policy: FirewallPolicy) -> Self {
        match policy {
            FirewallPolicy::Disabled => Self::disabled(),
            FirewallPolicy::Strict => Self::strict(),
            FirewallPolicy::Lenient => Self::lenient(),
            FirewallPolicy::Custom => Self::custom(None, None),
        }
    }

    pub fn enforce_source_len(&self, len: usize) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if let Some(limit) = self.max_bytes {
            let len_u64 = len as u64;
            if len_u64 > limit {
                warn!(len = len_u64, limit, "input rejected by byte limit");
                return Err(EngineError::firewall_violation(format!(
                    "input size {} bytes exceeds limit of {} bytes",
                    len_u64, limit
                )));
            }
        }
        Ok(())
    }

    pub fn enforce_pixels(&self, width: u32, height: u32) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if let Some(limit) = self.max_pixels {
            let pixels = width as u64 * height as u64;
            if pixels > limit {
                warn!(width, height, limit, "input rejected by pixel limit");
                return Err(EngineError::firewall_violation(format!(
                    "{}x{} ({} pixels) exceeds limit of {} pixels",
                    width, height, pixels, limit
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn strict_policy_enforces_pixels_and_bytes() {
        let cfg = FirewallConfig::strict();
        assert!(cfg.enforce_pixels(2000, 2000).is_ok());
        let err = cfg.enforce_pixels(7000, 7000).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);
        assert!(cfg.enforce_source_len(1024).is_ok());
        assert!(cfg
            .enforce_source_len((STRICT_MAX_BYTES + 1) as usize)
            .is_err());
    }

    #[test]
    fn lenient_is_looser_than_strict() {
        let cfg = FirewallConfig::lenient();
        assert!(cfg.enforce_pixels(7000, 7000).is_ok());
        assert!(cfg.enforce_pixels(10_000, 10_000).is_err());
    }

    #[test]
    fn disabled_allows_everything() {
        let cfg = FirewallConfig::disabled();
        assert!(cfg.enforce_pixels(u32::MAX, u32::MAX).is_ok());
        assert!(cfg.enforce_source_len(usize::MAX).is_ok());
    }

    #[test]
    fn custom_limits_apply_per_axis() {
        let cfg = FirewallConfig::custom(Some(100), None);
        assert!(cfg.enforce_pixels(10, 10).is_ok());
        assert!(cfg.enforce_pixels(10, 11).is_err());
        assert!(cfg.enforce_source_len(usize::MAX).is_ok());
    }

    #[test]
    fn policy_names_parse() {
        assert_eq!(
            FirewallPolicy::from_name("Strict").unwrap(),
            FirewallPolicy::Strict
        );
        assert_eq!(
            FirewallPolicy::from_name("off").unwrap(),
            FirewallPolicy::Disabled
        );
        let err = FirewallPolicy::from_name("paranoid").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }
}
