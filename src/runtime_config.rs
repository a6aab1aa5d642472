// =============================================================================
// Service Configuration — defaults for the HTTP surface, hot-swappable
// =============================================================================
//
// The core pipeline takes its configuration per call; this file only holds
// the defaults the server applies when a request leaves something out.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::indicators::IndicatorConfig;
use crate::signals::RuleConfig;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "SIGNAL_DESK_CONFIG";
/// Config file used when `SIGNAL_DESK_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "signal_desk.json";

const BIND_ADDR_ENV: &str = "SIGNAL_DESK_BIND_ADDR";
const INSTRUMENTS_ENV: &str = "SIGNAL_DESK_INSTRUMENTS";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_instruments() -> Vec<String> {
    vec![
        "BTCUSDT".to_string(),
        "ETHUSDT".to_string(),
        "EURUSD".to_string(),
    ]
}

fn default_interval() -> String {
    "1h".to_string()
}

fn default_lookback() -> usize {
    100
}

fn default_max_lookback() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

// =============================================================================
// ServiceConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Socket address the HTTP server listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Instruments the dashboard offers for selection.
    #[serde(default = "default_instruments")]
    pub instruments: Vec<String>,

    #[serde(default = "default_interval")]
    pub default_interval: String,

    /// Most recent candles kept when a request gives no lookback.
    #[serde(default = "default_lookback")]
    pub default_lookback: usize,

    /// Upper bound for any requested lookback; larger values are clamped.
    #[serde(default = "default_max_lookback")]
    pub max_lookback: usize,

    /// Whether envelopes carry the full candle and indicator columns.
    #[serde(default = "default_true")]
    pub include_series: bool,

    #[serde(default)]
    pub indicators: IndicatorConfig,

    #[serde(default)]
    pub rules: RuleConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            instruments: default_instruments(),
            default_interval: default_interval(),
            default_lookback: default_lookback(),
            max_lookback: default_max_lookback(),
            include_series: true,
            indicators: IndicatorConfig::default(),
            rules: RuleConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read service config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse service config from {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("invalid service config in {}", path.display()))?;

        info!(
            path = %path.display(),
            instruments = ?config.instruments,
            interval = %config.default_interval,
            "service config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise service config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "service config saved (atomic)");
        Ok(())
    }

    /// Apply `SIGNAL_DESK_BIND_ADDR` / `SIGNAL_DESK_INSTRUMENTS`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(BIND_ADDR_ENV).ok(),
            std::env::var(INSTRUMENTS_ENV).ok(),
        );
    }

    fn apply_overrides(&mut self, bind_addr: Option<String>, instruments: Option<String>) {
        if let Some(addr) = bind_addr.filter(|a| !a.trim().is_empty()) {
            self.bind_addr = addr.trim().to_string();
        }
        if let Some(list) = instruments {
            let parsed: Vec<String> = list
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            if !parsed.is_empty() {
                self.instruments = parsed;
            }
        }
    }

    /// Check the nested indicator and rule configuration, then the lookbacks
    /// against the warm-up those windows need.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.indicators.validate()?;
        self.rules.validate()?;

        let required = self.indicators.min_candles_for_signal();
        if self.max_lookback < required {
            return Err(ConfigError::LookbackBelowWarmup {
                name: "max_lookback",
                value: self.max_lookback,
                required,
            });
        }
        if self.default_lookback > self.max_lookback {
            return Err(ConfigError::LookbackAboveMax {
                default_lookback: self.default_lookback,
                max_lookback: self.max_lookback,
            });
        }
        if self.default_lookback < required {
            return Err(ConfigError::LookbackBelowWarmup {
                name: "default_lookback",
                value: self.default_lookback,
                required,
            });
        }
        Ok(())
    }

    /// Resolve a requested lookback: default when absent, clamped to
    /// `max_lookback` otherwise.
    pub fn effective_lookback(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_lookback)
            .min(self.max_lookback)
    }
}
