// =============================================================================
// Central Application State — Signal Desk service
// =============================================================================
//
// Process-wide state is limited to configuration and counters: candle data
// and verdicts live only for the duration of one request.
//
// Thread safety:
//   - Atomic counters for lock-free run accounting.
//   - parking_lot::RwLock for the swappable configuration and error log.
//   - The config write lock is held across persist + swap, so the file on
//     disk and the in-memory config always come from the same update.
// =============================================================================

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::pipeline::PipelineError;
use crate::runtime_config::ServiceConfig;
use crate::types::SignalVerdict;

/// Maximum number of recent failures to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// A failed pipeline run, kept for the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub instrument: String,
    /// Human-readable error message.
    pub message: String,
    /// Machine-readable `PipelineError::kind`.
    pub kind: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Per-verdict and per-failure run counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    pub runs: u64,
    pub buy: u64,
    pub sell: u64,
    pub hold: u64,
    pub failures: u64,
}

/// Payload of `GET /api/v1/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub version: &'static str,
    pub server_time: i64,
    pub uptime_secs: u64,
    pub config_version: u64,
    pub counters: RunCounters,
    pub recent_errors: Vec<ErrorRecord>,
}

/// Shared across handlers via `Arc<AppState>`.
pub struct AppState {
    config: RwLock<ServiceConfig>,
    /// Incremented every time the configuration is replaced.
    config_version: AtomicU64,
    /// Where accepted config updates are persisted, if anywhere.
    config_path: Option<PathBuf>,

    runs: AtomicU64,
    buy: AtomicU64,
    sell: AtomicU64,
    hold: AtomicU64,
    failures: AtomicU64,

    recent_errors: RwLock<VecDeque<ErrorRecord>>,

    /// Instant the service started. Used for uptime.
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: ServiceConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            config: RwLock::new(config),
            config_version: AtomicU64::new(1),
            config_path,
            runs: AtomicU64::new(0),
            buy: AtomicU64::new(0),
            sell: AtomicU64::new(0),
            hold: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            recent_errors: RwLock::new(VecDeque::with_capacity(MAX_RECENT_ERRORS)),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Configuration ───────────────────────────────────────────────────

    /// Copy of the current configuration.  Handlers work on the copy so the
    /// lock is never held across a pipeline run.
    pub fn config(&self) -> ServiceConfig {
        self.config.read().clone()
    }

    pub fn config_version(&self) -> u64 {
        self.config_version.load(Ordering::SeqCst)
    }

    /// Validate, persist and swap in a new configuration.  An invalid one
    /// leaves the current configuration untouched.
    ///
    /// Performs blocking file I/O when a config path is set; async callers
    /// should run it on the blocking pool.
    pub fn replace_config(&self, new_config: ServiceConfig) -> Result<u64, ConfigError> {
        new_config.validate()?;

        let mut current = self.config.write();
        if let Some(path) = &self.config_path {
            if let Err(e) = new_config.save(path) {
                warn!(error = %e, "config accepted but could not be persisted");
            }
        }
        *current = new_config;
        let version = self.config_version.fetch_add(1, Ordering::SeqCst) + 1;
        drop(current);
        info!(config_version = version, "service config replaced");
        Ok(version)
    }

    // ── Run accounting ──────────────────────────────────────────────────

    pub fn record_verdict(&self, verdict: SignalVerdict) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        let counter = match verdict {
            SignalVerdict::Buy => &self.buy,
            SignalVerdict::Sell => &self.sell,
            SignalVerdict::Hold => &self.hold,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failed run and keep it in the capped error log.
    pub fn record_failure(&self, instrument: &str, error: &PipelineError) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);

        let record = ErrorRecord {
            instrument: instrument.to_string(),
            message: error.to_string(),
            kind: error.kind().to_string(),
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        if errors.len() == MAX_RECENT_ERRORS {
            errors.pop_front();
        }
        errors.push_back(record);
    }

    pub fn counters(&self) -> RunCounters {
        RunCounters {
            runs: self.runs.load(Ordering::Relaxed),
            buy: self.buy.load(Ordering::Relaxed),
            sell: self.sell.load(Ordering::Relaxed),
            hold: self.hold.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    // ── Snapshot ────────────────────────────────────────────────────────

    pub fn health(&self) -> HealthSnapshot {
        HealthSnapshot {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            server_time: Utc::now().timestamp_millis(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            config_version: self.config_version(),
            counters: self.counters(),
            recent_errors: self.recent_errors.read().iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NormalizationError;
    use std::sync::Arc;

    #[test]
    fn invalid_config_is_not_swapped_in() {
        let state = AppState::new(ServiceConfig::default(), None);
        let mut bad = ServiceConfig::default();
        bad.rules.oversold = 90.0;

        assert!(state.replace_config(bad).is_err());
        assert_eq!(state.config(), ServiceConfig::default());
        assert_eq!(state.config_version(), 1);
    }

    #[test]
    fn valid_config_bumps_version() {
        let state = AppState::new(ServiceConfig::default(), None);
        let mut cfg = ServiceConfig::default();
        cfg.default_interval = "4h".into();

        assert_eq!(state.replace_config(cfg.clone()), Ok(2));
        assert_eq!(state.config(), cfg);
    }

    #[test]
    fn counters_track_verdicts_and_failures() {
        let state = AppState::new(ServiceConfig::default(), None);
        state.record_verdict(SignalVerdict::Buy);
        state.record_verdict(SignalVerdict::Hold);
        state.record_verdict(SignalVerdict::Hold);
        state.record_failure("BTCUSDT", &PipelineError::from(NormalizationError::EmptyPayload));

        let c = state.counters();
        assert_eq!(c.runs, 4);
        assert_eq!(c.buy, 1);
        assert_eq!(c.hold, 2);
        assert_eq!(c.sell, 0);
        assert_eq!(c.failures, 1);

        let health = state.health();
        assert_eq!(health.recent_errors.len(), 1);
        assert_eq!(health.recent_errors[0].kind, "normalization");
    }

    #[test]
    fn concurrent_updates_leave_file_and_memory_in_step() {
        let dir = std::env::temp_dir().join(format!("signal-desk-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("signal_desk.json");
        let state = Arc::new(AppState::new(ServiceConfig::default(), Some(path.clone())));

        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let state = state.clone();
                std::thread::spawn(move || {
                    for round in 0..50 {
                        let cfg = ServiceConfig {
                            default_interval: format!("{worker}-{round}"),
                            ..ServiceConfig::default()
                        };
                        state.replace_config(cfg).unwrap();
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        assert_eq!(state.config_version(), 201);
        assert_eq!(ServiceConfig::load(&path).unwrap(), state.config());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn error_log_is_capped() {
        let state = AppState::new(ServiceConfig::default(), None);
        for i in 0..(MAX_RECENT_ERRORS + 5) {
            state.record_failure(
                &format!("SYM{i}"),
                &PipelineError::from(NormalizationError::EmptyPayload),
            );
        }
        let errors = state.health().recent_errors;
        assert_eq!(errors.len(), MAX_RECENT_ERRORS);
        assert_eq!(errors[0].instrument, "SYM5");
    }
}
