// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`.  Pipeline runs are CPU-bound and
// synchronous, so each one executes on `spawn_blocking`; the batch endpoint
// starts one task per instrument and a failure in one never affects another.
//
// CORS is configured permissively for the dashboard.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::error::{ApiError, Result};
use crate::app_state::AppState;
use crate::indicators::IndicatorConfig;
use crate::pipeline::{self, PipelineRequest};
use crate::runtime_config::ServiceConfig;
use crate::signal_envelope::SignalEnvelope;
use crate::signals::RuleConfig;
use crate::types::ProviderShape;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS and tracing middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/config", get(get_config).put(put_config))
        .route("/api/v1/signal", post(signal))
        .route("/api/v1/signals", post(signals_batch))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Request bodies
// =============================================================================

/// One instrument's raw payload.  Omitted settings fall back to the
/// configured defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalRequest {
    pub instrument: String,
    pub shape: ProviderShape,
    pub payload: Value,
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub lookback: Option<usize>,
    #[serde(default)]
    pub indicators: Option<IndicatorConfig>,
    #[serde(default)]
    pub rules: Option<RuleConfig>,
    #[serde(default)]
    pub include_series: Option<bool>,
}

/// Shared settings plus one entry per instrument.  Per-entry settings win
/// over batch-level ones, which win over the configured defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub lookback: Option<usize>,
    #[serde(default)]
    pub indicators: Option<IndicatorConfig>,
    #[serde(default)]
    pub rules: Option<RuleConfig>,
    pub items: Vec<SignalRequest>,
}

/// One batch result: an envelope, or the reason that instrument failed.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Signal(Box<SignalEnvelope>),
    Failed {
        instrument: String,
        error: String,
        kind: String,
    },
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub results: Vec<BatchEntry>,
    pub succeeded: usize,
    pub failed: usize,
}

/// Fill the gaps in a request from the service defaults.
fn resolve(req: SignalRequest, config: &ServiceConfig) -> (PipelineRequest, bool) {
    let include_series = req.include_series.unwrap_or(config.include_series);
    let request = PipelineRequest {
        instrument: req.instrument,
        interval: req
            .interval
            .unwrap_or_else(|| config.default_interval.clone()),
        lookback: Some(config.effective_lookback(req.lookback)),
        shape: req.shape,
        payload: req.payload,
        indicators: req.indicators.unwrap_or(config.indicators),
        rules: req.rules.unwrap_or(config.rules),
    };
    (request, include_series)
}

/// Run one resolved request on the blocking pool and wrap the result.
async fn run_blocking(
    state: Arc<AppState>,
    request: PipelineRequest,
    include_series: bool,
) -> Result<SignalEnvelope> {
    let joined = tokio::task::spawn_blocking(move || {
        let outcome = pipeline::run_request(&request);
        (request.instrument, request.interval, outcome)
    })
    .await;

    let (instrument, interval, outcome) = joined?;

    match outcome {
        Ok(output) => {
            state.record_verdict(output.evaluation.verdict);
            info!(
                instrument = %instrument,
                interval = %interval,
                verdict = %output.evaluation.verdict,
                "signal computed"
            );
            Ok(SignalEnvelope::new(instrument, interval, output, include_series))
        }
        Err(e) => {
            state.record_failure(&instrument, &e);
            Err(ApiError::from(e))
        }
    }
}

/// Turn one joined batch task into its response entry.  `instrument` names
/// the entry even when the task itself never finished.
fn batch_entry(
    instrument: String,
    joined: std::result::Result<Result<SignalEnvelope>, tokio::task::JoinError>,
) -> BatchEntry {
    let failed = |e: ApiError| BatchEntry::Failed {
        instrument: instrument.clone(),
        error: e.to_string(),
        kind: e.kind().to_string(),
    };
    match joined {
        Ok(Ok(envelope)) => BatchEntry::Signal(Box::new(envelope)),
        Ok(Err(e)) => failed(e),
        Err(e) => failed(ApiError::from(e)),
    }
}

// =============================================================================
// Health
// =============================================================================

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.health())
}

// =============================================================================
// Configuration
// =============================================================================

async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.config())
}

#[derive(Serialize)]
struct ConfigUpdated {
    config_version: u64,
    config: ServiceConfig,
}

async fn put_config(
    State(state): State<Arc<AppState>>,
    Json(new_config): Json<ServiceConfig>,
) -> Result<Json<ConfigUpdated>> {
    // Persisting the file is blocking I/O.
    let task_state = state.clone();
    let config_version =
        tokio::task::spawn_blocking(move || task_state.replace_config(new_config)).await??;
    Ok(Json(ConfigUpdated {
        config_version,
        config: state.config(),
    }))
}

// =============================================================================
// Signals
// =============================================================================

async fn signal(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignalRequest>,
) -> Result<Json<SignalEnvelope>> {
    if req.instrument.trim().is_empty() {
        return Err(ApiError::BadRequest("instrument must not be empty".into()));
    }
    let (request, include_series) = resolve(req, &state.config());
    run_blocking(state, request, include_series)
        .await
        .map(Json)
}

async fn signals_batch(
    State(state): State<Arc<AppState>>,
    Json(batch): Json<BatchRequest>,
) -> Result<Json<BatchResponse>> {
    if batch.items.is_empty() {
        return Err(ApiError::BadRequest("batch contains no items".into()));
    }

    let config = state.config();
    let handles: Vec<_> = batch
        .items
        .into_iter()
        .map(|mut item| {
            item.interval = item.interval.or_else(|| batch.interval.clone());
            item.lookback = item.lookback.or(batch.lookback);
            item.indicators = item.indicators.or(batch.indicators);
            item.rules = item.rules.or(batch.rules);
            let (request, include_series) = resolve(item, &config);
            let instrument = request.instrument.clone();
            let handle = tokio::spawn(run_blocking(state.clone(), request, include_series));
            (instrument, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (instrument, handle) in handles {
        results.push(batch_entry(instrument, handle.await));
    }

    let failed = results
        .iter()
        .filter(|r| matches!(r, BatchEntry::Failed { .. }))
        .count();
    let succeeded = results.len() - failed;
    info!(succeeded, failed, "batch finished");

    Ok(Json(BatchResponse {
        results,
        succeeded,
        failed,
    }))
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::klines_payload;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState::new(ServiceConfig::default(), None));
        (router(state.clone()), state)
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn small_indicators() -> Value {
        json!({
            "ema_fast_window": 3, "ema_slow_window": 5, "rsi_window": 14,
            "macd_fast": 3, "macd_slow": 5, "macd_signal": 3
        })
    }

    fn rebound_closes() -> Vec<f64> {
        let mut closes: Vec<f64> = (0..14).map(|i| 100.0 + i as f64).collect();
        closes.extend([112.0, 111.0, 110.0, 109.0, 108.0, 111.5]);
        closes
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (app, _) = app();
        let (status, body) = send(app, "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["counters"]["runs"], 0);
    }

    #[tokio::test]
    async fn signal_returns_envelope() {
        let (app, state) = app();
        let req = json!({
            "instrument": "BTCUSDT",
            "interval": "1m",
            "shape": "klines",
            "payload": klines_payload(&rebound_closes()),
            "indicators": small_indicators(),
            "rules": { "family": "crossover" }
        });
        let (status, body) = send(app, "POST", "/api/v1/signal", Some(req)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verdict"], "BUY");
        assert_eq!(body["instrument"], "BTCUSDT");
        assert_eq!(body["series"].as_array().map(Vec::len), Some(20));
        assert_eq!(state.counters().buy, 1);
    }

    #[tokio::test]
    async fn short_history_is_unprocessable() {
        let (app, state) = app();
        // Default windows need 51 candles.
        let req = json!({
            "instrument": "ETHUSDT",
            "shape": "klines",
            "payload": klines_payload(&[100.0; 20]),
        });
        let (status, body) = send(app, "POST", "/api/v1/signal", Some(req)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "insufficient_history");
        assert_eq!(body["status"], 422);
        assert_eq!(state.counters().failures, 1);
    }

    #[tokio::test]
    async fn bad_windows_are_bad_request() {
        let (app, _) = app();
        let req = json!({
            "instrument": "ETHUSDT",
            "shape": "klines",
            "payload": klines_payload(&[100.0; 20]),
            "indicators": { "ema_fast_window": 60 }
        });
        let (status, body) = send(app, "POST", "/api/v1/signal", Some(req)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_configuration");
    }

    #[tokio::test]
    async fn config_update_is_validated() {
        let (app, state) = app();
        let bad = json!({ "rules": { "oversold": 80.0, "overbought": 70.0 } });
        let (status, _) = send(app.clone(), "PUT", "/api/v1/config", Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(state.config_version(), 1);

        let good = json!({ "default_interval": "15m" });
        let (status, body) = send(app.clone(), "PUT", "/api/v1/config", Some(good)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["config_version"], 2);

        let (_, body) = send(app, "GET", "/api/v1/config", None).await;
        assert_eq!(body["default_interval"], "15m");
    }

    #[tokio::test]
    async fn batch_isolates_failures() {
        let (app, _) = app();
        let req = json!({
            "indicators": small_indicators(),
            "rules": { "family": "crossover" },
            "items": [
                { "instrument": "BTCUSDT", "shape": "klines", "payload": klines_payload(&rebound_closes()) },
                { "instrument": "ETHUSDT", "shape": "klines", "payload": [] },
                { "instrument": "EURUSD", "shape": "time_series", "payload": { "Note": "rate limited" } }
            ]
        });
        let (status, body) = send(app, "POST", "/api/v1/signals", Some(req)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["succeeded"], 1);
        assert_eq!(body["failed"], 2);

        let results = body["results"].as_array().unwrap();
        assert_eq!(results[0]["verdict"], "BUY");
        assert_eq!(results[1]["instrument"], "ETHUSDT");
        assert_eq!(results[1]["kind"], "normalization");
        assert_eq!(results[2]["kind"], "normalization");
    }

    #[tokio::test]
    async fn lookback_shorter_than_warmup_rejected_on_update() {
        let (app, state) = app();
        for body in [
            json!({ "max_lookback": 0, "default_lookback": 0 }),
            json!({ "default_lookback": 20 }),
            json!({ "default_lookback": 1500 }),
        ] {
            let (status, resp) = send(app.clone(), "PUT", "/api/v1/config", Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(resp["kind"], "invalid_configuration");
        }
        assert_eq!(state.config(), ServiceConfig::default());
    }

    #[tokio::test]
    async fn panicked_batch_task_still_names_instrument() {
        async fn dies() -> Result<SignalEnvelope> {
            panic!("pipeline worker died")
        }
        let joined = tokio::spawn(dies()).await;
        assert!(joined.is_err());

        match batch_entry("SOLUSDT".to_string(), joined) {
            BatchEntry::Failed { instrument, kind, .. } => {
                assert_eq!(instrument, "SOLUSDT");
                assert_eq!(kind, "internal");
            }
            BatchEntry::Signal(_) => panic!("expected a failed entry"),
        }
    }

    #[tokio::test]
    async fn empty_batch_rejected() {
        let (app, _) = app();
        let (status, body) = send(app, "POST", "/api/v1/signals", Some(json!({ "items": [] }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "bad_request");
    }
}
