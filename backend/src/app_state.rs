// =============================================================================
// Central Application State — candle dashboard
// =============================================================================
//
// Ties together the user-selected parameters, the most recently published
// chart frame and the operational status, and builds the snapshot sent to
// the dashboard over REST and WebSocket.
//
// Thread safety:
//   - Atomic counters for lock-free version tracking and cycle statistics.
//   - parking_lot::RwLock for everything else.
//
// The refresh loop is the only writer of the chart frame and warning; HTTP
// handlers only write parameters and the pause / refresh-request flags.
// =============================================================================

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::binance::rate_limit::{RateLimitSnapshot, RateLimitTracker};
use crate::chart::ChartFrame;
use crate::error::PipelineError;
use crate::runtime_config::{ChartParams, DashboardConfig, ParamsUpdate};

/// Warning shown when the exchange returned an empty candle list.
pub const NO_DATA_WARNING: &str = "No data available. Try again later.";

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

// =============================================================================
// Error Record
// =============================================================================

/// A recorded cycle failure for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    pub code: Option<String>,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// AppState
// =============================================================================

/// Shared across the refresh task and HTTP handlers via `Arc<AppState>`.
pub struct AppState {
    // ── Version tracking ────────────────────────────────────────────────
    /// Incremented on every change the dashboard should see. The WebSocket
    /// feed compares it to decide whether to push.
    pub state_version: AtomicU64,
    pub ws_clients: AtomicUsize,

    // ── Parameters ──────────────────────────────────────────────────────
    pub config: Arc<RwLock<DashboardConfig>>,
    pub config_path: PathBuf,

    // ── Published output ────────────────────────────────────────────────
    pub latest_frame: RwLock<Option<ChartFrame>>,
    pub warning: RwLock<Option<String>>,
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    // ── Refresh control ─────────────────────────────────────────────────
    pub paused: AtomicBool,
    refresh_requested: AtomicBool,
    pub refresh_notify: Notify,
    /// Wall-clock copy of the driver's last trigger time, for display only.
    pub last_refresh_at: RwLock<Option<DateTime<Utc>>>,

    // ── Statistics ──────────────────────────────────────────────────────
    pub cycles_ok: AtomicU64,
    pub cycles_failed: AtomicU64,
    pub rate_limit: Arc<RateLimitTracker>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        config: DashboardConfig,
        config_path: impl Into<PathBuf>,
        rate_limit: Arc<RateLimitTracker>,
    ) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            ws_clients: AtomicUsize::new(0),

            config: Arc::new(RwLock::new(config)),
            config_path: config_path.into(),

            latest_frame: RwLock::new(None),
            warning: RwLock::new(None),
            recent_errors: RwLock::new(Vec::new()),

            paused: AtomicBool::new(false),
            refresh_requested: AtomicBool::new(false),
            refresh_notify: Notify::new(),
            last_refresh_at: RwLock::new(None),

            cycles_ok: AtomicU64::new(0),
            cycles_failed: AtomicU64::new(0),
            rate_limit,
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Parameters ──────────────────────────────────────────────────────

    /// Parameters for the next cycle, read fresh each time.
    pub fn chart_params(&self) -> ChartParams {
        self.config.read().chart_params()
    }

    /// Apply a partial parameter update, persist it (best-effort) and ask the
    /// refresh loop to rerun immediately if anything changed.
    pub fn update_params(&self, update: &ParamsUpdate) -> Result<Vec<String>, String> {
        let (changes, snapshot) = {
            let mut config = self.config.write();
            let changes = config.apply(update)?;
            (changes, config.clone())
        };

        if !changes.is_empty() {
            info!(changes = ?changes, "dashboard parameters updated");
            if let Err(e) = snapshot.save(&self.config_path) {
                warn!(error = %e, "failed to save dashboard config to disk");
            }
            self.increment_version();
            self.request_refresh();
        }

        Ok(changes)
    }

    // ── Refresh Control ─────────────────────────────────────────────────

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Pause or resume automatic refreshes. Resuming triggers a cycle.
    pub fn set_paused(&self, paused: bool) {
        let was = self.paused.swap(paused, Ordering::SeqCst);
        if was != paused {
            self.increment_version();
            if !paused {
                self.request_refresh();
            }
        }
    }

    /// Ask the refresh loop to run a cycle as soon as the current one ends.
    pub fn request_refresh(&self) {
        self.refresh_requested.store(true, Ordering::SeqCst);
        self.refresh_notify.notify_one();
    }

    pub fn refresh_pending(&self) -> bool {
        self.refresh_requested.load(Ordering::SeqCst)
    }

    /// Consume a pending refresh request, if any.
    pub fn take_refresh_request(&self) -> bool {
        self.refresh_requested.swap(false, Ordering::SeqCst)
    }

    pub fn record_refresh(&self, at: DateTime<Utc>) {
        *self.last_refresh_at.write() = Some(at);
    }

    // ── Cycle Results ───────────────────────────────────────────────────

    /// Replace the chart and clear any warning left by an earlier failure.
    pub fn publish_frame(&self, frame: ChartFrame) {
        *self.latest_frame.write() = Some(frame);
        *self.warning.write() = None;
        self.cycles_ok.fetch_add(1, Ordering::Relaxed);
        self.increment_version();
    }

    /// Show a warning and keep whatever chart was published before.
    pub fn publish_warning(&self, message: &str) {
        *self.warning.write() = Some(message.to_string());
        self.increment_version();
    }

    /// Record a failed cycle: user-facing warning plus an error-log entry.
    pub fn record_failure(&self, err: &PipelineError) {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
        *self.warning.write() = Some(err.user_message().to_string());
        self.push_error_with_code(err.to_string(), Some(err.code().to_string()));
    }

    pub fn push_error_with_code(&self, msg: String, code: Option<String>) {
        let record = ErrorRecord {
            message: msg,
            code,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        drop(errors);

        self.increment_version();
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Payload of `GET /api/v1/state` and of every WebSocket push.
    ///
    /// The version is read first, so a snapshot never claims a version newer
    /// than its contents.
    pub fn build_snapshot(&self) -> DashboardSnapshot {
        let state_version = self.current_state_version();
        let now = Utc::now();
        let params = self.config.read().clone();
        let last_refresh_at = *self.last_refresh_at.read();
        let next_refresh_at = match (self.is_paused(), last_refresh_at) {
            (false, Some(at)) => Some(
                at + chrono::Duration::seconds(params.refresh_interval_secs.as_secs() as i64),
            ),
            _ => None,
        };

        DashboardSnapshot {
            state_version,
            server_time: now.timestamp_millis(),
            params,
            paused: self.is_paused(),
            last_refresh_at,
            next_refresh_at,
            warning: self.warning.read().clone(),
            chart: self.latest_frame.read().clone(),
            recent_errors: self.recent_errors.read().clone(),
            stats: CycleStats {
                cycles_ok: self.cycles_ok.load(Ordering::Relaxed),
                cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
                ws_clients: self.ws_clients.load(Ordering::Relaxed),
                uptime_secs: self.start_time.elapsed().as_secs(),
            },
            rate_limit: self.rate_limit.snapshot(),
        }
    }
}

// =============================================================================
// Serialisable snapshot types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub params: DashboardConfig,
    pub paused: bool,
    pub last_refresh_at: Option<DateTime<Utc>>,
    pub next_refresh_at: Option<DateTime<Utc>>,
    pub warning: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartFrame>,

    pub recent_errors: Vec<ErrorRecord>,
    pub stats: CycleStats,
    pub rate_limit: RateLimitSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleStats {
    pub cycles_ok: u64,
    pub cycles_failed: u64,
    pub ws_clients: usize,
    pub uptime_secs: u64,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{FetchError, NormalizeError};
    use crate::market_data::CandleSeries;
    use crate::types::Symbol;
    use uuid::Uuid;

    pub(crate) fn test_state() -> AppState {
        let path = std::env::temp_dir().join(format!("candle-dash-{}.json", Uuid::new_v4()));
        AppState::new(
            DashboardConfig::default(),
            path,
            Arc::new(RateLimitTracker::new()),
        )
    }

    #[test]
    fn publish_frame_clears_warning_and_bumps_version() {
        let state = test_state();
        state.publish_warning(NO_DATA_WARNING);
        let before = state.current_state_version();

        let frame = ChartFrame::build(Uuid::nil(), &state.chart_params(), &CandleSeries::default());
        state.publish_frame(frame);

        assert!(state.warning.read().is_none());
        assert!(state.latest_frame.read().is_some());
        assert!(state.current_state_version() > before);
        assert_eq!(state.cycles_ok.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn failure_keeps_previous_frame() {
        let state = test_state();
        let frame = ChartFrame::build(Uuid::nil(), &state.chart_params(), &CandleSeries::default());
        state.publish_frame(frame);

        let err = PipelineError::Fetch(FetchError::Status {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            body: String::new(),
        });
        state.record_failure(&err);

        assert!(state.latest_frame.read().is_some());
        assert_eq!(
            state.warning.read().as_deref(),
            Some("Error fetching data from Binance API")
        );
        let errors = state.recent_errors.read();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code.as_deref(), Some("fetch_status"));
    }

    #[test]
    fn error_log_is_capped() {
        let state = test_state();
        for _ in 0..(MAX_RECENT_ERRORS + 5) {
            state.record_failure(&PipelineError::Normalize(NormalizeError::NotAnArray));
        }
        assert_eq!(state.recent_errors.read().len(), MAX_RECENT_ERRORS);
        assert_eq!(
            state.cycles_failed.load(Ordering::Relaxed),
            (MAX_RECENT_ERRORS + 5) as u64
        );
    }

    #[test]
    fn update_params_requests_refresh_only_on_change() {
        let state = test_state();

        let same = ParamsUpdate {
            sma_window: Some(20),
            ..ParamsUpdate::default()
        };
        assert!(state.update_params(&same).unwrap().is_empty());
        assert!(!state.take_refresh_request());

        let change = ParamsUpdate {
            symbol: Some(Symbol::EthUsdt),
            ..ParamsUpdate::default()
        };
        assert_eq!(state.update_params(&change).unwrap().len(), 1);
        assert!(state.take_refresh_request());
        assert!(!state.take_refresh_request());
        assert_eq!(state.chart_params().symbol, Symbol::EthUsdt);

        std::fs::remove_file(&state.config_path).ok();
    }

    #[test]
    fn resume_requests_refresh() {
        let state = test_state();
        state.set_paused(true);
        assert!(state.is_paused());
        assert!(!state.take_refresh_request());

        state.set_paused(false);
        assert!(!state.is_paused());
        assert!(state.take_refresh_request());
    }

    #[test]
    fn snapshot_reports_next_refresh_when_running() {
        let state = test_state();
        let at = Utc::now();
        state.record_refresh(at);

        let snap = state.build_snapshot();
        assert_eq!(snap.last_refresh_at, Some(at));
        assert_eq!(snap.next_refresh_at, Some(at + chrono::Duration::seconds(30)));
        assert!(snap.chart.is_none());

        state.set_paused(true);
        assert!(state.build_snapshot().next_refresh_at.is_none());
    }
}
