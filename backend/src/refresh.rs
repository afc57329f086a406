// =============================================================================
// Refresh Driver — decides when the next cycle runs
// =============================================================================
//
// Two policies:
//   fixed_sleep    run a cycle, sleep the whole interval, repeat.
//   elapsed_check  wake every second and run once `now - last > interval`.
//
// A forced refresh (button, parameter change, resume) runs a cycle on the
// next wake, at most once per MIN_FORCED_GAP, and pausing stops automatic
// cycles. Under fixed_sleep only the sleep timer starts an automatic cycle;
// an early wake without a pending request goes straight back to sleep.
// The driver owns the last-refresh instant; the shared state only gets a
// wall-clock copy for the UI. Stopping the loop is done by aborting its task.
// =============================================================================

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info};

use crate::app_state::AppState;
use crate::binance::BinanceClient;
use crate::pipeline::refresh_once;
use crate::types::RefreshPolicy;

/// Wake-up period of the elapsed-check policy.
const POLL_TICK: Duration = Duration::from_secs(1);

/// Minimum spacing between two forced cycles.
pub const MIN_FORCED_GAP: Duration = Duration::from_secs(2);

/// What ended the loop's last wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Timer,
    Request,
}

#[derive(Debug, Default)]
pub struct RefreshDriver {
    last_refresh: Option<Instant>,
}

impl RefreshDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if nothing has run yet or strictly more than `interval` passed.
    pub fn is_due(&self, now: Instant, interval: Duration) -> bool {
        match self.last_refresh {
            None => true,
            Some(last) => now.saturating_duration_since(last) > interval,
        }
    }

    /// Time left before another forced cycle is allowed, if any.
    pub fn forced_cooldown(&self, now: Instant) -> Option<Duration> {
        let last = self.last_refresh?;
        MIN_FORCED_GAP
            .checked_sub(now.saturating_duration_since(last))
            .filter(|left| !left.is_zero())
    }

    /// Record that a cycle was triggered at `now`.
    pub fn mark(&mut self, now: Instant) {
        self.last_refresh = Some(now);
    }

    /// Whether a wake-up under `policy` should run a cycle.
    pub fn should_run(
        &self,
        policy: RefreshPolicy,
        wake: Wake,
        now: Instant,
        interval: Duration,
        paused: bool,
        forced: bool,
    ) -> bool {
        if forced && self.forced_cooldown(now).is_none() {
            return true;
        }
        if paused {
            return false;
        }
        match policy {
            RefreshPolicy::FixedSleep => wake == Wake::Timer,
            RefreshPolicy::ElapsedCheck => self.is_due(now, interval),
        }
    }
}

/// Drive refresh cycles until the task is aborted.
pub async fn run_refresh_loop(state: Arc<AppState>, client: BinanceClient) {
    let mut driver = RefreshDriver::new();
    let mut wake = Wake::Timer;
    info!("refresh loop starting");

    loop {
        let (interval, policy) = {
            let cfg = state.config.read();
            (cfg.refresh_interval_secs.as_duration(), cfg.refresh_policy)
        };

        let now = Instant::now();
        let forced = state.refresh_pending();
        if driver.should_run(policy, wake, now, interval, state.is_paused(), forced) {
            state.take_refresh_request();
            driver.mark(now);
            state.record_refresh(Utc::now());
            debug!(%policy, ?wake, forced, "refresh triggered");
            refresh_once(&state, &client).await;
        }

        let mut wait = match policy {
            RefreshPolicy::FixedSleep => interval,
            RefreshPolicy::ElapsedCheck => POLL_TICK,
        };
        if state.refresh_pending() {
            if let Some(left) = driver.forced_cooldown(Instant::now()) {
                debug!(?left, "forced refresh throttled");
                wait = wait.min(left);
            }
        }

        wake = tokio::select! {
            _ = tokio::time::sleep(wait) => Wake::Timer,
            _ = state.refresh_notify.notified() => Wake::Request,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::Ordering;

    use crate::app_state::tests::test_state;
    use crate::binance::client::tests::{klines_router, spawn_exchange};

    const THIRTY: Duration = Duration::from_secs(30);

    #[test]
    fn first_check_is_always_due() {
        let driver = RefreshDriver::new();
        assert!(driver.is_due(Instant::now(), THIRTY));
    }

    #[test]
    fn due_only_after_strictly_more_than_interval() {
        let start = Instant::now();
        let mut driver = RefreshDriver::new();
        driver.mark(start);

        assert!(!driver.is_due(start + Duration::from_secs(10), THIRTY));
        assert!(!driver.is_due(start + THIRTY, THIRTY));
        assert!(driver.is_due(start + THIRTY + Duration::from_millis(1), THIRTY));
    }

    #[test]
    fn mark_moves_the_window() {
        let start = Instant::now();
        let mut driver = RefreshDriver::new();
        driver.mark(start);
        let later = start + Duration::from_secs(31);
        assert!(driver.is_due(later, THIRTY));

        driver.mark(later);
        assert_eq!(driver.last_refresh, Some(later));
        assert!(!driver.is_due(later + Duration::from_secs(5), THIRTY));
    }

    #[test]
    fn pause_and_force_rules() {
        let start = Instant::now();
        let mut driver = RefreshDriver::new();
        driver.mark(start);
        let soon = start + Duration::from_secs(1);

        let later = start + MIN_FORCED_GAP + Duration::from_millis(1);

        // Fixed sleep runs when its timer fires unless paused.
        assert!(driver.should_run(RefreshPolicy::FixedSleep, Wake::Timer, soon, THIRTY, false, false));
        assert!(!driver.should_run(RefreshPolicy::FixedSleep, Wake::Timer, soon, THIRTY, true, false));

        // Elapsed check waits for the interval.
        assert!(!driver.should_run(RefreshPolicy::ElapsedCheck, Wake::Timer, soon, THIRTY, false, false));

        // A forced refresh runs even while paused, once the gap has passed.
        assert!(driver.should_run(RefreshPolicy::ElapsedCheck, Wake::Request, later, THIRTY, true, true));
    }

    #[test]
    fn fixed_sleep_ignores_early_wake_without_request() {
        let start = Instant::now();
        let mut driver = RefreshDriver::new();
        driver.mark(start);
        let soon = start + Duration::from_secs(5);

        assert!(!driver.should_run(RefreshPolicy::FixedSleep, Wake::Request, soon, THIRTY, false, false));
        assert!(driver.should_run(RefreshPolicy::FixedSleep, Wake::Request, soon, THIRTY, false, true));
    }

    #[test]
    fn forced_refreshes_are_spaced() {
        let mut driver = RefreshDriver::new();
        let start = Instant::now();
        assert!(driver.forced_cooldown(start).is_none());
        assert!(driver.should_run(RefreshPolicy::ElapsedCheck, Wake::Request, start, THIRTY, false, true));

        driver.mark(start);
        let soon = start + Duration::from_millis(500);
        assert_eq!(driver.forced_cooldown(soon), Some(MIN_FORCED_GAP - Duration::from_millis(500)));
        assert!(!driver.should_run(RefreshPolicy::ElapsedCheck, Wake::Request, soon, THIRTY, false, true));

        let later = start + MIN_FORCED_GAP;
        assert!(driver.forced_cooldown(later).is_none());
        assert!(driver.should_run(RefreshPolicy::ElapsedCheck, Wake::Request, later, THIRTY, false, true));
    }

    async fn wait_for_cycles(state: &AppState, n: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while state.cycles_ok.load(Ordering::Relaxed) < n {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("refresh loop did not publish in time");
    }

    #[tokio::test]
    async fn loop_runs_immediately_and_on_request() {
        let base = spawn_exchange(klines_router(vec!["1", "2", "3"])).await;
        let client = BinanceClient::new(base).unwrap();
        let state = Arc::new(test_state());

        let handle = tokio::spawn(run_refresh_loop(state.clone(), client));

        wait_for_cycles(&state, 1).await;
        assert!(state.last_refresh_at.read().is_some());

        // The 30 s interval has not elapsed; only the request can trigger this.
        state.request_refresh();
        wait_for_cycles(&state, 2).await;

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn paused_loop_does_not_fetch() {
        let base = spawn_exchange(klines_router(vec!["1"])).await;
        let client = BinanceClient::new(base).unwrap();
        let state = Arc::new(test_state());
        state.set_paused(true);

        let handle = tokio::spawn(run_refresh_loop(state.clone(), client));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(state.cycles_ok.load(Ordering::Relaxed), 0);

        state.set_paused(false);
        wait_for_cycles(&state, 1).await;
        handle.abort();
    }

    #[tokio::test]
    async fn fixed_sleep_request_runs_a_single_cycle() {
        let base = spawn_exchange(klines_router(vec!["1", "2"])).await;
        let client = BinanceClient::new(base).unwrap();
        let state = Arc::new(test_state());
        state.config.write().refresh_policy = RefreshPolicy::FixedSleep;

        // Queued before the loop parks, so the wake-up permit is left over.
        state.request_refresh();
        let handle = tokio::spawn(run_refresh_loop(state.clone(), client));

        wait_for_cycles(&state, 1).await;
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(state.cycles_ok.load(Ordering::Relaxed), 1);

        handle.abort();
    }

    #[tokio::test]
    async fn burst_of_requests_is_throttled() {
        let base = spawn_exchange(klines_router(vec!["1"])).await;
        let client = BinanceClient::new(base).unwrap();
        let state = Arc::new(test_state());

        let handle = tokio::spawn(run_refresh_loop(state.clone(), client));
        wait_for_cycles(&state, 1).await;

        for _ in 0..10 {
            state.request_refresh();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(state.cycles_ok.load(Ordering::Relaxed), 1);

        // The queued request still runs once the gap has passed.
        wait_for_cycles(&state, 2).await;
        handle.abort();
    }
}
