//! The monitor: single owner of [`SampleState`].
//!
//! `Monitor` is a synchronous state machine driven by explicit timestamps,
//! so every transition can be exercised without sleeping. `MonitorHandle`
//! runs it on a dedicated thread and publishes snapshots.
//!
//! ```text
//!            start / wake
//!   Stopped ──────────────▶ Running ──┐ tick(now)
//!      ▲                      │  ▲    │  session time, sample,
//!      └──────────────────────┘  └────┘  history, debounced save
//!      pause / suspend / shutdown
//!      (forced save)
//! ```

mod config;
mod service;

pub use config::{
    ConfigError, DEFAULT_SAMPLE_INTERVAL_SECS, DEFAULT_TICK_INTERVAL, MonitorConfig,
};
pub use service::{Command, MonitorHandle, ServiceStopped};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::collector::{CounterSource, Counters};
use crate::rates::{RateSample, Rejection, compute_rate};
use crate::storage::{PersistenceManager, SampleState, StorageError};

/// Whether the sampling loop is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
}

/// Result of one counter read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    Accepted(RateSample),
    Rejected(Rejection),
    /// The counter source could not be read this tick.
    Unavailable,
}

/// What a single tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// `None` when no read was due this tick.
    pub sample: Option<SampleOutcome>,
    pub history_appended: bool,
    /// Synthetic points added because the tick arrived after a gap.
    pub bridged: usize,
    /// Whether a debounced save was attempted.
    pub saved: bool,
}

/// Previous reading the next one is compared against.
#[derive(Debug, Clone, Copy)]
struct Baseline {
    counters: Counters,
    at: DateTime<Utc>,
}

/// Sampling, rate, history, gap and persistence orchestration.
pub struct Monitor<S: CounterSource> {
    source: S,
    config: MonitorConfig,
    state: SampleState,
    persistence: PersistenceManager,
    run_state: RunState,
    baseline: Option<Baseline>,
    last_tick: Option<DateTime<Utc>>,
    last_read: Option<DateTime<Utc>>,
}

impl<S: CounterSource> Monitor<S> {
    /// Creates a monitor in the `Stopped` state.
    ///
    /// Loads the saved state, falling back to a fresh one when there is
    /// nothing usable on disk. A saved `last_active` seeds the rate baseline
    /// from the saved raw counters and triggers gap reconciliation against
    /// `now`.
    pub fn new(
        source: S,
        persistence: PersistenceManager,
        config: MonitorConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let mut state = match persistence.load() {
            Ok(state) => {
                info!(
                    path = %persistence.store().path().display(),
                    uploaded = state.total_uploaded,
                    downloaded = state.total_downloaded,
                    points = state.history.len(),
                    "monitor: restored saved state"
                );
                state
            }
            Err(StorageError::NotFound(path)) => {
                info!(path = %path.display(), "monitor: no saved state, starting fresh");
                SampleState::fresh()
            }
            Err(e) => {
                warn!(error = %e, "monitor: could not load saved state, starting fresh");
                SampleState::fresh()
            }
        };
        state.is_monitoring = false;
        state.history.evict_overflow(config.history_cap);

        let baseline = state.last_active.map(|at| Baseline {
            counters: state.last_known_counters(),
            at,
        });

        let mut monitor = Self {
            source,
            config,
            state,
            persistence,
            run_state: RunState::Stopped,
            baseline,
            last_tick: None,
            last_read: None,
        };
        monitor.bridge_gap(now);
        monitor
    }

    pub fn state(&self) -> &SampleState {
        &self.state
    }

    /// An owned copy of the current state for publishing.
    pub fn snapshot(&self) -> SampleState {
        self.state.clone()
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn persistence(&self) -> &PersistenceManager {
        &self.persistence
    }

    /// `Stopped -> Running`. No-op when already running.
    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.is_running() {
            return;
        }
        self.run_state = RunState::Running;
        self.state.is_monitoring = true;
        self.last_tick = Some(now);
        self.last_read = None;
        self.persistence.mark_dirty();
        info!("monitor: started");
    }

    /// Stops sampling on user request. Traffic while paused is not counted:
    /// the first reading after the next start only re-establishes a baseline.
    pub fn pause(&mut self, now: DateTime<Utc>) {
        self.stop(now, "paused");
        self.baseline = None;
    }

    /// Stops sampling before the host sleeps. The baseline is kept so the
    /// first reading after wake continues from the same counters.
    pub fn suspend(&mut self, now: DateTime<Utc>) {
        self.stop(now, "suspended");
    }

    /// Stops sampling for process exit.
    pub fn shutdown(&mut self, now: DateTime<Utc>) {
        self.stop(now, "shut down");
    }

    /// Bridges the time since `last_active` and resumes sampling.
    ///
    /// When already running (the host slept without a suspend), the tick
    /// clock restarts at `now` so the next tick does not bridge the same gap
    /// again.
    pub fn wake(&mut self, now: DateTime<Utc>) {
        let bridged = self.bridge_gap(now);
        info!(bridged, "monitor: woke up");
        if self.is_running() {
            self.last_tick = Some(now);
        } else {
            self.start(now);
        }
    }

    /// Replaces the state with a fresh one, saves it and resumes sampling.
    /// Calling it repeatedly yields the same zeroed state.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        if self.is_running() {
            self.run_state = RunState::Stopped;
            self.last_tick = None;
        }
        self.state = SampleState::fresh();
        self.baseline = None;
        self.last_read = None;
        info!("monitor: statistics reset");
        // Already logged by the persistence manager.
        let _ = self.persistence.flush(&self.state, now);
        self.start(now);
    }

    /// Runs one tick. Does nothing unless running.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();
        if !self.is_running() {
            return report;
        }

        if let Some(last) = self.last_tick {
            let elapsed = now - last;
            if elapsed > self.config.gap.threshold {
                info!(
                    gap_secs = elapsed.num_seconds(),
                    "monitor: tick arrived after a gap, treating as wake"
                );
                report.bridged = self.bridge_gap(now);
            } else if elapsed > Duration::zero() {
                self.state.session_duration_secs += secs_f64(elapsed);
            }
        }
        self.last_tick = Some(now);

        if self.read_due(now) {
            self.last_read = Some(now);
            let outcome = self.sample(now);
            if matches!(outcome, SampleOutcome::Accepted(_)) {
                report.history_appended = self.record_history(now);
            }
            report.sample = Some(outcome);
        }

        self.persistence.mark_dirty();
        report.saved = self.persistence.maybe_flush(&self.state, now);
        report
    }

    fn read_due(&self, now: DateTime<Utc>) -> bool {
        self.last_read
            .is_none_or(|last| now - last >= self.config.sample_interval)
    }

    /// Reads the counters and applies the result to the state.
    fn sample(&mut self, now: DateTime<Utc>) -> SampleOutcome {
        let current = match self.source.read() {
            Ok(counters) => counters,
            Err(e) => {
                warn!(error = %e, "monitor: counter read failed, skipping sample");
                return SampleOutcome::Unavailable;
            }
        };

        let (previous, elapsed) = match self.baseline {
            Some(b) => (b.counters, secs_f64(now - b.at)),
            None => (Counters::default(), 0.0),
        };
        let result = compute_rate(previous, current, elapsed);

        self.baseline = Some(Baseline {
            counters: current,
            at: now,
        });
        self.state.set_last_known_counters(current);

        match result {
            Ok(rate) => {
                self.state.total_uploaded = self.state.total_uploaded.saturating_add(rate.upload_delta);
                self.state.total_downloaded =
                    self.state.total_downloaded.saturating_add(rate.download_delta);
                self.state.upload_rate = rate.upload_rate;
                self.state.download_rate = rate.download_rate;
                self.state.last_active = Some(now);
                debug!(
                    upload_rate = rate.upload_rate,
                    download_rate = rate.download_rate,
                    total_uploaded = self.state.total_uploaded,
                    total_downloaded = self.state.total_downloaded,
                    "monitor: sample accepted"
                );
                SampleOutcome::Accepted(rate)
            }
            Err(rejection) => {
                debug!(
                    reason = %rejection,
                    upload = current.upload,
                    download = current.download,
                    "monitor: sample rejected, baseline resynchronized"
                );
                SampleOutcome::Rejected(rejection)
            }
        }
    }

    fn record_history(&mut self, now: DateTime<Utc>) -> bool {
        if !self.state.history.is_due(now, self.config.history_interval) {
            return false;
        }
        let Some(point) = self.state.new_history_point(now) else {
            warn!("monitor: history point ids exhausted, not recording history");
            return false;
        };
        let appended = self.state.history.offer(point, self.config.history_interval);
        self.state.history.evict_overflow(self.config.history_cap);
        appended
    }

    fn stop(&mut self, now: DateTime<Utc>, reason: &str) {
        let was_running = self.is_running();
        if was_running {
            self.run_state = RunState::Stopped;
            self.state.is_monitoring = false;
            self.state.upload_rate = 0.0;
            self.state.download_rate = 0.0;
            self.state.last_active = Some(now);
            self.last_tick = None;
            info!(reason, "monitor: stopped");
        }
        if was_running || self.persistence.is_dirty() {
            // Already logged by the persistence manager.
            let _ = self.persistence.flush(&self.state, now);
        }
    }

    /// Appends bridging points for the time since `last_active`.
    fn bridge_gap(&mut self, now: DateTime<Utc>) -> usize {
        let Some(last_active) = self.state.last_active else {
            return 0;
        };
        let totals = self.state.totals();
        let points = self.config.gap.reconcile(
            last_active,
            now,
            self.state.history.last(),
            totals,
            &mut self.state.next_point_id,
        );
        if points.is_empty() {
            return 0;
        }

        let mut appended = 0;
        for point in points {
            if self.state.history.append(point) {
                appended += 1;
            }
        }
        self.state.history.evict_overflow(self.config.history_cap);
        self.persistence.mark_dirty();
        info!(
            gap_secs = (now - last_active).num_seconds(),
            appended, "monitor: bridged gap in history"
        );
        appended
    }
}

fn secs_f64(d: Duration) -> f64 {
    d.num_milliseconds() as f64 / 1000.0
}
