//! Runs a [`Monitor`] on its own thread.
//!
//! One loop serves both the periodic tick and control commands, so there is
//! never more than one writer and never two timers racing on the same
//! fields. Consumers read immutable snapshots.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info};

use super::Monitor;
use crate::collector::CounterSource;
use crate::storage::SampleState;

/// Control operations accepted by the service thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Reset,
    /// Host is about to sleep.
    Suspend,
    /// Host resumed.
    Wake,
    Shutdown,
}

/// The service thread has exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStopped;

impl std::fmt::Display for ServiceStopped {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "monitor service is not running")
    }
}

impl std::error::Error for ServiceStopped {}

/// Latest snapshot plus subscriber channels.
#[derive(Default)]
struct Published {
    latest: RwLock<Arc<SampleState>>,
    subscribers: Mutex<Vec<Sender<Arc<SampleState>>>>,
}

impl Published {
    fn publish(&self, state: SampleState) {
        let snapshot = Arc::new(state);
        {
            let mut latest = self.latest.write().unwrap_or_else(|e| e.into_inner());
            *latest = Arc::clone(&snapshot);
        }
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| tx.send(Arc::clone(&snapshot)).is_ok());
    }
}

/// Handle to a monitor running on a background thread.
///
/// Dropping the handle shuts the monitor down and waits for the final save.
pub struct MonitorHandle {
    commands: Sender<Command>,
    published: Arc<Published>,
    thread: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Moves `monitor` onto a new thread ticking every `tick_interval`
    /// (taken from the monitor's config). The monitor keeps its current run
    /// state; send [`Command::Start`] to begin sampling.
    pub fn spawn<S>(monitor: Monitor<S>) -> std::io::Result<Self>
    where
        S: CounterSource + 'static,
    {
        let (commands, rx) = mpsc::channel();
        let published = Arc::new(Published::default());
        published.publish(monitor.snapshot());

        let shared = Arc::clone(&published);
        let thread = std::thread::Builder::new()
            .name("bwtally-monitor".to_string())
            .spawn(move || run(monitor, rx, shared))?;

        Ok(Self {
            commands,
            published,
            thread: Some(thread),
        })
    }

    /// The most recently published state.
    pub fn snapshot(&self) -> Arc<SampleState> {
        let latest = self.published.latest.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&latest)
    }

    /// Receives every snapshot published from now on.
    pub fn subscribe(&self) -> Receiver<Arc<SampleState>> {
        let (tx, rx) = mpsc::channel();
        let mut subscribers = self
            .published
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        subscribers.push(tx);
        rx
    }

    pub fn send(&self, command: Command) -> Result<(), ServiceStopped> {
        self.commands.send(command).map_err(|_| ServiceStopped)
    }

    pub fn start(&self) -> Result<(), ServiceStopped> {
        self.send(Command::Start)
    }

    pub fn pause(&self) -> Result<(), ServiceStopped> {
        self.send(Command::Pause)
    }

    pub fn reset(&self) -> Result<(), ServiceStopped> {
        self.send(Command::Reset)
    }

    pub fn suspend(&self) -> Result<(), ServiceStopped> {
        self.send(Command::Suspend)
    }

    pub fn wake(&self) -> Result<(), ServiceStopped> {
        self.send(Command::Wake)
    }

    /// Stops the monitor, flushes state and joins the thread.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.commands.send(Command::Shutdown);
        if thread.join().is_err() {
            error!("monitor thread panicked");
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<S: CounterSource>(mut monitor: Monitor<S>, rx: Receiver<Command>, published: Arc<Published>) {
    let tick_interval = monitor.config().tick_interval;
    let mut next_tick = Instant::now() + tick_interval;
    debug!(?tick_interval, "monitor service running");

    loop {
        let command = if monitor.is_running() {
            let timeout = next_tick.saturating_duration_since(Instant::now());
            match rx.recv_timeout(timeout) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => Some(Command::Shutdown),
            }
        } else {
            Some(rx.recv().unwrap_or(Command::Shutdown))
        };

        let now = Utc::now();
        let was_running = monitor.is_running();
        match command {
            None => {
                let report = monitor.tick(now);
                if report.bridged > 0 {
                    debug!(bridged = report.bridged, "monitor service: gap bridged on tick");
                }
                next_tick = schedule_next(next_tick, tick_interval);
            }
            Some(Command::Shutdown) => {
                monitor.shutdown(now);
                published.publish(monitor.snapshot());
                info!("monitor service stopped");
                return;
            }
            Some(Command::Start) => monitor.start(now),
            Some(Command::Pause) => monitor.pause(now),
            Some(Command::Reset) => monitor.reset(now),
            Some(Command::Suspend) => monitor.suspend(now),
            Some(Command::Wake) => monitor.wake(now),
        }
        if !was_running && monitor.is_running() {
            next_tick = Instant::now() + tick_interval;
        }
        published.publish(monitor.snapshot());
    }
}

/// Next deadline on the fixed grid, skipping missed slots instead of
/// bursting to catch up.
fn schedule_next(previous: Instant, interval: Duration) -> Instant {
    let now = Instant::now();
    let mut next = previous + interval;
    if next <= now {
        next = now + interval;
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::ScriptedSource;
    use crate::monitor::MonitorConfig;
    use crate::storage::{PersistenceManager, StateStore};
    use tempfile::tempdir;

    fn fast_config() -> MonitorConfig {
        MonitorConfig {
            tick_interval: Duration::from_millis(10),
            sample_interval: chrono::Duration::milliseconds(10),
            ..MonitorConfig::default()
        }
    }

    fn wait_for(
        rx: &Receiver<Arc<SampleState>>,
        pred: impl Fn(&SampleState) -> bool,
    ) -> Arc<SampleState> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let snapshot = rx
                .recv_timeout(remaining)
                .expect("no matching snapshot before deadline");
            if pred(&snapshot) {
                return snapshot;
            }
        }
    }

    #[test]
    fn test_service_samples_and_publishes() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.json")).unwrap();
        let persistence = PersistenceManager::new(store, chrono::Duration::seconds(60));
        let source = ScriptedSource::with_readings([(1000, 2000), (1500, 2600)]);
        let monitor = Monitor::new(source, persistence, fast_config(), Utc::now());

        let mut handle = MonitorHandle::spawn(monitor).unwrap();
        let rx = handle.subscribe();
        assert!(!handle.snapshot().is_monitoring);

        handle.start().unwrap();
        let snapshot = wait_for(&rx, |s| s.total_uploaded == 500);
        assert!(snapshot.is_monitoring);
        assert_eq!(snapshot.total_downloaded, 600);
        assert_eq!(snapshot.history.len(), 1);

        handle.pause().unwrap();
        let snapshot = wait_for(&rx, |s| !s.is_monitoring);
        assert_eq!(snapshot.upload_rate, 0.0);
        assert!(snapshot.last_active.is_some());

        handle.shutdown();
        assert!(handle.start().is_err());

        let saved = StateStore::open(dir.path().join("state.json"))
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(saved.total_uploaded, 500);
        assert!(!saved.is_monitoring);
    }

    #[test]
    fn test_service_reset_publishes_zeroed_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = StateStore::open(&path).unwrap();
        store
            .save(&SampleState {
                total_uploaded: 10,
                total_downloaded: 20,
                ..SampleState::default()
            })
            .unwrap();
        let persistence = PersistenceManager::new(store, chrono::Duration::seconds(60));
        let monitor = Monitor::new(ScriptedSource::new(), persistence, fast_config(), Utc::now());

        let handle = MonitorHandle::spawn(monitor).unwrap();
        assert_eq!(handle.snapshot().total_uploaded, 10);
        let rx = handle.subscribe();

        handle.reset().unwrap();
        let snapshot = wait_for(&rx, |s| s.total_uploaded == 0);
        assert!(snapshot.is_monitoring);
        assert!(snapshot.history.is_empty());
        drop(handle);

        assert_eq!(StateStore::open(&path).unwrap().load().unwrap().total_uploaded, 0);
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let published = Published::default();
        let (tx, rx) = mpsc::channel();
        published.subscribers.lock().unwrap().push(tx);
        drop(rx);

        published.publish(SampleState::fresh());
        assert!(published.subscribers.lock().unwrap().is_empty());
    }

    #[test]
    fn test_schedule_next_skips_missed_slots() {
        let interval = Duration::from_millis(10);
        let long_ago = Instant::now() - Duration::from_secs(1);
        let next = schedule_next(long_ago, interval);
        assert!(next > Instant::now());
    }
}
