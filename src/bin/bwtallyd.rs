//! bwtallyd - network bandwidth sampler daemon.
//!
//! Samples interface byte counters from /proc/net/dev, keeps running totals
//! and a minute-resolution usage history, and persists them to a JSON file.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use clap::Parser;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use bwtally::collector::{InterfaceFilter, NetDevSource, RealFs};
use bwtally::fmt::{FmtStyle, format_bytes, format_duration, format_rate};
use bwtally::history::DEFAULT_HISTORY_CAP;
use bwtally::monitor::{Monitor, MonitorConfig, MonitorHandle};
use bwtally::storage::{PersistenceManager, SampleState, StateStore};
use bwtally::util::parse_duration;

/// How often the main loop logs a status line.
const STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// Network bandwidth sampler daemon.
#[derive(Parser, Debug)]
#[command(name = "bwtallyd", about = "Network bandwidth sampler daemon", version)]
struct Args {
    /// State file holding totals and history.
    #[arg(short, long, env = "BWTALLY_STATE_FILE", default_value = "./data/bwtally.json")]
    state_file: PathBuf,

    /// Comma-separated interfaces to count. Default: every non-loopback interface.
    #[arg(short, long, env = "BWTALLY_INTERFACES", value_delimiter = ',')]
    interfaces: Vec<String>,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: PathBuf,

    /// Service loop period (e.g. "1s", "500ms").
    #[arg(long, default_value = "1s", value_parser = parse_duration)]
    tick: Duration,

    /// Counter read interval (e.g. "4s").
    #[arg(long, default_value = "4s", value_parser = parse_duration)]
    sample_interval: Duration,

    /// Minimum time between debounced saves (e.g. "1m").
    #[arg(long, default_value = "1m", value_parser = parse_duration)]
    save_interval: Duration,

    /// Maximum number of history points kept.
    #[arg(long, default_value_t = DEFAULT_HISTORY_CAP)]
    history_cap: usize,

    /// Zero all statistics on startup.
    #[arg(long)]
    reset: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn monitor_config(&self) -> Result<MonitorConfig, String> {
        let chrono = |name: &str, d: Duration| {
            chrono::Duration::from_std(d).map_err(|e| format!("{} out of range: {}", name, e))
        };
        Ok(MonitorConfig {
            tick_interval: self.tick,
            sample_interval: chrono("sample interval", self.sample_interval)?,
            save_interval: chrono("save interval", self.save_interval)?,
            history_cap: self.history_cap,
            ..MonitorConfig::default()
        })
    }
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["bwtallyd", "bwtally"] {
        match format!("{}={}", target, level).parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("invalid log directive for {}: {}", target, e),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// One-line summary for the periodic status log.
fn status_line(state: &SampleState) -> String {
    format!(
        "up {} down {}, total up {} down {}, session {}, {} history points",
        format_rate(state.upload_rate, FmtStyle::Compact),
        format_rate(state.download_rate, FmtStyle::Compact),
        format_bytes(state.total_uploaded, FmtStyle::Compact),
        format_bytes(state.total_downloaded, FmtStyle::Compact),
        format_duration(state.session_duration_secs as i64, FmtStyle::Compact),
        state.history.len(),
    )
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("bwtallyd {} starting", env!("CARGO_PKG_VERSION"));

    let config = match args.monitor_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = config.validate() {
        error!("{}", e);
        return ExitCode::FAILURE;
    }

    let filter = InterfaceFilter::from_names(args.interfaces.iter().cloned());
    info!(
        "Config: state={}, proc={}, interfaces={:?}, tick={:?}, sample={:?}, save={:?}",
        args.state_file.display(),
        args.proc_path.display(),
        filter,
        args.tick,
        args.sample_interval,
        args.save_interval
    );

    let store = match StateStore::open(&args.state_file) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open state file {}: {}", args.state_file.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let persistence = PersistenceManager::new(store, config.save_interval);
    let source = NetDevSource::new(RealFs::new(), &args.proc_path, filter);
    let monitor = Monitor::new(source, persistence, config, Utc::now());

    let mut handle = match MonitorHandle::spawn(monitor) {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start monitor thread: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let started = if args.reset {
        info!("Resetting statistics");
        handle.reset()
    } else {
        handle.start()
    };
    if let Err(e) = started {
        error!("{}", e);
        return ExitCode::FAILURE;
    }

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    info!("Sampling started");

    let mut last_status = Instant::now();
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));

        if last_status.elapsed() >= STATUS_INTERVAL {
            last_status = Instant::now();
            info!("Status: {}", status_line(&handle.snapshot()));
        }
    }

    info!("Shutting down...");
    handle.shutdown();
    debug!("Final state: {}", status_line(&handle.snapshot()));
    info!("bwtallyd stopped");

    ExitCode::SUCCESS
}
