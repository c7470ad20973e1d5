//! bwtally - show the state recorded by bwtallyd.
//!
//! Usage:
//!   bwtally                     # totals first
//!   bwtally --display rate      # current speed first
//!   bwtally -n 10               # list the last 10 history points

use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{Level, debug, error};
use tracing_subscriber::EnvFilter;

use bwtally::fmt::{DisplayMode, FmtStyle, format_bytes, format_duration, format_rate};
use bwtally::storage::{SampleState, StateStore, StorageError};

/// Show bandwidth totals, speeds and history recorded by bwtallyd.
#[derive(Parser, Debug)]
#[command(name = "bwtally", about = "Network bandwidth usage viewer", version)]
struct Args {
    /// State file written by bwtallyd.
    #[arg(short, long, env = "BWTALLY_STATE_FILE", default_value = "./data/bwtally.json")]
    state_file: PathBuf,

    /// Which figure to show first.
    #[arg(short, long, value_enum, default_value_t = DisplayMode::Total)]
    display: DisplayMode,

    /// Number of most recent history points to list.
    #[arg(short = 'n', long, default_value_t = 5)]
    recent: usize,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let mut filter = EnvFilter::from_default_env();
    match format!("bwtally={}", level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("invalid log directive: {}", e),
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Renders the state as a report.
fn render(state: &SampleState, mode: DisplayMode, recent: usize) -> String {
    let mut out = String::new();
    let style = FmtStyle::Detail;

    let status = if state.is_monitoring {
        "running"
    } else {
        "stopped"
    };
    let _ = writeln!(out, "Monitoring:       {}", status);
    if let Some(at) = state.last_active {
        let _ = writeln!(out, "Last active:      {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    let _ = writeln!(out);

    for pair in [mode.primary(state, style), mode.secondary(state, style)] {
        let _ = writeln!(out, "{:<17} {}", format!("{}:", pair.download_label), pair.download);
        let _ = writeln!(out, "{:<17} {}", format!("{}:", pair.upload_label), pair.upload);
    }
    let _ = writeln!(
        out,
        "Session duration: {}",
        format_duration(state.session_duration_secs as i64, style)
    );
    let _ = writeln!(out);

    let history = &state.history;
    match (history.first(), history.last()) {
        (Some(first), Some(last)) => {
            let _ = writeln!(
                out,
                "History:          {} points, {} to {}",
                history.len(),
                first.timestamp().format("%Y-%m-%d %H:%M"),
                last.timestamp().format("%Y-%m-%d %H:%M")
            );
            let skip = history.len().saturating_sub(recent);
            for point in history.iter().skip(skip) {
                let _ = writeln!(
                    out,
                    "  {}  up {:>10}  down {:>10}",
                    point.timestamp().format("%Y-%m-%d %H:%M"),
                    format_bytes(point.cumulative_upload(), style),
                    format_bytes(point.cumulative_download(), style)
                );
            }
        }
        _ => {
            let _ = writeln!(out, "History:          empty");
        }
    }

    out
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(args.verbose);

    let store = StateStore::read_only(&args.state_file);
    let state = match store.load() {
        Ok(state) => state,
        Err(StorageError::NotFound(path)) => {
            eprintln!("No state recorded yet at {}. Is bwtallyd running?", path.display());
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!("Failed to load {}: {}", args.state_file.display(), e);
            return ExitCode::FAILURE;
        }
    };
    debug!(
        version = state.version,
        points = state.history.len(),
        rate = %format_rate(state.download_rate, FmtStyle::Compact),
        "loaded state"
    );

    print!("{}", render(&state, args.display, args.recent));
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_state() -> SampleState {
        let mut state = SampleState {
            upload_rate: 2048.0,
            download_rate: 100.0,
            total_uploaded: 3 * 1024 * 1024,
            total_downloaded: 512,
            is_monitoring: true,
            session_duration_secs: 185.0,
            ..SampleState::default()
        };
        for minute in 0..3 {
            let ts = Utc.with_ymd_and_hms(2026, 1, 2, 10, minute, 0).unwrap();
            let p = state.new_history_point(ts).unwrap();
            state.history.append(p);
        }
        state
    }

    #[test]
    fn test_render_total_mode_lists_totals_first() {
        let out = render(&sample_state(), DisplayMode::Total, 2);
        let total = out.find("Total download:").unwrap();
        let speed = out.find("Download speed:").unwrap();
        assert!(total < speed);
        assert!(out.contains("Total upload:     3.0 MiB"));
        assert!(out.contains("Upload speed:     2.0 KiB/s"));
        assert!(out.contains("Session duration: 3m 5s"));
        assert!(out.contains("Monitoring:       running"));
    }

    #[test]
    fn test_render_rate_mode_lists_speed_first() {
        let out = render(&sample_state(), DisplayMode::Rate, 2);
        let total = out.find("Total download:").unwrap();
        let speed = out.find("Download speed:").unwrap();
        assert!(speed < total);
    }

    #[test]
    fn test_render_history_summary() {
        let out = render(&sample_state(), DisplayMode::Total, 2);
        assert!(out.contains("3 points, 2026-01-02 10:00 to 2026-01-02 10:02"));
        assert!(!out.contains("  2026-01-02 10:00  up"));
        assert!(out.contains("  2026-01-02 10:01  up"));
        assert!(out.contains("  2026-01-02 10:02  up"));

        let out = render(&SampleState::default(), DisplayMode::Total, 5);
        assert!(out.contains("History:          empty"));
        assert!(out.contains("Monitoring:       stopped"));
    }

    #[test]
    fn test_args_display_mode() {
        let args = Args::try_parse_from(["bwtally", "--display", "rate"]).unwrap();
        assert_eq!(args.display, DisplayMode::Rate);
        let args = Args::try_parse_from(["bwtally"]).unwrap();
        assert_eq!(args.display, DisplayMode::Total);
        assert!(Args::try_parse_from(["bwtally", "--display", "graph"]).is_err());
    }
}
