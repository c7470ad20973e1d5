//! Formatting helpers for byte counts, rates and durations.
//!
//! All functions are pure. Those that differ between compact one-line output
//! and verbose reports are parameterized via [`FmtStyle`].

use crate::storage::SampleState;

/// Controls compact (status line) vs verbose (report) output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FmtStyle {
    /// Compact: no spaces, short suffixes ("1.5G", "3m5s")
    Compact,
    /// Detail: spaces, full suffixes ("1.5 GiB", "3m 5s")
    Detail,
}

// ---------------------------------------------------------------------------
// Style-parameterized functions
// ---------------------------------------------------------------------------

/// Format byte count as human-readable size.
///
/// Compact: `"1.5G"`, `"100.3M"`, `"50.0K"`, `"512B"`
/// Detail:  `"1.5 GiB"`, `"100.3 MiB"`, `"50.0 KiB"`, `"512 B"`
pub fn format_bytes(bytes: u64, style: FmtStyle) -> String {
    let (t, g, m, k, b) = match style {
        FmtStyle::Compact => ("T", "G", "M", "K", "B"),
        FmtStyle::Detail => (" TiB", " GiB", " MiB", " KiB", " B"),
    };
    let f = bytes as f64;
    if bytes >= 1 << 40 {
        format!("{:.1}{}", f / (1u64 << 40) as f64, t)
    } else if bytes >= 1 << 30 {
        format!("{:.1}{}", f / (1u64 << 30) as f64, g)
    } else if bytes >= 1 << 20 {
        format!("{:.1}{}", f / (1u64 << 20) as f64, m)
    } else if bytes >= 1 << 10 {
        format!("{:.1}{}", f / 1024.0, k)
    } else {
        format!("{}{}", bytes, b)
    }
}

/// Format bytes-per-second rate as human-readable.
///
/// Compact: `"1.5G/s"`, `"100.3M/s"`, `"0B/s"`
/// Detail:  `"1.5 GiB/s"`, `"100.3 MiB/s"`, `"0 B/s"`
pub fn format_rate(rate: f64, style: FmtStyle) -> String {
    let (g, m, k, b) = match style {
        FmtStyle::Compact => ("G/s", "M/s", "K/s", "B/s"),
        FmtStyle::Detail => (" GiB/s", " MiB/s", " KiB/s", " B/s"),
    };
    if !rate.is_finite() || rate < 1.0 {
        return format!("0{}", b);
    }
    if rate >= 1024.0 * 1024.0 * 1024.0 {
        format!("{:.1}{}", rate / (1024.0 * 1024.0 * 1024.0), g)
    } else if rate >= 1024.0 * 1024.0 {
        format!("{:.1}{}", rate / (1024.0 * 1024.0), m)
    } else if rate >= 1024.0 {
        format!("{:.1}{}", rate / 1024.0, k)
    } else {
        format!("{:.0}{}", rate, b)
    }
}

/// Format duration in seconds as human-readable.
///
/// Compact: `"3m5s"` (no spaces, `"-"` for negative)
/// Detail:  `"3m 5s"` (with spaces, `"0s"` for `<= 0`)
pub fn format_duration(secs: i64, style: FmtStyle) -> String {
    match style {
        FmtStyle::Compact => {
            if secs < 0 {
                return "-".to_string();
            }
            if secs < 60 {
                format!("{}s", secs)
            } else if secs < 3600 {
                format!("{}m{}s", secs / 60, secs % 60)
            } else if secs < 86400 {
                format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
            } else {
                format!("{}d{}h", secs / 86400, (secs % 86400) / 3600)
            }
        }
        FmtStyle::Detail => {
            if secs <= 0 {
                return "0s".to_string();
            }
            if secs < 60 {
                format!("{}s", secs)
            } else if secs < 3600 {
                format!("{}m {}s", secs / 60, secs % 60)
            } else if secs < 86400 {
                format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
            } else {
                format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Display mode
// ---------------------------------------------------------------------------

/// Which figure is shown first. The other one becomes the secondary line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum DisplayMode {
    /// Current upload/download speed first.
    Rate,
    /// Cumulative totals first.
    #[default]
    Total,
}

/// One labelled download/upload pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FigurePair {
    pub download_label: &'static str,
    pub download: String,
    pub upload_label: &'static str,
    pub upload: String,
}

impl DisplayMode {
    /// The figure pair shown first.
    pub fn primary(self, state: &SampleState, style: FmtStyle) -> FigurePair {
        match self {
            DisplayMode::Rate => rates(state, style),
            DisplayMode::Total => totals(state, style),
        }
    }

    /// The figure pair shown second.
    pub fn secondary(self, state: &SampleState, style: FmtStyle) -> FigurePair {
        match self {
            DisplayMode::Rate => totals(state, style),
            DisplayMode::Total => rates(state, style),
        }
    }
}

fn rates(state: &SampleState, style: FmtStyle) -> FigurePair {
    FigurePair {
        download_label: "Download speed",
        download: format_rate(state.download_rate, style),
        upload_label: "Upload speed",
        upload: format_rate(state.upload_rate, style),
    }
}

fn totals(state: &SampleState, style: FmtStyle) -> FigurePair {
    FigurePair {
        download_label: "Total download",
        download: format_bytes(state.total_downloaded, style),
        upload_label: "Total upload",
        upload: format_bytes(state.total_uploaded, style),
    }
}
