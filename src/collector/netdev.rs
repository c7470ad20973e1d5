//! `/proc/net/dev` counter source.

use std::path::{Path, PathBuf};

use tracing::trace;

use super::traits::FileSystem;
use super::{CollectError, CounterSource, Counters};

/// Per-interface byte counters from `/proc/net/dev`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetDevStats {
    pub interface: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Parses `/proc/net/dev` content.
///
/// Format:
/// ```text
/// Inter-|   Receive                                                |  Transmit
///  face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets ...
///   eth0: 987654321 654321 5 10 0 0 0 100 123456789 456789 2 5 0 0 0 0
/// ```
///
/// Header lines and lines with fewer than 16 counters are skipped.
pub fn parse_net_dev(content: &str) -> Vec<NetDevStats> {
    let mut devices = Vec::new();

    for line in content.lines() {
        if line.contains('|') || line.trim().is_empty() {
            continue;
        }

        let Some((name, rest)) = line.split_once(':') else {
            continue;
        };

        let values: Vec<&str> = rest.split_whitespace().collect();
        if values.len() < 16 {
            continue;
        }

        let get_val =
            |idx: usize| -> u64 { values.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

        devices.push(NetDevStats {
            interface: name.trim().to_string(),
            rx_bytes: get_val(0),
            tx_bytes: get_val(8),
        });
    }

    devices
}

/// Which interfaces contribute to the summed counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InterfaceFilter {
    /// Every interface except `lo`.
    #[default]
    NonLoopback,
    /// Only the named interfaces.
    Named(Vec<String>),
}

impl InterfaceFilter {
    /// Builds a filter from a list of names; an empty list means all
    /// non-loopback interfaces.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names
            .into_iter()
            .map(Into::into)
            .filter(|n| !n.trim().is_empty())
            .collect();
        if names.is_empty() {
            InterfaceFilter::NonLoopback
        } else {
            InterfaceFilter::Named(names)
        }
    }

    pub fn matches(&self, interface: &str) -> bool {
        match self {
            InterfaceFilter::NonLoopback => interface != "lo",
            InterfaceFilter::Named(names) => names.iter().any(|n| n == interface),
        }
    }
}

/// Counter source summing `tx_bytes`/`rx_bytes` of the filtered interfaces.
pub struct NetDevSource<F: FileSystem> {
    fs: F,
    net_dev_path: PathBuf,
    filter: InterfaceFilter,
}

impl<F: FileSystem> NetDevSource<F> {
    /// Creates a new source.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    /// * `filter` - Interfaces to sum
    pub fn new(fs: F, proc_path: impl AsRef<Path>, filter: InterfaceFilter) -> Self {
        Self {
            fs,
            net_dev_path: proc_path.as_ref().join("net/dev"),
            filter,
        }
    }

    pub fn filter(&self) -> &InterfaceFilter {
        &self.filter
    }
}

impl<F: FileSystem> CounterSource for NetDevSource<F> {
    fn read(&mut self) -> Result<Counters, CollectError> {
        let content = self.fs.read_to_string(&self.net_dev_path)?;

        let mut matched = 0usize;
        let mut counters = Counters::default();
        for dev in parse_net_dev(&content) {
            if !self.filter.matches(&dev.interface) {
                continue;
            }
            matched += 1;
            counters.upload = counters.upload.saturating_add(dev.tx_bytes);
            counters.download = counters.download.saturating_add(dev.rx_bytes);
        }

        if matched == 0 {
            return Err(CollectError::NoInterfaces);
        }

        trace!(
            interfaces = matched,
            upload = counters.upload,
            download = counters.download,
            "read interface counters"
        );
        Ok(counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    const NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 12345678     9876    0    0    0     0          0         0 12345678     9876    0    0    0     0       0          0
  eth0: 987654321   654321    5   10    0     0          0       100 123456789   456789    2    5    0     0       0          0
 wlan0: 1000   10    0    0    0     0          0         0 500   5    0    0    0     0       0          0
";

    #[test]
    fn test_parse_net_dev() {
        let devices = parse_net_dev(NET_DEV);
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[1].interface, "eth0");
        assert_eq!(devices[1].rx_bytes, 987654321);
        assert_eq!(devices[1].tx_bytes, 123456789);
    }

    #[test]
    fn test_parse_net_dev_skips_short_lines() {
        let devices = parse_net_dev("  eth0: 1 2 3\n\n");
        assert!(devices.is_empty());
    }

    #[test]
    fn test_source_sums_non_loopback() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/net/dev", NET_DEV);
        let mut source = NetDevSource::new(fs, "/proc", InterfaceFilter::NonLoopback);

        let counters = source.read().unwrap();
        assert_eq!(counters.download, 987654321 + 1000);
        assert_eq!(counters.upload, 123456789 + 500);
    }

    #[test]
    fn test_source_named_filter() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/net/dev", NET_DEV);
        let filter = InterfaceFilter::from_names(["wlan0"]);
        let mut source = NetDevSource::new(fs, "/proc", filter);

        assert_eq!(source.read().unwrap(), Counters::new(500, 1000));
    }

    #[test]
    fn test_source_no_matching_interface() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/net/dev", NET_DEV);
        let mut source =
            NetDevSource::new(fs, "/proc", InterfaceFilter::from_names(["en0", "en1"]));

        assert!(matches!(source.read(), Err(CollectError::NoInterfaces)));
    }

    #[test]
    fn test_source_missing_file() {
        let mut source = NetDevSource::new(MockFs::new(), "/proc", InterfaceFilter::NonLoopback);
        assert!(matches!(source.read(), Err(CollectError::Io(_))));
    }

    #[test]
    fn test_filter_from_empty_names() {
        let filter = InterfaceFilter::from_names(Vec::<String>::new());
        assert_eq!(filter, InterfaceFilter::NonLoopback);
        assert!(!filter.matches("lo"));
        assert!(filter.matches("eth0"));

        let filter = InterfaceFilter::from_names(["", " "]);
        assert_eq!(filter, InterfaceFilter::NonLoopback);
    }
}
