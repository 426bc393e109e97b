use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings, read once at startup from `ROOMLEDGER_*` environment
/// variables. Unset or unparseable values fall back to the defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the journal file.
    pub data_dir: PathBuf,
    /// How long a pending booking holds its dates before payment.
    pub hold_duration: Duration,
    /// How often the sweeper looks for expired holds.
    pub sweep_interval: Duration,
    /// Compact the journal once this many events have accumulated.
    pub compact_threshold: u64,
    /// Prometheus exporter port; None disables the exporter.
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            hold_duration: Duration::from_secs(20 * 60),
            sweep_interval: Duration::from_secs(60),
            compact_threshold: 1000,
            metrics_port: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("ROOMLEDGER_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            hold_duration: env_parse::<u64>("ROOMLEDGER_HOLD_MINUTES")
                .map(|m| Duration::from_secs(m * 60))
                .unwrap_or(defaults.hold_duration),
            sweep_interval: env_parse::<u64>("ROOMLEDGER_SWEEP_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            compact_threshold: env_parse("ROOMLEDGER_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
            metrics_port: env_parse("ROOMLEDGER_METRICS_PORT"),
        }
    }

    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join("bookings.journal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.hold_duration, Duration::from_secs(1200));
        assert_eq!(cfg.sweep_interval, Duration::from_secs(60));
        assert_eq!(cfg.compact_threshold, 1000);
        assert!(cfg.metrics_port.is_none());
        assert_eq!(cfg.journal_path(), PathBuf::from("./data/bookings.journal"));
    }
}
