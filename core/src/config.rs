// Relay configuration

use std::path::PathBuf;

/// Relay configuration, read from the environment by the server binary.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// Token-usage records included in a new subscriber's snapshot.
    pub snapshot_depth: usize,
    /// Token-usage records retained in memory (ring buffer).
    pub series_capacity: usize,
    /// Error records retained in memory (ring buffer).
    pub error_capacity: usize,
    /// Per-subscriber outgoing queue bound; overflow drops the subscriber.
    pub subscriber_queue: usize,
    /// Journal file path; persistence is enabled when set.
    pub journal_path: Option<PathBuf>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            snapshot_depth: 50,
            series_capacity: 1024,
            error_capacity: 256,
            subscriber_queue: 64,
            journal_path: None,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("PULSE_HOST").unwrap_or(defaults.host),
            port: std::env::var("PULSE_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            snapshot_depth: std::env::var("PULSE_SNAPSHOT_DEPTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.snapshot_depth),
            series_capacity: std::env::var("PULSE_SERIES_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.series_capacity),
            error_capacity: std::env::var("PULSE_ERROR_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.error_capacity),
            subscriber_queue: std::env::var("PULSE_SUBSCRIBER_QUEUE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.subscriber_queue),
            journal_path: std::env::var("PULSE_JOURNAL").ok().map(PathBuf::from),
        }
    }
}
