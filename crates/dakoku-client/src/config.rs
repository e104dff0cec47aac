//! Client configuration.
//!
//! A single JSON file read once at startup. A missing file is written
//! back with defaults so the deployment has something to edit; an
//! unreadable file logs a warning and runs on defaults. Nothing here is
//! re-read at runtime; the retry interval is the one value that can
//! change later, through `RetryPolicy`.

use dakoku_core::constants::{
    DEBOUNCE_WINDOW_MS, DEFAULT_DATABASE_PATH, DEFAULT_RETRY_INTERVAL_SECS, DEFAULT_SERVER_URL,
    MAX_RETRY_INTERVAL_SECS, MIN_RETRY_INTERVAL_SECS, PENDING_BATCH_LIMIT, PENDING_MIN_AGE_SECS,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Transport kind of a configured reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Contactless frontend (FeliCa/NFC).
    Contactless,
    /// Contact smartcard reader.
    Smartcard,
}

/// One configured reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderEntry {
    /// Reader name as reported by its subsystem; also selects the APDU
    /// command profile for smartcard readers.
    pub name: String,

    /// Transport the reader speaks.
    pub transport: TransportKind,
}

/// Startup configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Attendance server base URL.
    pub server_url: String,

    /// Seconds between retry passes over the pending queue.
    pub retry_interval_secs: u64,

    /// Debounce window in milliseconds.
    pub debounce_window_ms: u64,

    /// Whether to suppress re-scans within the same calendar minute.
    pub same_minute_check: bool,

    /// SQLite file holding the pending queue.
    pub database_path: String,

    /// Minimum age before a queued record is resent, in seconds.
    pub pending_min_age_secs: u64,

    /// Maximum records per retry pass.
    pub pending_batch_limit: i64,

    /// Readers to poll.
    pub readers: Vec<ReaderEntry>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            retry_interval_secs: DEFAULT_RETRY_INTERVAL_SECS,
            debounce_window_ms: DEBOUNCE_WINDOW_MS,
            same_minute_check: true,
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            pending_min_age_secs: PENDING_MIN_AGE_SECS,
            pending_batch_limit: PENDING_BATCH_LIMIT,
            readers: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from `path`, falling back to defaults.
    ///
    /// A missing file is created with the default contents. Load and
    /// parse problems are never fatal; the terminal must clock people in
    /// even with a mangled config.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            let config = Self::default();
            match serde_json::to_string_pretty(&config) {
                Ok(body) => {
                    if let Err(e) = std::fs::write(path, body) {
                        warn!(path = %path.display(), error = %e, "could not write default config");
                    } else {
                        info!(path = %path.display(), "created default config file");
                    }
                }
                Err(e) => warn!(error = %e, "could not serialize default config"),
            }
            return config;
        }

        let loaded = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|body| serde_json::from_str::<Self>(&body).map_err(|e| e.to_string()));

        match loaded {
            Ok(config) => config.clamped(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config unreadable, using defaults");
                Self::default()
            }
        }
    }

    /// Clamp values to their accepted bands.
    pub fn clamped(mut self) -> Self {
        let requested = self.retry_interval_secs;
        self.retry_interval_secs =
            requested.clamp(MIN_RETRY_INTERVAL_SECS, MAX_RETRY_INTERVAL_SECS);
        if self.retry_interval_secs != requested {
            warn!(
                requested,
                effective = self.retry_interval_secs,
                "retry interval clamped"
            );
        }
        self
    }

    /// Debounce window as a duration.
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    /// Pending-record minimum age as a duration.
    pub fn pending_min_age(&self) -> Duration {
        Duration::from_secs(self.pending_min_age_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.retry_interval_secs, 600);
        assert_eq!(config.debounce_window_ms, 2000);
        assert!(config.same_minute_check);
        assert_eq!(config.pending_min_age_secs, 600);
        assert_eq!(config.pending_batch_limit, 50);
        assert!(config.readers.is_empty());
    }

    #[test]
    fn test_missing_file_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client_config.json");

        let config = ClientConfig::load(&path);
        assert_eq!(config, ClientConfig::default());
        assert!(path.exists());

        // Loading the freshly written file round-trips
        let reloaded = ClientConfig::load(&path);
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_partial_file_merges_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client_config.json");
        std::fs::write(&path, r#"{"server_url": "http://10.0.0.5:5000"}"#).unwrap();

        let config = ClientConfig::load(&path);
        assert_eq!(config.server_url, "http://10.0.0.5:5000");
        assert_eq!(config.retry_interval_secs, 600);
    }

    #[test]
    fn test_mangled_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client_config.json");
        std::fs::write(&path, "{not json").unwrap();

        let config = ClientConfig::load(&path);
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_retry_interval_clamping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client_config.json");
        std::fs::write(&path, r#"{"retry_interval_secs": 5}"#).unwrap();
        assert_eq!(ClientConfig::load(&path).retry_interval_secs, 60);

        std::fs::write(&path, r#"{"retry_interval_secs": 90000}"#).unwrap();
        assert_eq!(ClientConfig::load(&path).retry_interval_secs, 3600);
    }

    #[test]
    fn test_reader_entries_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client_config.json");
        std::fs::write(
            &path,
            r#"{
                "readers": [
                    {"name": "Sony RC-S380/P", "transport": "contactless"},
                    {"name": "CIR315 CL", "transport": "smartcard"}
                ]
            }"#,
        )
        .unwrap();

        let config = ClientConfig::load(&path);
        assert_eq!(config.readers.len(), 2);
        assert_eq!(config.readers[0].transport, TransportKind::Contactless);
        assert_eq!(config.readers[1].transport, TransportKind::Smartcard);
    }
}
