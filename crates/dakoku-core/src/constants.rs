//! Shared constants for the attendance-clocking client.
//!
//! All tunable values are centralized here so the polling engine, the
//! delivery pipeline, and the retry-sync worker agree on defaults. The
//! configuration file may override a subset of them at startup.

// ============================================================================
// Server API
// ============================================================================

/// Default attendance server base URL.
pub const DEFAULT_SERVER_URL: &str = "http://192.168.1.31:5000";

/// Attendance record submission endpoint (POST).
pub const API_ATTENDANCE: &str = "/api/attendance";

/// Server liveness probe endpoint (GET).
pub const API_HEALTH: &str = "/api/health";

// ============================================================================
// Network timeouts
// ============================================================================

/// Timeout for an attendance POST request.
///
/// # Value: 5000ms
///
/// The reader worker that produced the scan is never blocked by this
/// (delivery runs on its own task), but the bound keeps a dead server
/// from pinning pipeline tasks.
pub const ATTENDANCE_TIMEOUT_MS: u64 = 5000;

/// Timeout for a health-probe GET request.
///
/// # Value: 3000ms
pub const HEALTH_TIMEOUT_MS: u64 = 3000;

// ============================================================================
// Retry configuration
// ============================================================================

/// Default interval between retry passes over the pending queue.
///
/// # Value: 600s (10 minutes)
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 600;

/// Minimum accepted retry interval.
pub const MIN_RETRY_INTERVAL_SECS: u64 = 60;

/// Maximum accepted retry interval.
pub const MAX_RETRY_INTERVAL_SECS: u64 = 3600;

/// Tick granularity of the retry-sync loop.
///
/// The loop sleeps in these short increments and compares elapsed time
/// against the configured interval, so the interval can be changed at
/// runtime without restarting the worker.
///
/// # Value: 1s
pub const RETRY_TICK_SECS: u64 = 1;

/// Minimum age a pending record must reach before it is eligible for
/// resending.
///
/// # Value: 600s (10 minutes)
///
/// Bounds retry bursts right after an outage and gives the network a
/// chance to recover before the queue is replayed.
pub const PENDING_MIN_AGE_SECS: u64 = 600;

/// Maximum pending records fetched per retry pass.
pub const PENDING_BATCH_LIMIT: i64 = 50;

// ============================================================================
// Card reading
// ============================================================================

/// Debounce window: minimum elapsed time between two accepted scans of the
/// same card identifier, across all readers.
///
/// # Value: 2000ms
pub const DEBOUNCE_WINDOW_MS: u64 = 2000;

/// Per-poll card detection timeout.
///
/// # Value: 400ms
pub const CARD_DETECT_TIMEOUT_MS: u64 = 400;

/// Sleep between poll attempts on one reader.
///
/// # Value: 300ms
pub const POLL_INTERVAL_MS: u64 = 300;

/// Age after which dedup history entries are pruned.
///
/// # Value: 3600s (1 hour)
pub const DEDUP_PRUNE_AGE_SECS: u64 = 3600;

/// Interval between dedup-history maintenance sweeps.
///
/// # Value: 1800s (30 minutes)
pub const MAINTENANCE_INTERVAL_SECS: u64 = 1800;

// ============================================================================
// Reader link management
// ============================================================================

/// Consecutive poll failures tolerated before a reader link is considered
/// disconnected.
pub const MAX_CONSECUTIVE_POLL_FAILURES: u32 = 10;

/// Base wait before a reconnect attempt on a disconnected reader.
///
/// Doubles on each further failed attempt, up to
/// [`RECONNECT_BACKOFF_CAP_SECS`].
pub const RECONNECT_BACKOFF_SECS: u64 = 5;

/// Upper bound for the reconnect backoff.
pub const RECONNECT_BACKOFF_CAP_SECS: u64 = 60;

/// A reader that stays disconnected longer than this is abandoned: its
/// worker exits and the reader is reported once. The process keeps running
/// on the remaining readers.
///
/// # Value: 300s (5 minutes)
pub const READER_ABANDON_SECS: u64 = 300;

// ============================================================================
// Health monitoring
// ============================================================================

/// Interval between server liveness probes.
///
/// # Value: 3600s (1 hour)
pub const SERVER_CHECK_INTERVAL_SECS: u64 = 3600;

/// Quick reconnect attempts after a failed probe before the server is
/// declared down.
pub const HEALTH_QUICK_RETRIES: u32 = 2;

/// Wait between quick reconnect attempts.
pub const HEALTH_QUICK_RETRY_WAIT_SECS: u64 = 5;

// ============================================================================
// Card identifier constraints
// ============================================================================

/// Minimum normalized card identifier length (hex characters).
///
/// Anything shorter is reader noise, not a card.
pub const MIN_CARD_ID_LENGTH: usize = 8;

/// Maximum normalized card identifier length (hex characters).
pub const MAX_CARD_ID_LENGTH: usize = 32;

/// Maximum raw identifier bytes taken from a reader response.
pub const MAX_CARD_ID_BYTES: usize = 16;

/// Identifiers that several reader firmwares return for an empty or
/// half-read field. Never treated as a card.
pub const INVALID_CARD_IDS: [&str; 3] = ["00000000", "FFFFFFFF", "0000000000000000"];

// ============================================================================
// Local store
// ============================================================================

/// Default SQLite database file for the pending queue.
pub const DEFAULT_DATABASE_PATH: &str = "local_cache.db";

/// Default configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "client_config.json";
