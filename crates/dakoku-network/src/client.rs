//! HTTP client for the attendance server.
//!
//! The client wraps two calls: submitting an attendance record
//! (`POST /api/attendance`) and probing server liveness
//! (`GET /api/health`). Both are bounded by per-request timeouts so a dead
//! server costs a bounded wait, never a hang.
//!
//! # Delivery outcomes
//!
//! Failing to deliver is a *normal* outcome for this system (it feeds the
//! local queue), so [`AttendanceClient::send_attendance`] returns an outcome
//! enum rather than an error:
//!
//! - [`DeliveryOutcome::Delivered`]: HTTP 200 with application status
//!   `"success"`.
//! - [`DeliveryOutcome::Duplicate`]: the server says it already has this
//!   record. Counts as delivered for idempotence purposes; resending a
//!   queued record after a crash must converge, not loop.
//! - [`DeliveryOutcome::Failed`]: connection error, timeout, non-200
//!   status, undecodable body, or any other application error.
//!
//! # Design Principles
//!
//! - **No automatic retry**: the retry-sync worker owns retry policy.
//! - **No shared state**: the client is cheap to clone (reqwest pools
//!   connections internally) and safe to call from any task.

use dakoku_core::{
    CardId, TerminalId,
    constants::{API_ATTENDANCE, API_HEALTH, ATTENDANCE_TIMEOUT_MS, HEALTH_TIMEOUT_MS},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Markers in a server error message that identify an already-recorded
/// scan. Matched case-insensitively.
const DUPLICATE_MARKERS: [&str; 3] = ["duplicate", "重複", "既に"];

/// Configuration for the attendance client
///
/// # Example
///
/// ```
/// use dakoku_network::AttendanceClientConfig;
/// use std::time::Duration;
///
/// let config = AttendanceClientConfig {
///     server_url: "http://192.168.1.31:5000".to_string(),
///     request_timeout: Duration::from_secs(5),
///     health_timeout: Duration::from_secs(3),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct AttendanceClientConfig {
    /// Base URL of the attendance server
    pub server_url: String,

    /// Timeout for attendance POST requests
    pub request_timeout: Duration,

    /// Timeout for health-probe GET requests
    pub health_timeout: Duration,
}

impl Default for AttendanceClientConfig {
    fn default() -> Self {
        Self {
            server_url: dakoku_core::constants::DEFAULT_SERVER_URL.to_string(),
            request_timeout: Duration::from_millis(ATTENDANCE_TIMEOUT_MS),
            health_timeout: Duration::from_millis(HEALTH_TIMEOUT_MS),
        }
    }
}

impl AttendanceClientConfig {
    /// Create a configuration for the given server URL with default
    /// timeouts.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Default::default()
        }
    }
}

/// Errors constructing the client
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The underlying HTTP client could not be built
    #[error("HTTP client setup failed: {0}")]
    ClientSetup(#[from] reqwest::Error),
}

/// Outcome of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Server recorded the scan
    Delivered,

    /// Server already had the scan; treated as delivered
    Duplicate,

    /// Scan did not reach the server
    Failed(DeliveryFailure),
}

impl DeliveryOutcome {
    /// Whether the record is on the server after this attempt.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered | DeliveryOutcome::Duplicate)
    }
}

/// Why a delivery attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// Connection refused / network unreachable
    Connect(String),

    /// Request timed out
    Timeout,

    /// Non-200 HTTP response
    Http(u16),

    /// HTTP 200 but the application reported an error
    Application(String),

    /// Response body was not the expected JSON
    Decode(String),
}

impl std::fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryFailure::Connect(msg) => write!(f, "connection error: {msg}"),
            DeliveryFailure::Timeout => write!(f, "request timeout"),
            DeliveryFailure::Http(status) => write!(f, "HTTP {status}"),
            DeliveryFailure::Application(msg) => write!(f, "server error: {msg}"),
            DeliveryFailure::Decode(msg) => write!(f, "invalid response: {msg}"),
        }
    }
}

/// Attendance record as sent on the wire
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceRequest {
    /// Card identifier
    pub idm: CardId,

    /// Scan timestamp (RFC 3339)
    pub timestamp: DateTime<Utc>,

    /// Originating terminal
    pub terminal_id: TerminalId,
}

/// Server response body for both endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    /// "success" or "error"
    pub status: String,

    /// Optional human-readable detail
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiResponse {
    fn is_success(&self) -> bool {
        self.status == "success"
    }

    fn is_duplicate(&self) -> bool {
        let message = self.message.as_deref().unwrap_or("").to_lowercase();
        DUPLICATE_MARKERS
            .iter()
            .any(|marker| message.contains(marker))
    }
}

/// HTTP client for the attendance server
///
/// # Example
///
/// ```no_run
/// use dakoku_network::{AttendanceClient, AttendanceClientConfig, AttendanceRequest};
/// use dakoku_core::{CardId, TerminalId};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = AttendanceClient::new(AttendanceClientConfig::new("http://192.168.1.31:5000"))?;
///
/// let request = AttendanceRequest {
///     idm: CardId::new("04A1B2C3")?,
///     timestamp: chrono::Utc::now(),
///     terminal_id: TerminalId::from_mac_bytes([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
/// };
///
/// let outcome = client.send_attendance(&request).await;
/// println!("{:?}", outcome);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AttendanceClient {
    http: reqwest::Client,
    attendance_url: String,
    health_url: String,
    health_timeout: Duration,
}

impl AttendanceClient {
    /// Create a client for the configured server.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::ClientSetup`] if the HTTP client cannot be
    /// constructed.
    pub fn new(config: AttendanceClientConfig) -> Result<Self, NetworkError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let base = config.server_url.trim_end_matches('/');
        Ok(Self {
            http,
            attendance_url: format!("{base}{API_ATTENDANCE}"),
            health_url: format!("{base}{API_HEALTH}"),
            health_timeout: config.health_timeout,
        })
    }

    /// Attempt to deliver one attendance record.
    ///
    /// Never returns an error; failure is an outcome the caller routes to
    /// the local queue.
    pub async fn send_attendance(&self, request: &AttendanceRequest) -> DeliveryOutcome {
        trace!(idm = %request.idm, "posting attendance record");

        let response = match self
            .http
            .post(self.attendance_url.as_str())
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!(idm = %request.idm, "attendance request timed out");
                return DeliveryOutcome::Failed(DeliveryFailure::Timeout);
            }
            Err(e) => {
                warn!(idm = %request.idm, error = %e, "attendance request failed");
                return DeliveryOutcome::Failed(DeliveryFailure::Connect(e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(idm = %request.idm, status = status.as_u16(), "server rejected attendance request");
            return DeliveryOutcome::Failed(DeliveryFailure::Http(status.as_u16()));
        }

        let body: ApiResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(idm = %request.idm, error = %e, "undecodable server response");
                return DeliveryOutcome::Failed(DeliveryFailure::Decode(e.to_string()));
            }
        };

        if body.is_success() {
            debug!(idm = %request.idm, "attendance recorded");
            return DeliveryOutcome::Delivered;
        }

        if body.is_duplicate() {
            debug!(idm = %request.idm, "server already has this record");
            return DeliveryOutcome::Duplicate;
        }

        let message = body.message.unwrap_or_else(|| "server error".to_string());
        warn!(idm = %request.idm, %message, "server reported an error");
        DeliveryOutcome::Failed(DeliveryFailure::Application(message))
    }

    /// Probe server liveness.
    ///
    /// Returns `true` when `GET /api/health` answers HTTP 200 within the
    /// health timeout.
    pub async fn check_health(&self) -> bool {
        match self
            .http
            .get(self.health_url.as_str())
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "health probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: &str, message: Option<&str>) -> ApiResponse {
        ApiResponse {
            status: status.to_string(),
            message: message.map(str::to_string),
        }
    }

    #[test]
    fn test_success_response() {
        assert!(response("success", Some("記録しました")).is_success());
        assert!(!response("error", None).is_success());
    }

    #[test]
    fn test_duplicate_markers() {
        assert!(response("error", Some("Duplicate entry")).is_duplicate());
        assert!(response("error", Some("重複データです")).is_duplicate());
        assert!(response("error", Some("既に記録済み")).is_duplicate());
        assert!(!response("error", Some("database unavailable")).is_duplicate());
        assert!(!response("error", None).is_duplicate());
    }

    #[test]
    fn test_url_normalization() {
        let client =
            AttendanceClient::new(AttendanceClientConfig::new("http://example.invalid:5000/"))
                .unwrap();
        assert_eq!(
            client.attendance_url,
            "http://example.invalid:5000/api/attendance"
        );
        assert_eq!(client.health_url, "http://example.invalid:5000/api/health");
    }

    #[test]
    fn test_outcome_settled() {
        assert!(DeliveryOutcome::Delivered.is_settled());
        assert!(DeliveryOutcome::Duplicate.is_settled());
        assert!(!DeliveryOutcome::Failed(DeliveryFailure::Timeout).is_settled());
    }
}
