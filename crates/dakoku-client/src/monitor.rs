//! Server liveness monitor.
//!
//! Purely observational: probes `GET /api/health` on a long interval and
//! reports connectivity transitions to the feedback sink. Delivery never
//! consults this (every delivery attempt finds out for itself), but the
//! operator gets a log line and the terminal can show "server NG" instead
//! of silently queueing for hours.

use crate::feedback::{FeedbackEvent, FeedbackSink};
use dakoku_core::constants::{
    HEALTH_QUICK_RETRIES, HEALTH_QUICK_RETRY_WAIT_SECS, SERVER_CHECK_INTERVAL_SECS,
};
use dakoku_network::AttendanceClient;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Probe cadence.
#[derive(Debug, Clone)]
pub struct HealthMonitorConfig {
    /// Interval between probe rounds.
    pub check_interval: Duration,

    /// Quick retries after a failed probe before declaring the server
    /// down.
    pub quick_retries: u32,

    /// Wait between quick retries.
    pub quick_retry_wait: Duration,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(SERVER_CHECK_INTERVAL_SECS),
            quick_retries: HEALTH_QUICK_RETRIES,
            quick_retry_wait: Duration::from_secs(HEALTH_QUICK_RETRY_WAIT_SECS),
        }
    }
}

/// Periodic liveness prober.
pub struct HealthMonitor {
    client: AttendanceClient,
    feedback: Arc<dyn FeedbackSink>,
    config: HealthMonitorConfig,
}

impl HealthMonitor {
    /// Create a monitor with the default cadence.
    pub fn new(client: AttendanceClient, feedback: Arc<dyn FeedbackSink>) -> Self {
        Self::with_config(client, feedback, HealthMonitorConfig::default())
    }

    /// Create a monitor with a custom cadence.
    pub fn with_config(
        client: AttendanceClient,
        feedback: Arc<dyn FeedbackSink>,
        config: HealthMonitorConfig,
    ) -> Self {
        Self {
            client,
            feedback,
            config,
        }
    }

    /// Run until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        debug!(interval = ?self.config.check_interval, "health monitor started");
        let mut connected: Option<bool> = None;

        loop {
            let healthy = self.probe(&cancel).await;
            if cancel.is_cancelled() {
                break;
            }

            if connected != Some(healthy) {
                if healthy {
                    info!("attendance server reachable");
                    self.feedback.notify(None, FeedbackEvent::ServerReconnected);
                } else {
                    warn!("attendance server unreachable");
                    self.feedback.notify(None, FeedbackEvent::ServerLost);
                }
                connected = Some(healthy);
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.check_interval) => {}
            }
        }

        debug!("health monitor stopped");
    }

    /// One probe round: the initial probe plus the quick retries.
    async fn probe(&self, cancel: &CancellationToken) -> bool {
        if self.client.check_health().await {
            return true;
        }

        for attempt in 1..=self.config.quick_retries {
            debug!(attempt, max = self.config.quick_retries, "health probe retry");
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(self.config.quick_retry_wait) => {}
            }
            if self.client.check_health().await {
                return true;
            }
        }

        false
    }
}
