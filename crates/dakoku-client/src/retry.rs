//! Background retry-sync worker.
//!
//! Exactly one of these loops runs per process. It ticks once a second,
//! and when the configured retry interval has elapsed since the last pass
//! it replays a batch of aged pending records through the delivery
//! pipeline's network step. The short tick means the interval can be
//! changed at runtime, through [`RetryPolicy`], without restarting the
//! worker.
//!
//! The worker coordinates with live deliveries only through the queue
//! table, whose operations are each a self-contained statement.

use crate::pipeline::DeliveryPipeline;
use dakoku_core::constants::{
    DEFAULT_RETRY_INTERVAL_SECS, MAX_RETRY_INTERVAL_SECS, MIN_RETRY_INTERVAL_SECS,
    RETRY_TICK_SECS,
};
use dakoku_storage::{PendingRecordRepository, SqlitePendingRecordRepository};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runtime-adjustable retry interval.
///
/// Cloned handles share the same value; setting it takes effect on the
/// worker's next tick.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    interval_secs: Arc<AtomicU64>,
}

impl RetryPolicy {
    /// Create a policy, clamping the interval to the accepted band.
    pub fn new(interval_secs: u64) -> Self {
        Self {
            interval_secs: Arc::new(AtomicU64::new(Self::clamp(interval_secs))),
        }
    }

    /// Change the interval at runtime (clamped).
    pub fn set_interval_secs(&self, secs: u64) {
        self.interval_secs.store(Self::clamp(secs), Ordering::Relaxed);
    }

    /// Current interval.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.load(Ordering::Relaxed))
    }

    fn clamp(secs: u64) -> u64 {
        secs.clamp(MIN_RETRY_INTERVAL_SECS, MAX_RETRY_INTERVAL_SECS)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_INTERVAL_SECS)
    }
}

/// Result of one retry pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    /// Records attempted this pass.
    pub attempted: usize,

    /// Records that reached the server (including duplicates).
    pub delivered: usize,

    /// Records that failed again.
    pub failed: usize,
}

/// Replays aged pending records until they reach the server.
pub struct RetrySyncWorker {
    pipeline: Arc<DeliveryPipeline>,
    repo: SqlitePendingRecordRepository,
    policy: RetryPolicy,
    min_age: Duration,
    batch_limit: i64,
}

impl RetrySyncWorker {
    /// Create a worker over the shared pipeline and queue.
    pub fn new(
        pipeline: Arc<DeliveryPipeline>,
        repo: SqlitePendingRecordRepository,
        policy: RetryPolicy,
        min_age: Duration,
        batch_limit: i64,
    ) -> Self {
        Self {
            pipeline,
            repo,
            policy,
            min_age,
            batch_limit,
        }
    }

    /// Run until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        debug!(interval = ?self.policy.interval(), "retry-sync worker started");
        let mut last_pass: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_secs(RETRY_TICK_SECS)) => {}
            }

            let due = last_pass.is_none_or(|t| t.elapsed() >= self.policy.interval());
            if !due {
                continue;
            }

            last_pass = Some(Instant::now());
            let summary = self.execute_pass().await;
            if summary.attempted > 0 {
                info!(
                    attempted = summary.attempted,
                    delivered = summary.delivered,
                    failed = summary.failed,
                    "retry pass finished"
                );
            }
        }

        debug!("retry-sync worker stopped");
    }

    /// Run one pass over the aged part of the queue.
    ///
    /// Storage errors are logged and skipped; a bad row or a busy database
    /// must not take the worker down.
    pub async fn execute_pass(&self) -> PassSummary {
        let records = match self.repo.list_pending(self.min_age, self.batch_limit).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "could not read pending queue");
                return PassSummary::default();
            }
        };

        let mut summary = PassSummary::default();

        for record in records {
            summary.attempted += 1;

            if self.pipeline.resend(&record).await.is_settled() {
                match self.repo.mark_sent(record.id).await {
                    Ok(()) => {
                        summary.delivered += 1;
                        info!(
                            record_id = record.id,
                            idm = %record.idm,
                            attempts = record.retry_count + 1,
                            "queued scan delivered"
                        );
                    }
                    Err(e) => {
                        // The server has the record; the worst case of a
                        // failed flag write is one duplicate resend, which
                        // the server answers as a duplicate.
                        warn!(record_id = record.id, error = %e, "could not flag record as sent");
                    }
                }
            } else {
                summary.failed += 1;
                debug!(record_id = record.id, idm = %record.idm, "resend failed");
                if let Err(e) = self.repo.increment_retry(record.id).await {
                    warn!(record_id = record.id, error = %e, "could not bump retry counter");
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_clamps_interval() {
        assert_eq!(RetryPolicy::new(5).interval(), Duration::from_secs(60));
        assert_eq!(RetryPolicy::new(600).interval(), Duration::from_secs(600));
        assert_eq!(RetryPolicy::new(90000).interval(), Duration::from_secs(3600));
    }

    #[test]
    fn test_policy_runtime_change_shared_across_clones() {
        let policy = RetryPolicy::new(600);
        let clone = policy.clone();

        policy.set_interval_secs(120);
        assert_eq!(clone.interval(), Duration::from_secs(120));

        clone.set_interval_secs(30);
        assert_eq!(policy.interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_default_policy() {
        assert_eq!(RetryPolicy::default().interval(), Duration::from_secs(600));
    }
}
