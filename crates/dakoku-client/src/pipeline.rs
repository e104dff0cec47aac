//! Delivery pipeline: server first, local queue as fallback.
//!
//! One accepted scan flows through [`DeliveryPipeline::process_scan`]:
//! a bounded network attempt, and on failure exactly one pending record
//! in the local queue. The pipeline is shared behind an `Arc` and called
//! from short-lived tasks, never while the dedup lock is held, so slow
//! network I/O cannot throttle reader polling.

use crate::feedback::{FeedbackEvent, FeedbackSink};
use dakoku_core::{CardId, TerminalId};
use dakoku_hardware::ScanEvent;
use dakoku_network::{AttendanceClient, AttendanceRequest, DeliveryFailure, DeliveryOutcome};
use dakoku_storage::{PendingRecord, PendingRecordRepository, SqlitePendingRecordRepository};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What became of one accepted scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDisposition {
    /// Recorded on the server.
    Delivered,

    /// Server already had it.
    Duplicate,

    /// Queued locally for the retry-sync worker.
    Queued,

    /// Delivery and local queueing both failed; the scan is lost.
    ///
    /// Accepted degraded behavior: the client stays up, the loss is in
    /// the logs.
    Dropped,
}

/// Delivers accepted scans and requeues failures.
pub struct DeliveryPipeline {
    client: AttendanceClient,
    repo: SqlitePendingRecordRepository,
    terminal_id: TerminalId,
    feedback: Arc<dyn FeedbackSink>,
}

impl DeliveryPipeline {
    /// Create a pipeline.
    pub fn new(
        client: AttendanceClient,
        repo: SqlitePendingRecordRepository,
        terminal_id: TerminalId,
        feedback: Arc<dyn FeedbackSink>,
    ) -> Self {
        Self {
            client,
            repo,
            terminal_id,
            feedback,
        }
    }

    /// Deliver one live scan, falling back to the local queue.
    pub async fn process_scan(&self, scan: &ScanEvent) -> ScanDisposition {
        self.feedback.notify(Some(&scan.card_id), FeedbackEvent::CardRead);

        let request = AttendanceRequest {
            idm: scan.card_id.clone(),
            timestamp: scan.detected_at,
            terminal_id: self.terminal_id.clone(),
        };

        match self.client.send_attendance(&request).await {
            DeliveryOutcome::Delivered => {
                info!(card_id = %scan.card_id, reader_id = %scan.reader_id, "scan delivered");
                self.feedback
                    .notify(Some(&scan.card_id), FeedbackEvent::Delivered);
                ScanDisposition::Delivered
            }
            DeliveryOutcome::Duplicate => {
                info!(card_id = %scan.card_id, "server already had this scan");
                self.feedback
                    .notify(Some(&scan.card_id), FeedbackEvent::Duplicate);
                ScanDisposition::Duplicate
            }
            DeliveryOutcome::Failed(failure) => {
                warn!(card_id = %scan.card_id, %failure, "delivery failed, queueing locally");
                self.queue_scan(scan).await
            }
        }
    }

    /// Re-deliver a queued record. Bypasses the dedup filter: the scan was
    /// already accepted once.
    pub async fn resend(&self, record: &PendingRecord) -> DeliveryOutcome {
        let idm = match CardId::new(&record.idm) {
            Ok(idm) => idm,
            Err(e) => {
                // Only reachable if the table was edited by hand
                error!(record_id = record.id, error = %e, "corrupt queued record");
                return DeliveryOutcome::Failed(DeliveryFailure::Application(
                    "corrupt queued record".to_string(),
                ));
            }
        };

        let request = AttendanceRequest {
            idm,
            timestamp: record.timestamp,
            terminal_id: self.terminal_id.clone(),
        };

        self.client.send_attendance(&request).await
    }

    async fn queue_scan(&self, scan: &ScanEvent) -> ScanDisposition {
        match self
            .repo
            .insert(scan.card_id.as_str(), scan.detected_at, self.terminal_id.as_str())
            .await
        {
            Ok(record_id) => {
                debug!(card_id = %scan.card_id, record_id, "scan queued for retry");
                self.feedback
                    .notify(Some(&scan.card_id), FeedbackEvent::SavedLocal);
                ScanDisposition::Queued
            }
            Err(e) => {
                error!(card_id = %scan.card_id, error = %e, "local queueing failed, scan lost");
                self.feedback
                    .notify(Some(&scan.card_id), FeedbackEvent::StoreFailed);
                ScanDisposition::Dropped
            }
        }
    }
}
