use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An attendance scan that failed immediate delivery and is held for
/// background resending.
///
/// # Lifecycle
///
/// A row is created exactly once per failed scan, with `retry_count = 0`
/// and `created_at` fixed at insert time. The retry-sync worker then drives
/// it through:
///
/// ```text
/// Pending --(resend success)--> Sent         (terminal)
/// Pending --(resend failure)--> Pending      (retry_count + 1, unbounded)
/// ```
///
/// Sent rows are flagged, never deleted and never resurrected: once
/// `sent_to_server` is set the row is permanently excluded from pending
/// queries. The flag keeps `mark_sent` idempotent and preserves a local
/// audit trail of everything the terminal recorded while offline.
///
/// # Fields
///
/// * `id` - Auto-increment primary key
/// * `idm` - Normalized card identifier that was scanned
/// * `timestamp` - When the card was presented (event time)
/// * `terminal_id` - This terminal's stable identifier
/// * `created_at` - When the row was written (queue time); age for retry
///   eligibility is measured from here, not from the event time
/// * `sent_to_server` - Terminal-state flag
/// * `retry_count` - Failed resend attempts so far; monotonically
///   non-decreasing, no upper bound
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PendingRecord {
    /// Auto-increment primary key
    pub id: i64,

    /// Normalized card identifier
    pub idm: String,

    /// When the card was presented
    pub timestamp: DateTime<Utc>,

    /// Terminal that recorded the scan
    pub terminal_id: String,

    /// When the row was queued
    pub created_at: DateTime<Utc>,

    /// Whether a resend has succeeded (terminal state)
    pub sent_to_server: bool,

    /// Failed resend attempts
    pub retry_count: i64,
}

impl PendingRecord {
    /// Age of the queued row relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_record_age() {
        let created = Utc::now();
        let record = PendingRecord {
            id: 1,
            idm: "04A1B2C3".to_string(),
            timestamp: created,
            terminal_id: "AA:BB:CC:DD:EE:FF".to_string(),
            created_at: created,
            sent_to_server: false,
            retry_count: 0,
        };

        let later = created + chrono::Duration::seconds(650);
        assert_eq!(record.age(later).num_seconds(), 650);
    }
}
