//! Shared scan dedup/debounce filter.
//!
//! The single source of truth for "is this scan new enough to act on",
//! shared by every reader worker. Two independent suppression layers:
//!
//! 1. **Debounce window** (always on): a card accepted less than the
//!    window ago (default 2.0 s) is rejected, whichever reader saw it.
//!    The check and the timestamp update happen in one critical section,
//!    so two readers racing on the same card within the window can never
//!    both win.
//! 2. **Same-minute suppression** (configurable): an accept is downgraded
//!    to reject when the previous accept for the card falls in the same
//!    (date, hour, minute) bucket, even outside the debounce window.
//!    Approximates the server's "already recorded this minute" answer for
//!    standalone deployments without a round trip.
//!
//! The map records *accepted* scans only; rejected candidates leave no
//! trace.

use chrono::{DateTime, Utc};
use dakoku_core::CardId;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Decision for one candidate scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptDecision {
    /// New enough; the caller should act on the scan.
    Accepted,

    /// A scan of this card was accepted within the debounce window.
    RejectedWithinWindow,

    /// A scan of this card was already accepted this calendar minute.
    RejectedSameMinute,
}

impl AcceptDecision {
    /// Whether the scan should be acted on.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, AcceptDecision::Accepted)
    }
}

/// Mutex-guarded map from card identifier to last accepted time.
///
/// Critical sections are a map lookup and insert; nothing slow (and
/// certainly no network call) ever runs under the lock.
#[derive(Debug)]
pub struct DedupFilter {
    window_ms: i64,
    same_minute_check: bool,
    last_accepted: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl DedupFilter {
    /// Create a filter with the given debounce window.
    pub fn new(window: Duration, same_minute_check: bool) -> Self {
        Self {
            window_ms: window.as_millis() as i64,
            same_minute_check,
            last_accepted: Mutex::new(HashMap::new()),
        }
    }

    /// Check-and-update for one candidate scan.
    ///
    /// On `Accepted` the card's entry is atomically set to `now`; on
    /// rejection nothing changes.
    pub fn try_accept(&self, card_id: &CardId, now: DateTime<Utc>) -> AcceptDecision {
        let mut map = self
            .last_accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(last) = map.get(card_id.as_str()) {
            let elapsed_ms = now.signed_duration_since(*last).num_milliseconds();
            if elapsed_ms < self.window_ms {
                return AcceptDecision::RejectedWithinWindow;
            }
            if self.same_minute_check && minute_key(last) == minute_key(&now) {
                return AcceptDecision::RejectedSameMinute;
            }
        }

        map.insert(card_id.as_str().to_string(), now);
        AcceptDecision::Accepted
    }

    /// Drop entries whose last accept is older than `max_age`.
    ///
    /// Returns the number of entries removed. Called periodically so the
    /// map stays proportional to recently-seen cards, not to everyone who
    /// ever clocked in.
    pub fn prune_older_than(&self, now: DateTime<Utc>, max_age: Duration) -> usize {
        let mut map = self
            .last_accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let cutoff_ms = max_age.as_millis() as i64;
        let before = map.len();
        map.retain(|_, last| now.signed_duration_since(*last).num_milliseconds() < cutoff_ms);
        before - map.len()
    }

    /// Number of cards currently tracked.
    pub fn tracked_cards(&self) -> usize {
        self.last_accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn minute_key(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const WINDOW: Duration = Duration::from_secs(2);

    fn card(id: &str) -> CardId {
        CardId::new(id).unwrap()
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, h, m, s).unwrap()
    }

    #[test]
    fn test_first_scan_accepted() {
        let filter = DedupFilter::new(WINDOW, false);
        assert_eq!(
            filter.try_accept(&card("04A1B2C3"), at(9, 30, 0)),
            AcceptDecision::Accepted
        );
    }

    #[test]
    fn test_rescan_within_window_rejected() {
        let filter = DedupFilter::new(WINDOW, false);
        filter.try_accept(&card("04A1B2C3"), at(9, 30, 0));

        let second = filter.try_accept(
            &card("04A1B2C3"),
            at(9, 30, 0) + chrono::Duration::seconds(1),
        );
        assert_eq!(second, AcceptDecision::RejectedWithinWindow);
    }

    #[test]
    fn test_rejection_does_not_extend_window() {
        let filter = DedupFilter::new(WINDOW, false);
        filter.try_accept(&card("04A1B2C3"), at(9, 30, 0));

        // A rejected re-scan at +1.9s does not push the window forward:
        // +2.1s from the ACCEPT is still accepted.
        filter.try_accept(
            &card("04A1B2C3"),
            at(9, 30, 0) + chrono::Duration::milliseconds(1900),
        );
        let third = filter.try_accept(
            &card("04A1B2C3"),
            at(9, 31, 0) + chrono::Duration::milliseconds(100),
        );
        assert_eq!(third, AcceptDecision::Accepted);
    }

    #[test]
    fn test_different_cards_do_not_interact() {
        let filter = DedupFilter::new(WINDOW, false);
        assert!(filter.try_accept(&card("04A1B2C3"), at(9, 30, 0)).is_accepted());
        assert!(filter.try_accept(&card("05D4E5F6"), at(9, 30, 0)).is_accepted());
    }

    #[test]
    fn test_window_boundary_is_inclusive_for_accept() {
        let filter = DedupFilter::new(WINDOW, false);
        filter.try_accept(&card("04A1B2C3"), at(9, 30, 58));

        // Exactly the window later (and in a different minute)
        let second = filter.try_accept(&card("04A1B2C3"), at(9, 31, 0));
        assert_eq!(second, AcceptDecision::Accepted);
    }

    #[test]
    fn test_same_minute_suppression() {
        let filter = DedupFilter::new(WINDOW, true);
        filter.try_accept(&card("04A1B2C3"), at(9, 30, 5));

        // Outside the 2s window but still 09:30
        let second = filter.try_accept(&card("04A1B2C3"), at(9, 30, 45));
        assert_eq!(second, AcceptDecision::RejectedSameMinute);

        // Next minute is fine
        let third = filter.try_accept(&card("04A1B2C3"), at(9, 31, 5));
        assert_eq!(third, AcceptDecision::Accepted);
    }

    #[test]
    fn test_same_minute_disabled() {
        let filter = DedupFilter::new(WINDOW, false);
        filter.try_accept(&card("04A1B2C3"), at(9, 30, 5));

        let second = filter.try_accept(&card("04A1B2C3"), at(9, 30, 45));
        assert_eq!(second, AcceptDecision::Accepted);
    }

    #[test]
    fn test_clock_regression_rejected() {
        let filter = DedupFilter::new(WINDOW, false);
        filter.try_accept(&card("04A1B2C3"), at(9, 30, 10));

        // Clock stepped backwards; elapsed is negative, well under the window
        let second = filter.try_accept(&card("04A1B2C3"), at(9, 30, 9));
        assert_eq!(second, AcceptDecision::RejectedWithinWindow);
    }

    #[test]
    fn test_prune_drops_stale_entries_only() {
        let filter = DedupFilter::new(WINDOW, false);
        filter.try_accept(&card("04A1B2C3"), at(8, 0, 0));
        filter.try_accept(&card("05D4E5F6"), at(9, 45, 0));
        assert_eq!(filter.tracked_cards(), 2);

        let removed = filter.prune_older_than(at(10, 0, 0), Duration::from_secs(3600));
        assert_eq!(removed, 1);
        assert_eq!(filter.tracked_cards(), 1);

        // The pruned card is immediately acceptable again
        assert!(filter.try_accept(&card("04A1B2C3"), at(10, 0, 1)).is_accepted());
    }

    #[test]
    fn test_concurrent_accept_admits_exactly_one() {
        use std::sync::Arc;

        let filter = Arc::new(DedupFilter::new(WINDOW, false));
        let now = at(9, 30, 0);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let filter = filter.clone();
                std::thread::spawn(move || filter.try_accept(&card("04A1B2C3"), now).is_accepted())
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&was_accepted| was_accepted)
            .count();
        assert_eq!(accepted, 1);
    }
}
