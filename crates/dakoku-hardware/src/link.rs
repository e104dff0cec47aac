//! Reader link state machine.
//!
//! Tracks the health of one reader's transport across poll iterations:
//!
//! - `Disconnected → Connecting → Idle ⇄ CardPresent`
//! - Repeated poll failures beyond a threshold drop the link to
//!   `Disconnected`; reconnect attempts are paced by a doubling backoff.
//! - A link that stays disconnected past a long timeout is abandoned:
//!   the owning worker exits, siblings keep running.
//!
//! The machine is pure state; the polling worker feeds it observations and
//! acts on the resulting state, which keeps all threshold/backoff behavior
//! unit-testable without hardware or timers.

use std::fmt;
use std::time::{Duration, Instant};

use dakoku_core::constants::{
    MAX_CONSECUTIVE_POLL_FAILURES, READER_ABANDON_SECS, RECONNECT_BACKOFF_CAP_SECS,
    RECONNECT_BACKOFF_SECS,
};

/// Connection state of one reader link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    /// Transport considered dead; waiting out a backoff before reconnecting.
    Disconnected,

    /// Probing the transport (initial bring-up or reconnect attempt).
    Connecting,

    /// Transport healthy, field empty.
    Idle,

    /// Transport healthy, a card is resting in the field.
    CardPresent,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkState::Disconnected => "Disconnected",
            LinkState::Connecting => "Connecting",
            LinkState::Idle => "Idle",
            LinkState::CardPresent => "CardPresent",
        };
        write!(f, "{}", s)
    }
}

impl LinkState {
    /// Check if a transition to the target state is valid from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use dakoku_hardware::link::LinkState;
    ///
    /// assert!(LinkState::Idle.can_transition_to(&LinkState::CardPresent));
    /// assert!(!LinkState::Disconnected.can_transition_to(&LinkState::Idle));
    /// ```
    pub fn can_transition_to(&self, target: &LinkState) -> bool {
        matches!(
            (self, target),
            (LinkState::Disconnected, LinkState::Connecting)
                | (LinkState::Connecting, LinkState::Idle | LinkState::CardPresent | LinkState::Disconnected)
                | (LinkState::Idle, LinkState::CardPresent | LinkState::Connecting | LinkState::Disconnected)
                | (LinkState::CardPresent, LinkState::Idle | LinkState::Connecting | LinkState::Disconnected)
        )
    }
}

/// Thresholds and pacing for one reader link.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Consecutive poll failures tolerated before the link drops to
    /// `Disconnected`.
    pub max_consecutive_failures: u32,

    /// Base wait before the first reconnect attempt; doubles per attempt.
    pub reconnect_backoff: Duration,

    /// Upper bound for the reconnect backoff.
    pub backoff_cap: Duration,

    /// Total disconnected time after which the reader is abandoned.
    pub abandon_after: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: MAX_CONSECUTIVE_POLL_FAILURES,
            reconnect_backoff: Duration::from_secs(RECONNECT_BACKOFF_SECS),
            backoff_cap: Duration::from_secs(RECONNECT_BACKOFF_CAP_SECS),
            abandon_after: Duration::from_secs(READER_ABANDON_SECS),
        }
    }
}

/// Health tracker for one reader's transport.
#[derive(Debug)]
pub struct ReaderLink {
    state: LinkState,
    consecutive_failures: u32,
    reconnect_attempts: u32,
    disconnected_at: Option<Instant>,
    config: LinkConfig,
}

impl ReaderLink {
    /// Create a link tracker in the `Connecting` state.
    pub fn new(config: LinkConfig) -> Self {
        Self {
            state: LinkState::Connecting,
            consecutive_failures: 0,
            reconnect_attempts: 0,
            disconnected_at: None,
            config,
        }
    }

    /// Current link state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Record a successful poll (regardless of card presence).
    ///
    /// Resets failure and reconnect counters and moves the link to `Idle`
    /// or `CardPresent`.
    pub fn on_poll_success(&mut self, card_present: bool) {
        self.consecutive_failures = 0;
        self.reconnect_attempts = 0;
        self.disconnected_at = None;

        let target = if card_present {
            LinkState::CardPresent
        } else {
            LinkState::Idle
        };
        debug_assert!(
            self.state == target || self.state.can_transition_to(&target),
            "invalid link transition {} -> {}",
            self.state,
            target
        );
        self.state = target;
    }

    /// Record a failed poll and return the resulting state.
    ///
    /// While healthy, the link tolerates up to the configured number of
    /// consecutive failures. During a reconnect probe a single failure is
    /// enough to fall back to `Disconnected`; the probe either works or it
    /// does not.
    pub fn on_poll_failure(&mut self, now: Instant) -> LinkState {
        if self.state == LinkState::Disconnected {
            return self.state;
        }

        self.consecutive_failures += 1;

        let threshold = if self.reconnect_attempts > 0 {
            1
        } else {
            self.config.max_consecutive_failures
        };

        if self.consecutive_failures >= threshold {
            self.state = LinkState::Disconnected;
            self.consecutive_failures = 0;
            if self.disconnected_at.is_none() {
                self.disconnected_at = Some(now);
            }
        }

        self.state
    }

    /// Begin a reconnect attempt: `Disconnected → Connecting`.
    ///
    /// No-op in any other state.
    pub fn begin_reconnect(&mut self) {
        if self.state == LinkState::Disconnected {
            self.reconnect_attempts += 1;
            self.state = LinkState::Connecting;
        }
    }

    /// Wait to observe before the next reconnect attempt.
    ///
    /// Doubles per attempt already made, capped by the configured bound.
    pub fn backoff(&self) -> Duration {
        let shift = self.reconnect_attempts.min(16);
        let wait = self
            .config
            .reconnect_backoff
            .saturating_mul(1u32 << shift);
        wait.min(self.config.backoff_cap)
    }

    /// Whether the link has been disconnected longer than the abandonment
    /// threshold.
    pub fn is_abandoned(&self, now: Instant) -> bool {
        match self.disconnected_at {
            Some(since) => now.duration_since(since) >= self.config.abandon_after,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> LinkConfig {
        LinkConfig {
            max_consecutive_failures: 3,
            reconnect_backoff: Duration::from_secs(5),
            backoff_cap: Duration::from_secs(60),
            abandon_after: Duration::from_secs(300),
        }
    }

    #[test]
    fn test_initial_state_is_connecting() {
        let link = ReaderLink::new(test_config());
        assert_eq!(link.state(), LinkState::Connecting);
    }

    #[test]
    fn test_success_moves_to_idle_and_card_present() {
        let mut link = ReaderLink::new(test_config());

        link.on_poll_success(false);
        assert_eq!(link.state(), LinkState::Idle);

        link.on_poll_success(true);
        assert_eq!(link.state(), LinkState::CardPresent);

        link.on_poll_success(false);
        assert_eq!(link.state(), LinkState::Idle);
    }

    #[test]
    fn test_failures_below_threshold_keep_link_up() {
        let mut link = ReaderLink::new(test_config());
        link.on_poll_success(false);

        let now = Instant::now();
        assert_eq!(link.on_poll_failure(now), LinkState::Idle);
        assert_eq!(link.on_poll_failure(now), LinkState::Idle);
    }

    #[test]
    fn test_failure_threshold_disconnects() {
        let mut link = ReaderLink::new(test_config());
        link.on_poll_success(false);

        let now = Instant::now();
        for _ in 0..2 {
            link.on_poll_failure(now);
        }
        assert_eq!(link.on_poll_failure(now), LinkState::Disconnected);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let mut link = ReaderLink::new(test_config());
        link.on_poll_success(false);

        let now = Instant::now();
        link.on_poll_failure(now);
        link.on_poll_failure(now);
        link.on_poll_success(false);

        // Counter starts over
        link.on_poll_failure(now);
        link.on_poll_failure(now);
        assert_eq!(link.state(), LinkState::Idle);
    }

    #[test]
    fn test_reconnect_probe_fails_fast() {
        let mut link = ReaderLink::new(test_config());
        let now = Instant::now();

        for _ in 0..3 {
            link.on_poll_failure(now);
        }
        assert_eq!(link.state(), LinkState::Disconnected);

        link.begin_reconnect();
        assert_eq!(link.state(), LinkState::Connecting);

        // During a probe a single failure drops the link again
        assert_eq!(link.on_poll_failure(now), LinkState::Disconnected);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut link = ReaderLink::new(test_config());
        let now = Instant::now();

        for _ in 0..3 {
            link.on_poll_failure(now);
        }
        assert_eq!(link.backoff(), Duration::from_secs(5));

        link.begin_reconnect();
        link.on_poll_failure(now);
        assert_eq!(link.backoff(), Duration::from_secs(10));

        link.begin_reconnect();
        link.on_poll_failure(now);
        assert_eq!(link.backoff(), Duration::from_secs(20));

        for _ in 0..10 {
            link.begin_reconnect();
            link.on_poll_failure(now);
        }
        assert_eq!(link.backoff(), Duration::from_secs(60));
    }

    #[test]
    fn test_abandonment_after_prolonged_disconnect() {
        let mut link = ReaderLink::new(test_config());
        let start = Instant::now();

        for _ in 0..3 {
            link.on_poll_failure(start);
        }
        assert!(!link.is_abandoned(start + Duration::from_secs(299)));
        assert!(link.is_abandoned(start + Duration::from_secs(300)));
    }

    #[test]
    fn test_recovery_clears_disconnect_clock() {
        let mut link = ReaderLink::new(test_config());
        let start = Instant::now();

        for _ in 0..3 {
            link.on_poll_failure(start);
        }
        link.begin_reconnect();
        link.on_poll_success(false);

        assert!(!link.is_abandoned(start + Duration::from_secs(600)));
        assert_eq!(link.state(), LinkState::Idle);
    }

    #[test]
    fn test_transition_table() {
        use LinkState::*;
        assert!(Disconnected.can_transition_to(&Connecting));
        assert!(Connecting.can_transition_to(&Idle));
        assert!(Connecting.can_transition_to(&CardPresent));
        assert!(Idle.can_transition_to(&CardPresent));
        assert!(CardPresent.can_transition_to(&Idle));
        assert!(!Disconnected.can_transition_to(&Idle));
        assert!(!Disconnected.can_transition_to(&CardPresent));
        assert!(!Idle.can_transition_to(&Idle));
    }
}
