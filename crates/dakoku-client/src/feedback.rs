//! Feedback collaborator interface.
//!
//! Visual/audio feedback (LEDs, buzzer, LCD) is owned by external
//! hardware-specific code; the pipeline only reports what happened to
//! each scan and to server connectivity through this narrow seam.

use dakoku_core::CardId;
use std::fmt;
use tracing::{info, warn};

/// What happened, for feedback purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackEvent {
    /// A card was read and accepted for processing.
    CardRead,

    /// The scan reached the server.
    Delivered,

    /// The server already had the scan.
    Duplicate,

    /// Delivery failed; the scan is queued locally.
    SavedLocal,

    /// Delivery failed and local queueing also failed; the scan is lost.
    StoreFailed,

    /// The attendance server became reachable.
    ServerReconnected,

    /// The attendance server became unreachable.
    ServerLost,
}

impl fmt::Display for FeedbackEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FeedbackEvent::CardRead => "Reading...",
            FeedbackEvent::Delivered => "Sent",
            FeedbackEvent::Duplicate => "Already Recorded",
            FeedbackEvent::SavedLocal => "Saved Local",
            FeedbackEvent::StoreFailed => "Save Failed",
            FeedbackEvent::ServerReconnected => "Server OK",
            FeedbackEvent::ServerLost => "Server NG",
        };
        write!(f, "{}", s)
    }
}

/// Sink for feedback notifications.
///
/// Implementations must be fast and non-blocking; notifications happen on
/// the delivery path. Anything slow (buzzer patterns, LCD writes) belongs
/// on the implementation's own task.
pub trait FeedbackSink: Send + Sync {
    /// Report an outcome, with the card it concerns where applicable.
    fn notify(&self, card_id: Option<&CardId>, event: FeedbackEvent);
}

/// Log-only feedback sink.
///
/// The default sink on headless terminals: every outcome lands in the
/// process logs and nowhere else.
#[derive(Debug, Default)]
pub struct LogFeedback;

impl FeedbackSink for LogFeedback {
    fn notify(&self, card_id: Option<&CardId>, event: FeedbackEvent) {
        match (card_id, event) {
            (Some(card), FeedbackEvent::StoreFailed) => {
                warn!(card_id = %card, "{}", event)
            }
            (None, FeedbackEvent::ServerLost) => warn!("{}", event),
            (Some(card), _) => info!(card_id = %card, "{}", event),
            (None, _) => info!("{}", event),
        }
    }
}
