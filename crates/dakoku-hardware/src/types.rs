//! Common types shared by reader drivers and the polling engine.

use chrono::{DateTime, Utc};
use dakoku_core::{CardId, Error, Result as CoreResult};
use std::fmt;

/// APDU success status word (SW1).
pub const SW1_SUCCESS: u8 = 0x90;

/// APDU success status word (SW2).
pub const SW2_SUCCESS: u8 = 0x00;

/// Reader identifier (2 digits, zero-padded).
///
/// Assigned at discovery time, starting from 1. Exactly one polling worker
/// owns each identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReaderId(u8);

impl ReaderId {
    /// Create a new reader ID with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidReaderId` if the ID is outside 1-99.
    pub fn new(id: u8) -> CoreResult<Self> {
        if !(1..=99).contains(&id) {
            return Err(Error::InvalidReaderId(format!(
                "reader ID must be 1-99, got {id}"
            )));
        }
        Ok(ReaderId(id))
    }

    /// Get the raw reader ID.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for ReaderId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

/// Transport kind of a physical reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderTransport {
    /// Contactless frontend (FeliCa/NFC, e.g. Sony RC-S380).
    Contactless,
    /// Contact smartcard reader driven over APDU exchanges.
    Smartcard,
}

impl fmt::Display for ReaderTransport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReaderTransport::Contactless => write!(f, "contactless"),
            ReaderTransport::Smartcard => write!(f, "smartcard"),
        }
    }
}

/// Response to a single APDU exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    /// Response payload, without the trailing status words.
    pub data: Vec<u8>,

    /// First status word.
    pub sw1: u8,

    /// Second status word.
    pub sw2: u8,
}

impl ApduResponse {
    /// Create a new response.
    #[must_use]
    pub fn new(data: Vec<u8>, sw1: u8, sw2: u8) -> Self {
        Self { data, sw1, sw2 }
    }

    /// Whether the card answered with the success status (90 00).
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.sw1 == SW1_SUCCESS && self.sw2 == SW2_SUCCESS
    }

    /// Identifier bytes carried by a successful response.
    ///
    /// Returns `None` for error statuses and for payloads too short to be
    /// a card identifier.
    #[must_use]
    pub fn identifier_bytes(&self) -> Option<&[u8]> {
        if self.is_success() && self.data.len() >= 4 {
            Some(&self.data)
        } else {
            None
        }
    }
}

/// A new card presentation observed by one reader.
///
/// Ephemeral: produced by a polling worker, consumed by the dedup filter
/// and the delivery pipeline, then discarded.
#[derive(Debug, Clone)]
pub struct ScanEvent {
    /// Normalized card identifier.
    pub card_id: CardId,

    /// Reader that observed the presentation.
    pub reader_id: ReaderId,

    /// Detection timestamp.
    pub detected_at: DateTime<Utc>,
}
