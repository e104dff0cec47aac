//! Reader driver trait definitions.
//!
//! These traits are the narrow seam between the polling engine and the
//! actual reader stacks (a contactless frontend, a PC/SC-style smartcard
//! subsystem). Real driver implementations live behind feature flags; mock
//! implementations in [`crate::mock`] cover development and testing.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024
//! RPITIT), eliminating the need for the `async_trait` macro.
//!
//! # Contract
//!
//! "No card in the field" is the ordinary case and is reported in-band,
//! as `Ok(None)` from [`ContactlessDriver::detect`] or `Ok(false)` from
//! [`SmartcardDriver::connect`], never as an error. Errors mean the
//! transport itself misbehaved and feed the reader's link state machine.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::types::ApduResponse;
use std::time::Duration;

/// Contactless reader frontend abstraction.
///
/// Models a frontend that is opened once and polled repeatedly, returning
/// the raw identifier of whatever card is currently in the field.
///
/// # Object Safety and Dynamic Dispatch
///
/// **NOTE**: This trait is NOT object-safe because `async fn` methods return
/// `impl Future` (Edition 2024 RPITIT). For dynamic dispatch use the enum
/// wrapper [`AnyContactlessDriver`](crate::devices::AnyContactlessDriver).
pub trait ContactlessDriver: Send {
    /// Attempt to detect a card within the given timeout.
    ///
    /// Returns the raw identifier bytes of the card currently in the field,
    /// or `None` when the field is empty. Identical consecutive results for
    /// a card resting on the reader are expected; presentation gating is the
    /// caller's concern.
    ///
    /// # Errors
    ///
    /// Returns an error if the frontend is closed, disconnected, or the
    /// exchange with the reader fails.
    async fn detect(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>>;

    /// Release the frontend.
    ///
    /// After closing, every further operation fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying device rejects the release.
    async fn close(&mut self) -> Result<()>;
}

/// Contact smartcard reader abstraction.
///
/// Models the connect / transmit / disconnect cycle of a PC/SC-style
/// reader: each poll opens a connection to the card (if any), exchanges
/// identifier APDUs, and disconnects.
///
/// # Object Safety and Dynamic Dispatch
///
/// **NOTE**: This trait is NOT object-safe because `async fn` methods return
/// `impl Future` (Edition 2024 RPITIT). For dynamic dispatch use the enum
/// wrapper [`AnySmartcardDriver`](crate::devices::AnySmartcardDriver).
pub trait SmartcardDriver: Send {
    /// Attempt to connect to a card in the field.
    ///
    /// Returns `false` when no card is present, the ordinary idle case.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader itself is unreachable.
    async fn connect(&mut self) -> Result<bool>;

    /// Transmit one APDU to the connected card.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection is open or the exchange fails at
    /// the transport level. A card answering with an error status is NOT an
    /// error; it is reported through [`ApduResponse`] status words.
    async fn transmit(&mut self, apdu: &[u8]) -> Result<ApduResponse>;

    /// Close the connection opened by [`SmartcardDriver::connect`].
    ///
    /// Idempotent; disconnecting without a connection is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader rejects the release.
    async fn disconnect(&mut self) -> Result<()>;
}
