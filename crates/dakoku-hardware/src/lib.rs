//! Reader hardware abstraction for the attendance-clocking client.
//!
//! This crate owns everything between physical card readers and the
//! delivery side of the client:
//!
//! - Narrow driver traits for the two supported transports: a contactless
//!   frontend polled with [`ContactlessDriver::detect`], and a contact
//!   smartcard reader driven through [`SmartcardDriver`]'s
//!   connect / transmit / disconnect cycle.
//! - APDU [`profile`]s: per reader-family command lists resolved once at
//!   registration, never re-evaluated per poll.
//! - [`devices`]: enum-dispatch wrappers over the driver traits, including
//!   an `Unavailable` variant for transports not compiled into the build.
//! - [`link`]: the per-reader connection state machine
//!   (`Disconnected → Connecting → Idle ⇄ CardPresent`) with failure
//!   thresholds, doubling reconnect backoff, and abandonment.
//! - [`manager`]: the polling engine; one independent task per reader,
//!   new-presentation gating, and a single event channel out.
//!
//! # Design Philosophy
//!
//! - **Async-first**: all I/O is `async fn`, native in traits (Rust 1.90 +
//!   Edition 2024 RPITIT), no `async_trait` macro.
//! - **No card is not an error**: empty-field polls are in-band values so
//!   the hot path stays allocation- and log-quiet.
//! - **Failure isolation**: one reader's transport trouble stays on that
//!   reader's link; siblings never notice.
//!
//! [`ContactlessDriver::detect`]: traits::ContactlessDriver::detect
//! [`SmartcardDriver`]: traits::SmartcardDriver

pub mod devices;
pub mod error;
pub mod link;
pub mod manager;
pub mod mock;
pub mod profile;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{HardwareError, Result};
pub use manager::{PollConfig, ReaderEvent, ReaderManager, ReaderPool};
pub use profile::CommandProfile;
pub use traits::{ContactlessDriver, SmartcardDriver};
pub use types::{ApduResponse, ReaderId, ReaderTransport, ScanEvent};
