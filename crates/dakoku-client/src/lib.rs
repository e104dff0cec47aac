//! Attendance-clocking client engine.
//!
//! Wires the hardware polling layer, the dedup filter, the delivery
//! pipeline, the local queue, and the retry-sync worker into one process:
//!
//! ```text
//! readers ──► DedupFilter ──► DeliveryPipeline ──► server
//!                                   │                 ▲
//!                              (on failure)           │
//!                                   ▼                 │
//!                             pending queue ──► RetrySyncWorker
//! ```
//!
//! Delivery is at-least-once: a scan that fails to reach the server is
//! queued durably and resent until the server records it, or answers
//! that it already has it; duplicates count as delivered.

pub mod app;
pub mod config;
pub mod dedup;
pub mod feedback;
pub mod monitor;
pub mod pipeline;
pub mod retry;

pub use config::{ClientConfig, ReaderEntry, TransportKind};
pub use dedup::{AcceptDecision, DedupFilter};
pub use feedback::{FeedbackEvent, FeedbackSink, LogFeedback};
pub use monitor::{HealthMonitor, HealthMonitorConfig};
pub use pipeline::{DeliveryPipeline, ScanDisposition};
pub use retry::{PassSummary, RetryPolicy, RetrySyncWorker};
