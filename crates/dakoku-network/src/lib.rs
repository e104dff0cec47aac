//! Network delivery layer for the attendance-clocking client.
//!
//! Provides the HTTP client used by both the live delivery pipeline and
//! the retry-sync worker: attendance submission plus a liveness probe.
//!
//! # Example
//!
//! ```no_run
//! use dakoku_network::{AttendanceClient, AttendanceClientConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AttendanceClient::new(AttendanceClientConfig::new("http://192.168.1.31:5000"))?;
//! if client.check_health().await {
//!     println!("server reachable");
//! }
//! # Ok(())
//! # }
//! ```

mod client;

pub use client::{
    ApiResponse, AttendanceClient, AttendanceClientConfig, AttendanceRequest, DeliveryFailure,
    DeliveryOutcome, NetworkError,
};
