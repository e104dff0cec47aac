//! Local storage layer for the attendance-clocking client.
//!
//! This crate provides the SQLite-backed pending queue: the durable holding
//! area for scans whose immediate delivery to the server failed. Records
//! wait here until the retry-sync worker resends them.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool manager with automatic migrations
//! - [`PendingRecordRepository`] - Data access trait for the queue
//! - [`SqlitePendingRecordRepository`] - SQLite implementation
//!
//! # Concurrency
//!
//! Every repository operation is a short, self-contained statement on a
//! pooled connection. Nothing holds a lock across operations, so the
//! synchronous failure path (a scan being queued) and the retry-sync
//! worker (records being resent) interleave safely. The database runs in
//! WAL mode for concurrent read/write behavior.
//!
//! # Guarantees
//!
//! - `created_at` is fixed at insert and never changes
//! - `retry_count` is monotonically non-decreasing, reset only by success
//!   (via the terminal sent flag, not an actual reset)
//! - A record marked sent is permanently excluded from pending queries
//! - `list_pending(min_age, ..)` never returns a record younger than
//!   `min_age`
//!
//! # Examples
//!
//! ```no_run
//! use dakoku_storage::{Database, DatabaseConfig};
//! use dakoku_storage::repositories::{PendingRecordRepository, SqlitePendingRecordRepository};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("local_cache.db")).await?;
//! let repo = SqlitePendingRecordRepository::new(db.pool().clone());
//!
//! let id = repo
//!     .insert("04A1B2C3", chrono::Utc::now(), "AA:BB:CC:DD:EE:FF")
//!     .await?;
//!
//! for record in repo.list_pending(Duration::from_secs(600), 50).await? {
//!     println!("pending: {} (retries: {})", record.idm, record.retry_count);
//! }
//!
//! repo.mark_sent(id).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod models;
pub mod repositories;

pub use connection::{Database, DatabaseConfig};
pub use error::{StorageError, StorageResult};
pub use models::PendingRecord;
pub use repositories::{PendingRecordRepository, SqlitePendingRecordRepository};
