//! Client wiring and main loop.
//!
//! Startup order matters: terminal identity first (everything stamps it),
//! then the local queue (the only fatal failure), then the network client
//! and the background workers, then the readers. The main loop consumes
//! reader events, runs each through the dedup filter, and spawns a
//! delivery task per accepted scan so one slow request never delays the
//! next card.
//!
//! Shutdown is cooperative: ctrl-c cancels a shared token, reader tasks
//! are joined with a bounded timeout (a hung reader is aborted, not
//! waited on), and the background workers exit on their next tick.

use crate::config::{ClientConfig, ReaderEntry, TransportKind};
use crate::dedup::{AcceptDecision, DedupFilter};
use crate::feedback::{FeedbackSink, LogFeedback};
use crate::monitor::HealthMonitor;
use crate::pipeline::DeliveryPipeline;
use crate::retry::{RetryPolicy, RetrySyncWorker};
use anyhow::Context;
use chrono::Utc;
use dakoku_core::TerminalId;
use dakoku_core::constants::{DEDUP_PRUNE_AGE_SECS, MAINTENANCE_INTERVAL_SECS};
use dakoku_hardware::devices::{AnyContactlessDriver, AnySmartcardDriver, UnavailableDriver};
use dakoku_hardware::{PollConfig, ReaderEvent, ReaderId, ReaderManager, ScanEvent};
use dakoku_network::{AttendanceClient, AttendanceClientConfig};
use dakoku_storage::{Database, DatabaseConfig, PendingRecordRepository, SqlitePendingRecordRepository};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Run the attendance client until shutdown.
///
/// # Errors
///
/// Fails only on startup problems that make the client useless: the local
/// queue database cannot be opened, or the HTTP client cannot be built.
pub async fn run(config: ClientConfig) -> anyhow::Result<()> {
    let terminal_id = match TerminalId::from_hardware() {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "no hardware address, using generated terminal identity");
            TerminalId::generated()
        }
    };
    info!(
        terminal_id = %terminal_id,
        server_url = %config.server_url,
        version = dakoku_core::VERSION,
        "starting attendance client"
    );

    let db = Database::new(DatabaseConfig::new(&config.database_path))
        .await
        .context("opening local queue database")?;
    let repo = SqlitePendingRecordRepository::new(db.pool().clone());

    match repo.count_pending().await {
        Ok(0) => {}
        Ok(backlog) => info!(backlog, "unsent records waiting in local queue"),
        Err(e) => warn!(error = %e, "could not count pending records"),
    }

    let client = AttendanceClient::new(AttendanceClientConfig::new(&config.server_url))
        .context("building attendance client")?;
    let feedback: Arc<dyn FeedbackSink> = Arc::new(LogFeedback);
    let dedup = Arc::new(DedupFilter::new(
        config.debounce_window(),
        config.same_minute_check,
    ));
    let pipeline = Arc::new(DeliveryPipeline::new(
        client.clone(),
        repo.clone(),
        terminal_id,
        feedback.clone(),
    ));

    let cancel = CancellationToken::new();

    let retry_worker = RetrySyncWorker::new(
        pipeline.clone(),
        repo.clone(),
        RetryPolicy::new(config.retry_interval_secs),
        config.pending_min_age(),
        config.pending_batch_limit,
    );
    let retry_task = tokio::spawn(retry_worker.run(cancel.child_token()));

    let monitor = HealthMonitor::new(client.clone(), feedback.clone());
    let monitor_task = tokio::spawn(monitor.run(cancel.child_token()));

    let maintenance_task = tokio::spawn(dedup_maintenance(dedup.clone(), cancel.child_token()));

    let mut manager = ReaderManager::new(PollConfig::default());
    register_readers(&mut manager, &config.readers);

    if manager.is_empty() {
        error!("no card readers configured; add readers to the config file and restart");
        cancel.cancel();
        let _ = retry_task.await;
        let _ = monitor_task.await;
        let _ = maintenance_task.await;
        db.close().await;
        return Ok(());
    }

    let mut pool = manager.start();
    info!(readers = config.readers.len(), "waiting for cards");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "ctrl-c handler failed, shutting down");
                }
                info!("shutdown requested");
                break;
            }
            event = pool.recv() => {
                match event {
                    Some(ReaderEvent::CardDetected(scan)) => {
                        handle_scan(scan, &dedup, &pipeline);
                    }
                    Some(ReaderEvent::ReaderAbandoned { reader_id, reason }) => {
                        warn!(%reader_id, %reason, "reader abandoned, continuing without it");
                    }
                    Some(_) => {}
                    None => {
                        warn!("all reader workers exited");
                        break;
                    }
                }
            }
        }
    }

    cancel.cancel();
    pool.shutdown(Duration::from_secs(5)).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = retry_task.await;
        let _ = monitor_task.await;
        let _ = maintenance_task.await;
    })
    .await;
    db.close().await;
    info!("stopped");
    Ok(())
}

/// Dedup check and per-scan delivery task.
///
/// The dedup decision is synchronous and brief; the network call happens
/// on its own task, after the lock has been released.
fn handle_scan(scan: ScanEvent, dedup: &Arc<DedupFilter>, pipeline: &Arc<DeliveryPipeline>) {
    match dedup.try_accept(&scan.card_id, Utc::now()) {
        AcceptDecision::Accepted => {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                pipeline.process_scan(&scan).await;
            });
        }
        AcceptDecision::RejectedWithinWindow => {
            debug!(card_id = %scan.card_id, reader_id = %scan.reader_id, "suppressed: debounce window");
        }
        AcceptDecision::RejectedSameMinute => {
            info!(card_id = %scan.card_id, "suppressed: already recorded this minute");
        }
    }
}

/// Register configured readers, resolving each transport's driver once.
///
/// Builds without the corresponding `dakoku-hardware` feature get an
/// `Unavailable` driver: the reader shows up in the logs as failing and is
/// eventually abandoned, instead of being silently skipped.
fn register_readers(manager: &mut ReaderManager, readers: &[ReaderEntry]) {
    for (index, entry) in readers.iter().enumerate() {
        let id = match u8::try_from(index + 1).map_err(|e| e.to_string()).and_then(|n| {
            ReaderId::new(n).map_err(|e| e.to_string())
        }) {
            Ok(id) => id,
            Err(e) => {
                warn!(reader = %entry.name, error = %e, "skipping reader");
                continue;
            }
        };

        match entry.transport {
            TransportKind::Contactless => {
                manager.register_contactless(id, &entry.name, contactless_driver(entry));
            }
            TransportKind::Smartcard => {
                manager.register_smartcard(id, &entry.name, smartcard_driver(entry));
            }
        }
    }
}

fn contactless_driver(entry: &ReaderEntry) -> AnyContactlessDriver {
    // Real frontends arrive with the hardware-nfc feature
    AnyContactlessDriver::Unavailable(UnavailableDriver::new(format!(
        "contactless frontend for {} (built without hardware-nfc)",
        entry.name
    )))
}

fn smartcard_driver(entry: &ReaderEntry) -> AnySmartcardDriver {
    // Real subsystem access arrives with the hardware-pcsc feature
    AnySmartcardDriver::Unavailable(UnavailableDriver::new(format!(
        "smartcard subsystem for {} (built without hardware-pcsc)",
        entry.name
    )))
}

/// Periodic dedup-history pruning.
async fn dedup_maintenance(dedup: Arc<DedupFilter>, cancel: CancellationToken) {
    let interval = Duration::from_secs(MAINTENANCE_INTERVAL_SECS);
    let max_age = Duration::from_secs(DEDUP_PRUNE_AGE_SECS);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let removed = dedup.prune_older_than(Utc::now(), max_age);
        if removed > 0 {
            debug!(removed, remaining = dedup.tracked_cards(), "pruned dedup history");
        }
    }
}
