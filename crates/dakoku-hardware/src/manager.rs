//! Reader polling engine.
//!
//! The [`ReaderManager`] owns every registered reader and, on
//! [`ReaderManager::start`], spawns one polling task per reader. Tasks are
//! fully independent: each drives its own driver, its own link state
//! machine, and its own presentation gate, and never holds a shared lock
//! across a poll call. New card presentations funnel through one bounded
//! mpsc channel into the [`ReaderPool`] handle.
//!
//! ```text
//! ┌────────────────┐       ┌─────────────────┐
//! │ Reader 01 task │──────►│                 │
//! └────────────────┘       │  Event channel  │
//! ┌────────────────┐       │  (mpsc)         │──────► dedup → delivery
//! │ Reader 02 task │──────►│                 │
//! └────────────────┘       └─────────────────┘
//! ```
//!
//! A task emits an event only for a *new* presentation: a different card
//! than last observed, or the same card returning after at least one empty
//! poll. A card resting in the field is observed every poll and emits
//! nothing further.

use crate::devices::{AnyContactlessDriver, AnySmartcardDriver};
use crate::link::{LinkConfig, LinkState, ReaderLink};
use crate::profile::CommandProfile;
use crate::traits::{ContactlessDriver, SmartcardDriver};
use crate::types::{ReaderId, ReaderTransport, ScanEvent};
use crate::{HardwareError, Result};
use chrono::Utc;
use dakoku_core::CardId;
use dakoku_core::constants::{CARD_DETECT_TIMEOUT_MS, POLL_INTERVAL_MS};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Event emitted by a reader polling task.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ReaderEvent {
    /// A new card presentation.
    CardDetected(ScanEvent),

    /// A reader stayed disconnected past the abandonment threshold and its
    /// worker exited. Emitted once per reader; the process keeps running.
    ReaderAbandoned {
        /// Reader that was given up on.
        reader_id: ReaderId,
        /// Last transport error observed.
        reason: String,
    },
}

/// Polling cadence and link thresholds, shared by all readers.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Per-poll card detection timeout.
    pub detect_timeout: Duration,

    /// Sleep between polls on one reader.
    pub poll_interval: Duration,

    /// Link state machine thresholds.
    pub link: LinkConfig,

    /// Event channel capacity.
    pub channel_capacity: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            detect_timeout: Duration::from_millis(CARD_DETECT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
            link: LinkConfig::default(),
            channel_capacity: 100,
        }
    }
}

/// Driver plus per-transport polling data.
#[derive(Debug)]
enum ReaderDevice {
    Contactless(AnyContactlessDriver),
    Smartcard {
        driver: AnySmartcardDriver,
        profile: CommandProfile,
    },
}

#[derive(Debug)]
struct RegisteredReader {
    id: ReaderId,
    name: String,
    device: ReaderDevice,
}

/// Owns registered readers and spawns their polling tasks.
///
/// # Lifecycle
///
/// 1. Create with a [`PollConfig`]
/// 2. Register readers (`register_contactless` / `register_smartcard`)
/// 3. `start()` spawns one task per reader and returns a [`ReaderPool`]
/// 4. Receive [`ReaderEvent`]s from the pool
/// 5. `shutdown(timeout)` for a bounded stop
///
/// # Examples
///
/// ```no_run
/// use dakoku_hardware::manager::{PollConfig, ReaderEvent, ReaderManager};
/// use dakoku_hardware::devices::AnyContactlessDriver;
/// use dakoku_hardware::mock::MockContactless;
/// use dakoku_hardware::types::ReaderId;
/// use std::time::Duration;
///
/// # async fn example() -> dakoku_core::Result<()> {
/// let mut manager = ReaderManager::new(PollConfig::default());
///
/// let (reader, _handle) = MockContactless::new();
/// manager.register_contactless(
///     ReaderId::new(1)?,
///     "Mock Contactless Reader",
///     AnyContactlessDriver::Mock(reader),
/// );
///
/// let mut pool = manager.start();
/// while let Some(event) = pool.recv().await {
///     if let ReaderEvent::CardDetected(scan) = event {
///         println!("card {} on reader {}", scan.card_id, scan.reader_id);
///     }
/// }
/// pool.shutdown(Duration::from_secs(5)).await;
/// # Ok(())
/// # }
/// ```
pub struct ReaderManager {
    readers: Vec<RegisteredReader>,
    config: PollConfig,
}

impl ReaderManager {
    /// Create a manager with the given polling configuration.
    pub fn new(config: PollConfig) -> Self {
        Self {
            readers: Vec::new(),
            config,
        }
    }

    /// Register a contactless reader.
    pub fn register_contactless(
        &mut self,
        id: ReaderId,
        name: impl Into<String>,
        driver: AnyContactlessDriver,
    ) {
        let name = name.into();
        info!(reader_id = %id, reader = %name, transport = %ReaderTransport::Contactless, "registered reader");
        self.readers.push(RegisteredReader {
            id,
            name,
            device: ReaderDevice::Contactless(driver),
        });
    }

    /// Register a contact smartcard reader.
    ///
    /// The APDU command profile is resolved here, once, from the reader
    /// name.
    pub fn register_smartcard(
        &mut self,
        id: ReaderId,
        name: impl Into<String>,
        driver: AnySmartcardDriver,
    ) {
        let name = name.into();
        let profile = CommandProfile::for_reader_name(&name);
        info!(
            reader_id = %id,
            reader = %name,
            transport = %ReaderTransport::Smartcard,
            ?profile,
            "registered reader"
        );
        self.readers.push(RegisteredReader {
            id,
            name,
            device: ReaderDevice::Smartcard { driver, profile },
        });
    }

    /// Number of registered readers.
    pub fn reader_count(&self) -> usize {
        self.readers.len()
    }

    /// Whether no reader has been registered.
    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    /// Spawn one polling task per registered reader.
    pub fn start(self) -> ReaderPool {
        let (event_tx, event_rx) = mpsc::channel(self.config.channel_capacity);
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();

        for reader in self.readers {
            tasks.spawn(reader_task(
                reader,
                self.config.clone(),
                event_tx.clone(),
                cancel.child_token(),
            ));
        }

        ReaderPool {
            event_rx,
            tasks,
            cancel,
        }
    }
}

/// Handle over the running polling tasks.
pub struct ReaderPool {
    event_rx: mpsc::Receiver<ReaderEvent>,
    tasks: JoinSet<()>,
    cancel: CancellationToken,
}

impl ReaderPool {
    /// Receive the next event from any reader.
    ///
    /// Returns `None` once every reader task has exited and the channel
    /// drained.
    pub async fn recv(&mut self) -> Option<ReaderEvent> {
        self.event_rx.recv().await
    }

    /// Signal all reader tasks to stop without waiting for them.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stop all reader tasks, waiting at most `timeout` before aborting
    /// whatever is left. A hung reader cannot block process exit.
    pub async fn shutdown(mut self, timeout: Duration) {
        self.cancel.cancel();

        let drained = tokio::time::timeout(timeout, async {
            while self.tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!("reader tasks did not stop in time, aborting");
            self.tasks.abort_all();
            while self.tasks.join_next().await.is_some() {}
        }
    }
}

async fn reader_task(
    mut reader: RegisteredReader,
    config: PollConfig,
    tx: mpsc::Sender<ReaderEvent>,
    cancel: CancellationToken,
) {
    let mut link = ReaderLink::new(config.link.clone());
    let mut last_observed: Option<CardId> = None;
    let mut last_error = String::new();

    debug!(reader_id = %reader.id, reader = %reader.name, "reader worker started");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        if link.state() == LinkState::Disconnected {
            if link.is_abandoned(Instant::now()) {
                warn!(
                    reader_id = %reader.id,
                    reader = %reader.name,
                    "abandoning reader after prolonged disconnect"
                );
                let _ = tx
                    .send(ReaderEvent::ReaderAbandoned {
                        reader_id: reader.id,
                        reason: last_error.clone(),
                    })
                    .await;
                return;
            }

            let wait = link.backoff();
            debug!(reader_id = %reader.id, ?wait, "reconnect backoff");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
            link.begin_reconnect();
            continue;
        }

        match poll_reader(&mut reader.device, config.detect_timeout).await {
            Ok(Some(card_id)) => {
                link.on_poll_success(true);
                if last_observed.as_ref() != Some(&card_id) {
                    last_observed = Some(card_id.clone());
                    let scan = ScanEvent {
                        card_id,
                        reader_id: reader.id,
                        detected_at: Utc::now(),
                    };
                    debug!(reader_id = %reader.id, card_id = %scan.card_id, "card detected");
                    if tx.send(ReaderEvent::CardDetected(scan)).await.is_err() {
                        break;
                    }
                }
            }
            Ok(None) => {
                link.on_poll_success(false);
                // Field went empty: the same card presented again later is
                // a new presentation.
                last_observed = None;
            }
            Err(e) => {
                last_observed = None;
                last_error = e.to_string();
                let state = link.on_poll_failure(Instant::now());
                if state == LinkState::Disconnected {
                    warn!(reader_id = %reader.id, reader = %reader.name, error = %e, "reader link lost");
                } else {
                    trace!(reader_id = %reader.id, error = %e, "poll failed");
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(config.poll_interval) => {}
        }
    }

    debug!(reader_id = %reader.id, "reader worker stopped");
}

/// One bounded poll attempt against a reader.
///
/// Invalid identifiers (too short, placeholder patterns) read as an empty
/// field. The outer timeout guards against a driver ignoring its own
/// deadline.
async fn poll_reader(device: &mut ReaderDevice, detect_timeout: Duration) -> Result<Option<CardId>> {
    let budget = detect_timeout + Duration::from_millis(200);

    let poll = async {
        match device {
            ReaderDevice::Contactless(driver) => poll_contactless(driver, detect_timeout).await,
            ReaderDevice::Smartcard { driver, profile } => poll_smartcard(driver, *profile).await,
        }
    };

    match tokio::time::timeout(budget, poll).await {
        Ok(result) => result,
        Err(_) => Err(HardwareError::timeout(budget.as_millis() as u64)),
    }
}

async fn poll_contactless(
    driver: &mut AnyContactlessDriver,
    timeout: Duration,
) -> Result<Option<CardId>> {
    match driver.detect(timeout).await? {
        Some(raw) => Ok(CardId::from_bytes(&raw).ok()),
        None => Ok(None),
    }
}

async fn poll_smartcard(
    driver: &mut AnySmartcardDriver,
    profile: CommandProfile,
) -> Result<Option<CardId>> {
    if !driver.connect().await? {
        return Ok(None);
    }

    let mut found = None;
    for apdu in profile.apdus() {
        match driver.transmit(apdu).await {
            Ok(resp) => {
                if let Some(bytes) = resp.identifier_bytes()
                    && let Ok(card_id) = CardId::from_bytes(bytes)
                {
                    found = Some(card_id);
                    break;
                }
            }
            Err(e) => {
                trace!(error = %e, "identifier command failed, trying next");
            }
        }
    }

    if let Err(e) = driver.disconnect().await {
        trace!(error = %e, "disconnect after poll failed");
    }

    Ok(found)
}
