//! Periodic transfer progress polling.
//!
//! The backend does not push byte counts, so while an upload or download is
//! queued a background task asks for them every `interval` and publishes a
//! `SessionEvent::Transfers`. The task never touches the queue tree.

use crate::backend::{process_transfers, SyncDaemonBackend, Transfer, TransferDirection};
use crate::events::{EventBus, SessionEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default time between two progress fetches.
pub const TRANSFER_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Fetch uploads then downloads and keep the sized ones.
pub async fn fetch_transfers(backend: &dyn SyncDaemonBackend) -> anyhow::Result<Vec<Transfer>> {
    let uploads = backend.get_current_uploads().await?;
    let downloads = backend.get_current_downloads().await?;

    let mut transfers = process_transfers(&uploads, TransferDirection::Upload);
    transfers.extend(process_transfers(&downloads, TransferDirection::Download));
    Ok(transfers)
}

/// Starts and stops the background progress task.
pub struct TransfersPoller {
    backend: Arc<dyn SyncDaemonBackend>,
    bus: Arc<EventBus>,
    interval: Duration,
    /// Runtime the poll task is spawned on; picked up lazily when the poller
    /// is built outside of one.
    runtime: Option<Handle>,
    task: Option<JoinHandle<()>>,
}

impl TransfersPoller {
    pub fn new(backend: Arc<dyn SyncDaemonBackend>, bus: Arc<EventBus>, interval: Duration) -> Self {
        Self {
            backend,
            bus,
            interval,
            runtime: Handle::try_current().ok(),
            task: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a polling task is scheduled.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Start polling (if not already) or stop it.
    ///
    /// The first fetch happens one interval after start. Without a tokio
    /// runtime, starting is skipped with a warning.
    pub fn run(&mut self, should_run: bool) {
        if should_run {
            if self.is_running() {
                return;
            }
            if self.runtime.is_none() {
                self.runtime = Handle::try_current().ok();
            }
            let Some(runtime) = &self.runtime else {
                warn!("No tokio runtime available, transfers poller not started");
                return;
            };
            debug!("Starting transfers poller every {:?}", self.interval);
            let task = poll_loop(Arc::clone(&self.backend), Arc::clone(&self.bus), self.interval);
            self.task = Some(runtime.spawn(task));
        } else if let Some(task) = self.task.take() {
            debug!("Stopping transfers poller");
            task.abort();
        }
    }
}

impl Drop for TransfersPoller {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn poll_loop(backend: Arc<dyn SyncDaemonBackend>, bus: Arc<EventBus>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        match fetch_transfers(backend.as_ref()).await {
            Ok(transfers) => bus.emit(SessionEvent::Transfers(transfers)),
            Err(e) => warn!("Failed to fetch current transfers: {:#}", e),
        }
    }
}
