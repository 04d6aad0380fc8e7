//! Monitoring session: glue between the backend, the queue tree and the UI.
//!
//! The session owns the `QueueContent` and is driven from a single task. Each
//! queue change is validated at the backend boundary, applied to the tree and
//! turned into at most one `SessionEvent`. After every change the transfers
//! poller is started or stopped to follow `QueueContent::transferring`.

use crate::backend::{
    QueueEvent, RawTransfer, SyncDaemonBackend, Transfer, TransferDirection, TypedOp, WireOp,
};
use crate::events::{EventBus, SessionEvent};
use crate::poller::TransfersPoller;
use anyhow::Context;
use queue_content::{Action, OpChange, OpData, QueueContent};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct QueueSession {
    content: QueueContent,
    backend: Arc<dyn SyncDaemonBackend>,
    bus: Arc<EventBus>,
    poller: TransfersPoller,
}

impl QueueSession {
    pub fn new(home: impl Into<String>, backend: Arc<dyn SyncDaemonBackend>, poll_interval: Duration) -> Self {
        let bus = Arc::new(EventBus::new());
        let poller = TransfersPoller::new(Arc::clone(&backend), Arc::clone(&bus), poll_interval);
        Self {
            content: QueueContent::new(home),
            backend,
            bus,
            poller,
        }
    }

    /// Bus carrying this session's notifications.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn content(&self) -> &QueueContent {
        &self.content
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    /// Load shares configuration and the current queue from the backend.
    pub async fn load_initial(&mut self) -> anyhow::Result<()> {
        info!("Getting initial queue content");

        let real = self
            .backend
            .get_real_shares_dir()
            .await
            .context("Failed to get real shares dir")?;
        let link = self
            .backend
            .get_link_shares_dir()
            .await
            .context("Failed to get link shares dir")?;
        info!("Shares dirs: link {:?}, real {:?}", link, real);
        self.content.set_shares_dirs(&link, &real)?;

        let queued = self
            .backend
            .get_queue_content()
            .await
            .context("Failed to get queue content")?;
        info!("Queue content has {} operation(s)", queued.len());
        self.content
            .set_content(queued.into_iter().filter_map(normalize));

        self.bus
            .emit(SessionEvent::NodeOpsChanged(self.content.node_ops()));
        self.bus.emit(SessionEvent::InternalOpsChanged(
            self.content.internal_ops().to_vec(),
        ));
        self.poller.run(self.content.transferring());
        Ok(())
    }

    /// An operation was added to the request queue.
    pub fn on_queue_added(&mut self, op: WireOp) {
        info!("Queue content: added {:?} [{}] {:?}", op.op_name, op.op_id, op.op_data);
        self.apply(op, |content, name, id, data| content.add(name, id, data));
    }

    /// An operation was removed from the request queue.
    pub fn on_queue_removed(&mut self, op: WireOp) {
        info!("Queue content: removed {:?} [{}] {:?}", op.op_name, op.op_id, op.op_data);
        self.apply(op, |content, name, id, data| content.remove(name, id, data));
    }

    pub fn handle(&mut self, event: QueueEvent) {
        match event.action {
            Action::Added => self.on_queue_added(event.op),
            Action::Removed => self.on_queue_removed(event.op),
        }
    }

    /// The backend pushed progress for a single upload.
    pub fn on_upload_progress(&self, raw: RawTransfer) {
        self.publish_progress(&raw, TransferDirection::Upload);
    }

    /// The backend pushed progress for a single download.
    pub fn on_download_progress(&self, raw: RawTransfer) {
        self.publish_progress(&raw, TransferDirection::Download);
    }

    /// Compact finished operations and publish the new tree.
    pub fn clear(&mut self) {
        self.content.clear();
        self.bus
            .emit(SessionEvent::NodeOpsChanged(self.content.node_ops()));
    }

    pub fn shutdown(&mut self) {
        self.poller.run(false);
    }

    fn publish_progress(&self, raw: &RawTransfer, direction: TransferDirection) {
        match Transfer::from_raw(raw, direction) {
            Ok(Some(transfer)) => self.bus.emit(SessionEvent::Transfers(vec![transfer])),
            Ok(None) => debug!("{:?} progress without a size yet: {:?}", direction, raw),
            Err(e) => warn!("Ignoring {:?} progress: {}", direction, e),
        }
    }

    fn apply<F>(&mut self, op: WireOp, change: F)
    where
        F: FnOnce(&mut QueueContent, &str, &str, &OpData) -> Option<OpChange>,
    {
        if let Some((name, id, data)) = normalize(op) {
            match change(&mut self.content, &name, &id, &data) {
                Some(OpChange::Node) => self
                    .bus
                    .emit(SessionEvent::NodeOpsChanged(self.content.node_ops())),
                Some(OpChange::Internal) => self.bus.emit(SessionEvent::InternalOpsChanged(
                    self.content.internal_ops().to_vec(),
                )),
                None => {}
            }
        }
        self.poller.run(self.content.transferring());
    }
}

fn normalize(op: WireOp) -> Option<(String, String, OpData)> {
    match TypedOp::try_from(op) {
        Ok(typed) => Some(typed.into_parts()),
        Err(e) => {
            warn!("Ignoring queue operation: {}", e);
            None
        }
    }
}
