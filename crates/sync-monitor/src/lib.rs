//! sync-monitor library: SyncDaemon queue monitoring session.
//!
//! Wraps the `queue-content` tree with the pieces a frontend needs: the
//! backend boundary, change notifications, transfer progress polling and text
//! summaries. The `sync-monitor` binary replays recorded queue events through
//! a session.

pub mod backend;
pub mod config;
pub mod events;
pub mod poller;
pub mod replay;
pub mod session;
pub mod summary;

// Re-export key types for convenience
pub use backend::{
    QueueEvent, QueueOp, RawTransfer, SyncDaemonBackend, Transfer, TransferDirection, TypedOp,
    WireOp,
};
pub use config::{Config, ConfigError};
pub use events::{EventBus, SessionEvent, Subscription};
pub use poller::{TransfersPoller, TRANSFER_POLL_INTERVAL};
pub use replay::ReplayBackend;
pub use session::QueueSession;
