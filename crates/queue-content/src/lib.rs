//! queue-content: In-memory tree mirroring the SyncDaemon request queue.
//!
//! This crate provides:
//! - Path resolution from operation payloads (home stripping, share remapping)
//! - A path-keyed node arena with per-node operation history
//! - Incremental add/remove of queue operations and transfer tracking
//! - Compaction of finished subtrees
//! - A flat log of internal (pathless) operations
//!
//! Everything here is synchronous and performs no I/O. The tree is meant to be
//! owned by a single event-processing task.

pub mod clock;
pub mod error;
pub mod log;
pub mod node;
pub mod op;
pub mod path;
pub mod snapshot;
pub mod tree;

pub use error::{QueueError, Result};
pub use log::{Action, InternalOp};
pub use node::{Completion, Node, NodeId, NodeKind};
pub use op::{NodeOpKind, OpChange, OpData, OperationRecord};
pub use path::{PathResolver, ResolvedPath, ShareDirs};
pub use snapshot::{NodeSnapshot, RootSnapshot};
pub use tree::{QueueContent, ROOT_HOME};
