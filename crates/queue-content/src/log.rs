//! Flat log of internal operations.
//!
//! Operations without a path (share listings, metadata queries, ...) are not
//! part of the tree. Each add/remove of one is appended here as-is; the log is
//! never compacted.

use crate::op::OpData;
use serde::{Deserialize, Serialize};

/// What happened to a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Added,
    Removed,
}

/// One entry of the internal operations log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InternalOp {
    /// When the event was received, in milliseconds since Unix epoch.
    pub timestamp: f64,
    pub op_name: String,
    pub op_id: String,
    pub op_data: OpData,
    pub action: Action,
}
