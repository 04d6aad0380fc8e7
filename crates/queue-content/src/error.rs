//! Error taxonomy for the queue content tree.
//!
//! Only `InvalidConfiguration` is ever returned to callers. The other
//! variants describe per-event anomalies that `QueueContent` logs and
//! swallows so that one bad event cannot stall the UI refresh pipeline.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Both shares directories need to be under home {home:?} (link: {link:?}, real: {real:?})")]
    InvalidConfiguration {
        home: String,
        link: String,
        real: String,
    },

    #[error("Operation {op_name} has no {key:?} entry in its data")]
    MissingPath { op_name: String, key: &'static str },

    #[error("Element {segment:?} (from {path:?}) not in the tree")]
    MissingNode { segment: String, path: String },

    #[error("Operation {op_name} [{op_id}] found {found} times in node {node:?}")]
    OperationRecordMismatch {
        op_name: String,
        op_id: String,
        found: usize,
        node: String,
    },
}

pub type Result<T> = std::result::Result<T, QueueError>;
