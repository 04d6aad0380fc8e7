//! Boundary with the SyncDaemon backend.
//!
//! The backend speaks in loosely typed string maps. This module:
//! - Deserializes queue events as they arrive on the wire
//! - Validates them into a typed operation per kind
//! - Normalizes typed operations back into the `(name, id, data)` triple the tree consumes
//! - Turns raw transfer maps into `Transfer` progress records
//!
//! `SyncDaemonBackend` is the seam to the daemon itself (D-Bus, a replay file,
//! a test double).

use async_trait::async_trait;
use queue_content::op::{PATH_DEFAULT, PATH_FROM};
use queue_content::{Action, NodeOpKind, OpData};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

/// Payload key holding the destination of a move.
pub const PATH_TO: &str = "path_to";

/// Transfer entry as reported by the backend (string to string).
pub type RawTransfer = BTreeMap<String, String>;

/// Operation exactly as it is queued in the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireOp {
    pub op_name: String,
    pub op_id: String,
    #[serde(default)]
    pub op_data: OpData,
}

impl WireOp {
    pub fn new(op_name: impl Into<String>, op_id: impl Into<String>, op_data: OpData) -> Self {
        Self {
            op_name: op_name.into(),
            op_id: op_id.into(),
            op_data,
        }
    }
}

/// Queue change notification.
///
/// One JSON object per line in replay files:
/// `{"action": "added", "op_name": "MakeFile", "op_id": "1", "op_data": {"path": "/home/u/a"}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEvent {
    pub action: Action,
    #[serde(flatten)]
    pub op: WireOp,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Operation {op_name} [{op_id}] has no {key:?} entry in its data")]
    MissingField {
        op_name: String,
        op_id: String,
        key: &'static str,
    },

    #[error("Transfer entry has no {key:?} entry")]
    MissingTransferField { key: &'static str },

    #[error("Transfer of {path:?} has a non-numeric {key:?} value {value:?}")]
    InvalidTransferField {
        path: String,
        key: &'static str,
        value: String,
    },
}

/// Operation payload, typed per kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueOp {
    Move { path_from: String, path_to: Option<String> },
    MakeDir { path: String },
    MakeFile { path: String },
    Unlink { path: String },
    Upload { path: String },
    Download { path: String },
    /// Pathless operation (listing shares, querying metadata, ...).
    Internal { name: String },
}

impl QueueOp {
    /// The node-affecting kind, `None` for internal operations.
    pub fn kind(&self) -> Option<NodeOpKind> {
        match self {
            QueueOp::Move { .. } => Some(NodeOpKind::Move),
            QueueOp::MakeDir { .. } => Some(NodeOpKind::MakeDir),
            QueueOp::MakeFile { .. } => Some(NodeOpKind::MakeFile),
            QueueOp::Unlink { .. } => Some(NodeOpKind::Unlink),
            QueueOp::Upload { .. } => Some(NodeOpKind::Upload),
            QueueOp::Download { .. } => Some(NodeOpKind::Download),
            QueueOp::Internal { .. } => None,
        }
    }

    /// Backend name of the operation.
    pub fn name(&self) -> &str {
        match self {
            QueueOp::Internal { name } => name.as_str(),
            other => other.kind().map(NodeOpKind::name).unwrap_or_default(),
        }
    }

    /// Path the operation is filed under in the tree.
    pub fn path(&self) -> Option<&str> {
        match self {
            QueueOp::Move { path_from, .. } => Some(path_from.as_str()),
            QueueOp::MakeDir { path }
            | QueueOp::MakeFile { path }
            | QueueOp::Unlink { path }
            | QueueOp::Upload { path }
            | QueueOp::Download { path } => Some(path.as_str()),
            QueueOp::Internal { .. } => None,
        }
    }
}

/// Validated queue operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedOp {
    pub id: String,
    pub op: QueueOp,
    /// Payload entries the typed variant doesn't model, kept opaque.
    pub extra: OpData,
}

impl TypedOp {
    /// Flatten back into what `QueueContent` consumes.
    pub fn into_parts(self) -> (String, String, OpData) {
        let name = self.op.name().to_string();
        let mut data = self.extra;
        match self.op {
            QueueOp::Move { path_from, path_to } => {
                data.insert(PATH_FROM.to_string(), path_from);
                if let Some(path_to) = path_to {
                    data.insert(PATH_TO.to_string(), path_to);
                }
            }
            QueueOp::MakeDir { path }
            | QueueOp::MakeFile { path }
            | QueueOp::Unlink { path }
            | QueueOp::Upload { path }
            | QueueOp::Download { path } => {
                data.insert(PATH_DEFAULT.to_string(), path);
            }
            QueueOp::Internal { .. } => {}
        }
        (name, self.id, data)
    }
}

impl TryFrom<WireOp> for TypedOp {
    type Error = BackendError;

    fn try_from(wire: WireOp) -> Result<Self, Self::Error> {
        let WireOp {
            op_name,
            op_id,
            op_data: mut extra,
        } = wire;

        let mut take = |key: &'static str| {
            extra.remove(key).ok_or_else(|| BackendError::MissingField {
                op_name: op_name.clone(),
                op_id: op_id.clone(),
                key,
            })
        };

        let op = match NodeOpKind::from_name(&op_name) {
            Some(NodeOpKind::Move) => QueueOp::Move {
                path_from: take(PATH_FROM)?,
                path_to: take(PATH_TO).ok(),
            },
            Some(NodeOpKind::MakeDir) => QueueOp::MakeDir { path: take(PATH_DEFAULT)? },
            Some(NodeOpKind::MakeFile) => QueueOp::MakeFile { path: take(PATH_DEFAULT)? },
            Some(NodeOpKind::Unlink) => QueueOp::Unlink { path: take(PATH_DEFAULT)? },
            Some(NodeOpKind::Upload) => QueueOp::Upload { path: take(PATH_DEFAULT)? },
            Some(NodeOpKind::Download) => QueueOp::Download { path: take(PATH_DEFAULT)? },
            None => QueueOp::Internal {
                name: op_name.clone(),
            },
        };

        Ok(TypedOp { id: op_id, op, extra })
    }
}

/// Which way bytes are flowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Upload,
    Download,
}

impl TransferDirection {
    /// Raw transfer key holding the bytes moved so far.
    pub fn progress_key(self) -> &'static str {
        match self {
            TransferDirection::Upload => "n_bytes_written",
            TransferDirection::Download => "n_bytes_read",
        }
    }
}

/// Size of a transfer once compressed; entries without it have not started.
pub const TOTAL_KEY: &str = "deflated_size";

/// Progress of one upload or download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transfer {
    pub path: String,
    pub transferred: u64,
    pub total: u64,
}

impl Transfer {
    /// Parse a raw entry. `Ok(None)` when the transfer has no size yet.
    pub fn from_raw(raw: &RawTransfer, direction: TransferDirection) -> Result<Option<Self>, BackendError> {
        let Some(total) = raw.get(TOTAL_KEY) else {
            return Ok(None);
        };
        let path = raw
            .get("path")
            .ok_or(BackendError::MissingTransferField { key: "path" })?;
        let progress_key = direction.progress_key();
        let transferred = raw
            .get(progress_key)
            .ok_or(BackendError::MissingTransferField { key: progress_key })?;

        let number = |key: &'static str, value: &str| {
            value
                .parse::<u64>()
                .map_err(|_| BackendError::InvalidTransferField {
                    path: path.clone(),
                    key,
                    value: value.to_string(),
                })
        };

        Ok(Some(Transfer {
            path: path.clone(),
            transferred: number(progress_key, transferred.as_str())?,
            total: number(TOTAL_KEY, total.as_str())?,
        }))
    }
}

/// Keep the useful part of the backend's transfer list.
///
/// Entries that have not been sized yet are skipped silently; malformed ones
/// are skipped with a warning.
pub fn process_transfers(raw: &[RawTransfer], direction: TransferDirection) -> Vec<Transfer> {
    raw.iter()
        .filter_map(|entry| match Transfer::from_raw(entry, direction) {
            Ok(transfer) => transfer,
            Err(e) => {
                warn!("Skipping {:?} transfer: {}", direction, e);
                None
            }
        })
        .collect()
}

/// Access to a running SyncDaemon.
#[async_trait]
pub trait SyncDaemonBackend: Send + Sync {
    /// Operations currently waiting in the request queue, in queue order.
    async fn get_queue_content(&self) -> anyhow::Result<Vec<WireOp>>;

    /// Directory where shares live on disk.
    async fn get_real_shares_dir(&self) -> anyhow::Result<String>;

    /// Directory where shares are shown to the user.
    async fn get_link_shares_dir(&self) -> anyhow::Result<String>;

    async fn get_current_uploads(&self) -> anyhow::Result<Vec<RawTransfer>>;

    async fn get_current_downloads(&self) -> anyhow::Result<Vec<RawTransfer>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawTransfer {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_queue_event_json_shape() {
        let line = r#"{"action":"added","op_name":"MakeFile","op_id":"1","op_data":{"path":"/home/u/a","share_id":"s"}}"#;
        let event: QueueEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event.action, Action::Added);
        assert_eq!(event.op.op_name, "MakeFile");
        assert_eq!(event.op.op_data["share_id"], "s");
    }

    #[test]
    fn test_queue_event_without_data() {
        let line = r#"{"action":"removed","op_name":"ListShares","op_id":"7"}"#;
        let event: QueueEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event.action, Action::Removed);
        assert!(event.op.op_data.is_empty());
    }

    #[test]
    fn test_typed_op_round_trip_keeps_extra_keys() {
        let data = OpData::from([
            ("path".to_string(), "/home/u/a".to_string()),
            ("node_id".to_string(), "n".to_string()),
        ]);
        let typed = TypedOp::try_from(WireOp::new("Upload", "3", data.clone())).unwrap();
        assert_eq!(typed.op, QueueOp::Upload { path: "/home/u/a".into() });
        assert_eq!(typed.extra.len(), 1);

        let (name, id, back) = typed.into_parts();
        assert_eq!((name.as_str(), id.as_str()), ("Upload", "3"));
        assert_eq!(back, data);
    }

    #[test]
    fn test_move_is_typed_by_both_paths() {
        let data = OpData::from([
            ("path_from".to_string(), "/a".to_string()),
            ("path_to".to_string(), "/b".to_string()),
        ]);
        let typed = TypedOp::try_from(WireOp::new("Move", "1", data)).unwrap();
        assert_eq!(typed.op.path(), Some("/a"));
        assert_eq!(typed.op.kind(), Some(NodeOpKind::Move));
        assert!(typed.extra.is_empty());
    }

    #[test]
    fn test_missing_path_is_rejected() {
        let err = TypedOp::try_from(WireOp::new("Unlink", "9", OpData::new())).unwrap_err();
        assert_eq!(
            err,
            BackendError::MissingField {
                op_name: "Unlink".into(),
                op_id: "9".into(),
                key: "path"
            }
        );
    }

    #[test]
    fn test_internal_ops_pass_through() {
        let data = OpData::from([("volume_id".to_string(), "v".to_string())]);
        let typed = TypedOp::try_from(WireOp::new("GetDelta", "2", data.clone())).unwrap();
        assert_eq!(typed.op.kind(), None);
        assert_eq!(typed.op.name(), "GetDelta");
        assert_eq!(typed.into_parts().2, data);
    }

    #[test]
    fn test_process_downloads() {
        let downloads = vec![
            raw(&[("deflated_size", "123"), ("n_bytes_read", "45"), ("path", "p1")]),
            raw(&[("n_bytes_read", "0"), ("path", "p2")]),
            raw(&[("deflated_size", "678"), ("n_bytes_read", "90"), ("path", "p3")]),
        ];
        let result = process_transfers(&downloads, TransferDirection::Download);
        assert_eq!(
            result,
            vec![
                Transfer { path: "p1".into(), transferred: 45, total: 123 },
                Transfer { path: "p3".into(), transferred: 90, total: 678 },
            ]
        );
    }

    #[test]
    fn test_process_uploads_uses_bytes_written() {
        let uploads = vec![raw(&[
            ("deflated_size", "10"),
            ("n_bytes_written", "4"),
            ("n_bytes_read", "999"),
            ("path", "p"),
        ])];
        let result = process_transfers(&uploads, TransferDirection::Upload);
        assert_eq!(result[0].transferred, 4);
    }

    #[test]
    fn test_malformed_transfer_is_skipped() {
        let uploads = vec![
            raw(&[("deflated_size", "ten"), ("n_bytes_written", "4"), ("path", "p")]),
            raw(&[("deflated_size", "10"), ("path", "q")]),
        ];
        assert!(process_transfers(&uploads, TransferDirection::Upload).is_empty());

        let err = Transfer::from_raw(&uploads[0], TransferDirection::Upload).unwrap_err();
        assert!(matches!(err, BackendError::InvalidTransferField { key: "deflated_size", .. }));
    }
}
