//! Queue operation kinds and the records attached to tree nodes.
//!
//! The six node-affecting kinds are described by a static table instead of
//! string comparisons scattered through the tree: each entry says which node
//! kind the operation implies, whether it is a transfer, and which payload
//! key carries its path.

use crate::node::NodeKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Operation payload as delivered by the backend (string to string).
pub type OpData = BTreeMap<String, String>;

/// Payload key holding the path for most operations.
pub const PATH_DEFAULT: &str = "path";
/// Payload key holding the source path of a move.
pub const PATH_FROM: &str = "path_from";

/// Operations that refer to a filesystem path and live in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeOpKind {
    Move,
    MakeDir,
    MakeFile,
    Unlink,
    Upload,
    Download,
}

struct KindTraits {
    kind: NodeOpKind,
    name: &'static str,
    implied: NodeKind,
    transfer: bool,
    path_key: &'static str,
}

static KIND_TABLE: [KindTraits; 6] = [
    KindTraits {
        kind: NodeOpKind::Move,
        name: "Move",
        implied: NodeKind::Unknown,
        transfer: false,
        path_key: PATH_FROM,
    },
    KindTraits {
        kind: NodeOpKind::MakeDir,
        name: "MakeDir",
        implied: NodeKind::Directory,
        transfer: false,
        path_key: PATH_DEFAULT,
    },
    KindTraits {
        kind: NodeOpKind::MakeFile,
        name: "MakeFile",
        implied: NodeKind::File,
        transfer: false,
        path_key: PATH_DEFAULT,
    },
    KindTraits {
        kind: NodeOpKind::Unlink,
        name: "Unlink",
        implied: NodeKind::Unknown,
        transfer: false,
        path_key: PATH_DEFAULT,
    },
    KindTraits {
        kind: NodeOpKind::Upload,
        name: "Upload",
        implied: NodeKind::Unknown,
        transfer: true,
        path_key: PATH_DEFAULT,
    },
    KindTraits {
        kind: NodeOpKind::Download,
        name: "Download",
        implied: NodeKind::Unknown,
        transfer: true,
        path_key: PATH_DEFAULT,
    },
];

impl NodeOpKind {
    pub const ALL: [NodeOpKind; 6] = [
        NodeOpKind::Move,
        NodeOpKind::MakeDir,
        NodeOpKind::MakeFile,
        NodeOpKind::Unlink,
        NodeOpKind::Upload,
        NodeOpKind::Download,
    ];

    fn traits(self) -> &'static KindTraits {
        &KIND_TABLE[self as usize]
    }

    /// Look up a node-affecting kind by its backend name.
    ///
    /// Returns `None` for internal operations (e.g. "ListShares").
    pub fn from_name(name: &str) -> Option<Self> {
        KIND_TABLE.iter().find(|t| t.name == name).map(|t| t.kind)
    }

    /// Backend name of the operation.
    pub fn name(self) -> &'static str {
        self.traits().name
    }

    /// Node kind this operation is evidence for.
    pub fn implied_kind(self) -> NodeKind {
        self.traits().implied
    }

    /// Whether this is an upload or download.
    pub fn is_transfer(self) -> bool {
        self.traits().transfer
    }

    /// Payload key holding the path this operation refers to.
    pub fn path_key(self) -> &'static str {
        self.traits().path_key
    }
}

impl Display for NodeOpKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which structure an add/remove touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OpChange {
    /// The node tree changed.
    Node,
    /// The internal operations log changed.
    Internal,
}

/// One queue operation attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationRecord {
    /// Backend identifier, unique among pending operations of the node.
    pub id: String,
    /// Backend operation name (e.g. "MakeFile").
    pub name: String,
    /// Copy of the payload received with the operation.
    pub data: OpData,
    /// Set when the backend reports the operation as removed from the queue.
    pub done: bool,
}

impl OperationRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, data: OpData) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            data,
            done: false,
        }
    }
}
