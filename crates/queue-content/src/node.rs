//! Tree vertices and the arena that owns them.
//!
//! Nodes never hold references to each other. Children and the parent
//! back-link are `NodeId` handles into the arena owned by `QueueContent`,
//! so removing a subtree is just dropping its entries from the arena.

use crate::op::OperationRecord;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display, Formatter};
use std::ops::{Index, IndexMut};

/// Stable handle to a node in the tree.
///
/// Handles are never reused, so a handle to a pruned node simply stops
/// resolving instead of pointing at some other node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u64);

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a path segment is known to be.
///
/// Variant order is the display order: directories first, then files,
/// then unclassified entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum NodeKind {
    Directory,
    File,
    /// Touched by an operation that says nothing about the entry's type.
    Unknown,
}

/// Completion state of a node's operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Completion {
    /// Pure intermediate directory, or a finished directory reset by compaction.
    NeverResolved,
    /// At least one attached operation is still queued.
    Pending,
    /// Every attached operation finished.
    Complete,
}

impl Completion {
    pub fn is_complete(self) -> bool {
        self == Completion::Complete
    }
}

/// One path segment in the queue tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) operations: Vec<OperationRecord>,
    pub(crate) done: Completion,
    pub(crate) children: BTreeMap<String, NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) last_modified: Option<f64>,
}

impl Node {
    /// Intermediate directory created while walking down to an operation's path.
    pub(crate) fn directory(name: &str, parent: Option<NodeId>) -> Self {
        Self {
            name: name.to_string(),
            kind: NodeKind::Directory,
            operations: Vec::new(),
            done: Completion::NeverResolved,
            children: BTreeMap::new(),
            parent,
            last_modified: None,
        }
    }

    /// Leaf created by the first operation touching its path.
    pub(crate) fn with_operation(
        name: &str,
        parent: Option<NodeId>,
        kind: NodeKind,
        operation: OperationRecord,
        now: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            operations: vec![operation],
            done: Completion::Pending,
            children: BTreeMap::new(),
            parent,
            last_modified: Some(now),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn operations(&self) -> &[OperationRecord] {
        &self.operations
    }

    pub fn done(&self) -> Completion {
        self.done
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn last_modified(&self) -> Option<f64> {
        self.last_modified
    }

    pub fn child(&self, name: &str) -> Option<NodeId> {
        self.children.get(name).copied()
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.children.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Upgrade an unclassified node. File and Directory are final.
    pub(crate) fn refine_kind(&mut self, evidence: NodeKind) {
        if self.kind == NodeKind::Unknown && evidence != NodeKind::Unknown {
            self.kind = evidence;
        }
    }

    /// Attach a newly queued operation.
    ///
    /// A node whose operations had all finished starts over with only the new
    /// operation. Intermediate directories become pending.
    pub(crate) fn push_operation(&mut self, evidence: NodeKind, operation: OperationRecord, now: f64) {
        self.last_modified = Some(now);
        self.refine_kind(evidence);
        if self.done.is_complete() {
            self.operations.clear();
        }
        self.done = Completion::Pending;
        self.operations.push(operation);
    }

    /// Mark the operation at `index` finished, completing the node if it was
    /// the last pending one.
    pub(crate) fn finish_operation(&mut self, index: usize, now: f64) {
        if let Some(operation) = self.operations.get_mut(index) {
            operation.done = true;
        }
        if self.operations.iter().all(|op| op.done) {
            self.done = Completion::Complete;
        }
        self.last_modified = Some(now);
    }

    /// Forget finished history but keep the node (it still has children).
    pub(crate) fn reset_idle(&mut self) {
        self.operations.clear();
        self.done = Completion::NeverResolved;
    }
}

/// Owner of every node in the tree.
#[derive(Debug, Default, Clone)]
pub(crate) struct Arena {
    nodes: HashMap<NodeId, Node>,
    next_id: u64,
}

impl Arena {
    pub(crate) fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }

    pub(crate) fn remove(&mut self, id: NodeId) -> Option<Node> {
        self.nodes.remove(&id)
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}

// Handles stored in `children`/`parent` always point at live nodes; indexing
// with a dangling handle is a bug in the tree, same as an out-of-bounds slice.
impl Index<NodeId> for Arena {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        match self.nodes.get(&id) {
            Some(node) => node,
            None => panic!("dangling node handle {id}"),
        }
    }
}

impl IndexMut<NodeId> for Arena {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        match self.nodes.get_mut(&id) {
            Some(node) => node,
            None => panic!("dangling node handle {id}"),
        }
    }
}
