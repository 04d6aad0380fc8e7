//! The queue content tree.
//!
//! `QueueContent` ingests "operation added" / "operation removed" events from
//! the backend, one at a time, and keeps:
//! - a path-keyed tree of node operations, single-rooted at the home root
//! - the flat log of internal operations
//! - the set of transfers (uploads/downloads) still in flight
//!
//! Per-event anomalies (payload without a path, removal of a node that was
//! already compacted away, duplicated operation ids) are logged and reported
//! as "nothing changed" (`None`). Only share configuration errors surface.

use crate::clock::now_ms;
use crate::error::{QueueError, Result};
use crate::log::{Action, InternalOp};
use crate::node::{Arena, Completion, Node, NodeId};
use crate::op::{NodeOpKind, OpChange, OpData, OperationRecord};
use crate::path::{PathResolver, ResolvedPath, ShareDirs};
use crate::snapshot::{NodeSnapshot, RootSnapshot};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, error, warn};

/// Label of the home root (shown next to the home icon in a UI).
pub const ROOT_HOME: &str = "";

/// Tree built from the content of the backend request queue.
#[derive(Debug, Clone)]
pub struct QueueContent {
    resolver: PathResolver,
    nodes: Arena,
    roots: BTreeMap<String, NodeId>,
    internal_ops: Vec<InternalOp>,
    transferring: HashSet<String>,
}

impl QueueContent {
    pub fn new(home: impl Into<String>) -> Self {
        Self {
            resolver: PathResolver::new(home),
            nodes: Arena::default(),
            roots: BTreeMap::new(),
            internal_ops: Vec::new(),
            transferring: HashSet::new(),
        }
    }

    pub fn home(&self) -> &str {
        self.resolver.home()
    }

    pub fn shares_dirs(&self) -> Option<&ShareDirs> {
        self.resolver.shares_dirs()
    }

    /// Configure share remapping; both directories must be under home.
    pub fn set_shares_dirs(&mut self, link: &str, real: &str) -> Result<()> {
        self.resolver.set_shares_dirs(link, real)
    }

    /// Load a full queue snapshot: an ordered replay of `add`.
    pub fn set_content<I>(&mut self, ops: I)
    where
        I: IntoIterator<Item = (String, String, OpData)>,
    {
        for (op_name, op_id, op_data) in ops {
            self.add(&op_name, &op_id, &op_data);
        }
    }

    /// Whether any upload or download is still queued.
    pub fn transferring(&self) -> bool {
        !self.transferring.is_empty()
    }

    /// Internal operations log, oldest first.
    pub fn internal_ops(&self) -> &[InternalOp] {
        &self.internal_ops
    }

    /// Snapshot of the node tree as (root label, children) pairs.
    ///
    /// There is always exactly one pair, for the home root; its children are
    /// empty when nothing is queued.
    pub fn node_ops(&self) -> Vec<RootSnapshot> {
        let children = match self.roots.get(ROOT_HOME) {
            Some(&root) => self.snapshot_children(root),
            None => BTreeMap::new(),
        };
        vec![RootSnapshot {
            label: ROOT_HOME.to_string(),
            children,
        }]
    }

    /// Handle of the home root, if anything is in the tree.
    pub fn root(&self) -> Option<NodeId> {
        self.roots.get(ROOT_HOME).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Find a node by its segments below the home root.
    pub fn find(&self, segments: &[&str]) -> Option<NodeId> {
        segments
            .iter()
            .try_fold(self.root()?, |id, segment| self.nodes.get(id)?.child(segment))
    }

    /// Find the node an absolute backend path maps to.
    pub fn find_path(&self, path: &str) -> Option<NodeId> {
        self.locate(&self.resolver.resolve_path(path)).ok()
    }

    /// Number of nodes in the tree, including the home root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// An operation was added to the backend queue.
    pub fn add(&mut self, op_name: &str, op_id: &str, op_data: &OpData) -> Option<OpChange> {
        match NodeOpKind::from_name(op_name) {
            Some(kind) => self
                .add_node(kind, op_id, op_data)
                .map_err(|e| warn!("Ignoring added operation [{}]: {}", op_id, e))
                .ok(),
            None => Some(self.log_internal(op_name, op_id, op_data, Action::Added)),
        }
    }

    /// An operation was removed from the backend queue (it finished).
    pub fn remove(&mut self, op_name: &str, op_id: &str, op_data: &OpData) -> Option<OpChange> {
        match NodeOpKind::from_name(op_name) {
            Some(kind) => match self.remove_node(kind, op_id, op_data) {
                Ok(change) => Some(change),
                Err(e @ QueueError::OperationRecordMismatch { .. }) => {
                    error!("{}", e);
                    None
                }
                Err(e) => {
                    warn!("Ignoring removed operation [{}]: {}", op_id, e);
                    None
                }
            },
            None => Some(self.log_internal(op_name, op_id, op_data, Action::Removed)),
        }
    }

    /// Compaction: drop finished leaves and forget finished history.
    ///
    /// A finished node with children is kept but reset to idle. A finished
    /// childless node is removed, and the removal climbs up through ancestors
    /// that have no state of their own and no other children. Calling this
    /// twice is the same as calling it once.
    pub fn clear(&mut self) {
        let roots: Vec<NodeId> = self.roots.values().copied().collect();
        self.inspect(&roots);
    }

    fn inspect(&mut self, ids: &[NodeId]) {
        for &id in ids {
            // Pruned by a cascade started further down a sibling's subtree.
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            if node.done.is_complete() {
                if node.has_children() {
                    node.reset_idle();
                } else {
                    self.prune(id);
                    continue;
                }
            }
            let children: Vec<NodeId> = node_children(&self.nodes[id]);
            self.inspect(&children);
        }
    }

    fn prune(&mut self, id: NodeId) {
        let mut current = id;
        while let Some(node) = self.nodes.remove(current) {
            debug!("Pruning finished node {:?}", node.name);
            let Some(parent_id) = node.parent else {
                self.roots.remove(&node.name);
                return;
            };
            let parent = &mut self.nodes[parent_id];
            parent.children.remove(&node.name);
            if parent.done != Completion::NeverResolved || parent.has_children() {
                return;
            }
            current = parent_id;
        }
    }

    fn add_node(&mut self, kind: NodeOpKind, op_id: &str, op_data: &OpData) -> Result<OpChange> {
        if kind.is_transfer() {
            self.transferring.insert(op_id.to_string());
        }
        let path = self.resolver.resolve(kind, op_data)?;

        let mut parent = None;
        for segment in path.parents() {
            let id = match self.child_of(parent, segment) {
                Some(id) => id,
                None => self.attach(parent, Node::directory(segment, parent)),
            };
            parent = Some(id);
        }

        let operation = OperationRecord::new(op_id, kind.name(), op_data.clone());
        let now = now_ms();
        match self.child_of(parent, path.leaf()) {
            Some(id) => self.nodes[id].push_operation(kind.implied_kind(), operation, now),
            None => {
                let node = Node::with_operation(path.leaf(), parent, kind.implied_kind(), operation, now);
                self.attach(parent, node);
            }
        }
        Ok(OpChange::Node)
    }

    fn remove_node(&mut self, kind: NodeOpKind, op_id: &str, op_data: &OpData) -> Result<OpChange> {
        self.transferring.remove(op_id);
        let path = self.resolver.resolve(kind, op_data)?;
        let id = self.locate(&path)?;

        let node = &mut self.nodes[id];
        let matches: Vec<usize> = node
            .operations
            .iter()
            .enumerate()
            .filter(|(_, op)| op.id == op_id)
            .map(|(index, _)| index)
            .collect();
        let &[index] = matches.as_slice() else {
            return Err(QueueError::OperationRecordMismatch {
                op_name: kind.name().to_string(),
                op_id: op_id.to_string(),
                found: matches.len(),
                node: path.to_string(),
            });
        };

        node.finish_operation(index, now_ms());
        Ok(OpChange::Node)
    }

    fn log_internal(&mut self, op_name: &str, op_id: &str, op_data: &OpData, action: Action) -> OpChange {
        self.internal_ops.push(InternalOp {
            timestamp: now_ms(),
            op_name: op_name.to_string(),
            op_id: op_id.to_string(),
            op_data: op_data.clone(),
            action,
        });
        OpChange::Internal
    }

    /// Walk existing nodes down to the leaf of `path`.
    fn locate(&self, path: &ResolvedPath) -> Result<NodeId> {
        let missing = |segment: &str| QueueError::MissingNode {
            segment: segment.to_string(),
            path: path.to_string(),
        };
        let mut parent = None;
        for segment in path.parents() {
            parent = Some(self.child_of(parent, segment).ok_or_else(|| missing(segment))?);
        }
        self.child_of(parent, path.leaf())
            .ok_or_else(|| missing(path.leaf()))
    }

    fn child_of(&self, parent: Option<NodeId>, name: &str) -> Option<NodeId> {
        match parent {
            Some(id) => self.nodes[id].child(name),
            None => self.roots.get(name).copied(),
        }
    }

    fn attach(&mut self, parent: Option<NodeId>, node: Node) -> NodeId {
        let name = node.name.clone();
        let id = self.nodes.insert(node);
        match parent {
            Some(parent_id) => {
                self.nodes[parent_id].children.insert(name, id);
            }
            None => {
                self.roots.insert(name, id);
            }
        }
        id
    }

    fn snapshot_children(&self, id: NodeId) -> BTreeMap<String, NodeSnapshot> {
        self.nodes[id]
            .children()
            .map(|(name, child)| (name.to_string(), self.snapshot(child)))
            .collect()
    }

    fn snapshot(&self, id: NodeId) -> NodeSnapshot {
        let node = &self.nodes[id];
        NodeSnapshot {
            kind: node.kind,
            done: node.done,
            last_modified: node.last_modified,
            operations: node.operations.clone(),
            children: self.snapshot_children(id),
        }
    }
}

fn node_children(node: &Node) -> Vec<NodeId> {
    node.children.values().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    fn data(path: &str) -> OpData {
        OpData::from([("path".to_string(), path.to_string())])
    }

    fn node<'a>(qc: &'a QueueContent, segments: &[&str]) -> &'a Node {
        let id = qc.find(segments).expect("node exists");
        qc.node(id).expect("node is live")
    }

    #[test]
    fn test_set_empty() {
        let mut qc = QueueContent::new("/a/b");
        qc.set_content(Vec::new());
        assert!(qc.is_empty());
        assert!(qc.internal_ops().is_empty());
    }

    #[test]
    fn test_each_node_kind_goes_to_tree() {
        for kind in NodeOpKind::ALL {
            let mut qc = QueueContent::new("/a/b");
            let payload = OpData::from([(kind.path_key().to_string(), "/a/b/foo".to_string())]);
            let r = qc.add(kind.name(), "123", &payload);
            assert_eq!(r, Some(OpChange::Node), "{kind}");
            assert!(!qc.is_empty(), "{kind}");
            assert!(qc.internal_ops().is_empty(), "{kind}");
        }
    }

    #[test]
    fn test_internal_op_goes_to_log() {
        let mut qc = QueueContent::new("/a/b");
        let r = qc.add("ListShares", "456", &OpData::new());
        assert_eq!(r, Some(OpChange::Internal));
        assert!(qc.is_empty());
        assert_eq!(qc.internal_ops().len(), 1);

        let op = &qc.internal_ops()[0];
        assert_eq!(op.op_name, "ListShares");
        assert_eq!(op.op_id, "456");
        assert_eq!(op.action, Action::Added);
        assert!(op.timestamp > 0.0);
    }

    #[test]
    fn test_internal_remove_is_appended() {
        let mut qc = QueueContent::new("/a/b");
        qc.add("ListShares", "456", &OpData::new());
        let r = qc.remove("ListShares", "456", &OpData::new());
        assert_eq!(r, Some(OpChange::Internal));

        let actions: Vec<_> = qc.internal_ops().iter().map(|op| op.action).collect();
        assert_eq!(actions, vec![Action::Added, Action::Removed]);
    }

    #[test]
    fn test_set_mixed_ops() {
        let mut qc = QueueContent::new("/a/b");
        qc.set_content(vec![
            ("MakeFile".to_string(), "123".to_string(), data("foo")),
            ("ListShares".to_string(), "456".to_string(), OpData::new()),
        ]);
        assert!(!qc.is_empty());
        assert_eq!(qc.internal_ops().len(), 1);
    }

    #[test]
    fn test_intermediate_directories() {
        let mut qc = QueueContent::new("/");
        qc.add("MakeFile", "123", &data("/a/b/foo"));

        for segments in [&["a"][..], &["a", "b"][..]] {
            let dir = node(&qc, segments);
            assert_eq!(dir.kind(), NodeKind::Directory);
            assert_eq!(dir.done(), Completion::NeverResolved);
            assert!(dir.operations().is_empty());
            assert!(dir.last_modified().is_none());
            assert_eq!(dir.children().count(), 1);
        }

        let leaf = node(&qc, &["a", "b", "foo"]);
        assert_eq!(leaf.kind(), NodeKind::File);
        assert_eq!(leaf.done(), Completion::Pending);
        assert!(leaf.last_modified().is_some());
        assert_eq!(
            leaf.operations(),
            &[OperationRecord::new("123", "MakeFile", data("/a/b/foo"))]
        );
        assert!(!leaf.has_children());
    }

    #[test]
    fn test_second_operation_is_appended() {
        let mut qc = QueueContent::new("/");
        qc.add("MakeFile", "1", &data("/a/foo"));
        qc.add("Upload", "2", &data("/a/foo"));

        let leaf = node(&qc, &["a", "foo"]);
        let ids: Vec<_> = leaf.operations().iter().map(|op| op.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(leaf.kind(), NodeKind::File);
    }

    #[test]
    fn test_unknown_is_refined_later() {
        let mut qc = QueueContent::new("/");
        qc.add("Unlink", "1", &data("/a/foo"));
        assert_eq!(node(&qc, &["a", "foo"]).kind(), NodeKind::Unknown);

        qc.add("MakeDir", "2", &data("/a/foo"));
        assert_eq!(node(&qc, &["a", "foo"]).kind(), NodeKind::Directory);

        qc.add("MakeFile", "3", &data("/a/foo"));
        assert_eq!(node(&qc, &["a", "foo"]).kind(), NodeKind::Directory);
    }

    #[test]
    fn test_intermediate_directory_is_not_downgraded() {
        let mut qc = QueueContent::new("/");
        qc.add("MakeFile", "1", &data("/a/foo"));
        qc.add("MakeFile", "2", &data("/a"));
        assert_eq!(node(&qc, &["a"]).kind(), NodeKind::Directory);
        assert_eq!(node(&qc, &["a"]).done(), Completion::Pending);
    }

    #[test]
    fn test_remove_marks_done() {
        let mut qc = QueueContent::new("/");
        qc.add("MakeFile", "1", &data("/a/foo"));
        qc.add("Upload", "2", &data("/a/foo"));

        assert_eq!(qc.remove("MakeFile", "1", &data("/a/foo")), Some(OpChange::Node));
        let leaf = node(&qc, &["a", "foo"]);
        assert_eq!(leaf.done(), Completion::Pending);
        assert!(leaf.operations()[0].done);
        assert!(!leaf.operations()[1].done);

        assert_eq!(qc.remove("Upload", "2", &data("/a/foo")), Some(OpChange::Node));
        assert_eq!(node(&qc, &["a", "foo"]).done(), Completion::Complete);
    }

    #[test]
    fn test_add_on_finished_node_restarts() {
        let mut qc = QueueContent::new("/");
        qc.add("MakeFile", "1", &data("/foo"));
        qc.remove("MakeFile", "1", &data("/foo"));
        qc.add("Upload", "2", &data("/foo"));

        let leaf = node(&qc, &["foo"]);
        assert_eq!(leaf.done(), Completion::Pending);
        assert_eq!(leaf.operations().len(), 1);
        assert_eq!(leaf.operations()[0].id, "2");
        assert_eq!(leaf.kind(), NodeKind::File);
    }

    #[test]
    fn test_remove_missing_node_is_ignored() {
        let mut qc = QueueContent::new("/");
        assert_eq!(qc.remove("Unlink", "999", &data("/nowhere")), None);
        assert!(qc.is_empty());

        qc.add("MakeFile", "1", &data("/a/foo"));
        assert_eq!(qc.remove("MakeFile", "2", &data("/a/bar")), None);
        assert_eq!(qc.remove("MakeFile", "2", &data("/b/foo")), None);
    }

    #[test]
    fn test_remove_unknown_id_leaves_node_untouched() {
        let mut qc = QueueContent::new("/");
        qc.add("MakeFile", "1", &data("/foo"));
        let before = qc.node_ops();

        assert_eq!(qc.remove("MakeFile", "2", &data("/foo")), None);
        assert_eq!(qc.node_ops(), before);
    }

    #[test]
    fn test_remove_duplicated_id_leaves_node_untouched() {
        let mut qc = QueueContent::new("/");
        qc.add("Upload", "1", &data("/foo"));
        qc.add("Upload", "1", &data("/foo"));
        let before = qc.node_ops();

        assert_eq!(qc.remove("Upload", "1", &data("/foo")), None);
        assert_eq!(qc.node_ops(), before);
    }

    #[test]
    fn test_missing_path_is_ignored() {
        let mut qc = QueueContent::new("/");
        assert_eq!(qc.add("MakeFile", "1", &OpData::new()), None);
        assert!(qc.is_empty());
        assert_eq!(qc.remove("MakeFile", "1", &OpData::new()), None);
    }

    #[test]
    fn test_move_is_keyed_by_source() {
        let mut qc = QueueContent::new("/home/u");
        let payload = OpData::from([
            ("path_from".to_string(), "/home/u/old".to_string()),
            ("path_to".to_string(), "/home/u/new".to_string()),
        ]);
        qc.add("Move", "1", &payload);
        assert!(qc.find(&["old"]).is_some());
        assert!(qc.find(&["new"]).is_none());
    }

    #[test]
    fn test_share_paths_land_under_link() {
        let mut qc = QueueContent::new("/home/u");
        qc.set_shares_dirs("/home/u/links", "/home/u/.shares").unwrap();
        qc.add("Download", "1", &data("/home/u/.shares/friend/doc"));
        assert!(qc.find(&["links", "friend", "doc"]).is_some());
        assert!(qc.find_path("/home/u/.shares/friend/doc").is_some());
    }

    #[test]
    fn test_invalid_shares_keep_tree_unchanged() {
        let mut qc = QueueContent::new("/home/u");
        assert!(qc.set_shares_dirs("/elsewhere", "/home/u/x").is_err());
        assert!(qc.shares_dirs().is_none());
    }

    #[test]
    fn test_transferring() {
        let mut qc = QueueContent::new("/");
        assert!(!qc.transferring());

        qc.add("Upload", "1", &data("/x"));
        qc.add("Download", "2", &data("/y"));
        qc.add("MakeFile", "3", &data("/z"));
        assert!(qc.transferring());

        qc.remove("Upload", "1", &data("/x"));
        assert!(qc.transferring());
        qc.remove("Download", "2", &data("/y"));
        assert!(!qc.transferring());
    }

    #[test]
    fn test_transfer_removal_counts_even_if_node_is_gone() {
        let mut qc = QueueContent::new("/");
        qc.add("Upload", "1", &data("/x"));
        assert_eq!(qc.remove("Upload", "1", &data("/elsewhere")), None);
        assert!(!qc.transferring());
    }

    #[test]
    fn test_clear_removes_finished_leaf_and_root() {
        let mut qc = QueueContent::new("/");
        qc.add("MakeFile", "1", &data("/a/b/foo"));
        qc.remove("MakeFile", "1", &data("/a/b/foo"));

        qc.clear();
        assert!(qc.is_empty());
        assert_eq!(qc.len(), 0);
        assert!(qc.node_ops()[0].children.is_empty());
    }

    #[test]
    fn test_clear_keeps_pending_sibling() {
        let mut qc = QueueContent::new("/");
        qc.add("MakeFile", "1", &data("/a/foo"));
        qc.add("MakeFile", "2", &data("/a/bar"));
        qc.remove("MakeFile", "1", &data("/a/foo"));

        qc.clear();
        assert!(qc.find(&["a", "foo"]).is_none());
        assert!(qc.find(&["a", "bar"]).is_some());
    }

    #[test]
    fn test_clear_stops_at_ancestor_with_own_state() {
        let mut qc = QueueContent::new("/");
        qc.add("MakeDir", "1", &data("/a"));
        qc.add("MakeFile", "2", &data("/a/foo"));
        qc.remove("MakeFile", "2", &data("/a/foo"));

        qc.clear();
        assert!(qc.find(&["a", "foo"]).is_none());
        let dir = node(&qc, &["a"]);
        assert_eq!(dir.done(), Completion::Pending);
        assert!(!dir.has_children());
    }

    #[test]
    fn test_clear_collapses_finished_directory_with_finished_children() {
        let mut qc = QueueContent::new("/");
        qc.add("MakeDir", "1", &data("/a"));
        qc.add("MakeFile", "2", &data("/a/foo"));
        qc.remove("MakeDir", "1", &data("/a"));
        qc.remove("MakeFile", "2", &data("/a/foo"));

        qc.clear();
        assert!(qc.is_empty());
    }

    #[test]
    fn test_clear_keeps_unfinished_leaves() {
        let mut qc = QueueContent::new("/");
        qc.add("Unlink", "1", &data("/a/foo"));
        let before = qc.node_ops();
        qc.clear();
        assert_eq!(qc.node_ops(), before);
    }

    #[test]
    fn test_add_after_full_clear_rebuilds_root() {
        let mut qc = QueueContent::new("/");
        qc.add("MakeFile", "1", &data("/foo"));
        qc.remove("MakeFile", "1", &data("/foo"));
        qc.clear();
        assert!(qc.root().is_none());

        qc.add("MakeFile", "2", &data("/bar"));
        assert!(qc.root().is_some());
        assert_eq!(node(&qc, &["bar"]).done(), Completion::Pending);
    }

    #[test]
    fn test_late_removal_after_clear() {
        let mut qc = QueueContent::new("/");
        qc.add("Upload", "1", &data("/foo"));
        qc.add("Upload", "2", &data("/foo"));
        qc.remove("Upload", "1", &data("/foo"));
        qc.remove("Upload", "2", &data("/foo"));
        qc.clear();

        assert_eq!(qc.remove("Upload", "2", &data("/foo")), None);
        assert!(qc.is_empty());
    }

    #[test]
    fn test_node_ops_without_root() {
        let qc = QueueContent::new("/");
        let roots = qc.node_ops();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].label, ROOT_HOME);
        assert!(roots[0].children.is_empty());
    }

    #[test]
    fn test_node_ops_skips_home_root() {
        let mut qc = QueueContent::new("/home/u");
        qc.add("MakeFile", "1", &data("/home/u/a/foo"));
        let roots = qc.node_ops();
        let a = &roots[0].children["a"];
        assert_eq!(a.kind, NodeKind::Directory);
        assert_eq!(a.children["foo"].operations[0].id, "1");
    }
}
