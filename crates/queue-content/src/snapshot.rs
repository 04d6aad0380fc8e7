//! Read-only projection of the tree handed to the UI layer.

use crate::node::{Completion, NodeKind};
use crate::op::OperationRecord;
use serde::Serialize;
use std::collections::BTreeMap;

/// Owned copy of one node and its subtree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub kind: NodeKind,
    pub done: Completion,
    pub last_modified: Option<f64>,
    pub operations: Vec<OperationRecord>,
    pub children: BTreeMap<String, NodeSnapshot>,
}

impl NodeSnapshot {
    /// Children in display order: by kind, then by name.
    pub fn sorted_children(&self) -> Vec<(&str, &NodeSnapshot)> {
        sorted_for_display(&self.children)
    }

    /// Names of operations still queued on this node.
    pub fn pending_operations(&self) -> impl Iterator<Item = &str> {
        self.operations
            .iter()
            .filter(|op| !op.done)
            .map(|op| op.name.as_str())
    }
}

/// One root of the tree (currently only the home root) and its children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RootSnapshot {
    pub label: String,
    pub children: BTreeMap<String, NodeSnapshot>,
}

impl RootSnapshot {
    /// Children in display order: by kind, then by name.
    pub fn sorted_children(&self) -> Vec<(&str, &NodeSnapshot)> {
        sorted_for_display(&self.children)
    }
}

fn sorted_for_display(children: &BTreeMap<String, NodeSnapshot>) -> Vec<(&str, &NodeSnapshot)> {
    let mut sorted: Vec<_> = children
        .iter()
        .map(|(name, node)| (name.as_str(), node))
        .collect();
    sorted.sort_by(|(a_name, a), (b_name, b)| a.kind.cmp(&b.kind).then_with(|| a_name.cmp(b_name)));
    sorted
}
