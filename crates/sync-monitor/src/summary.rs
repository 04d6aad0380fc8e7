//! Text helpers for presenting the queue tree.

use crate::backend::Transfer;
use queue_content::{NodeKind, NodeSnapshot, RootSnapshot, ROOT_HOME};
use std::fmt;

const ELLIPSIS: &str = "...";
/// Longest operations list shown for a finished node.
pub const MAX_OP_LEN: usize = 30;

const BYTE_UNITS: [(u64, &str); 6] = [
    (1 << 50, "PB"),
    (1 << 40, "TB"),
    (1 << 30, "GB"),
    (1 << 20, "MB"),
    (1 << 10, "kB"),
    (1, "bytes"),
];

const TIME_UNITS: [(u64, &str); 4] = [(86_400, "day"), (3_600, "hour"), (60, "minute"), (1, "second")];

/// Human readable byte count: `1 byte`, `512.0 bytes`, `1.0 kB`, `12.05 MB`.
pub fn humanize_bytes(n: u64, precision: usize) -> String {
    if n == 1 {
        return "1 byte".to_string();
    }
    let (factor, suffix) = BYTE_UNITS
        .iter()
        .copied()
        .find(|(factor, _)| n >= *factor)
        .unwrap_or((1, "bytes"));
    format!("{:.*} {}", precision, n as f64 / factor as f64, suffix)
}

/// Coarse elapsed time: `1 second`, `5 minutes`, `2 days`.
pub fn humanize_elapsed(seconds: u64) -> String {
    let (factor, unit) = TIME_UNITS
        .iter()
        .copied()
        .find(|(factor, _)| seconds >= *factor)
        .unwrap_or((1, "second"));
    let amount = seconds / factor;
    let plural = if amount == 1 { "" } else { "s" };
    format!("{amount} {unit}{plural}")
}

/// One-line description of a node's operations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OpsSummary {
    pub text: String,
    /// Every operation finished, so `clear` would drop or reset this node.
    pub clearable: bool,
}

/// Summarize a node's operations as of `now_ms` (milliseconds since epoch).
///
/// Pending operations are listed by name. Once everything finished the
/// summary says how long ago, with the operations list truncated.
pub fn operations_summary(node: &NodeSnapshot, now_ms: f64) -> OpsSummary {
    if node.operations.is_empty() {
        return OpsSummary::default();
    }

    let pending: Vec<&str> = node.pending_operations().collect();
    if !pending.is_empty() {
        return OpsSummary {
            text: pending.join(", "),
            clearable: false,
        };
    }

    let mut ops = node
        .operations
        .iter()
        .map(|op| op.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    if ops.chars().count() > MAX_OP_LEN {
        ops = ops.chars().take(MAX_OP_LEN - ELLIPSIS.len()).collect::<String>() + ELLIPSIS;
    }

    let since = node.last_modified.unwrap_or(now_ms);
    let seconds = ((now_ms - since) / 1000.0).max(0.0) as u64;
    OpsSummary {
        text: format!("Completed {} ago ({})", humanize_elapsed(seconds), ops),
        clearable: true,
    }
}

/// Percentage done; an unsized transfer counts as 0%.
pub fn transfer_percent(transfer: &Transfer) -> f64 {
    if transfer.total == 0 {
        return 0.0;
    }
    transfer.transferred as f64 / transfer.total as f64 * 100.0
}

/// `"123.0 bytes of 1.2 kB (10.0%)"`
pub fn transfer_text(transfer: &Transfer) -> String {
    format!(
        "{} of {} ({:.1}%)",
        humanize_bytes(transfer.transferred, 1),
        humanize_bytes(transfer.total, 1),
        transfer_percent(transfer)
    )
}

/// Indented rendering of the tree, children in display order.
///
/// The home root is shown as `~`, directories get a trailing `/`, and each
/// node with operations is followed by its summary.
pub struct TreeView<'a> {
    pub roots: &'a [RootSnapshot],
    /// Reference time for elapsed summaries, ms since the epoch.
    pub now_ms: f64,
}

impl TreeView<'_> {
    fn write_node(&self, f: &mut fmt::Formatter<'_>, name: &str, node: &NodeSnapshot, depth: usize) -> fmt::Result {
        let slash = if node.kind == NodeKind::Directory { "/" } else { "" };
        write!(f, "{:indent$}{name}{slash}", "", indent = depth * 2)?;
        let summary = operations_summary(node, self.now_ms);
        if !summary.text.is_empty() {
            write!(f, "  [{}]", summary.text)?;
        }
        writeln!(f)?;
        for (child_name, child) in node.sorted_children() {
            self.write_node(f, child_name, child, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for TreeView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for root in self.roots {
            let label = if root.label == ROOT_HOME { "~" } else { root.label.as_str() };
            writeln!(f, "{label}")?;
            for (name, child) in root.sorted_children() {
                self.write_node(f, name, child, 1)?;
            }
        }
        Ok(())
    }
}

/// `TreeView` rendered to a string.
pub fn render_tree(roots: &[RootSnapshot], now_ms: f64) -> String {
    TreeView { roots, now_ms }.to_string()
}
