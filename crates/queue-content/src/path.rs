//! Path resolution for queue operations.
//!
//! The backend reports absolute paths. The tree is keyed by home-relative
//! segments, with paths under the on-disk shares directory moved to where the
//! user sees them (the shares link directory).
//!
//! Prefix checks are plain string prefixes, matching how the backend reports
//! paths.

use crate::error::{QueueError, Result};
use crate::op::{NodeOpKind, OpData};
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

pub const SEPARATOR: char = '/';

/// Shares directories: where shares are displayed and where they live on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareDirs {
    pub link: String,
    pub real: String,
}

/// Operation path split into segments.
///
/// The first parent segment is always the empty home-root segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    parents: Vec<String>,
    leaf: String,
}

impl ResolvedPath {
    /// Segments leading to the leaf, starting with the home root.
    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    /// Final segment, the one the operation is attached to.
    pub fn leaf(&self) -> &str {
        &self.leaf
    }

    /// All segments, home root first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.parents
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.leaf.as_str()))
    }
}

impl Display for ResolvedPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for parent in &self.parents {
            write!(f, "{parent}{SEPARATOR}")?;
        }
        f.write_str(&self.leaf)
    }
}

/// Turns operation payloads into tree paths.
#[derive(Debug, Clone)]
pub struct PathResolver {
    home: String,
    shares: Option<ShareDirs>,
}

impl PathResolver {
    pub fn new(home: impl Into<String>) -> Self {
        Self {
            home: home.into(),
            shares: None,
        }
    }

    pub fn home(&self) -> &str {
        &self.home
    }

    pub fn shares_dirs(&self) -> Option<&ShareDirs> {
        self.shares.as_ref()
    }

    /// Configure share remapping. Both directories must be under home;
    /// on error the previous configuration is kept.
    pub fn set_shares_dirs(&mut self, link: &str, real: &str) -> Result<()> {
        if !link.starts_with(&self.home) || !real.starts_with(&self.home) {
            return Err(QueueError::InvalidConfiguration {
                home: self.home.clone(),
                link: link.to_string(),
                real: real.to_string(),
            });
        }
        self.shares = Some(ShareDirs {
            link: link.to_string(),
            real: real.to_string(),
        });
        Ok(())
    }

    /// Resolve the path an operation refers to.
    pub fn resolve(&self, kind: NodeOpKind, data: &OpData) -> Result<ResolvedPath> {
        let key = kind.path_key();
        let path = data.get(key).ok_or_else(|| QueueError::MissingPath {
            op_name: kind.name().to_string(),
            key,
        })?;
        Ok(self.resolve_path(path))
    }

    /// Resolve a raw backend path.
    pub fn resolve_path(&self, path: &str) -> ResolvedPath {
        let remapped = match &self.shares {
            Some(shares) => match path.strip_prefix(shares.real.as_str()) {
                Some(rest) => format!("{}{rest}", shares.link),
                None => path.to_string(),
            },
            None => path.to_string(),
        };

        let relative = remapped
            .strip_prefix(self.home.as_str())
            .unwrap_or(&remapped);
        let rooted = if relative.starts_with(SEPARATOR) {
            relative.to_string()
        } else {
            format!("{SEPARATOR}{relative}")
        };

        let (head, leaf) = rooted.rsplit_once(SEPARATOR).unwrap_or(("", rooted.as_str()));
        ResolvedPath {
            parents: head.split(SEPARATOR).map(str::to_string).collect(),
            leaf: leaf.to_string(),
        }
    }
}
