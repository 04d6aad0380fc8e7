//! Offline backend fed from recorded queue events.
//!
//! A replay file is JSON lines, one `QueueEvent` per line. Blank lines and
//! lines starting with `#` are ignored.

use crate::backend::{QueueEvent, RawTransfer, SyncDaemonBackend, WireOp};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Parse queue events from a JSON-lines reader.
pub fn read_events(reader: impl BufRead) -> Result<Vec<QueueEvent>> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", index + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(trimmed)
            .with_context(|| format!("Invalid queue event on line {}", index + 1))?;
        events.push(event);
    }
    Ok(events)
}

/// Open a replay source; `-` reads standard input.
pub fn open_events(source: &Path) -> Result<Box<dyn BufRead>> {
    if source == Path::new("-") {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(source).with_context(|| format!("Failed to open {}", source.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Backend with fixed shares directories and a preloaded queue.
///
/// There is nothing in flight when replaying, so transfer lists are empty.
#[derive(Debug, Clone, Default)]
pub struct ReplayBackend {
    link_shares_dir: String,
    real_shares_dir: String,
    queued: Vec<WireOp>,
}

impl ReplayBackend {
    pub fn new(link_shares_dir: impl Into<String>, real_shares_dir: impl Into<String>) -> Self {
        Self {
            link_shares_dir: link_shares_dir.into(),
            real_shares_dir: real_shares_dir.into(),
            queued: Vec::new(),
        }
    }

    /// Operations reported as already queued at startup.
    pub fn with_queue(mut self, queued: Vec<WireOp>) -> Self {
        self.queued = queued;
        self
    }
}

#[async_trait]
impl SyncDaemonBackend for ReplayBackend {
    async fn get_queue_content(&self) -> Result<Vec<WireOp>> {
        Ok(self.queued.clone())
    }

    async fn get_real_shares_dir(&self) -> Result<String> {
        Ok(self.real_shares_dir.clone())
    }

    async fn get_link_shares_dir(&self) -> Result<String> {
        Ok(self.link_shares_dir.clone())
    }

    async fn get_current_uploads(&self) -> Result<Vec<RawTransfer>> {
        Ok(Vec::new())
    }

    async fn get_current_downloads(&self) -> Result<Vec<RawTransfer>> {
        Ok(Vec::new())
    }
}
