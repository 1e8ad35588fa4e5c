//! Undo Journal.
//!
//! Holds the most recent batch that renamed anything. Undo replays its successful ops
//! backwards and never overwrites a node that is already at the original path.

use crate::config::app_paths;
use crate::error::{EngineError, FailureReason};
use crate::executor::{BatchEntry, BatchRecord, OpStatus};
use crate::fs_ops::{RenameFs, StdFs};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UndoOutcome {
    FullyReverted,
    PartiallyReverted,
    Failed,
}

/// One reversal. `from` is where the node sat after the batch, `to` its original path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UndoEntry {
    pub from: PathBuf,
    pub to: PathBuf,
    pub status: OpStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UndoReport {
    pub batch_executed_at: DateTime<Local>,
    pub root: PathBuf,
    pub outcome: UndoOutcome,
    pub entries: Vec<UndoEntry>,
}

impl UndoReport {
    pub fn reverted_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == OpStatus::Succeeded)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.entries.len() - self.reverted_count()
    }
}

#[derive(Debug, Clone)]
pub struct UndoJournal {
    path: PathBuf,
}

impl UndoJournal {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Journal under the per-user config directory.
    pub fn open_default() -> Result<Self> {
        Ok(Self::at(app_paths()?.journal_path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_history(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<Option<BatchRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read undo journal: {}", self.path.display()))?;
        let record = serde_json::from_str::<BatchRecord>(&raw)
            .with_context(|| format!("undo journal is corrupt: {}", self.path.display()))?;
        Ok(Some(record))
    }

    /// Stores `record` in full, in batch order, as the batch to undo. A batch that renamed
    /// nothing leaves the previous record in place. Returns whether the record was written.
    pub fn record_batch(&self, record: &BatchRecord) -> Result<bool> {
        if record.succeeded_count() == 0 {
            log::debug!("batch renamed nothing, journal left as is");
            return Ok(false);
        }

        self.write(record)?;
        log::info!(
            "recorded {} rename(s) for undo in {}",
            record.succeeded_count(),
            self.path.display()
        );
        Ok(true)
    }

    pub fn clear(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        fs::remove_file(&self.path)
            .with_context(|| format!("cannot remove undo journal: {}", self.path.display()))
    }

    pub fn undo(&self) -> Result<UndoReport> {
        self.undo_with(&StdFs)
    }

    pub fn undo_with(&self, fs: &dyn RenameFs) -> Result<UndoReport> {
        let record = self.load()?.ok_or(EngineError::NoHistory)?;
        let applied: Vec<&BatchEntry> = record.entries.iter().filter(|e| e.succeeded()).collect();
        if applied.is_empty() {
            self.clear()?;
            return Err(EngineError::NoHistory.into());
        }

        log::info!(
            "undoing {} rename(s) from batch at {}",
            applied.len(),
            record.executed_at.format("%Y-%m-%d %H:%M:%S")
        );

        let mut entries = Vec::with_capacity(applied.len());
        let mut outstanding = Vec::new();
        for entry in applied.iter().rev() {
            let status = revert(entry, fs);
            if status != OpStatus::Succeeded {
                outstanding.push((*entry).clone());
            }
            entries.push(UndoEntry {
                from: entry.destination.clone(),
                to: entry.source.clone(),
                status,
            });
        }

        let outcome = if outstanding.is_empty() {
            UndoOutcome::FullyReverted
        } else if outstanding.len() == applied.len() {
            UndoOutcome::Failed
        } else {
            UndoOutcome::PartiallyReverted
        };

        match outcome {
            UndoOutcome::FullyReverted => self.clear()?,
            UndoOutcome::PartiallyReverted => {
                // Journal keeps only what is still applied, in the original order.
                outstanding.reverse();
                self.write(&BatchRecord {
                    entries: outstanding,
                    ..record.clone()
                })?;
            }
            UndoOutcome::Failed => {}
        }

        let report = UndoReport {
            batch_executed_at: record.executed_at,
            root: record.root,
            outcome,
            entries,
        };
        log::info!(
            "undo finished: {} reverted, {} failed",
            report.reverted_count(),
            report.failed_count()
        );
        Ok(report)
    }

    fn write(&self, record: &BatchRecord) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create journal folder: {}", dir.display()))?;

        let body =
            serde_json::to_string_pretty(record).context("cannot serialize undo journal")?;
        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("cannot create temp file in {}", dir.display()))?;
        temp.write_all(body.as_bytes())
            .context("cannot write undo journal")?;
        temp.persist(&self.path)
            .map_err(|err| err.error)
            .with_context(|| format!("cannot save undo journal: {}", self.path.display()))?;
        Ok(())
    }
}

fn revert(entry: &BatchEntry, fs: &dyn RenameFs) -> OpStatus {
    if !fs.exists(&entry.destination) {
        log::warn!("renamed node is gone: {}", entry.destination.display());
        return OpStatus::Failed(FailureReason::Disappeared);
    }
    if fs.exists(&entry.source) && !fs.same_node(&entry.destination, &entry.source) {
        log::warn!("original path is taken: {}", entry.source.display());
        return OpStatus::Failed(FailureReason::DestinationOccupied);
    }
    match fs.rename(&entry.destination, &entry.source) {
        Ok(()) => {
            log::debug!(
                "{} -> {}",
                entry.destination.display(),
                entry.source.display()
            );
            OpStatus::Succeeded
        }
        Err(err) => {
            log::error!(
                "undo failed: {} -> {}: {err}",
                entry.destination.display(),
                entry.source.display()
            );
            OpStatus::Failed(FailureReason::from_io(&err))
        }
    }
}
