//! Batch Executor.
//!
//! Applies a plan op by op in plan order. Nothing is rolled back automatically; the
//! returned [`BatchRecord`] says exactly which ops happened so the journal can undo them.

use crate::entry::EntryKind;
use crate::error::FailureReason;
use crate::fs_ops::{RenameFs, StdFs};
use crate::planner::{RenameOp, RenamePlan};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failed op; the rest are not attempted.
    #[default]
    Abort,
    /// Keep going and report every failure at the end.
    Continue,
}

/// Shared flag checked between ops. Cancelling never interrupts a rename in flight.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub policy: FailurePolicy,
    pub cancel: CancelToken,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum OpStatus {
    Succeeded,
    Failed(FailureReason),
    NotAttempted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub kind: EntryKind,
    pub status: OpStatus,
}

impl BatchEntry {
    fn pending(op: &RenameOp) -> Self {
        Self {
            source: op.source.clone(),
            destination: op.destination.clone(),
            kind: op.kind,
            status: OpStatus::NotAttempted,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == OpStatus::Succeeded
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.status {
            OpStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Every op succeeded, including the empty batch.
    Completed,
    /// Some ops succeeded and some did not.
    Partial,
    /// Nothing was renamed.
    Failed,
}

/// What a batch did, in plan order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchRecord {
    pub executed_at: DateTime<Local>,
    pub root: PathBuf,
    pub rule_summary: String,
    #[serde(default)]
    pub cancelled: bool,
    pub entries: Vec<BatchEntry>,
}

impl BatchRecord {
    pub fn succeeded_count(&self) -> usize {
        self.entries.iter().filter(|e| e.succeeded()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.failure().is_some()).count()
    }

    pub fn not_attempted_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == OpStatus::NotAttempted)
            .count()
    }

    pub fn outcome(&self) -> BatchOutcome {
        let succeeded = self.succeeded_count();
        if succeeded == self.entries.len() {
            BatchOutcome::Completed
        } else if succeeded == 0 {
            BatchOutcome::Failed
        } else {
            BatchOutcome::Partial
        }
    }
}

pub fn execute(plan: RenamePlan, policy: FailurePolicy) -> BatchRecord {
    let options = ExecuteOptions {
        policy,
        ..ExecuteOptions::default()
    };
    execute_with(plan, &options, &StdFs)
}

pub fn execute_with(plan: RenamePlan, options: &ExecuteOptions, fs: &dyn RenameFs) -> BatchRecord {
    let rule_summary = plan.rule().summary();
    let (_, root, ops) = plan.into_ops();
    let mut entries: Vec<BatchEntry> = ops.iter().map(BatchEntry::pending).collect();
    let mut cancelled = false;

    log::info!("executing {} rename(s) under {}", ops.len(), root.display());

    for (index, op) in ops.iter().enumerate() {
        if options.cancel.is_cancelled() {
            log::warn!(
                "batch cancelled, {} rename(s) not attempted",
                ops.len() - index
            );
            cancelled = true;
            break;
        }

        let status = apply_op(op, fs);
        let stop = match &status {
            OpStatus::Failed(FailureReason::Disappeared) => false,
            OpStatus::Failed(_) => options.policy == FailurePolicy::Abort,
            _ => false,
        };
        entries[index].status = status;

        if stop {
            log::warn!(
                "aborting batch after failure, {} rename(s) not attempted",
                ops.len() - index - 1
            );
            break;
        }
    }

    let record = BatchRecord {
        executed_at: Local::now(),
        root,
        rule_summary,
        cancelled,
        entries,
    };
    log::info!(
        "batch finished: {} succeeded, {} failed, {} not attempted",
        record.succeeded_count(),
        record.failed_count(),
        record.not_attempted_count()
    );
    record
}

fn apply_op(op: &RenameOp, fs: &dyn RenameFs) -> OpStatus {
    // The tree may have changed since planning.
    if !fs.exists(&op.source) {
        log::warn!("source disappeared: {}", op.source.display());
        return OpStatus::Failed(FailureReason::Disappeared);
    }
    if fs.exists(&op.destination) && !fs.same_node(&op.source, &op.destination) {
        log::warn!(
            "destination appeared since planning: {}",
            op.destination.display()
        );
        return OpStatus::Failed(FailureReason::DestinationOccupied);
    }

    match fs.rename(&op.source, &op.destination) {
        Ok(()) => {
            log::debug!("{} -> {}", op.source.display(), op.destination.display());
            OpStatus::Succeeded
        }
        Err(err) => {
            let reason = FailureReason::from_io(&err);
            log::error!(
                "rename failed: {} -> {}: {err}",
                op.source.display(),
                op.destination.display()
            );
            OpStatus::Failed(reason)
        }
    }
}
