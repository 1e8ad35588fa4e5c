//! Background worker that runs plan, execute and undo one at a time.
//!
//! Requests return a [`Job`] immediately. While a job is in flight every other request
//! is rejected with [`EngineError::Busy`]; nothing is queued.

use crate::error::EngineError;
use crate::executor::{execute_with, BatchRecord, CancelToken, ExecuteOptions, FailurePolicy};
use crate::fs_ops::{RenameFs, StdFs};
use crate::journal::{UndoJournal, UndoOutcome, UndoReport};
use crate::planner::{build_plan, PlanOptions, RenamePlan};
use crate::rule::RenameRule;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Empty,
    Planned,
    Executed,
    Undone,
    /// A recorded batch can still be undone, but the tree has moved on since: a newer
    /// plan was built, a batch renamed nothing, or an undo only partly succeeded.
    ExecutedStale,
}

impl BatchState {
    fn has_history(self) -> bool {
        matches!(self, BatchState::Executed | BatchState::ExecutedStale)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanRequest {
    pub root: PathBuf,
    pub rule: RenameRule,
    pub options: PlanOptions,
}

/// Result of an execute job. The renames stand even when the journal write fails.
#[derive(Debug, Clone)]
pub struct ExecuteReport {
    pub record: BatchRecord,
    pub journaled: bool,
    pub journal_error: Option<String>,
}

pub struct Job<T> {
    handle: JoinHandle<Result<T>>,
    cancel: CancelToken,
}

impl<T> Job<T> {
    /// Takes effect before the next rename; the current one always finishes.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn wait(self) -> Result<T> {
        self.handle
            .join()
            .map_err(|_| anyhow::Error::from(EngineError::Worker))?
    }
}

#[derive(Debug)]
struct Session {
    state: BatchState,
    last_request: Option<PlanRequest>,
}

struct Shared {
    busy: AtomicBool,
    session: Mutex<Session>,
    journal: UndoJournal,
    fs: Arc<dyn RenameFs>,
}

impl Shared {
    fn session(&self) -> MutexGuard<'_, Session> {
        // A panicking job must not wedge the engine.
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: BatchState) {
        let mut session = self.session();
        log::debug!("engine state {:?} -> {:?}", session.state, state);
        session.state = state;
    }
}

/// Clears the busy flag when the job ends, including by panic.
struct BusyGuard(Arc<Shared>);

impl BusyGuard {
    fn acquire(shared: &Arc<Shared>) -> Result<Self, EngineError> {
        shared
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| EngineError::Busy)?;
        Ok(Self(Arc::clone(shared)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.busy.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

impl Engine {
    pub fn new(journal: UndoJournal) -> Self {
        Self::with_fs(journal, Arc::new(StdFs))
    }

    pub fn with_fs(journal: UndoJournal, fs: Arc<dyn RenameFs>) -> Self {
        let state = if journal.has_history() {
            BatchState::Executed
        } else {
            BatchState::Empty
        };
        Self {
            shared: Arc::new(Shared {
                busy: AtomicBool::new(false),
                session: Mutex::new(Session {
                    state,
                    last_request: None,
                }),
                journal,
                fs,
            }),
        }
    }

    pub fn state(&self) -> BatchState {
        self.shared.session().state
    }

    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::SeqCst)
    }

    pub fn journal(&self) -> &UndoJournal {
        &self.shared.journal
    }

    pub fn submit_plan(&self, request: PlanRequest) -> Result<Job<RenamePlan>, EngineError> {
        let guard = BusyGuard::acquire(&self.shared)?;
        self.shared.session().last_request = Some(request.clone());
        Ok(self.spawn(guard, CancelToken::new(), move |shared, _| {
            let plan = build_plan(&request.root, &request.rule, &request.options)?;
            let next = if shared.session().state.has_history() || shared.journal.has_history() {
                BatchState::ExecutedStale
            } else {
                BatchState::Planned
            };
            shared.set_state(next);
            Ok(plan)
        }))
    }

    /// Plans again with the most recent request, e.g. after the tree changed.
    pub fn replan_last(&self) -> Result<Job<RenamePlan>, EngineError> {
        let request = self
            .shared
            .session()
            .last_request
            .clone()
            .ok_or(EngineError::NoPreviousPlan)?;
        self.submit_plan(request)
    }

    pub fn submit_execute(
        &self,
        plan: RenamePlan,
        policy: FailurePolicy,
    ) -> Result<Job<ExecuteReport>, EngineError> {
        let guard = BusyGuard::acquire(&self.shared)?;
        let cancel = CancelToken::new();
        Ok(self.spawn(guard, cancel, move |shared, cancel| {
            let options = ExecuteOptions { policy, cancel };
            let record = execute_with(plan, &options, shared.fs.as_ref());

            let (journaled, journal_error) = match shared.journal.record_batch(&record) {
                Ok(written) => (written, None),
                Err(err) => {
                    log::error!("cannot record batch for undo: {err:#}");
                    (false, Some(format!("{err:#}")))
                }
            };

            let next = if journaled {
                BatchState::Executed
            } else if shared.journal.has_history() {
                BatchState::ExecutedStale
            } else {
                BatchState::Empty
            };
            shared.set_state(next);

            Ok(ExecuteReport {
                record,
                journaled,
                journal_error,
            })
        }))
    }

    pub fn submit_undo(&self) -> Result<Job<UndoReport>, EngineError> {
        let guard = BusyGuard::acquire(&self.shared)?;
        if !self.state().has_history() {
            return Err(EngineError::NoHistory);
        }
        Ok(self.spawn(guard, CancelToken::new(), |shared, _| {
            let result = shared.journal.undo_with(shared.fs.as_ref());
            match &result {
                Ok(report) if report.outcome == UndoOutcome::FullyReverted => {
                    shared.set_state(BatchState::Undone)
                }
                Ok(_) => shared.set_state(BatchState::ExecutedStale),
                Err(err)
                    if matches!(
                        err.downcast_ref::<EngineError>(),
                        Some(EngineError::NoHistory)
                    ) =>
                {
                    shared.set_state(BatchState::Empty)
                }
                Err(_) => {}
            }
            result
        }))
    }

    fn spawn<T, F>(&self, guard: BusyGuard, cancel: CancelToken, work: F) -> Job<T>
    where
        T: Send + 'static,
        F: FnOnce(&Shared, CancelToken) -> Result<T> + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        let token = cancel.clone();
        let handle = thread::spawn(move || {
            let _guard = guard;
            work(shared.as_ref(), token)
        });
        Job { handle, cancel }
    }
}
