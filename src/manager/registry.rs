//! The authoritative store of task state.
//!
//! The registry holds two partitions: *active* (non-terminal tasks,
//! unbounded) and *history* (terminal tasks, bounded, oldest evicted
//! first by completion order). It is the only shared mutable structure in
//! the manager; callers go through the manager's mutex and readers only
//! ever receive copies.

use super::error::SubmitError;
use super::record::{TaskOutcome, TaskRecord};
use super::task::{TaskId, TaskStatus};
use crate::diagnostics::{RegistrySnapshot, TaskView};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// State tracked for a live (non-terminal) task.
pub(crate) struct ActiveEntry {
    pub record: TaskRecord,
    pub token: CancellationToken,
    pub status_tx: watch::Sender<TaskStatus>,
    pub join: Option<JoinHandle<()>>,
}

pub(crate) struct Registry {
    active: HashMap<TaskId, ActiveEntry>,
    /// Names of live tasks, for submit-time deduplication.
    names: HashMap<String, TaskId>,
    /// Terminal tasks in completion order, oldest at the front.
    history: VecDeque<TaskRecord>,
    history_limit: usize,
    /// Publishes the active partition size; shutdown waits on this.
    count_tx: watch::Sender<usize>,
}

impl Registry {
    pub fn new(history_limit: usize) -> Self {
        let (count_tx, _) = watch::channel(0);
        Self {
            active: HashMap::new(),
            names: HashMap::new(),
            history: VecDeque::new(),
            history_limit,
            count_tx,
        }
    }

    /// Returns a receiver tracking the number of active tasks.
    pub fn subscribe_active_count(&self) -> watch::Receiver<usize> {
        self.count_tx.subscribe()
    }

    /// Registers a new task, rejecting duplicates of a live name.
    pub fn try_insert(
        &mut self,
        record: TaskRecord,
        token: CancellationToken,
        status_tx: watch::Sender<TaskStatus>,
    ) -> Result<(), SubmitError> {
        if self.names.contains_key(&record.name) {
            return Err(SubmitError::AlreadyRunning {
                name: record.name.clone(),
            });
        }
        self.names.insert(record.name.clone(), record.id);
        self.active.insert(
            record.id,
            ActiveEntry {
                record,
                token,
                status_tx,
                join: None,
            },
        );
        self.publish_count();
        Ok(())
    }

    /// Stores the worker's join handle once it has been spawned.
    pub fn attach_join(&mut self, id: TaskId, join: JoinHandle<()>) {
        if let Some(entry) = self.active.get_mut(&id) {
            entry.join = Some(join);
        }
    }

    /// Transitions a task to `Running`.
    pub fn mark_running(&mut self, id: TaskId) -> bool {
        match self.active.get_mut(&id) {
            Some(entry) => {
                entry.record.mark_running();
                entry.status_tx.send_replace(TaskStatus::Running);
                true
            }
            None => false,
        }
    }

    /// Overwrites the progress message of a live task.
    pub fn set_progress(&mut self, id: TaskId, message: String) -> bool {
        match self.active.get_mut(&id) {
            Some(entry) => {
                entry.record.progress = Some(message);
                true
            }
            None => false,
        }
    }

    /// Returns the cancellation token of a live task.
    pub fn token_for(&self, id: TaskId) -> Option<CancellationToken> {
        self.active.get(&id).map(|entry| entry.token.clone())
    }

    /// Returns the tokens of every live task.
    pub fn active_tokens(&self) -> Vec<CancellationToken> {
        self.active.values().map(|e| e.token.clone()).collect()
    }

    /// Returns the ids of every live task.
    pub fn active_ids(&self) -> Vec<TaskId> {
        self.active.keys().copied().collect()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Applies a terminal transition and moves the task into history.
    ///
    /// The status, outcome, end timestamp and history eviction all happen
    /// inside this call, under the caller's lock, so a snapshot can never
    /// observe a terminal status without its outcome or an over-full
    /// history partition. Returns the finalized record for notification
    /// purposes, or `None` if the task is not live.
    pub fn complete(
        &mut self,
        id: TaskId,
        status: TaskStatus,
        outcome: TaskOutcome,
        elapsed: Duration,
    ) -> Option<TaskRecord> {
        let mut entry = self.active.remove(&id)?;
        let cancel_requested = entry.token.is_cancelled();
        entry
            .record
            .finalize(status, outcome, elapsed, cancel_requested);

        if self.names.get(&entry.record.name) == Some(&id) {
            self.names.remove(&entry.record.name);
        }

        entry.status_tx.send_replace(status);

        self.history.push_back(entry.record.clone());
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }

        self.publish_count();
        Some(entry.record)
    }

    /// Flags every remaining live task as having outlived the shutdown
    /// budget. When `abandon` is set, their workers are aborted as well.
    pub fn flag_shutdown_timeouts(&mut self, abandon: bool) -> Vec<TaskId> {
        let mut flagged = Vec::new();
        for entry in self.active.values_mut() {
            entry.record.timed_out_during_shutdown = true;
            entry.record.cancel_requested = true;
            if abandon {
                if let Some(join) = entry.join.take() {
                    join.abort();
                }
            }
            flagged.push(entry.record.id);
        }
        flagged.sort();
        flagged
    }

    /// Drops the history partition. Active tasks are untouched.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Builds an immutable snapshot of both partitions.
    ///
    /// Active tasks are ordered by start time ascending; history by
    /// completion time descending (most recent first).
    pub fn snapshot(&self) -> RegistrySnapshot {
        let mut active: Vec<TaskView> = self.active.values().map(view_of_entry).collect();
        active.sort_by_key(|view| (view.started_at.unwrap_or(view.submitted_at), view.id));

        let history: Vec<TaskView> = self.history.iter().rev().map(view_of_record).collect();

        RegistrySnapshot { active, history }
    }

    /// Finds tasks by name across both partitions, most recent first.
    pub fn find_by_name(&self, name: &str) -> Vec<TaskView> {
        let mut views: Vec<TaskView> = self
            .active
            .values()
            .filter(|entry| entry.record.name == name)
            .map(view_of_entry)
            .chain(
                self.history
                    .iter()
                    .filter(|record| record.name == name)
                    .map(view_of_record),
            )
            .collect();
        views.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        views
    }

    fn publish_count(&self) {
        self.count_tx.send_replace(self.active.len());
    }
}

/// Copies a live entry into a view; cancellation state comes from the
/// token, which is the source of truth while the task runs.
fn view_of_entry(entry: &ActiveEntry) -> TaskView {
    let mut view = view_of_record(&entry.record);
    view.cancel_requested = entry.token.is_cancelled();
    view
}

fn view_of_record(record: &TaskRecord) -> TaskView {
    let (output, failure) = match &record.outcome {
        Some(TaskOutcome::Finished(output)) => (Some(output.clone()), None),
        Some(TaskOutcome::Failed(failure)) => (None, Some(failure.clone())),
        Some(TaskOutcome::Cancelled) | None => (None, None),
    };

    TaskView {
        id: record.id,
        name: record.name.clone(),
        tags: record.tags.clone(),
        status: record.status,
        progress: record.progress.clone(),
        submitted_at: record.submitted_at,
        started_at: record.started_at,
        ended_at: record.ended_at,
        duration: record.duration,
        output,
        failure,
        cancel_requested: record.cancel_requested,
        timed_out_during_shutdown: record.timed_out_during_shutdown,
    }
}
