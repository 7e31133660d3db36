// src/engine/queue.rs

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use super::{RunKey, RunRequest};
use crate::types::TaskName;

/// What happened to a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitDecision {
    /// None of the requested tasks was running; dispatch now.
    Dispatch,
    /// Some requested task is in flight; a re-run is now pending.
    Queued,
    /// A re-run for the same targets was already pending; this submission
    /// was folded into it.
    Coalesced,
}

/// Tracks which task names are claimed by in-flight runs and the re-runs
/// waiting behind them.
///
/// Semantics:
/// - A task name belongs to at most one in-flight run. A request is
///   dispatched only when none of its targets is claimed.
/// - At most one re-run per key is pending. Any number of submissions for
///   the same targets collapse into that single re-run.
/// - When a run finishes, its names are released and every pending re-run
///   that no longer overlaps a running one is dispatched, oldest first.
#[derive(Debug, Default)]
pub struct RunQueue {
    running: HashSet<RunKey>,
    busy: HashSet<TaskName>,
    /// One entry per key, in the order the first submission arrived.
    pending: VecDeque<RunRequest>,
}

impl RunQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self, key: &RunKey) -> bool {
        self.running.contains(key)
    }

    /// Whether task `name` is claimed by an in-flight run.
    pub fn is_busy(&self, name: &str) -> bool {
        self.busy.contains(name)
    }

    pub fn running_len(&self) -> usize {
        self.running.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Nothing in flight and nothing pending.
    pub fn is_idle(&self) -> bool {
        self.running.is_empty() && self.pending.is_empty()
    }

    /// Record a submission. On [`SubmitDecision::Dispatch`] the request's
    /// names are claimed and the caller must dispatch `request`.
    pub fn submit(&mut self, request: &RunRequest) -> SubmitDecision {
        if let Some(existing) = self
            .pending
            .iter_mut()
            .find(|p| p.targets == request.targets)
        {
            // Latest reason wins; the targets are identical by definition.
            existing.reason = request.reason;
            debug!(key = ?request.targets, "re-run already pending; coalesced");
            return SubmitDecision::Coalesced;
        }

        if self.overlaps_running(request) {
            debug!(key = ?request.targets, "targets busy; queued one re-run");
            self.pending.push_back(request.clone());
            return SubmitDecision::Queued;
        }

        debug!(key = ?request.targets, "targets idle; dispatching");
        self.claim(request);
        SubmitDecision::Dispatch
    }

    /// Mark the run for `key` finished and release its names. Returns the
    /// pending re-runs that can start now; they are already claimed.
    pub fn finish(&mut self, key: &RunKey) -> Vec<RunRequest> {
        if self.running.remove(key) {
            for name in key {
                self.busy.remove(name);
            }
        } else {
            debug!(key = ?key, "finish for a key that was not running");
        }

        let mut ready = Vec::new();
        let mut waiting = VecDeque::with_capacity(self.pending.len());
        while let Some(next) = self.pending.pop_front() {
            if self.overlaps_running(&next) {
                waiting.push_back(next);
            } else {
                self.claim(&next);
                ready.push(next);
            }
        }
        self.pending = waiting;
        ready
    }

    /// Drop every pending re-run, returning how many were dropped.
    pub fn clear_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    fn overlaps_running(&self, request: &RunRequest) -> bool {
        request.targets.iter().any(|t| self.busy.contains(t))
    }

    fn claim(&mut self, request: &RunRequest) {
        self.busy.extend(request.targets.iter().cloned());
        self.running.insert(request.key());
    }
}
