// src/registry/plan.rs

use std::sync::Arc;

use crate::registry::definition::AtomicTask;
use crate::types::TaskName;

/// Ordered sequence of atomic tasks produced by resolving one or more
/// requested task names. Immutable once built.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    targets: Vec<TaskName>,
    actions: Vec<Arc<AtomicTask>>,
}

/// One unit of a plan walk: a single action, or two or more adjacent
/// `parallel` actions that run concurrently.
#[derive(Debug, Clone, Copy)]
pub enum PlanGroup<'a> {
    Single(&'a Arc<AtomicTask>),
    Parallel(&'a [Arc<AtomicTask>]),
}

impl<'a> PlanGroup<'a> {
    pub fn tasks(&self) -> &'a [Arc<AtomicTask>] {
        match self {
            PlanGroup::Single(t) => std::slice::from_ref(*t),
            PlanGroup::Parallel(ts) => ts,
        }
    }
}

impl ExecutionPlan {
    pub(crate) fn new(targets: Vec<TaskName>, actions: Vec<Arc<AtomicTask>>) -> Self {
        Self { targets, actions }
    }

    /// The task names this plan was resolved from.
    pub fn targets(&self) -> &[TaskName] {
        &self.targets
    }

    pub fn actions(&self) -> &[Arc<AtomicTask>] {
        &self.actions
    }

    /// Names of the atomic tasks, in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Split the plan into execution groups. Runs of two or more consecutive
    /// `parallel` actions become one [`PlanGroup::Parallel`]; everything
    /// else, including a lone `parallel` action, is a [`PlanGroup::Single`].
    pub fn groups(&self) -> Vec<PlanGroup<'_>> {
        let mut groups = Vec::new();
        let mut i = 0;

        while i < self.actions.len() {
            if self.actions[i].parallel {
                let start = i;
                while i < self.actions.len() && self.actions[i].parallel {
                    i += 1;
                }
                if i - start >= 2 {
                    groups.push(PlanGroup::Parallel(&self.actions[start..i]));
                } else {
                    groups.push(PlanGroup::Single(&self.actions[start]));
                }
            } else {
                groups.push(PlanGroup::Single(&self.actions[i]));
                i += 1;
            }
        }

        groups
    }
}
