// src/registry/resolve.rs

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::errors::{BuildwatchError, Result};
use crate::registry::definition::{AtomicTask, TaskDefinition};
use crate::registry::plan::ExecutionPlan;
use crate::types::TaskName;

/// Depth-first flattening of composite tasks into an ordered list of atomic
/// actions.
///
/// `in_progress` holds the chain of composites currently being expanded;
/// meeting one of them again means the definitions are cyclic. Idempotent
/// atomic tasks are kept only at their first occurrence across the whole
/// plan, every other repeat is kept as-is.
struct Resolver<'a> {
    tasks: &'a BTreeMap<TaskName, TaskDefinition>,
    in_progress: Vec<TaskName>,
    seen_idempotent: HashSet<TaskName>,
    out: Vec<Arc<AtomicTask>>,
}

impl<'a> Resolver<'a> {
    fn visit(&mut self, name: &str) -> Result<()> {
        let def = self
            .tasks
            .get(name)
            .ok_or_else(|| BuildwatchError::UnknownTask(name.to_string()))?;

        match def {
            TaskDefinition::Atomic(task) => {
                if task.idempotent && !self.seen_idempotent.insert(task.name.clone()) {
                    trace!(task = %name, "dropping repeated idempotent task");
                    return Ok(());
                }
                self.out.push(Arc::clone(task));
            }
            TaskDefinition::Composite(composite) => {
                if let Some(pos) = self.in_progress.iter().position(|n| n == name) {
                    let mut cycle = self.in_progress[pos..].to_vec();
                    cycle.push(name.to_string());
                    return Err(BuildwatchError::CyclicTask(cycle));
                }

                self.in_progress.push(name.to_string());
                for member in &composite.members {
                    self.visit(member)?;
                }
                self.in_progress.pop();
            }
        }

        Ok(())
    }
}

/// Resolve `targets`, in order, into a single plan.
pub(crate) fn resolve_targets(
    tasks: &BTreeMap<TaskName, TaskDefinition>,
    targets: &[TaskName],
) -> Result<ExecutionPlan> {
    let mut resolver = Resolver {
        tasks,
        in_progress: Vec::new(),
        seen_idempotent: HashSet::new(),
        out: Vec::new(),
    };

    for target in targets {
        resolver.visit(target)?;
    }

    debug!(
        targets = ?targets,
        actions = resolver.out.len(),
        "resolved execution plan"
    );

    Ok(ExecutionPlan::new(targets.to_vec(), resolver.out))
}
