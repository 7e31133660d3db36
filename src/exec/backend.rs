// src/exec/backend.rs

//! Pluggable run backend.
//!
//! The runtime hands dispatched runs to a `RunBackend` instead of calling
//! the executor directly, so tests can substitute a fake that records
//! requests and reports completion without running any action.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, warn};

use crate::engine::{RunRequest, RuntimeEvent};
use crate::errors::Result;
use crate::exec::Executor;
use crate::registry::TaskRegistry;

/// How dispatched runs get executed.
///
/// Implementations must eventually send exactly one
/// [`RuntimeEvent::RunFinished`] per dispatched request, otherwise the
/// runtime keeps the key busy forever.
pub trait RunBackend: Send {
    /// Start executing `request`. Must not wait for the run to finish.
    fn dispatch(
        &mut self,
        request: RunRequest,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Wait for every run started by this backend.
    fn drain(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Production backend: resolves the request against the registry and runs
/// the plan on the executor in its own tokio task.
pub struct RealRunBackend {
    registry: Arc<TaskRegistry>,
    executor: Executor,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    runs: JoinSet<()>,
}

impl RealRunBackend {
    pub fn new(
        registry: Arc<TaskRegistry>,
        executor: Executor,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
    ) -> Self {
        Self {
            registry,
            executor,
            runtime_tx,
            runs: JoinSet::new(),
        }
    }
}

impl RunBackend for RealRunBackend {
    fn dispatch(
        &mut self,
        request: RunRequest,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            // Reap finished runs so the set doesn't grow in watch mode.
            while self.runs.try_join_next().is_some() {}

            let key = request.key();
            let plan = self.registry.resolve_all(&request.targets);
            let executor = self.executor.clone();
            let tx = self.runtime_tx.clone();

            self.runs.spawn(async move {
                let succeeded = match plan {
                    Ok(plan) => executor.run(&plan, request.reason).await.succeeded(),
                    Err(err) => {
                        error!(targets = ?request.targets, error = %err, "could not resolve run");
                        false
                    }
                };

                if tx
                    .send(RuntimeEvent::RunFinished { key, succeeded })
                    .await
                    .is_err()
                {
                    warn!("runtime gone before run finished");
                }
            });

            Ok(())
        })
    }

    fn drain(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            while let Some(res) = self.runs.join_next().await {
                if let Err(err) = res {
                    error!(error = %err, "run task aborted");
                }
            }
        })
    }
}
