use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use buildwatch::engine::{RunKey, RunRequest, RuntimeEvent};
use buildwatch::errors::Result;
use buildwatch::exec::RunBackend;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// A fake backend that:
/// - records every dispatched request
/// - reports `RunFinished` for it from a spawned task, failing the keys
///   listed in `failing`.
pub struct FakeBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    dispatched: Arc<Mutex<Vec<RunRequest>>>,
    failing: HashSet<RunKey>,
    runs: JoinSet<()>,
}

impl FakeBackend {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        dispatched: Arc<Mutex<Vec<RunRequest>>>,
    ) -> Self {
        Self {
            runtime_tx,
            dispatched,
            failing: HashSet::new(),
            runs: JoinSet::new(),
        }
    }

    pub fn failing(mut self, key: &[&str]) -> Self {
        self.failing
            .insert(key.iter().map(|s| s.to_string()).collect());
        self
    }
}

impl RunBackend for FakeBackend {
    fn dispatch(
        &mut self,
        request: RunRequest,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.dispatched.lock().unwrap().push(request.clone());

            let key = request.key();
            let succeeded = !self.failing.contains(&key);
            let tx = self.runtime_tx.clone();
            self.runs.spawn(async move {
                let _ = tx.send(RuntimeEvent::RunFinished { key, succeeded }).await;
            });
            Ok(())
        })
    }

    fn drain(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move { while self.runs.join_next().await.is_some() {} })
    }
}
