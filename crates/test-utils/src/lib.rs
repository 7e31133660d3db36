pub mod builders;
pub mod fake_actions;
pub mod fake_backend;

use std::path::PathBuf;
use std::sync::{Arc, Once};

use buildwatch::cache::ChangeCache;
use buildwatch::events::{BuildEvent, EventSink};
use buildwatch::exec::{Executor, ExecutorSettings};
use buildwatch::fs::FileSystem;
use buildwatch::fs::mock::MockFileSystem;
use tokio::sync::broadcast;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// An executor over an in-memory tree rooted at `"."`.
pub struct MockHarness {
    pub fs: MockFileSystem,
    pub cache: Arc<ChangeCache>,
    pub sink: EventSink,
    pub executor: Executor,
}

impl MockHarness {
    pub fn new(settings: ExecutorSettings) -> Self {
        let fs = MockFileSystem::new();
        let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
        let cache = Arc::new(ChangeCache::new(Arc::clone(&shared)));
        let sink = EventSink::default();
        let executor = Executor::new(
            PathBuf::from("."),
            shared,
            Arc::clone(&cache),
            sink.clone(),
            settings,
        );
        Self {
            fs,
            cache,
            sink,
            executor,
        }
    }

    pub fn with_workers(workers: usize) -> Self {
        Self::new(ExecutorSettings {
            workers,
            ..ExecutorSettings::default()
        })
    }
}

impl Default for MockHarness {
    fn default() -> Self {
        Self::new(ExecutorSettings::default())
    }
}

/// Everything currently buffered on `rx`.
pub fn drain_events(rx: &mut broadcast::Receiver<BuildEvent>) -> Vec<BuildEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
