// src/watch/watcher.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{RunRequest, RuntimeEvent};
use crate::events::{BuildEvent, EventSink};
use crate::types::TriggerReason;
use crate::watch::debounce::{Debouncer, DueTrigger};
use crate::watch::path_utils::slash_relative;
use crate::watch::patterns::WatchProfile;

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. Dropping the handle
/// stops watching and aborts triggers still waiting out their debounce
/// window; runs already submitted are unaffected.
pub struct WatcherHandle {
    inner: Option<RecommendedWatcher>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish_non_exhaustive()
    }
}

impl WatcherHandle {
    /// Stop watching and wait for the event loop to wind down.
    pub async fn stop(mut self) {
        // Dropping the notify watcher closes the event channel, which ends
        // the loop below.
        self.inner.take();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "watcher event loop aborted");
            }
        }
    }
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Spawn a filesystem watcher that observes `root` recursively and submits
/// each rule's tasks once its debounce window closes.
///
/// - `root` is the project root against which all glob patterns are
///   evaluated.
/// - `profiles` are the compiled `[watch.<id>]` rules.
/// - `runtime_tx` is the submission channel into the runtime.
/// - `sink` receives `Reload` events for live-reload rules.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    profiles: Vec<WatchProfile>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    sink: EventSink,
) -> Result<WatcherHandle> {
    let root = root.into();
    // Canonicalize once so relativising notify paths is stable.
    let root = root.canonicalize().unwrap_or(root);

    // Channel from the blocking notify callback into the async world.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                // Fails only once the event loop is gone.
                let _ = event_tx.send(event);
            }
            Err(err) => {
                eprintln!("buildwatch: file watch error: {err}");
            }
        },
        Config::default(),
    )
    .context("creating file watcher")?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("watching {:?}", root))?;

    info!(root = ?root, rules = profiles.len(), "file watcher started");

    let task = tokio::spawn(event_loop(root, profiles, event_rx, runtime_tx, sink));

    Ok(WatcherHandle {
        inner: Some(watcher),
        task: Some(task),
    })
}

async fn event_loop(
    root: PathBuf,
    profiles: Vec<WatchProfile>,
    mut event_rx: mpsc::UnboundedReceiver<Event>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    sink: EventSink,
) {
    let by_id: HashMap<&str, &WatchProfile> = profiles.iter().map(|p| (p.id(), p)).collect();
    let mut debouncer = Debouncer::new();

    loop {
        let deadline = debouncer.next_deadline();

        tokio::select! {
            maybe_event = event_rx.recv() => {
                let Some(event) = maybe_event else {
                    let aborted = debouncer.cancel_all();
                    debug!(aborted, "watcher stopped; pending triggers aborted");
                    break;
                };
                record_event(&mut debouncer, &root, &profiles, event);
            }
            _ = sleep_until(deadline) => {
                for due in debouncer.take_due(Instant::now()) {
                    let Some(profile) = by_id.get(due.rule.as_str()) else {
                        continue;
                    };
                    if !fire(profile, due, &runtime_tx, &sink).await {
                        info!("runtime gone; stopping watcher loop");
                        return;
                    }
                }
            }
        }
    }

    debug!("watcher event loop finished");
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(tokio::time::Instant::from_std(d)).await,
        None => std::future::pending().await,
    }
}

/// Feed one raw notify event into the debouncer.
fn record_event(debouncer: &mut Debouncer, root: &Path, profiles: &[WatchProfile], event: Event) {
    if !is_relevant_event_kind(&event.kind) {
        return;
    }

    let now = Instant::now();
    for path in &event.paths {
        let Some(rel) = slash_relative(root, path) else {
            debug!(path = ?path, "event outside project root; ignoring");
            continue;
        };

        for profile in profiles.iter().filter(|p| p.matches(&rel)) {
            if debouncer.record(profile.id(), &rel, now, profile.debounce()) {
                debug!(rule = %profile.id(), path = %rel, "change detected");
            }
        }
    }
}

/// Act on a rule whose window closed. Returns `false` if the runtime is
/// no longer accepting submissions.
async fn fire(
    profile: &WatchProfile,
    due: DueTrigger,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
    sink: &EventSink,
) -> bool {
    info!(
        rule = %profile.id(),
        events = due.events,
        paths = ?due.paths,
        "watch rule triggered"
    );

    if profile.livereload() {
        sink.emit(BuildEvent::Reload {
            paths: due.paths.clone(),
        });
    }

    if profile.tasks().is_empty() {
        return true;
    }

    let request = RunRequest::new(profile.tasks().iter().cloned(), TriggerReason::FileWatch);
    runtime_tx.send(RuntimeEvent::Submit(request)).await.is_ok()
}
