// tests/runtime_core.rs

use std::sync::{Arc, Mutex};

use buildwatch::engine::{
    CoreCommand, CoreRuntime, RunQueue, RunRequest, Runtime, RuntimeEvent, RuntimeOptions,
    RuntimeSummary, SubmitDecision,
};
use buildwatch::types::TriggerReason;
use buildwatch_test_utils::fake_backend::FakeBackend;
use buildwatch_test_utils::{init_tracing, with_timeout};
use tokio::sync::mpsc;

fn key(targets: &[&str]) -> Vec<String> {
    targets.iter().map(|s| s.to_string()).collect()
}

fn watch(targets: &[&str]) -> RunRequest {
    RunRequest::new(targets.iter().copied(), TriggerReason::FileWatch)
}

#[test]
fn queue_keeps_one_run_and_one_rerun_per_key() {
    let mut q = RunQueue::new();
    let js = watch(&["lint", "concat"]);

    assert_eq!(q.submit(&js), SubmitDecision::Dispatch);
    assert_eq!(q.submit(&js), SubmitDecision::Queued);
    assert_eq!(q.submit(&js), SubmitDecision::Coalesced);
    assert_eq!((q.running_len(), q.pending_len()), (1, 1));

    let next = q.finish(&js.key());
    assert_eq!(next.iter().map(|r| r.key()).collect::<Vec<_>>(), vec![js.key()]);
    assert!(q.is_running(&js.key()));
    assert_eq!(q.pending_len(), 0);

    assert!(q.finish(&js.key()).is_empty());
    assert!(q.is_idle());
}

#[test]
fn coalesced_rerun_takes_the_latest_reason() {
    let mut q = RunQueue::new();
    q.submit(&RunRequest::manual(["build"]));
    q.submit(&watch(&["build"]));
    q.submit(&RunRequest::manual(["build"]));

    let next = q.finish(&key(&["build"]));
    assert_eq!(next.len(), 1);
    assert_eq!(next[0].reason, TriggerReason::Manual);
}

#[test]
fn disjoint_targets_run_side_by_side() {
    let mut q = RunQueue::new();
    assert_eq!(q.submit(&watch(&["sass"])), SubmitDecision::Dispatch);
    assert_eq!(q.submit(&watch(&["js"])), SubmitDecision::Dispatch);
    assert_eq!(q.submit(&watch(&["php", "img"])), SubmitDecision::Dispatch);
    assert_eq!(q.running_len(), 3);
}

#[test]
fn shared_task_name_blocks_overlapping_targets() {
    let mut q = RunQueue::new();
    assert_eq!(q.submit(&watch(&["js", "css"])), SubmitDecision::Dispatch);
    assert!(q.is_busy("js") && q.is_busy("css"));

    assert_eq!(q.submit(&watch(&["js"])), SubmitDecision::Queued);
    assert_eq!(q.submit(&watch(&["css", "js"])), SubmitDecision::Queued);
    assert_eq!(q.submit(&watch(&["js"])), SubmitDecision::Coalesced);
    assert_eq!(q.running_len(), 1);

    // Both waiters want `js`; only the older one starts.
    let started = q.finish(&key(&["js", "css"]));
    assert_eq!(started.iter().map(|r| r.key()).collect::<Vec<_>>(), vec![key(&["js"])]);
    assert!(q.is_busy("js"));
    assert!(!q.is_busy("css"));
    assert_eq!(q.pending_len(), 1);

    let started = q.finish(&key(&["js"]));
    assert_eq!(
        started.iter().map(|r| r.key()).collect::<Vec<_>>(),
        vec![key(&["css", "js"])]
    );

    assert!(q.finish(&key(&["css", "js"])).is_empty());
    assert!(q.is_idle());
}

#[test]
fn one_finish_can_release_several_waiters() {
    let mut q = RunQueue::new();
    q.submit(&watch(&["js", "css"]));
    assert_eq!(q.submit(&watch(&["js"])), SubmitDecision::Queued);
    assert_eq!(q.submit(&watch(&["css"])), SubmitDecision::Queued);

    let started = q.finish(&key(&["js", "css"]));
    assert_eq!(
        started.iter().map(|r| r.key()).collect::<Vec<_>>(),
        vec![key(&["js"]), key(&["css"])]
    );
    assert_eq!(q.running_len(), 2);
}

#[test]
fn core_dispatches_and_exits_when_idle_in_one_shot_mode() {
    let mut core = CoreRuntime::new(RuntimeOptions {
        exit_when_idle: true,
    });

    let step = core.step(RuntimeEvent::Submit(RunRequest::manual(["build"])));
    assert!(step.keep_running);
    assert_eq!(
        step.commands,
        vec![CoreCommand::Dispatch(RunRequest::manual(["build"]))]
    );

    let step = core.step(RuntimeEvent::RunFinished {
        key: key(&["build"]),
        succeeded: false,
    });
    assert!(!step.keep_running);
    assert_eq!(step.commands, vec![CoreCommand::RequestExit]);
    assert_eq!(
        core.summary(),
        RuntimeSummary {
            runs_succeeded: 0,
            runs_failed: 1,
            runs_dropped: 0,
        }
    );
    assert!(!core.summary().all_succeeded());
}

#[test]
fn core_in_watch_mode_keeps_running_when_idle() {
    let mut core = CoreRuntime::new(RuntimeOptions::default());
    core.step(RuntimeEvent::Submit(watch(&["js"])));
    let step = core.step(RuntimeEvent::RunFinished {
        key: key(&["js"]),
        succeeded: true,
    });
    assert!(step.keep_running);
    assert!(step.commands.is_empty());
    assert!(core.is_idle());
}

#[test]
fn finishing_a_busy_key_dispatches_its_pending_rerun() {
    let mut core = CoreRuntime::new(RuntimeOptions::default());
    core.step(RuntimeEvent::Submit(watch(&["js"])));
    assert!(core.step(RuntimeEvent::Submit(watch(&["js"]))).commands.is_empty());
    assert!(core.step(RuntimeEvent::Submit(watch(&["js"]))).commands.is_empty());

    let step = core.step(RuntimeEvent::RunFinished {
        key: key(&["js"]),
        succeeded: true,
    });
    assert_eq!(step.commands, vec![CoreCommand::Dispatch(watch(&["js"]))]);
    assert_eq!(core.queue().pending_len(), 0);
}

#[test]
fn core_holds_back_a_request_sharing_a_running_task() {
    let mut core = CoreRuntime::new(RuntimeOptions::default());

    let first = core.step(RuntimeEvent::Submit(watch(&["js", "css"])));
    assert_eq!(first.commands.len(), 1);
    let second = core.step(RuntimeEvent::Submit(watch(&["js"])));
    assert!(second.commands.is_empty());
    assert_eq!(core.queue().running_len(), 1);

    let step = core.step(RuntimeEvent::RunFinished {
        key: key(&["js", "css"]),
        succeeded: true,
    });
    assert_eq!(step.commands, vec![CoreCommand::Dispatch(watch(&["js"]))]);
}

#[test]
fn shutdown_drops_pending_and_waits_for_in_flight() {
    let mut core = CoreRuntime::new(RuntimeOptions::default());
    core.step(RuntimeEvent::Submit(watch(&["js"])));
    core.step(RuntimeEvent::Submit(watch(&["js"])));
    core.step(RuntimeEvent::Submit(watch(&["sass"])));
    core.step(RuntimeEvent::Submit(watch(&["sass"])));

    let step = core.step(RuntimeEvent::ShutdownRequested);
    assert!(step.keep_running, "two runs still in flight");
    assert!(core.is_shutting_down());
    assert_eq!(core.summary().runs_dropped, 2);

    // New submissions are ignored once shutting down.
    assert!(core.step(RuntimeEvent::Submit(watch(&["php"]))).commands.is_empty());

    let step = core.step(RuntimeEvent::RunFinished {
        key: key(&["js"]),
        succeeded: true,
    });
    assert!(step.keep_running);
    assert!(step.commands.is_empty(), "dropped re-run must not start");

    let step = core.step(RuntimeEvent::RunFinished {
        key: key(&["sass"]),
        succeeded: true,
    });
    assert!(!step.keep_running);
}

#[test]
fn shutdown_while_idle_exits_immediately() {
    let mut core = CoreRuntime::new(RuntimeOptions::default());
    let step = core.step(RuntimeEvent::ShutdownRequested);
    assert!(!step.keep_running);
    assert_eq!(step.commands, vec![CoreCommand::RequestExit]);
}

#[tokio::test]
async fn burst_of_submissions_yields_one_run_and_one_rerun() {
    init_tracing();
    let (tx, rx) = mpsc::channel(16);
    let dispatched = Arc::new(Mutex::new(Vec::new()));
    let backend = FakeBackend::new(tx.clone(), Arc::clone(&dispatched));

    // Queued before the runtime reads anything, so the first run can't
    // finish between them.
    for _ in 0..3 {
        tx.send(RuntimeEvent::Submit(RunRequest::manual(["build"])))
            .await
            .unwrap();
    }
    drop(tx);

    let core = CoreRuntime::new(RuntimeOptions {
        exit_when_idle: true,
    });
    let summary = with_timeout(Runtime::new(core, rx, backend).run())
        .await
        .unwrap();

    assert_eq!(dispatched.lock().unwrap().len(), 2);
    assert_eq!(summary.runs_succeeded, 2);
    assert!(summary.all_succeeded());
}

#[tokio::test]
async fn failed_runs_are_counted() {
    let (tx, rx) = mpsc::channel(16);
    let dispatched = Arc::new(Mutex::new(Vec::new()));
    let backend = FakeBackend::new(tx.clone(), Arc::clone(&dispatched)).failing(&["lint"]);

    tx.send(RuntimeEvent::Submit(RunRequest::manual(["lint"])))
        .await
        .unwrap();
    drop(tx);

    let core = CoreRuntime::new(RuntimeOptions {
        exit_when_idle: true,
    });
    let summary = with_timeout(Runtime::new(core, rx, backend).run())
        .await
        .unwrap();

    assert_eq!(summary.runs_failed, 1);
    assert!(!summary.all_succeeded());
}

#[tokio::test]
async fn watch_mode_runtime_stops_on_shutdown() {
    let (tx, rx) = mpsc::channel(16);
    let dispatched = Arc::new(Mutex::new(Vec::new()));
    let backend = FakeBackend::new(tx.clone(), Arc::clone(&dispatched));

    let handle = tokio::spawn(Runtime::new(CoreRuntime::default(), rx, backend).run());

    tx.send(RuntimeEvent::Submit(watch(&["js"]))).await.unwrap();
    tx.send(RuntimeEvent::Submit(watch(&["sass"]))).await.unwrap();
    tx.send(RuntimeEvent::ShutdownRequested).await.unwrap();

    let summary = with_timeout(handle).await.unwrap().unwrap();
    let keys: Vec<_> = dispatched.lock().unwrap().iter().map(|r| r.key()).collect();
    assert_eq!(keys, vec![key(&["js"]), key(&["sass"])]);
    assert_eq!(summary.runs_dropped, 0);
}
