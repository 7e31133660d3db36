// src/lib.rs

pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod registry;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::ChangeCache;
use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_and_validate};
use crate::engine::{CoreRuntime, RunRequest, Runtime, RuntimeEvent, RuntimeOptions};
use crate::errors::{Result, exit_code};
use crate::events::EventSink;
use crate::events::console::spawn_console_reporter;
use crate::exec::{Executor, ExecutorSettings, RealRunBackend};
use crate::fs::{FileSystem, RealFileSystem};
use crate::registry::{ExecutionPlan, PlanGroup, TaskDefinition, TaskRegistry};
use crate::watch::{build_watch_profiles, spawn_watcher};

/// How long to wait for the console reporter to flush after the last run.
const REPORTER_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading and the task registry
/// - executor, change cache and event sink
/// - runtime core + shell
/// - (watch mode) the file watcher
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let registry = Arc::new(TaskRegistry::from_config(&cfg)?);

    if args.list {
        print_listing(&registry, &cfg);
        return Ok(exit_code::SUCCESS);
    }

    let one_shot = args.one_shot_task().map(str::to_string);

    // Resolve up front so unknown tasks and cycles fail before anything runs.
    let initial_plan = match &one_shot {
        Some(task) => Some(registry.resolve(task)?),
        None => None,
    };

    if args.dry_run {
        print_dry_run(&registry, &cfg, initial_plan.as_ref())?;
        return Ok(exit_code::SUCCESS);
    }

    let root = config_root_dir(&config_path);
    info!(root = ?root, config = ?config_path, "starting buildwatch");

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let sink = EventSink::default();
    let reporter = spawn_console_reporter(sink.subscribe());
    let cache = Arc::new(ChangeCache::new(Arc::clone(&fs)));
    let settings = ExecutorSettings::from_settings(cfg.settings(), args.workers);
    debug!(workers = settings.workers, timeout = ?settings.action_timeout, "executor settings");
    let executor = Executor::new(root.clone(), fs, cache, sink.clone(), settings);

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let backend = RealRunBackend::new(Arc::clone(&registry), executor, rt_tx.clone());

    let watcher = if one_shot.is_none() {
        let profiles = build_watch_profiles(&cfg)?;
        if profiles.is_empty() {
            warn!("no [watch.*] rules configured; waiting for Ctrl-C");
        }
        Some(spawn_watcher(&root, profiles, rt_tx.clone(), sink.clone())?)
    } else {
        None
    };

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    if let Some(plan) = &initial_plan {
        rt_tx
            .send(RuntimeEvent::Submit(RunRequest::manual(plan.targets().iter().cloned())))
            .await
            .map_err(|e| anyhow!("submitting initial run: {e}"))?;
    }
    drop(rt_tx);

    let core = CoreRuntime::new(RuntimeOptions {
        exit_when_idle: one_shot.is_some(),
    });
    let summary = Runtime::new(core, rt_rx, backend).run().await?;

    if let Some(watcher) = watcher {
        watcher.stop().await;
    }

    // The reporter ends once the last sink clone is gone.
    drop(sink);
    if tokio::time::timeout(REPORTER_FLUSH_TIMEOUT, reporter)
        .await
        .is_err()
    {
        warn!("console reporter did not finish in time");
    }

    if one_shot.is_some() && !summary.all_succeeded() {
        return Ok(exit_code::TASK_FAILED);
    }
    Ok(exit_code::SUCCESS)
}

/// Figure out the project root.
///
/// - If the config path has a non-empty parent (e.g. "site/Buildwatch.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Buildwatch.toml" (parent = ""),
///   we fall back to the current working directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    let root = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    root.canonicalize().unwrap_or(root)
}

fn describe(def: &TaskDefinition) -> String {
    match def {
        TaskDefinition::Atomic(task) => {
            let mut flags = Vec::new();
            if task.parallel {
                flags.push("parallel");
            }
            if task.idempotent {
                flags.push("idempotent");
            }
            if task.changed {
                flags.push("changed");
            }
            if !task.options.fail_on_error {
                flags.push("no-fail");
            }
            if flags.is_empty() {
                task.action.kind().to_string()
            } else {
                format!("{} [{}]", task.action.kind(), flags.join(", "))
            }
        }
        TaskDefinition::Composite(composite) => format!("-> {}", composite.members.join(", ")),
    }
}

fn print_listing(registry: &TaskRegistry, cfg: &ConfigFile) {
    println!("tasks ({}):", registry.len());
    let width = registry.names().map(str::len).max().unwrap_or(0);
    for name in registry.names() {
        if let Some(def) = registry.get(name) {
            println!("  {name:<width$}  {}", describe(def));
        }
    }

    if !cfg.watch_rules().is_empty() {
        println!();
        println!("watch rules ({}):", cfg.watch_rules().len());
        for (id, rule) in cfg.watch_rules() {
            println!("  {id}: {:?} -> {:?}", rule.globs, rule.tasks);
        }
    }
}

fn print_plan(plan: &ExecutionPlan) {
    for (i, group) in plan.groups().iter().enumerate() {
        match group {
            PlanGroup::Single(task) => println!("  {}. {}", i + 1, task.name),
            PlanGroup::Parallel(tasks) => {
                let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
                println!("  {}. [parallel] {}", i + 1, names.join(" | "));
            }
        }
    }
}

/// Print resolved plans without executing anything.
fn print_dry_run(
    registry: &TaskRegistry,
    cfg: &ConfigFile,
    plan: Option<&ExecutionPlan>,
) -> Result<()> {
    println!("buildwatch dry-run");
    println!();

    match plan {
        Some(plan) => {
            println!("plan for {}:", plan.targets().join(" + "));
            print_plan(plan);
        }
        None => {
            println!("watch mode ({} rules):", cfg.watch_rules().len());
            for (id, rule) in cfg.watch_rules() {
                println!("rule {id} ({:?}):", rule.globs);
                if rule.tasks.is_empty() {
                    println!("  (reload only)");
                    continue;
                }
                print_plan(&registry.resolve_all(&rule.tasks)?);
            }
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
