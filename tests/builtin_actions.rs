// tests/builtin_actions.rs

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use buildwatch::config::TaskConfig;
use buildwatch::exec::builtin::{ShellAction, build_action};
use buildwatch::exec::{Action, ActionContext};
use buildwatch::fs::FileSystem;
use buildwatch::fs::mock::MockFileSystem;
use buildwatch::registry::{TaskDefinition, TaskOptions, TaskRegistry};
use buildwatch::types::{TaskStatus, TriggerReason};
use buildwatch_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use buildwatch_test_utils::{MockHarness, init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn theme_files(fs: &MockFileSystem) {
    fs.add_file("assets/js/vendor/jquery.js", "var $;");
    fs.add_file("assets/js/app.js", "app();");
    fs.add_file("assets/js/nav.js", "nav();");
}

async fn run_task(harness: &MockHarness, reg: &TaskRegistry, task: &str) -> TaskStatus {
    let plan = reg.resolve(task).unwrap();
    let report = with_timeout(harness.executor.run(&plan, TriggerReason::Manual)).await;
    report.outcomes[0].status
}

#[tokio::test]
async fn concat_joins_inputs_in_pattern_order_with_footer() -> TestResult {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_task(
            "concat",
            TaskConfigBuilder::action("concat")
                .input("assets/js/vendor/*.js")
                .input("assets/js/*.js")
                .output("assets/dist/app.js")
                .option("banner", "(function(){\n")
                .option("footer", "\n})();")
                .build(),
        )
        .build();
    let reg = TaskRegistry::from_config(&cfg)?;
    let harness = MockHarness::default();
    theme_files(&harness.fs);

    assert_eq!(run_task(&harness, &reg, "concat").await, TaskStatus::Succeeded);

    let out = harness.fs.read_to_string(&PathBuf::from("assets/dist/app.js"))?;
    assert_eq!(out, "(function(){\nvar $;\napp();\nnav();\n})();");
    Ok(())
}

#[tokio::test]
async fn concat_separator_is_configurable() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_task(
            "concat",
            TaskConfigBuilder::action("concat")
                .input("assets/js/app.js")
                .input("assets/js/nav.js")
                .output("out.js")
                .option("separator", ";")
                .build(),
        )
        .build();
    let reg = TaskRegistry::from_config(&cfg)?;
    let harness = MockHarness::default();
    theme_files(&harness.fs);

    run_task(&harness, &reg, "concat").await;
    assert_eq!(harness.fs.read_to_string(&PathBuf::from("out.js"))?, "app();;nav();");
    Ok(())
}

#[tokio::test]
async fn copy_single_file_and_into_directory() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_task(
            "one",
            TaskConfigBuilder::action("copy")
                .input("assets/js/app.js")
                .output("public/app.js")
                .build(),
        )
        .with_task(
            "many",
            TaskConfigBuilder::action("copy")
                .input("assets/js/*.js")
                .output("public")
                .build(),
        )
        .build();
    let reg = TaskRegistry::from_config(&cfg)?;
    let harness = MockHarness::default();
    theme_files(&harness.fs);

    assert_eq!(run_task(&harness, &reg, "one").await, TaskStatus::Succeeded);
    assert_eq!(harness.fs.read_to_string(&PathBuf::from("public/app.js"))?, "app();");

    assert_eq!(run_task(&harness, &reg, "many").await, TaskStatus::Succeeded);
    assert!(harness.fs.is_file(&PathBuf::from("public/assets/js/app.js")));
    assert!(harness.fs.is_file(&PathBuf::from("public/assets/js/nav.js")));
    Ok(())
}

#[tokio::test]
async fn copy_without_matching_inputs_fails() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_task(
            "copy",
            TaskConfigBuilder::action("copy")
                .input("fonts/*.woff")
                .output("public/fonts")
                .build(),
        )
        .build();
    let reg = TaskRegistry::from_config(&cfg)?;
    let harness = MockHarness::default();

    assert_eq!(run_task(&harness, &reg, "copy").await, TaskStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn clean_removes_matched_files_only() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_task(
            "clean",
            TaskConfigBuilder::action("clean").input("assets/js/*.js").build(),
        )
        .build();
    let reg = TaskRegistry::from_config(&cfg)?;
    let harness = MockHarness::default();
    theme_files(&harness.fs);

    assert_eq!(run_task(&harness, &reg, "clean").await, TaskStatus::Succeeded);
    assert_eq!(
        harness.fs.files(),
        vec![PathBuf::from("assets/js/vendor/jquery.js")]
    );

    // Nothing left to match is still a success.
    assert_eq!(run_task(&harness, &reg, "clean").await, TaskStatus::Succeeded);
    Ok(())
}

#[test]
fn shell_placeholders_are_substituted_and_quoted() -> TestResult {
    let action = ShellAction::new("eslint {inputs} -o {output} --cwd {root}")?;
    let ctx = ActionContext {
        task: "lint".into(),
        root: PathBuf::from("/srv/site"),
        inputs: vec![
            PathBuf::from("/srv/site/assets/js/app.js"),
            PathBuf::from("/srv/site/assets/js/my file.js"),
        ],
        output: Some(PathBuf::from("/srv/site/report.txt")),
        options: TaskOptions::default(),
        fs: Arc::new(MockFileSystem::new()),
    };

    assert_eq!(
        action.command_line(&ctx),
        "eslint assets/js/app.js 'assets/js/my file.js' -o report.txt --cwd /srv/site"
    );
    Ok(())
}

#[test]
fn build_action_selects_the_configured_kind() -> TestResult {
    let shell = TaskConfig {
        cmd: Some("true".into()),
        ..TaskConfig::default()
    };
    assert_eq!(build_action("t", &shell)?.kind(), "shell");

    for kind in ["concat", "copy", "clean"] {
        let cfg = TaskConfig {
            action: Some(kind.into()),
            ..TaskConfig::default()
        };
        assert_eq!(build_action("t", &cfg)?.kind(), kind);
    }

    let bad = TaskConfig {
        action: Some("shell".into()),
        ..TaskConfig::default()
    };
    assert!(build_action("t", &bad).is_err());
    Ok(())
}

#[cfg(unix)]
mod shell {
    use super::*;
    use tempfile::tempdir;

    fn registry_in(cmds: &[(&str, &str)]) -> TaskRegistry {
        let mut builder = ConfigFileBuilder::new();
        for (name, cmd) in cmds {
            builder = builder.with_task(name, TaskConfigBuilder::shell(cmd).build());
        }
        TaskRegistry::from_config(&builder.build()).unwrap()
    }

    fn harness_at(root: &std::path::Path) -> buildwatch::exec::Executor {
        use buildwatch::cache::ChangeCache;
        use buildwatch::events::EventSink;
        use buildwatch::exec::ExecutorSettings;
        use buildwatch::fs::RealFileSystem;

        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        buildwatch::exec::Executor::new(
            root,
            Arc::clone(&fs),
            Arc::new(ChangeCache::new(fs)),
            EventSink::default(),
            ExecutorSettings::default(),
        )
    }

    #[tokio::test]
    async fn shell_runs_in_root_with_option_env() -> TestResult {
        init_tracing();
        let dir = tempdir()?;
        let cfg = ConfigFileBuilder::new()
            .with_task(
                "sass",
                TaskConfigBuilder::shell("printf '%s %s %s' \"$BUILDWATCH_TASK\" \"$BUILDWATCH_OPT_LOAD_PATH\" \"$BUILDWATCH_OUTPUT_STYLE\" > out.txt")
                    .option("load-path", "vendor")
                    .output_style(buildwatch::types::OutputStyle::Compressed)
                    .build(),
            )
            .build();
        let reg = TaskRegistry::from_config(&cfg)?;
        let exec = harness_at(dir.path());

        let report = with_timeout(exec.run(&reg.resolve("sass")?, TriggerReason::Manual)).await;
        assert!(report.succeeded());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("out.txt"))?,
            "sass vendor compressed"
        );
        Ok(())
    }

    #[tokio::test]
    async fn non_zero_exit_fails_with_captured_output() -> TestResult {
        let dir = tempdir()?;
        let reg = registry_in(&[("lint", "echo 'app.js: missing semicolon' >&2; exit 3")]);
        let exec = harness_at(dir.path());

        let report = with_timeout(exec.run(&reg.resolve("lint")?, TriggerReason::Manual)).await;
        let outcome = &report.outcomes[0];
        assert_eq!(outcome.status, TaskStatus::Failed);
        assert_eq!(outcome.error_detail().as_deref(), Some("exited with status 3"));
        let diagnostics = outcome.diagnostics.clone().unwrap_or_default();
        assert!(diagnostics.contains("missing semicolon"));
        Ok(())
    }

    #[tokio::test]
    async fn non_utf8_output_is_drained_and_kept() -> TestResult {
        let dir = tempdir()?;
        let reg = registry_in(&[(
            "lint",
            r"printf 'caf\351.js\n'; head -c 300000 /dev/zero | tr '\0' a; echo; echo done; exit 0",
        )]);
        let exec = harness_at(dir.path());

        let report = with_timeout(exec.run(&reg.resolve("lint")?, TriggerReason::Manual)).await;
        let outcome = &report.outcomes[0];
        assert_eq!(outcome.status, TaskStatus::Succeeded, "{:?}", outcome.error_detail());

        let diagnostics = outcome.diagnostics.clone().unwrap_or_default();
        let lines: Vec<&str> = diagnostics.lines().collect();
        assert_eq!(lines[0], "caf\u{FFFD}.js");
        assert_eq!(lines[1].len(), 300_000);
        assert_eq!(lines.last().copied(), Some("done"));
        Ok(())
    }

    #[tokio::test]
    async fn shell_action_is_killed_on_timeout() -> TestResult {
        let dir = tempdir()?;
        let cfg = ConfigFileBuilder::new()
            .with_task(
                "hang",
                TaskConfigBuilder::shell("sleep 30").timeout("100ms").build(),
            )
            .build();
        let reg = TaskRegistry::from_config(&cfg)?;
        let exec = harness_at(dir.path());

        let report = with_timeout(exec.run(&reg.resolve("hang")?, TriggerReason::Manual)).await;
        assert_eq!(report.outcomes[0].status, TaskStatus::Failed);
        assert!(matches!(
            report.into_result(),
            Err(buildwatch::errors::BuildwatchError::Timeout { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn parallel_shell_group_finishes_all_members() -> TestResult {
        let dir = tempdir()?;
        let mut reg = TaskRegistry::new();
        for name in ["a", "b", "c"] {
            let action = ShellAction::new(format!("touch {name}.done"))?;
            reg.register(TaskDefinition::atomic(
                buildwatch::registry::AtomicTask::new(name, Arc::new(action)).parallel(true),
            ))?;
        }
        reg.register(TaskDefinition::composite("all", ["a", "b", "c"]))?;
        let exec = harness_at(dir.path());

        let report = with_timeout(exec.run(&reg.resolve("all")?, TriggerReason::Manual)).await;
        assert!(report.succeeded());
        for name in ["a", "b", "c"] {
            assert!(dir.path().join(format!("{name}.done")).exists());
        }
        Ok(())
    }
}
