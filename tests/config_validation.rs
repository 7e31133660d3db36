// tests/config_validation.rs

use std::error::Error;
use std::io::Write;
use std::time::Duration;

use buildwatch::config::{ConfigFile, load_and_validate, parse_str};
use buildwatch::errors::{BuildwatchError, exit_code};
use buildwatch::types::OutputStyle;
use buildwatch_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder, WatchConfigBuilder};
use tempfile::NamedTempFile;

type TestResult = Result<(), Box<dyn Error>>;

const SAMPLE: &str = r#"
[config]
workers = 4
action_timeout = "10m"
debounce = "250ms"

[task.lint]
action = "shell"
cmd = "eslint {inputs}"
inputs = ["assets/js/*.js"]
fail_on_error = true

[task.concat]
action = "concat"
inputs = ["assets/js/vendor/*.js", "assets/js/app.js"]
output = "assets/dist/app.js"
changed = true
[task.concat.options]
footer = "})();"

[task.sass]
cmd = "sass {inputs} {output}"
inputs = ["assets/css/main.scss"]
output = "assets/css/main.css"
output_style = "compressed"
source_map = true

[task.js]
members = ["lint", "concat"]

[watch.js]
globs = ["assets/js/**/*.js"]
tasks = ["js"]
debounce = "100ms"

[watch.reload]
globs = ["**/*.php"]
livereload = true
"#;

fn validate(toml_src: &str) -> Result<ConfigFile, BuildwatchError> {
    ConfigFile::try_from(parse_str(toml_src)?)
}

#[test]
fn sample_document_parses_and_validates() -> TestResult {
    let cfg = validate(SAMPLE)?;

    assert_eq!(cfg.settings().workers, Some(4));
    assert_eq!(cfg.settings().action_timeout, Duration::from_secs(600));
    assert_eq!(cfg.settings().debounce, Duration::from_millis(250));

    let sass = cfg.task("sass").ok_or("missing sass")?;
    assert_eq!(sass.effective_action(), "shell");
    assert_eq!(sass.output_style, Some(OutputStyle::Compressed));
    assert!(sass.source_map);

    let concat = cfg.task("concat").ok_or("missing concat")?;
    assert!(concat.changed);
    assert!(concat.options.contains_key("footer"));

    assert_eq!(cfg.watch_rules().len(), 2);
    assert!(cfg.watch_rules()["reload"].livereload);
    Ok(())
}

#[test]
fn config_file_on_disk_round_trips_through_loader() -> TestResult {
    let mut file = NamedTempFile::new()?;
    write!(file, "{SAMPLE}")?;

    let cfg = load_and_validate(file.path())?;
    assert!(cfg.task("js").is_some_and(|t| t.is_composite()));
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    match load_and_validate("/definitely/not/here/Buildwatch.toml") {
        Err(e @ BuildwatchError::IoError(_)) => assert_eq!(e.exit_code(), exit_code::OTHER),
        other => panic!("expected IoError, got {other:?}"),
    }
}

#[test]
fn defaults_apply_when_config_section_is_absent() -> TestResult {
    let cfg = validate(
        r#"
[task.a]
cmd = "true"
"#,
    )?;
    assert_eq!(cfg.settings().workers, None);
    assert_eq!(cfg.settings().action_timeout, Duration::from_secs(600));
    assert_eq!(cfg.settings().debounce, Duration::from_millis(250));
    Ok(())
}

#[test]
fn composite_cycle_is_a_structured_error() {
    let result = validate(
        r#"
[task.lint]
cmd = "true"

[task.a]
members = ["lint", "b"]

[task.b]
members = ["a"]
"#,
    );

    match result {
        Err(e @ BuildwatchError::CyclicTask(_)) => {
            assert_eq!(e.exit_code(), exit_code::CYCLIC_TASK);
            let BuildwatchError::CyclicTask(path) = &e else { unreachable!() };
            assert_eq!(path.first(), path.last());
            assert!(path.contains(&"a".to_string()));
            assert!(path.contains(&"b".to_string()));
            assert!(e.to_string().contains(" -> "));
        }
        other => panic!("expected CyclicTask, got {other:?}"),
    }
}

#[test]
fn self_member_is_a_cycle() {
    let result = ConfigFileBuilder::new()
        .with_task("loop", TaskConfigBuilder::composite(&["loop"]).build())
        .try_build();

    match result {
        Err(BuildwatchError::CyclicTask(path)) => assert_eq!(path, vec!["loop", "loop"]),
        other => panic!("expected CyclicTask, got {other:?}"),
    }
}

#[test]
fn unknown_member_is_an_unknown_task() {
    let result = ConfigFileBuilder::new()
        .with_task("js", TaskConfigBuilder::composite(&["lint", "ghost"]).build())
        .with_task("lint", TaskConfigBuilder::shell("true").build())
        .try_build();

    match result {
        Err(e @ BuildwatchError::UnknownTask(_)) => {
            assert_eq!(e.exit_code(), exit_code::UNKNOWN_TASK);
            assert!(e.to_string().contains("ghost"));
        }
        other => panic!("expected UnknownTask, got {other:?}"),
    }
}

#[test]
fn watch_rule_with_unknown_task_is_rejected() {
    let result = ConfigFileBuilder::new()
        .with_task("lint", TaskConfigBuilder::shell("true").build())
        .with_watch("js", WatchConfigBuilder::new("**/*.js").task("nope").build())
        .try_build();

    assert!(matches!(result, Err(BuildwatchError::UnknownTask(name)) if name == "nope"));
}

fn expect_config_error(result: Result<ConfigFile, BuildwatchError>, needle: &str) {
    match result {
        Err(e @ BuildwatchError::ConfigError(_)) => {
            assert_eq!(e.exit_code(), exit_code::OTHER);
            assert!(
                e.to_string().contains(needle),
                "error {e} should mention {needle:?}"
            );
        }
        other => panic!("expected ConfigError mentioning {needle:?}, got {other:?}"),
    }
}

#[test]
fn invalid_definitions_are_configuration_errors() {
    expect_config_error(ConfigFileBuilder::new().try_build(), "at least one");

    expect_config_error(
        ConfigFileBuilder::new()
            .with_task("watch", TaskConfigBuilder::shell("true").build())
            .try_build(),
        "reserved",
    );

    expect_config_error(
        ConfigFileBuilder::new()
            .with_task("x", TaskConfigBuilder::action("rsync").build())
            .try_build(),
        "unknown action",
    );

    expect_config_error(
        ConfigFileBuilder::new()
            .with_task("x", TaskConfigBuilder::action("shell").build())
            .try_build(),
        "no `cmd`",
    );

    expect_config_error(
        ConfigFileBuilder::new()
            .with_task("x", TaskConfigBuilder::action("concat").input("a/*.js").build())
            .try_build(),
        "requires an `output`",
    );

    expect_config_error(
        ConfigFileBuilder::new()
            .with_task("x", TaskConfigBuilder::action("clean").build())
            .try_build(),
        "inputs",
    );

    expect_config_error(
        ConfigFileBuilder::new()
            .with_task("x", TaskConfigBuilder::composite(&[]).build())
            .try_build(),
        "at least one member",
    );

    expect_config_error(
        ConfigFileBuilder::new()
            .with_task("x", TaskConfigBuilder::shell("true").timeout("soon").build())
            .try_build(),
        "timeout",
    );

    expect_config_error(
        ConfigFileBuilder::new()
            .with_task(
                "x",
                TaskConfigBuilder::shell("true")
                    .timeout("9999999999999999999h")
                    .build(),
            )
            .try_build(),
        "out of range",
    );

    expect_config_error(
        ConfigFileBuilder::new()
            .with_task("x", TaskConfigBuilder::shell("true").build())
            .action_timeout("999999999999999999m")
            .try_build(),
        "out of range",
    );

    expect_config_error(
        ConfigFileBuilder::new()
            .with_task("x", TaskConfigBuilder::shell("true").input("src/[a-").build())
            .try_build(),
        "input",
    );

    expect_config_error(
        ConfigFileBuilder::new()
            .with_task("x", TaskConfigBuilder::shell("true").build())
            .workers(0)
            .try_build(),
        "workers",
    );

    expect_config_error(
        ConfigFileBuilder::new()
            .with_task("x", TaskConfigBuilder::shell("true").build())
            .debounce("1 fortnight")
            .try_build(),
        "debounce",
    );

    expect_config_error(
        ConfigFileBuilder::new()
            .with_task("x", TaskConfigBuilder::shell("true").build())
            .with_watch("w", WatchConfigBuilder::new("**/*.js").build())
            .try_build(),
        "not a livereload rule",
    );
}

#[test]
fn mixing_members_and_action_is_rejected() {
    let result = validate(
        r#"
[task.lint]
cmd = "true"

[task.js]
cmd = "true"
members = ["lint"]
"#,
    );
    expect_config_error(result, "either composite or atomic");
}

#[test]
fn unknown_keys_and_bad_toml_are_rejected() {
    match validate("[task.a]\ncmd = \"true\"\nafter = [\"b\"]\n") {
        Err(e @ BuildwatchError::TomlError(_)) => assert_eq!(e.exit_code(), exit_code::OTHER),
        other => panic!("expected TomlError, got {other:?}"),
    }

    assert!(matches!(
        validate("[task.a\ncmd = "),
        Err(BuildwatchError::TomlError(_))
    ));
}

#[test]
fn task_failure_errors_map_to_exit_code_one() {
    let failure = BuildwatchError::ActionFailure {
        task: "lint".into(),
        detail: "exit 1".into(),
    };
    let timeout = BuildwatchError::Timeout {
        task: "sass".into(),
        after: Duration::from_secs(1),
    };
    assert_eq!(failure.exit_code(), exit_code::TASK_FAILED);
    assert_eq!(timeout.exit_code(), exit_code::TASK_FAILED);
    assert!(!failure.is_configuration_error());
    assert!(BuildwatchError::DuplicateTask("a".into()).is_configuration_error());
}
