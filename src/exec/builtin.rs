// src/exec/builtin.rs

//! Built-in actions selectable with `action = "..."` in a task section.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use regex::{Captures, Regex};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::TaskConfig;
use crate::errors::{BuildwatchError, Result};
use crate::exec::action::{Action, ActionContext, ActionFuture, ActionOutput};
use crate::watch::path_utils::slash_relative;

/// Every value accepted by a task's `action` key.
pub const ACTION_KINDS: &[&str] = &["shell", "concat", "copy", "clean"];

/// Instantiate the built-in action configured for task `name`.
pub fn build_action(name: &str, task: &TaskConfig) -> Result<Arc<dyn Action>> {
    let action: Arc<dyn Action> = match task.effective_action() {
        "shell" => {
            let cmd = task.cmd.as_deref().ok_or_else(|| {
                BuildwatchError::ConfigError(format!("task '{name}' has no `cmd`"))
            })?;
            Arc::new(ShellAction::new(cmd)?)
        }
        "concat" => Arc::new(ConcatAction),
        "copy" => Arc::new(CopyAction),
        "clean" => Arc::new(CleanAction),
        other => {
            return Err(BuildwatchError::ConfigError(format!(
                "task '{name}' has unknown action '{other}'"
            )));
        }
    };
    Ok(action)
}

/// Display form of `path` for command lines and diagnostics: relative to
/// the project root when possible.
fn display_path(root: &Path, path: &Path) -> String {
    slash_relative(root, path).unwrap_or_else(|| path.display().to_string())
}

fn shell_quote(s: &str) -> Cow<'_, str> {
    let safe = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:=,@".contains(c));
    if safe {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(format!("'{}'", s.replace('\'', r"'\''")))
    }
}

fn require_output(ctx: &ActionContext) -> anyhow::Result<PathBuf> {
    ctx.output
        .clone()
        .ok_or_else(|| anyhow!("task '{}' has no output path", ctx.task))
}

/// Runs a command line through the platform shell.
///
/// `{inputs}`, `{output}` and `{root}` in the command are substituted before
/// spawning. Task options are exported as environment variables:
/// `BUILDWATCH_TASK`, `BUILDWATCH_INPUTS` (newline separated),
/// `BUILDWATCH_OUTPUT`, `BUILDWATCH_OUTPUT_STYLE`, `BUILDWATCH_SOURCE_MAP`
/// and `BUILDWATCH_OPT_<KEY>` for every entry of `options`.
#[derive(Debug)]
pub struct ShellAction {
    cmd: String,
    placeholder: Regex,
}

impl ShellAction {
    pub fn new(cmd: impl Into<String>) -> Result<Self> {
        let placeholder = Regex::new(r"\{(inputs|output|root)\}")
            .context("compiling placeholder pattern")?;
        Ok(Self {
            cmd: cmd.into(),
            placeholder,
        })
    }

    pub fn command_line(&self, ctx: &ActionContext) -> String {
        let root = ctx.root();
        self.placeholder
            .replace_all(&self.cmd, |caps: &Captures<'_>| match &caps[1] {
                "inputs" => ctx
                    .inputs
                    .iter()
                    .map(|p| shell_quote(&display_path(root, p)).into_owned())
                    .collect::<Vec<_>>()
                    .join(" "),
                "output" => ctx
                    .output()
                    .map(|p| shell_quote(&display_path(root, p)).into_owned())
                    .unwrap_or_default(),
                _ => shell_quote(&root.display().to_string()).into_owned(),
            })
            .into_owned()
    }

    async fn execute(&self, ctx: &ActionContext) -> anyhow::Result<ActionOutput> {
        let line = self.command_line(ctx);
        info!(task = %ctx.task, cmd = %line, "starting shell action");

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&line);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&line);
            c
        };

        let inputs = ctx
            .inputs
            .iter()
            .map(|p| display_path(ctx.root(), p))
            .collect::<Vec<_>>()
            .join("\n");

        cmd.current_dir(ctx.root())
            .env("BUILDWATCH_TASK", &ctx.task)
            .env("BUILDWATCH_INPUTS", inputs)
            .env("BUILDWATCH_SOURCE_MAP", ctx.options.source_map.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(output) = ctx.output() {
            cmd.env("BUILDWATCH_OUTPUT", display_path(ctx.root(), output));
        }
        if let Some(style) = ctx.options.output_style {
            cmd.env("BUILDWATCH_OUTPUT_STYLE", style.as_str());
        }
        for key in ctx.options.extra.keys() {
            if let Some(value) = ctx.options.extra_str(key) {
                cmd.env(option_env_name(key), value);
            }
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for task '{}'", ctx.task))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Drain both pipes while the child runs so neither buffer fills up.
        let (out_lines, err_lines) = tokio::join!(
            collect_lines(&ctx.task, "stdout", stdout),
            collect_lines(&ctx.task, "stderr", stderr),
        );

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for process of task '{}'", ctx.task))?;

        let code = status.code().unwrap_or(-1);
        info!(
            task = %ctx.task,
            exit_code = code,
            success = status.success(),
            "shell action exited"
        );

        let mut diagnostics = out_lines;
        diagnostics.extend(err_lines);
        if !status.success() {
            diagnostics.push(format!("exited with status {code}"));
        }

        Ok(ActionOutput {
            success: status.success(),
            diagnostics: None,
        }
        .with_diagnostics(diagnostics.join("\n")))
    }
}

fn option_env_name(key: &str) -> String {
    let key: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("BUILDWATCH_OPT_{key}")
}

async fn collect_lines<R>(task: &str, stream: &str, reader: Option<R>) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut collected = Vec::new();
    let Some(reader) = reader else {
        return collected;
    };

    // Read raw bytes; a line that isn't UTF-8 must not end the drain early.
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                let line = text.trim_end_matches(['\n', '\r']).to_string();
                debug!(task = %task, stream = %stream, "{}", line);
                collected.push(line);
            }
            Err(err) => {
                warn!(task = %task, stream = %stream, error = %err, "reading process output failed");
                break;
            }
        }
    }
    collected
}

impl Action for ShellAction {
    fn kind(&self) -> &str {
        "shell"
    }

    fn run<'a>(&'a self, ctx: &'a ActionContext) -> ActionFuture<'a> {
        Box::pin(self.execute(ctx))
    }
}

/// Concatenates the inputs, in pattern order, into `output`.
///
/// Options: `separator` (default `"\n"`), `banner`, `footer`.
#[derive(Debug, Default)]
pub struct ConcatAction;

fn concat_blocking(ctx: &ActionContext) -> anyhow::Result<ActionOutput> {
    let output = require_output(ctx)?;
    let separator = ctx
        .options
        .extra_str("separator")
        .unwrap_or_else(|| "\n".to_string());

    let mut parts = Vec::with_capacity(ctx.inputs.len());
    for input in &ctx.inputs {
        let text = ctx
            .fs
            .read_to_string(input)
            .with_context(|| format!("concat input {}", display_path(ctx.root(), input)))?;
        parts.push(text);
    }

    let mut contents = String::new();
    if let Some(banner) = ctx.options.extra_str("banner") {
        contents.push_str(&banner);
    }
    contents.push_str(&parts.join(&separator));
    if let Some(footer) = ctx.options.extra_str("footer") {
        contents.push_str(&footer);
    }

    ctx.fs.write(&output, contents.as_bytes())?;

    let summary = format!(
        "concatenated {} file(s) into {}",
        ctx.inputs.len(),
        display_path(ctx.root(), &output)
    );
    debug!(task = %ctx.task, "{summary}");
    Ok(ActionOutput::ok().with_diagnostics(summary))
}

impl Action for ConcatAction {
    fn kind(&self) -> &str {
        "concat"
    }

    fn run<'a>(&'a self, ctx: &'a ActionContext) -> ActionFuture<'a> {
        Box::pin(run_blocking(ctx, concat_blocking))
    }
}

/// Copies inputs to `output`.
///
/// A single input is copied to `output` itself unless `output` is an
/// existing directory or ends with `/`. Otherwise every input is copied
/// into `output`, keeping its path relative to the project root.
#[derive(Debug, Default)]
pub struct CopyAction;

fn copy_blocking(ctx: &ActionContext) -> anyhow::Result<ActionOutput> {
    let output = require_output(ctx)?;
    if ctx.inputs.is_empty() {
        bail!("task '{}' has no input files to copy", ctx.task);
    }

    let into_dir = ctx.inputs.len() > 1
        || ctx.fs.is_dir(&output)
        || output.to_string_lossy().ends_with('/');

    for input in &ctx.inputs {
        let target = if into_dir {
            let rel = slash_relative(ctx.root(), input)
                .map(PathBuf::from)
                .or_else(|| input.file_name().map(PathBuf::from))
                .ok_or_else(|| anyhow!("cannot derive a file name for {:?}", input))?;
            output.join(rel)
        } else {
            output.clone()
        };

        let bytes = ctx.fs.read(input)?;
        ctx.fs.write(&target, &bytes)?;
        debug!(
            task = %ctx.task,
            from = %display_path(ctx.root(), input),
            to = %display_path(ctx.root(), &target),
            "copied file"
        );
    }

    Ok(ActionOutput::ok().with_diagnostics(format!("copied {} file(s)", ctx.inputs.len())))
}

impl Action for CopyAction {
    fn kind(&self) -> &str {
        "copy"
    }

    fn run<'a>(&'a self, ctx: &'a ActionContext) -> ActionFuture<'a> {
        Box::pin(run_blocking(ctx, copy_blocking))
    }
}

/// Deletes every input file. Matching nothing is not an error.
#[derive(Debug, Default)]
pub struct CleanAction;

fn clean_blocking(ctx: &ActionContext) -> anyhow::Result<ActionOutput> {
    let mut removed = 0usize;
    for input in &ctx.inputs {
        if ctx.fs.is_file(input) {
            ctx.fs.remove_file(input)?;
            removed += 1;
        }
    }
    debug!(task = %ctx.task, removed, "clean finished");
    Ok(ActionOutput::ok().with_diagnostics(format!("removed {removed} file(s)")))
}

impl Action for CleanAction {
    fn kind(&self) -> &str {
        "clean"
    }

    fn run<'a>(&'a self, ctx: &'a ActionContext) -> ActionFuture<'a> {
        Box::pin(run_blocking(ctx, clean_blocking))
    }
}

/// Run a synchronous file action on the blocking pool.
async fn run_blocking(
    ctx: &ActionContext,
    f: fn(&ActionContext) -> anyhow::Result<ActionOutput>,
) -> anyhow::Result<ActionOutput> {
    let ctx = ctx.clone();
    tokio::task::spawn_blocking(move || f(&ctx))
        .await
        .context("file action task panicked")?
}
