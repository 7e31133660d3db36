// src/watch/patterns.rs

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::trace;

use crate::config::model::ConfigFile;
use crate::fs::FileSystem;
use crate::types::{TaskName, parse_duration};
use crate::watch::path_utils::slash_relative;

/// Compile a single glob pattern.
///
/// `*` does not cross directory separators (`assets/js/*.js` does not match
/// `assets/js/vendor/jquery.js`); use `**` for that.
pub fn compile_glob(pattern: &str) -> Result<Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(compile_glob(pat)?);
    }
    Ok(builder.build()?)
}

/// Compiled include/exclude globs, evaluated against paths relative to the
/// project root with forward slashes (e.g. `"assets/css/style.scss"`).
#[derive(Clone)]
pub struct PatternSet {
    include: GlobSet,
    exclude: Option<GlobSet>,
}

impl fmt::Debug for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternSet")
            .field("include", &self.include.len())
            .field("exclude", &self.exclude.as_ref().map(|e| e.len()))
            .finish()
    }
}

impl PatternSet {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let include = build_globset(include)?;
        let exclude = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude)?)
        };
        Ok(Self { include, exclude })
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// A compiled `[watch.<id>]` rule.
///
/// Created once at configuration load and never mutated afterwards.
#[derive(Clone)]
pub struct WatchProfile {
    id: String,
    patterns: PatternSet,
    tasks: Vec<TaskName>,
    debounce: Duration,
    livereload: bool,
}

impl fmt::Debug for WatchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchProfile")
            .field("id", &self.id)
            .field("tasks", &self.tasks)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl WatchProfile {
    pub fn new(
        id: impl Into<String>,
        globs: &[String],
        exclude: &[String],
        tasks: Vec<TaskName>,
        debounce: Duration,
    ) -> Result<Self> {
        let id = id.into();
        let patterns = PatternSet::new(globs, exclude)
            .with_context(|| format!("building globset for watch rule {id}"))?;
        Ok(Self {
            id,
            patterns,
            tasks,
            debounce,
            livereload: false,
        })
    }

    pub fn with_livereload(mut self, livereload: bool) -> Self {
        self.livereload = livereload;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Tasks submitted, in order, when this rule fires.
    pub fn tasks(&self) -> &[TaskName] {
        &self.tasks
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn livereload(&self) -> bool {
        self.livereload
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        self.patterns.matches(rel_path)
    }
}

/// Compile every `[watch.<id>]` rule of a validated config.
pub fn build_watch_profiles(cfg: &ConfigFile) -> Result<Vec<WatchProfile>> {
    let default_debounce = cfg.settings().debounce;

    cfg.watch_rules()
        .iter()
        .map(|(id, rule)| {
            let debounce = match rule.debounce {
                Some(ref s) => parse_duration(s)
                    .map_err(anyhow::Error::msg)
                    .with_context(|| format!("debounce of watch rule {id}"))?,
                None => default_debounce,
            };
            Ok(
                WatchProfile::new(id, &rule.globs, &rule.exclude, rule.tasks.clone(), debounce)?
                    .with_livereload(rule.livereload),
            )
        })
        .collect()
}

/// Leading path components of `pattern` that contain no glob syntax,
/// e.g. `assets/js` for `assets/js/**/*.js`.
fn literal_base(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    let mut parts = pattern.split('/').peekable();
    while let Some(part) = parts.next() {
        // The last component is the file name part, even when literal.
        if parts.peek().is_none() {
            break;
        }
        if part.contains(['*', '?', '[', '{']) {
            break;
        }
        if !part.is_empty() && part != "." {
            base.push(part);
        }
    }
    base
}

/// Collect every file under `dir`, as `(path, path relative to root)` pairs
/// sorted by relative path.
fn walk_files(fs: &dyn FileSystem, root: &Path, dir: &Path) -> Result<Vec<(PathBuf, String)>> {
    let mut files = Vec::new();
    if !fs.is_dir(dir) {
        return Ok(files);
    }

    // Canonical directories already listed; symlinked directories may point
    // back up the tree.
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let canonical = fs.canonicalize(&dir).unwrap_or_else(|_| dir.clone());
        if !visited.insert(canonical) {
            trace!(dir = ?dir, "directory already walked; skipping");
            continue;
        }

        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                if let Some(rel) = slash_relative(root, &path) {
                    files.push((path, rel));
                }
            }
        }
    }

    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

/// Expand an ordered list of input patterns into concrete files.
///
/// Files are returned pattern by pattern (sorted within one pattern) and
/// each file appears once, at its first match. Patterns starting with `!`
/// remove matches from the whole result. This keeps concatenation order
/// under the control of the pattern list.
pub fn expand_inputs(
    fs: &dyn FileSystem,
    root: &Path,
    patterns: &[String],
) -> Result<Vec<PathBuf>> {
    let (negated, positive): (Vec<&String>, Vec<&String>) =
        patterns.iter().partition(|p| p.starts_with('!'));

    let negated: Vec<String> = negated
        .iter()
        .map(|p| p.trim_start_matches('!').to_string())
        .collect();
    let exclude = if negated.is_empty() {
        None
    } else {
        Some(build_globset(&negated)?)
    };

    let mut walks: HashMap<PathBuf, Vec<(PathBuf, String)>> = HashMap::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for pattern in positive {
        let glob = compile_glob(pattern)?.compile_matcher();
        let base = root.join(literal_base(pattern));
        if !walks.contains_key(&base) {
            let files = walk_files(fs, root, &base)?;
            walks.insert(base.clone(), files);
        }

        for (path, rel) in walks[&base].iter() {
            if !glob.is_match(rel.as_str()) {
                continue;
            }
            if exclude.as_ref().is_some_and(|ex| ex.is_match(rel.as_str())) {
                continue;
            }
            if seen.insert(rel.clone()) {
                out.push(path.clone());
            }
        }
    }

    Ok(out)
}
