// src/watch/path_utils.rs

//! Path normalisation shared by the watcher and input expansion.

use std::path::{Component, Path};

/// Convert `path` into a string relative to `root`, with forward slashes and
/// no leading `./`.
///
/// Tries a direct `strip_prefix` first; if that fails (symlinked roots,
/// `/private/var` vs `/var` on macOS) both paths are canonicalized and the
/// strip is retried. Returns `None` if `path` is not under `root`.
pub fn slash_relative(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_slash(rel));
    }

    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(to_slash(rel));
        }
    }

    None
}

fn to_slash(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
