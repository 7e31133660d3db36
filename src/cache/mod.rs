// src/cache/mod.rs

//! Content fingerprints for task inputs ("only run when changed").
//!
//! The [`ChangeCache`] remembers, per task, the blake3 hash of every input
//! file seen at the last successful run. It lives in memory only: records
//! are lost when the process exits, so the first run after a restart always
//! executes.

pub mod hash;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use tracing::{debug, info};

use crate::fs::FileSystem;
use crate::types::TaskName;

pub use hash::compute_file_hash;

/// Last-seen signature of one input file of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintRecord {
    pub path: PathBuf,
    pub signature: String,
    pub task: TaskName,
}

/// Signatures of a set of input files, keyed by path.
pub type Fingerprint = HashMap<PathBuf, String>;

/// In-memory fingerprint store, namespaced by task name.
///
/// Records for a task are replaced wholesale by [`ChangeCache::commit`];
/// nothing is appended.
#[derive(Debug)]
pub struct ChangeCache {
    fs: Arc<dyn FileSystem>,
    records: Mutex<HashMap<TaskName, Fingerprint>>,
}

impl ChangeCache {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            records: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TaskName, Fingerprint>> {
        // A panic while holding the lock can't leave a half-written map:
        // every mutation is a single insert/remove.
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Hash every path in `inputs`.
    pub fn fingerprint(&self, inputs: &[PathBuf]) -> Result<Fingerprint> {
        let mut fp = Fingerprint::with_capacity(inputs.len());
        for path in inputs {
            let hash = compute_file_hash(self.fs.as_ref(), path)?;
            fp.insert(path.clone(), hash);
        }
        Ok(fp)
    }

    /// Returns `true` if `task` has never committed, if its set of input
    /// paths changed, or if any input's content hash differs from the
    /// recorded one.
    pub fn should_run(&self, task: &str, inputs: &[PathBuf]) -> Result<bool> {
        let current = self.fingerprint(inputs)?;
        Ok(self.differs(task, &current))
    }

    /// Compare an already computed fingerprint against the stored one.
    pub fn differs(&self, task: &str, current: &Fingerprint) -> bool {
        let records = self.lock();
        let Some(previous) = records.get(task) else {
            debug!(task = %task, "no fingerprint recorded yet");
            return true;
        };

        if previous.len() != current.len() {
            debug!(
                task = %task,
                before = previous.len(),
                now = current.len(),
                "input set changed size"
            );
            return true;
        }

        for (path, hash) in current.iter() {
            match previous.get(path) {
                Some(old) if old == hash => {}
                Some(_) => {
                    debug!(task = %task, path = ?path, "input content changed");
                    return true;
                }
                None => {
                    debug!(task = %task, path = ?path, "new input file");
                    return true;
                }
            }
        }

        false
    }

    /// Record the current signatures of `inputs` for `task`, replacing any
    /// previous records. Call only after the task succeeded.
    pub fn commit(&self, task: &str, inputs: &[PathBuf]) -> Result<()> {
        let fp = self.fingerprint(inputs)?;
        self.commit_fingerprint(task, fp);
        Ok(())
    }

    pub fn commit_fingerprint(&self, task: &str, fp: Fingerprint) {
        info!(task = %task, files = fp.len(), "stored input fingerprint");
        self.lock().insert(task.to_string(), fp);
    }

    /// Drop the records for `task`, forcing its next run.
    pub fn invalidate(&self, task: &str) {
        if self.lock().remove(task).is_some() {
            debug!(task = %task, "invalidated fingerprint");
        }
    }

    /// Snapshot of the records for `task`, sorted by path.
    pub fn records(&self, task: &str) -> Vec<FingerprintRecord> {
        let records = self.lock();
        let mut out: Vec<FingerprintRecord> = records
            .get(task)
            .map(|fp| {
                fp.iter()
                    .map(|(path, signature)| FingerprintRecord {
                        path: path.clone(),
                        signature: signature.clone(),
                        task: task.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        out.sort_by(|a, b| a.path.cmp(&b.path));
        out
    }

    pub fn has_record(&self, task: &str, path: &Path) -> bool {
        self.lock()
            .get(task)
            .is_some_and(|fp| fp.contains_key(path))
    }
}
