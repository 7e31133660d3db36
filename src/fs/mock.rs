// src/fs/mock.rs

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow};

use super::FileSystem;

#[derive(Debug, Clone)]
enum MockEntry {
    File(Vec<u8>),
    Dir,
}

/// In-memory file tree keyed by normalised relative paths.
///
/// `"./src/a.js"` and `"src/a.js"` refer to the same entry; the root is
/// `"."`. Directories are created implicitly for every file added.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<BTreeMap<PathBuf, MockEntry>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(PathBuf::from("."), MockEntry::Dir);
        Self {
            entries: Arc::new(Mutex::new(entries)),
        }
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = normalise(path.as_ref());
        let mut entries = self.lock();

        let mut parent = path.parent();
        while let Some(dir) = parent {
            let dir = if dir.as_os_str().is_empty() {
                Path::new(".")
            } else {
                dir
            };
            entries
                .entry(dir.to_path_buf())
                .or_insert(MockEntry::Dir);
            if dir == Path::new(".") {
                break;
            }
            parent = dir.parent();
        }

        entries.insert(path, MockEntry::File(content.into()));
    }

    /// Every file currently stored, in path order.
    pub fn files(&self) -> Vec<PathBuf> {
        self.lock()
            .iter()
            .filter(|(_, e)| matches!(e, MockEntry::File(_)))
            .map(|(p, _)| p.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PathBuf, MockEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Strip `.` components so lookups don't depend on how a path was joined.
fn normalise(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        out
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        match self.lock().get(&normalise(path)) {
            Some(MockEntry::File(content)) => Ok(content.clone()),
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let content = self.read(path)?;
        Ok(Box::new(Cursor::new(content)))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let mut entries = self.lock();
        match entries.get(&normalise(path)) {
            Some(MockEntry::File(_)) => {
                entries.remove(&normalise(path));
                Ok(())
            }
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().contains_key(&normalise(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.lock().get(&normalise(path)), Some(MockEntry::File(_)))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().get(&normalise(path)), Some(MockEntry::Dir))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let dir = normalise(path);
        let entries = self.lock();
        if !matches!(entries.get(&dir), Some(MockEntry::Dir)) {
            return Err(anyhow!("Not a directory or not found: {:?}", path));
        }

        // Children are reported joined onto the caller's path, mirroring
        // `std::fs::read_dir`.
        let children = entries
            .keys()
            .filter(|p| **p != dir)
            .filter(|p| {
                let parent = p.parent().map(|pp| {
                    if pp.as_os_str().is_empty() {
                        Path::new(".")
                    } else {
                        pp
                    }
                });
                parent == Some(dir.as_path())
            })
            .filter_map(|p| p.file_name().map(|name| path.join(name)))
            .collect();
        Ok(children)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        let normalised = normalise(path);
        if self.lock().contains_key(&normalised) {
            Ok(normalised)
        } else {
            Err(anyhow!("File not found: {:?}", path))
        }
    }
}
