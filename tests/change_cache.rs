// tests/change_cache.rs

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use buildwatch::cache::{ChangeCache, compute_file_hash};
use buildwatch::fs::mock::MockFileSystem;
use buildwatch::fs::{FileSystem, RealFileSystem};
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn Error>>;

fn mock_cache() -> (MockFileSystem, ChangeCache) {
    let fs = MockFileSystem::new();
    let cache = ChangeCache::new(Arc::new(fs.clone()));
    (fs, cache)
}

#[test]
fn should_run_is_true_first_and_false_after_commit() -> TestResult {
    let (fs, cache) = mock_cache();
    fs.add_file("src/app.js", "console.log(1);");
    let inputs = vec![PathBuf::from("src/app.js")];

    assert!(cache.should_run("concat", &inputs)?);
    cache.commit("concat", &inputs)?;
    assert!(!cache.should_run("concat", &inputs)?);
    Ok(())
}

#[test]
fn content_change_is_detected() -> TestResult {
    let (fs, cache) = mock_cache();
    fs.add_file("src/app.js", "v1");
    let inputs = vec![PathBuf::from("src/app.js")];
    cache.commit("concat", &inputs)?;

    fs.add_file("src/app.js", "v2");
    assert!(cache.should_run("concat", &inputs)?);
    Ok(())
}

#[test]
fn input_set_change_is_detected() -> TestResult {
    let (fs, cache) = mock_cache();
    fs.add_file("src/a.js", "a");
    fs.add_file("src/b.js", "b");
    let one = vec![PathBuf::from("src/a.js")];
    let two = vec![PathBuf::from("src/a.js"), PathBuf::from("src/b.js")];

    cache.commit("concat", &one)?;
    assert!(cache.should_run("concat", &two)?, "added file");

    cache.commit("concat", &two)?;
    assert!(cache.should_run("concat", &one)?, "removed file");

    let swapped = vec![PathBuf::from("src/b.js")];
    cache.commit("concat", &one)?;
    assert!(cache.should_run("concat", &swapped)?, "same size, other file");
    Ok(())
}

#[test]
fn records_are_namespaced_per_task() -> TestResult {
    let (fs, cache) = mock_cache();
    fs.add_file("src/a.js", "a");
    let inputs = vec![PathBuf::from("src/a.js")];

    cache.commit("lint", &inputs)?;
    assert!(!cache.should_run("lint", &inputs)?);
    assert!(cache.should_run("concat", &inputs)?);
    assert!(cache.has_record("lint", &inputs[0]));
    assert!(!cache.has_record("concat", &inputs[0]));
    Ok(())
}

#[test]
fn commit_overwrites_and_invalidate_forces_a_run() -> TestResult {
    let (fs, cache) = mock_cache();
    fs.add_file("src/a.js", "a");
    fs.add_file("src/b.js", "b");

    cache.commit("concat", &[PathBuf::from("src/a.js"), PathBuf::from("src/b.js")])?;
    cache.commit("concat", &[PathBuf::from("src/b.js")])?;

    let records = cache.records("concat");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].path, PathBuf::from("src/b.js"));
    assert_eq!(records[0].task, "concat");
    assert_eq!(records[0].signature, compute_file_hash(&fs, &records[0].path)?);

    cache.invalidate("concat");
    assert!(cache.records("concat").is_empty());
    assert!(cache.should_run("concat", &[PathBuf::from("src/b.js")])?);
    Ok(())
}

#[test]
fn missing_input_is_an_error() {
    let (_fs, cache) = mock_cache();
    let err = cache
        .should_run("concat", &[PathBuf::from("nope.js")])
        .unwrap_err();
    assert!(format!("{err:#}").contains("nope.js"));
}

#[test]
fn real_files_hash_by_content() -> TestResult {
    let dir = tempdir()?;
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    std::fs::write(&a, "same")?;
    std::fs::write(&b, "same")?;

    let fs = RealFileSystem;
    assert_eq!(compute_file_hash(&fs, &a)?, compute_file_hash(&fs, &b)?);

    std::fs::write(&b, "different")?;
    assert_ne!(compute_file_hash(&fs, &a)?, compute_file_hash(&fs, &b)?);

    let cache = ChangeCache::new(Arc::new(RealFileSystem) as Arc<dyn FileSystem>);
    let inputs = vec![a.clone()];
    cache.commit("copy", &inputs)?;
    assert!(!cache.should_run("copy", &inputs)?);
    std::fs::write(&a, "edited")?;
    assert!(cache.should_run("copy", &inputs)?);
    Ok(())
}
