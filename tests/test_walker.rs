use flowline::{Trackable, TreeWalkerBuilder, WorkerPool};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

static DIR_SEQ: AtomicU64 = AtomicU64::new(0);

/// A scratch directory that cleans itself up.
struct ScratchDir(PathBuf);

impl ScratchDir {
    fn new() -> Self {
        let seq = DIR_SEQ.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!("flowline-walk-{}-{seq}", process::id()));
        fs::create_dir_all(&path).unwrap();
        Self(path)
    }

    fn path(&self) -> &Path {
        &self.0
    }

    fn touch(&self, rel: &str) {
        let path = self.0.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    fn mkdir(&self, rel: &str) {
        fs::create_dir_all(self.0.join(rel)).unwrap();
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

fn names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .collect()
}

#[test]
fn txt_files_are_found_in_traversal_order() {
    let dir = ScratchDir::new();
    dir.touch("a.txt");
    dir.touch("b.log");
    dir.touch("sub/c.txt");

    let walker = TreeWalkerBuilder::new(Some("*.txt"))
        .unwrap()
        .search_for_files()
        .relative()
        .pool_size(2)
        .unwrap()
        .build()
        .unwrap();

    let dispatched = Arc::new(Mutex::new(Vec::new()));
    let dispatched_clone = Arc::clone(&dispatched);
    let matched = walker
        .walk(dir.path(), move |path| {
            dispatched_clone.lock().unwrap().push(path);
        })
        .unwrap();
    walker.shutdown().unwrap();

    assert_eq!(names(&matched), vec!["a.txt", "sub/c.txt"]);

    let mut dispatched = names(&dispatched.lock().unwrap());
    dispatched.sort();
    assert_eq!(dispatched, vec!["a.txt", "sub/c.txt"]);
}

#[test]
fn directory_search_can_skip_the_matched_subtree() {
    let dir = ScratchDir::new();
    dir.mkdir("data/inner/data");
    dir.touch("data/file.txt");
    dir.mkdir("other/data");

    let walker = TreeWalkerBuilder::new(Some("data"))
        .unwrap()
        .search_for_directories()
        .skip_subtree_after_match()
        .relative()
        .pool_size(1)
        .unwrap()
        .build()
        .unwrap();

    let matched = walker.walk(dir.path(), |_| {}).unwrap();
    walker.shutdown().unwrap();

    // inner/data is below a match and must not be visited
    assert_eq!(names(&matched), vec!["data", "other/data"]);
}

#[test]
fn without_skip_nested_matches_are_reported() {
    let dir = ScratchDir::new();
    dir.mkdir("data/inner/data");

    let walker = TreeWalkerBuilder::new(Some("data"))
        .unwrap()
        .search_for_directories()
        .relative()
        .pool_size(1)
        .unwrap()
        .build()
        .unwrap();

    let matched = walker.walk(dir.path(), |_| {}).unwrap();
    walker.shutdown().unwrap();

    assert_eq!(names(&matched), vec!["data", "data/inner/data"]);
}

#[test]
fn max_depth_limits_the_traversal() {
    let dir = ScratchDir::new();
    dir.touch("a.txt");
    dir.touch("sub/b.txt");
    dir.touch("sub/deep/c.txt");

    let walker = TreeWalkerBuilder::new(Some("*.txt"))
        .unwrap()
        .search_for_files()
        .relative()
        .max_depth(2)
        .pool_size(1)
        .unwrap()
        .build()
        .unwrap();

    let matched = walker.walk(dir.path(), |_| {}).unwrap();
    walker.shutdown().unwrap();

    assert_eq!(names(&matched), vec!["a.txt", "sub/b.txt"]);
}

#[test]
fn absolute_paths_are_reported_by_default() {
    let dir = ScratchDir::new();
    dir.touch("a.txt");

    let walker = TreeWalkerBuilder::new(Some("*.txt"))
        .unwrap()
        .search_for_files()
        .pool_size(1)
        .unwrap()
        .build()
        .unwrap();

    let matched = walker.walk(dir.path(), |_| {}).unwrap();
    walker.shutdown().unwrap();

    assert_eq!(matched, vec![dir.path().join("a.txt")]);
}

#[test]
fn include_root_reports_a_matching_root_as_dot() {
    let dir = ScratchDir::new();
    dir.mkdir("sub");

    let walker = TreeWalkerBuilder::new(None)
        .unwrap()
        .search_for_directories()
        .include_root_dir()
        .relative()
        .pool_size(1)
        .unwrap()
        .build()
        .unwrap();

    let matched = walker.walk(dir.path(), |_| {}).unwrap();
    walker.shutdown().unwrap();

    assert_eq!(names(&matched), vec![".", "sub"]);
}

#[test]
fn walking_a_missing_root_is_an_error() {
    let dir = ScratchDir::new();
    let missing = dir.path().join("nope");

    let walker = TreeWalkerBuilder::new(Some("*"))
        .unwrap()
        .search_for_files()
        .pool_size(1)
        .unwrap()
        .build()
        .unwrap();

    assert!(walker.walk(&missing, |_| {}).is_err());
    walker.shutdown().unwrap();
}

#[test]
fn tracking_counts_matches() {
    let dir = ScratchDir::new();
    for i in 0..7 {
        dir.touch(&format!("f{i}.txt"));
    }
    dir.touch("skip.log");

    let walker = TreeWalkerBuilder::new(Some("*.txt"))
        .unwrap()
        .search_for_files()
        .pool(WorkerPool::new(1, 2, Duration::from_millis(100)).unwrap())
        .build()
        .unwrap();
    walker.enable_tracking_with_step(3);

    let matched = walker.walk(dir.path(), |_| {}).unwrap();
    let tracker = walker.tracker().unwrap();
    walker.shutdown().unwrap();

    assert_eq!(matched.len(), 7);
    assert_eq!(tracker.count(), 7);
}
