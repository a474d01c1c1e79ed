use crate::error::{PipelineError, Result};
use crate::glob::PathMatcher;
use crate::pool::WorkerPool;
use crate::tracker::{self, Trackable, TrackerSlot};
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Fluent configuration for a [`TreeWalker`].
///
/// At least one of [`search_for_files`](TreeWalkerBuilder::search_for_files)
/// and [`search_for_directories`](TreeWalkerBuilder::search_for_directories)
/// must be selected, and a worker pool must be supplied; both are checked at
/// [`build`](TreeWalkerBuilder::build) time.
pub struct TreeWalkerBuilder {
    matcher: Option<PathMatcher>,
    pool: Option<WorkerPool>,
    search_files: bool,
    search_dirs: bool,
    skip_after_find: bool,
    include_root: bool,
    relative: bool,
    max_depth: usize,
}

impl TreeWalkerBuilder {
    /// Start configuring a walker. `pattern` is compiled once; `None`
    /// matches every node.
    pub fn new(pattern: Option<&str>) -> Result<Self> {
        let matcher = match pattern {
            Some(pattern) => Some(PathMatcher::new(pattern)?),
            None => None,
        };
        Ok(Self {
            matcher,
            pool: None,
            search_files: false,
            search_dirs: false,
            skip_after_find: false,
            include_root: false,
            relative: false,
            max_depth: usize::MAX,
        })
    }

    /// Match regular files.
    pub fn search_for_files(mut self) -> Self {
        self.search_files = true;
        self
    }

    /// Match directories.
    pub fn search_for_directories(mut self) -> Self {
        self.search_dirs = true;
        self
    }

    /// Do not descend below a matched directory.
    pub fn skip_subtree_after_match(mut self) -> Self {
        self.skip_after_find = true;
        self
    }

    /// Consider the search root itself a candidate.
    pub fn include_root_dir(mut self) -> Self {
        self.include_root = true;
        self
    }

    /// Report paths relative to the search root instead of as given.
    pub fn relative(mut self) -> Self {
        self.relative = true;
        self
    }

    /// Limit traversal depth; the root is depth 0, its children depth 1.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Dispatch matched work into the given pool.
    pub fn pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Convenience: a fixed-size pool with a one second keep-alive.
    pub fn pool_size(self, size: usize) -> Result<Self> {
        Ok(self.pool(WorkerPool::with_size(size)?))
    }

    /// Validate the configuration and build the walker.
    pub fn build(self) -> Result<TreeWalker> {
        let pool = self.pool.ok_or_else(|| {
            PipelineError::ConfigError("no worker pool given for tree walker".into())
        })?;
        if !self.search_files && !self.search_dirs {
            return Err(PipelineError::ConfigError(
                "define whether files or directories shall be searched".into(),
            ));
        }
        Ok(TreeWalker {
            matcher: self.matcher,
            pool,
            search_files: self.search_files,
            search_dirs: self.search_dirs,
            skip_after_find: self.skip_after_find,
            include_root: self.include_root,
            relative: self.relative,
            max_depth: self.max_depth,
            tracker: tracker::new_slot(),
        })
    }
}

/// Depth-first traversal of a directory tree that dispatches each matched
/// node as a unit of work into a bounded worker pool.
///
/// Traversal itself is single-threaded (and deterministic: entries are
/// visited in file-name order); only the per-match work runs in parallel.
/// Submission into a saturated pool blocks the traversal, bounding memory
/// use when the tree is large and match processing is slow.
pub struct TreeWalker {
    matcher: Option<PathMatcher>,
    pool: WorkerPool,
    search_files: bool,
    search_dirs: bool,
    skip_after_find: bool,
    include_root: bool,
    relative: bool,
    max_depth: usize,
    tracker: TrackerSlot,
}

impl TreeWalker {
    /// Walk the tree under `root`, dispatching `on_match` for every matched
    /// node and returning the matched paths in traversal order.
    ///
    /// An unreadable node aborts the walk with an error; work already
    /// dispatched keeps running in the pool.
    pub fn walk<F>(&self, root: &Path, on_match: F) -> Result<Vec<PathBuf>>
    where
        F: Fn(PathBuf) + Send + Sync + 'static,
    {
        let on_match = Arc::new(on_match);
        let mut matched = Vec::new();

        let mut entries = WalkDir::new(root)
            .max_depth(self.max_depth)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = entries.next() {
            let entry = entry.map_err(|err| walk_error(root, err))?;
            let is_dir = entry.file_type().is_dir();
            if entry.depth() == 0 && is_dir && !self.include_root {
                continue;
            }
            let wanted = if is_dir {
                self.search_dirs
            } else {
                self.search_files
            };
            if !wanted {
                continue;
            }
            let hit = match &self.matcher {
                Some(matcher) => matcher.matches(entry.path()),
                None => true,
            };
            if !hit {
                continue;
            }

            if let Some(tracker) = self.tracker.lock().clone() {
                tracker.track();
            }
            let reported = self.reported_path(root, entry.path());
            debug!("matched '{}'", reported.display());
            matched.push(reported.clone());

            let callback = Arc::clone(&on_match);
            self.pool.submit(move || callback(reported));

            if is_dir && self.skip_after_find {
                entries.skip_current_dir();
            }
        }
        Ok(matched)
    }

    fn reported_path(&self, root: &Path, path: &Path) -> PathBuf {
        if !self.relative {
            return path.to_path_buf();
        }
        match path.strip_prefix(root) {
            Ok(rel) if rel.as_os_str().is_empty() => PathBuf::from("."),
            Ok(rel) => rel.to_path_buf(),
            Err(_) => path.to_path_buf(),
        }
    }

    /// The pool backing this walker.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Wait for all dispatched work to finish and release the pool.
    pub fn shutdown(self) -> Result<()> {
        self.pool.shutdown_and_await()
    }
}

impl Trackable for TreeWalker {
    fn tracker_slot(&self) -> &TrackerSlot {
        &self.tracker
    }
}

fn walk_error(root: &Path, err: walkdir::Error) -> PipelineError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
    PipelineError::WalkError { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_without_pool_is_a_config_error() {
        let result = TreeWalkerBuilder::new(Some("*.txt"))
            .unwrap()
            .search_for_files()
            .build();
        assert!(matches!(result, Err(PipelineError::ConfigError(_))));
    }

    #[test]
    fn build_without_search_target_is_a_config_error() {
        let result = TreeWalkerBuilder::new(Some("*.txt"))
            .unwrap()
            .pool_size(1)
            .unwrap()
            .build();
        assert!(matches!(result, Err(PipelineError::ConfigError(_))));
    }

    #[test]
    fn bad_pattern_is_rejected_up_front() {
        assert!(TreeWalkerBuilder::new(Some("[oops")).is_err());
    }
}
