//! Parallel file finder
//!
//! Walks a directory tree, matches file names against a glob pattern and
//! hashes every match on a worker pool while the traversal continues.
//!
//! Usage: cargo run --example find_files --release -- <root> <pattern>
//!        e.g. cargo run --example find_files -- . "*.rs"

use flowline::{Trackable, TreeWalkerBuilder, WorkerPool};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let root = PathBuf::from(args.next().unwrap_or_else(|| ".".into()));
    let pattern = args.next().unwrap_or_else(|| "*".into());

    let pool = WorkerPool::new(2, 8, Duration::from_secs(1))?;
    let walker = TreeWalkerBuilder::new(Some(&pattern))?
        .search_for_files()
        .relative()
        .pool(pool)
        .build()?;
    walker.enable_tracking_with_step(100);

    let base = root.clone();
    let matched = walker.walk(&root, move |path| {
        let full = base.join(&path);
        match fs::read(&full) {
            Ok(bytes) => {
                // FNV-1a, good enough for a demo fingerprint
                let mut hash: u64 = 0xcbf29ce484222325;
                for byte in bytes {
                    hash ^= u64::from(byte);
                    hash = hash.wrapping_mul(0x100000001b3);
                }
                println!("{hash:016x}  {}", path.display());
            }
            Err(err) => eprintln!("skipping {}: {err}", path.display()),
        }
    })?;

    walker.shutdown()?;
    println!("\n{} files matched '{pattern}'", matched.len());
    Ok(())
}
