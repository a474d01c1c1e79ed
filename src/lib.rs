//! An embeddable in-process pipeline framework.
//!
//! Independent units of computation ([`Processor`]s) compose into chains
//! whose stages execute concurrently, each on its own worker thread, with
//! results flowing downstream through bounded queues. A full queue blocks
//! the producer, so a slow stage throttles a fast one instead of growing
//! memory without bound.
//!
//! # Features
//!
//! - Three interchangeable hosting strategies per processor: synchronous
//!   [`Module`], queued [`Pipe`], externally driven [`EventHandler`]
//! - [`PipeLinker`] chain builder with compile-time type matching between
//!   adjacent stages and cascading, fully draining shutdown
//! - [`Multiplexer`] fan-in merging concurrent handler output into one
//!   single-threaded stream
//! - [`WorkerPool`] with bounded queue, blocking submission and on-demand
//!   growth between core and max size
//! - [`TreeWalker`] traversing directory trees and dispatching matches into
//!   the pool under backpressure
//! - Progress [`Tracker`]s whose ownership moves between stages
//!
//! # Example
//!
//! ```no_run
//! use flowline::{MapProcessor, Pipe, PipeLinker};
//!
//! let chain = PipeLinker::new(Pipe::new(
//!     MapProcessor::new("parse", |line: String| Ok(line.len() as u64)),
//!     256,
//! ))
//! .append(Pipe::new(
//!     MapProcessor::new("report", |n: u64| {
//!         println!("{n}");
//!         Ok(n)
//!     }),
//!     256,
//! ))
//! .unwrap();
//!
//! chain.submit("hello".to_string());
//! chain.shutdown().unwrap();
//! ```

pub mod buffer;
pub mod error;
pub mod glob;
pub mod handler;
pub mod linker;
pub mod module;
pub mod multiplexer;
pub mod pipe;
pub mod pool;
pub mod processor;
pub mod tracker;
pub mod walker;

// Re-exports for convenience
pub use buffer::{RingBuffer, WriterMode};
pub use error::{LinkRejected, PipelineError, Result};
pub use glob::PathMatcher;
pub use handler::EventHandler;
pub use linker::PipeLinker;
pub use module::Module;
pub use multiplexer::Multiplexer;
pub use pipe::Pipe;
pub use pool::WorkerPool;
pub use processor::{CollectingProcessor, FilterProcessor, MapProcessor, Processor, Socket};
pub use tracker::{Trackable, Tracker};
pub use walker::{TreeWalker, TreeWalkerBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
