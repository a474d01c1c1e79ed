use crate::buffer::WriterMode;
use crate::error::Result;
use crate::pipe::{Inlet, Outlet, Pipe, StageControl};
use crate::processor::Processor;
use crate::tracker::{Trackable, TrackerSlot};

/// Builds a validated chain of pipes and drives it as a whole.
///
/// The chain has exactly one head (accepting external submissions) and one
/// tail; [`append`](PipeLinker::append) extends it at the tail with
/// compile-time input/output type matching. `I` is the chain's input type,
/// `O` the current tail's output type.
///
/// ```no_run
/// use flowline::{FilterProcessor, MapProcessor, Pipe, PipeLinker};
///
/// let chain = PipeLinker::new(Pipe::new(
///     MapProcessor::new("parse", |s: String| Ok(s.len() as u32)),
///     64,
/// ))
/// .append(Pipe::new(FilterProcessor::new("short", |n: &u32| *n < 10), 64))
/// .unwrap();
///
/// chain
///     .submit_and_shutdown(vec!["a".to_string(), "bb".to_string()])
///     .unwrap();
/// ```
pub struct PipeLinker<I: Send + 'static, O: Send + 'static> {
    head_inlet: Inlet<I>,
    head_tracker: TrackerSlot,
    chain: Box<dyn StageControl>,
    tail_outlet: Outlet<O>,
    tail_name: String,
    tail_mode: WriterMode,
}

impl<I: Send + 'static, O: Send + 'static> PipeLinker<I, O> {
    /// Start a chain at `head`, assuming items are submitted from a single
    /// thread. Use [`new_multi_writer`](PipeLinker::new_multi_writer) when
    /// several threads will submit.
    pub fn new<P>(head: Pipe<P>) -> Self
    where
        P: Processor<Input = I, Output = O>,
    {
        Self::with_writer_mode(head, WriterMode::Single)
    }

    /// Start a chain whose head accepts submissions from multiple threads.
    pub fn new_multi_writer<P>(head: Pipe<P>) -> Self
    where
        P: Processor<Input = I, Output = O>,
    {
        Self::with_writer_mode(head, WriterMode::Multi)
    }

    fn with_writer_mode<P>(head: Pipe<P>, mode: WriterMode) -> Self
    where
        P: Processor<Input = I, Output = O>,
    {
        head.set_writer_mode(mode);
        Self {
            head_inlet: head.inlet(),
            head_tracker: std::sync::Arc::clone(head.tracker_slot()),
            tail_outlet: head.outlet(),
            tail_name: head.name().to_string(),
            tail_mode: head.output_mode(),
            chain: Box::new(head),
        }
    }

    /// Append `next` at the tail of the chain, consuming both. Fails fast on
    /// a runtime link error, aborting chain construction; type compatibility
    /// between the tail's output and `next`'s input is checked at compile
    /// time.
    pub fn append<Q>(self, next: Pipe<Q>) -> Result<PipeLinker<I, Q::Output>>
    where
        Q: Processor<Input = O>,
    {
        let next_name = next.name().to_string();
        let next_mode = next.output_mode();
        let outlet = self
            .tail_outlet
            .attach(&self.tail_name, self.tail_mode, next)
            .map_err(|rejected| rejected.into_error())?;

        Ok(PipeLinker {
            head_inlet: self.head_inlet,
            head_tracker: self.head_tracker,
            chain: self.chain,
            tail_outlet: outlet,
            tail_name: next_name,
            tail_mode: next_mode,
        })
    }

    /// Submit one item to the head stage, blocking while its queue is full.
    pub fn submit(&self, item: I) {
        self.head_inlet.submit(item);
    }

    /// Submit an optional item; `None` is a no-op.
    pub fn submit_opt(&self, item: Option<I>) {
        if let Some(item) = item {
            self.head_inlet.submit(item);
        }
    }

    /// Submit every item in order.
    pub fn submit_all(&self, items: impl IntoIterator<Item = I>) {
        for item in items {
            self.head_inlet.submit(item);
        }
    }

    /// Shut the chain down, cascading from head to tail. Blocks until every
    /// stage has drained and terminated.
    pub fn shutdown(mut self) -> Result<()> {
        self.chain.shutdown_stage()
    }

    /// Submit every item, then shut down; returns once the full chain has
    /// drained.
    pub fn submit_and_shutdown(self, items: impl IntoIterator<Item = I>) -> Result<()> {
        self.submit_all(items);
        self.shutdown()
    }
}

/// Tracking calls address the head stage; delegate further down the chain at
/// construction time if another stage should report progress instead.
impl<I: Send + 'static, O: Send + 'static> Trackable for PipeLinker<I, O> {
    fn tracker_slot(&self) -> &TrackerSlot {
        &self.head_tracker
    }
}
