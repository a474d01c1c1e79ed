use crate::buffer::{RingBuffer, WriterMode};
use crate::error::{LinkRejected, PipelineError, Result};
use crate::processor::{Processor, Socket};
use crate::tracker::{Trackable, TrackerSlot};
use log::{debug, error, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Asynchronous hosting strategy: a bounded queue drained by one dedicated
/// consumer thread.
///
/// Pipes are linked into chains; each pipe exclusively owns the reference to
/// the next stage. Submitting to the head starts execution; items flow
/// downstream through the bounded queues, with a full queue blocking the
/// producer (backpressure). [`shutdown`](Pipe::shutdown) on the head stage
/// drains every stage in order and returns once the whole chain has
/// terminated.
///
/// ```no_run
/// use flowline::{MapProcessor, Pipe};
///
/// let mut head = Pipe::new(MapProcessor::new("double", |x: u32| Ok(x * 2)), 64);
/// let tail = Pipe::new(MapProcessor::new("print", |x: u32| {
///     println!("{x}");
///     Ok(x)
/// }), 64);
/// head.link_to(tail).unwrap();
/// head.submit(21);
/// head.shutdown().unwrap();
/// ```
pub struct Pipe<P: Processor> {
    inlet: Inlet<P::Input>,
    outlet: Outlet<P::Output>,
    tracker: TrackerSlot,
    failure: Arc<Mutex<Option<PipelineError>>>,
    worker: Option<JoinHandle<()>>,
    output_mode: WriterMode,
    name: Arc<str>,
}

/// Submit side of a pipe: the bounded queue plus its lifecycle flags.
/// Cheap to clone; used by upstream workers and the multiplexer to feed
/// items in.
pub(crate) struct Inlet<I: Send + 'static> {
    queue: RingBuffer<I>,
    accepting: Arc<AtomicBool>,
    draining: Arc<AtomicBool>,
    consuming: Arc<AtomicBool>,
    name: Arc<str>,
}

impl<I: Send + 'static> Clone for Inlet<I> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            accepting: Arc::clone(&self.accepting),
            draining: Arc::clone(&self.draining),
            consuming: Arc::clone(&self.consuming),
            name: Arc::clone(&self.name),
        }
    }
}

impl<I: Send + 'static> Inlet<I> {
    /// Enqueue an item, blocking while the queue is full. Items arriving
    /// after shutdown began (or after the stage failed) are dropped.
    pub(crate) fn submit(&self, item: I) {
        if !self.accepting.load(Ordering::Acquire) {
            warn!("stage '{}' is no longer accepting items, dropping", self.name);
            return;
        }
        self.queue.push(item);
    }
}

/// Downstream side of a pipe: slots for the next stage's inlet (used by the
/// worker to forward items) and for the owned next stage itself (used by the
/// shutdown cascade). Shared so a chain can be extended at the tail after
/// earlier stages were type-erased.
pub(crate) struct Outlet<O: Send + 'static> {
    sink: Arc<Mutex<Option<Inlet<O>>>>,
    control: Arc<Mutex<Option<Box<dyn StageControl>>>>,
}

impl<O: Send + 'static> Clone for Outlet<O> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            control: Arc::clone(&self.control),
        }
    }
}

impl<O: Send + 'static> Outlet<O> {
    fn new() -> Self {
        Self {
            sink: Arc::new(Mutex::new(None)),
            control: Arc::new(Mutex::new(None)),
        }
    }

    /// Attach `next` as the downstream stage of whatever owns this outlet.
    /// Returns `next`'s outlet so the chain can be extended further.
    pub(crate) fn attach<Q: Processor<Input = O>>(
        &self,
        upstream_name: &str,
        upstream_mode: WriterMode,
        next: Pipe<Q>,
    ) -> std::result::Result<Outlet<Q::Output>, LinkRejected<Pipe<Q>>> {
        let mut sink = self.sink.lock();
        if sink.is_some() {
            return Err(LinkRejected {
                error: PipelineError::AlreadyLinked(upstream_name.to_string()),
                stage: next,
            });
        }
        if next.inlet.consuming.load(Ordering::Acquire) {
            let name = next.name().to_string();
            return Err(LinkRejected {
                error: PipelineError::AlreadyConsuming(name),
                stage: next,
            });
        }

        // The new stage inherits this stage's producer arity.
        next.inlet.queue.set_writer_mode(upstream_mode);
        next.inlet.consuming.store(true, Ordering::Release);

        debug!("linked stage '{}' -> '{}'", upstream_name, next.name());
        let outlet = next.outlet.clone();
        *sink = Some(next.inlet.clone());
        *self.control.lock() = Some(Box::new(next));
        Ok(outlet)
    }
}

/// Shutdown surface of a type-erased downstream stage.
pub(crate) trait StageControl: Send + Sync {
    fn shutdown_stage(&mut self) -> Result<()>;
}

impl<P: Processor> Pipe<P> {
    /// Create an unlinked pipe around `processor` with a queue of at least
    /// `capacity` slots (rounded up to a power of two). The worker thread
    /// starts immediately and idles until items arrive.
    pub fn new(processor: P, capacity: usize) -> Self {
        Self::from_socket(Socket::new(processor), capacity)
    }

    pub(crate) fn from_socket(socket: Socket<P>, capacity: usize) -> Self {
        let name: Arc<str> = Arc::from(socket.processor_name());
        let inlet = Inlet {
            queue: RingBuffer::new(capacity, WriterMode::Single),
            accepting: Arc::new(AtomicBool::new(true)),
            draining: Arc::new(AtomicBool::new(false)),
            consuming: Arc::new(AtomicBool::new(false)),
            name: Arc::clone(&name),
        };
        let outlet = Outlet::new();
        let failure = Arc::new(Mutex::new(None));
        let tracker = Arc::clone(socket.tracker_slot());

        let worker = spawn_worker(socket, inlet.clone(), outlet.clone(), Arc::clone(&failure));

        Self {
            inlet,
            outlet,
            tracker,
            failure,
            worker: Some(worker),
            output_mode: WriterMode::Single,
            name,
        }
    }

    /// Declare that this stage writes to its downstream with more than one
    /// thread (a processor that hands items to helper threads, or a stage fed
    /// into by a fan-out). Must be called before linking; the flag propagates
    /// into the downstream queue's synchronization discipline at link time.
    pub fn with_output_writer_mode(mut self, mode: WriterMode) -> Self {
        self.output_mode = mode;
        self
    }

    /// Select the synchronization discipline of this pipe's own input queue.
    /// Only meaningful for the head of a chain; linked stages get their mode
    /// from their upstream at link time.
    pub fn set_writer_mode(&self, mode: WriterMode) {
        self.inlet.queue.set_writer_mode(mode);
    }

    /// The wrapped processor's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a downstream stage has been linked.
    pub fn is_linked(&self) -> bool {
        self.outlet.sink.lock().is_some()
    }

    /// Submit an item, blocking while the queue is full.
    pub fn submit(&self, item: P::Input) {
        self.inlet.submit(item);
    }

    /// Submit an optional item. `None` is a no-op: nothing is enqueued and
    /// nothing is processed.
    pub fn submit_opt(&self, item: Option<P::Input>) {
        if let Some(item) = item {
            self.inlet.submit(item);
        }
    }

    /// Link `next` as this pipe's downstream stage, consuming it. Fails if
    /// this pipe already has a downstream or `next` already has an upstream;
    /// the rejected stage is handed back untouched inside the error. Type
    /// compatibility is enforced at compile time.
    pub fn link_to<Q>(&mut self, next: Pipe<Q>) -> std::result::Result<(), LinkRejected<Pipe<Q>>>
    where
        Q: Processor<Input = P::Output>,
    {
        self.outlet.attach(&self.name, self.output_mode, next)?;
        Ok(())
    }

    /// Shut down this stage and, in cascade, every stage linked downstream.
    ///
    /// Stops accepting new submissions, drains the queue, runs the
    /// processor's finalize hook (forwarding its result downstream as a final
    /// item), then shuts the downstream stage down and joins the worker.
    /// Blocks until the entire chain has terminated. The first stage failure
    /// encountered is returned, naming the failing stage; the cascade always
    /// runs to completion so no stage is left blocked.
    pub fn shutdown(mut self) -> Result<()> {
        self.shutdown_in_place()
    }

    fn shutdown_in_place(&mut self) -> Result<()> {
        let mut first_error = None;

        if let Some(worker) = self.worker.take() {
            debug!("shutting down stage '{}'", self.name);
            self.inlet.accepting.store(false, Ordering::Release);
            self.inlet.draining.store(true, Ordering::Release);
            if worker.join().is_err() {
                first_error = Some(PipelineError::ThreadError(self.name.to_string()));
            }
        }

        if first_error.is_none() {
            first_error = self.failure.lock().take();
        }

        // Cascade even after a failure so downstream stages drain and
        // terminate instead of idling forever.
        let control = self.outlet.control.lock().take();
        if let Some(mut downstream) = control {
            let cascade = downstream.shutdown_stage();
            if first_error.is_none() {
                first_error = cascade.err();
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Expose the submit side for fan-in wiring inside the crate.
    pub(crate) fn inlet(&self) -> Inlet<P::Input> {
        self.inlet.clone()
    }

    /// Expose the downstream slots for chain building inside the crate.
    pub(crate) fn outlet(&self) -> Outlet<P::Output> {
        self.outlet.clone()
    }

    pub(crate) fn output_mode(&self) -> WriterMode {
        self.output_mode
    }
}

impl<P: Processor> StageControl for Pipe<P> {
    fn shutdown_stage(&mut self) -> Result<()> {
        self.shutdown_in_place()
    }
}

impl<P: Processor> Trackable for Pipe<P> {
    fn tracker_slot(&self) -> &TrackerSlot {
        &self.tracker
    }
}

impl<P: Processor> Drop for Pipe<P> {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.shutdown_in_place();
        }
    }
}

/// The dedicated consumer loop: dequeue, process, forward each output to the
/// linked downstream inlet (or discard when unlinked). Runs until shutdown
/// drains the queue; a processor failure aborts the stage, discarding
/// whatever is still queued so blocked producers are released.
fn spawn_worker<P: Processor>(
    mut socket: Socket<P>,
    inlet: Inlet<P::Input>,
    outlet: Outlet<P::Output>,
    failure: Arc<Mutex<Option<PipelineError>>>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let sink = outlet.sink;
        let mut emit = move |item: P::Output| {
            if let Some(downstream) = sink.lock().as_ref() {
                downstream.submit(item);
            }
            // No downstream: terminal stage, item is discarded.
        };

        let failed = loop {
            match inlet.queue.pop() {
                Some(item) => {
                    if let Err(err) = socket.consume(item, &mut emit) {
                        break Some(err);
                    }
                }
                None => {
                    if inlet.draining.load(Ordering::Acquire) {
                        break None;
                    }
                    thread::sleep(Duration::from_micros(10));
                }
            }
        };

        match failed {
            None => {
                if let Err(err) = socket.finish(&mut emit) {
                    error!("stage '{}' failed during finalize: {err}", inlet.name);
                    *failure.lock() = Some(PipelineError::stage(&*inlet.name, err));
                }
            }
            Some(err) => {
                error!("stage '{}' failed: {err}", inlet.name);
                *failure.lock() = Some(PipelineError::stage(&*inlet.name, err));
                // Refuse new items and unblock any producer stuck on a full
                // queue by discarding what is left.
                inlet.accepting.store(false, Ordering::Release);
                while inlet.queue.pop().is_some() {}
            }
        }
        debug!("stage '{}' terminated", inlet.name);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{CollectingProcessor, MapProcessor};
    use std::sync::Mutex as StdMutex;

    fn sink_into(buffer: Arc<StdMutex<Vec<u32>>>) -> impl Processor<Input = u32, Output = u32> {
        MapProcessor::new("sink", move |x: u32| {
            buffer.lock().unwrap().push(x);
            Ok(x)
        })
    }

    #[test]
    fn single_pipe_processes_in_fifo_order() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let pipe = Pipe::new(sink_into(Arc::clone(&seen)), 8);
        for i in 0..100 {
            pipe.submit(i);
        }
        pipe.shutdown().unwrap();
        assert_eq!(*seen.lock().unwrap(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn submit_opt_none_is_noop() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let pipe = Pipe::new(sink_into(Arc::clone(&seen)), 8);
        pipe.submit_opt(None);
        pipe.submit_opt(Some(7));
        pipe.shutdown().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[test]
    fn linked_pipes_forward_downstream() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let mut head = Pipe::new(MapProcessor::new("double", |x: u32| Ok(x * 2)), 8);
        let tail = Pipe::new(sink_into(Arc::clone(&seen)), 8);
        head.link_to(tail).unwrap();

        for i in 0..10 {
            head.submit(i);
        }
        head.shutdown().unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            (0..10).map(|i| i * 2).collect::<Vec<_>>()
        );
    }

    #[test]
    fn relinking_is_rejected_and_returns_stage() {
        let mut head = Pipe::new(MapProcessor::new("head", |x: u32| Ok(x)), 8);
        let first = Pipe::new(MapProcessor::new("first", |x: u32| Ok(x)), 8);
        let second = Pipe::new(MapProcessor::new("second", |x: u32| Ok(x)), 8);

        head.link_to(first).unwrap();
        let rejected = head.link_to(second).unwrap_err();
        assert!(matches!(rejected.error, PipelineError::AlreadyLinked(_)));
        // The rejected stage comes back usable.
        rejected.stage.submit(1);
        rejected.stage.shutdown().unwrap();
        head.shutdown().unwrap();
    }

    #[test]
    fn finalize_result_is_forwarded_as_final_item() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let mut head = Pipe::new(CollectingProcessor::new("collect"), 8);
        let tail = Pipe::new(
            MapProcessor::new("record", move |items: Vec<u32>| {
                seen_clone.lock().unwrap().push(items);
                Ok(())
            }),
            8,
        );
        head.link_to(tail).unwrap();

        for i in 0..5 {
            head.submit(i);
        }
        head.shutdown().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![vec![0, 1, 2, 3, 4]]);
    }

    #[test]
    fn processor_failure_surfaces_and_chain_still_terminates() {
        let mut head = Pipe::new(
            MapProcessor::new("explode", |x: u32| {
                if x == 3 {
                    Err(PipelineError::ConfigError("boom".into()))
                } else {
                    Ok(x)
                }
            }),
            8,
        );
        let tail = Pipe::new(MapProcessor::new("tail", |x: u32| Ok(x)), 8);
        head.link_to(tail).unwrap();

        for i in 0..6 {
            head.submit(i);
        }
        let err = head.shutdown().unwrap_err();
        match err {
            PipelineError::StageError { stage, .. } => assert_eq!(stage, "explode"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn backpressure_blocks_producer() {
        // A slow consumer with a tiny queue must throttle the producer.
        let pipe = Pipe::new(
            MapProcessor::new("slow", |x: u32| {
                thread::sleep(Duration::from_millis(5));
                Ok(x)
            }),
            4,
        );
        let start = std::time::Instant::now();
        for i in 0..20 {
            pipe.submit(i);
        }
        // 20 items at 5ms each through a 4-slot queue cannot all be
        // enqueued instantly.
        assert!(start.elapsed() >= Duration::from_millis(40));
        pipe.shutdown().unwrap();
    }
}
