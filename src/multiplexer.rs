use crate::error::{PipelineError, Result};
use crate::handler::EventHandler;
use crate::processor::Processor;
use crossbeam::channel::{self, Receiver, Sender};
use log::debug;
use std::thread::{self, JoinHandle};

/// Fan-in aggregator: merges output produced concurrently by several
/// handlers into a single stream consumed by one thread.
///
/// Every connected [`EventHandler`] emits into one bounded funnel channel;
/// a single merge thread forwards the funnel to the downstream consumer, so
/// the consumer never needs to be thread-safe. Each handler's own items keep
/// their relative order; across handlers, whichever emission reaches the
/// funnel first is forwarded first.
pub struct Multiplexer<T: Send + 'static> {
    funnel_tx: Option<Sender<T>>,
    funnel_rx: Option<Receiver<T>>,
    worker: Option<JoinHandle<()>>,
    connected: usize,
}

impl<T: Send + 'static> Multiplexer<T> {
    /// Create a multiplexer with a funnel of at least `capacity` slots.
    /// Handler emissions block when the funnel is full (backpressure onto
    /// the fan-out workers).
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = channel::bounded(capacity.max(1));
        Self {
            funnel_tx: Some(tx),
            funnel_rx: Some(rx),
            worker: None,
            connected: 0,
        }
    }

    /// Wire one handler's emission point into the funnel. The source set is
    /// fixed once the multiplexer starts; connecting afterwards is an error.
    pub fn connect<P>(&mut self, handler: &mut EventHandler<P>) -> Result<()>
    where
        P: Processor<Output = T>,
    {
        if self.worker.is_some() {
            return Err(PipelineError::AlreadyStarted);
        }
        let tx = self
            .funnel_tx
            .as_ref()
            .ok_or(PipelineError::AlreadyStarted)?;
        handler.connect(tx.clone());
        self.connected += 1;
        Ok(())
    }

    /// Wire a whole set of handlers at once.
    pub fn connect_handlers<'a, P>(
        &mut self,
        handlers: impl IntoIterator<Item = &'a mut EventHandler<P>>,
    ) -> Result<()>
    where
        P: Processor<Output = T>,
    {
        for handler in handlers {
            self.connect(handler)?;
        }
        Ok(())
    }

    /// Number of handlers connected so far.
    pub fn connected(&self) -> usize {
        self.connected
    }

    /// Start observing the connected handlers: spawns the single merge
    /// thread, which invokes `consumer` for every item until all handlers
    /// have finished and the funnel has drained.
    pub fn start<C>(&mut self, mut consumer: C) -> Result<()>
    where
        C: FnMut(T) + Send + 'static,
    {
        if self.worker.is_some() {
            return Err(PipelineError::AlreadyStarted);
        }
        let rx = self
            .funnel_rx
            .take()
            .ok_or(PipelineError::AlreadyStarted)?;
        debug!("multiplexer starting with {} handlers", self.connected);
        self.worker = Some(thread::spawn(move || {
            for item in rx {
                consumer(item);
            }
            debug!("multiplexer funnel drained");
        }));
        Ok(())
    }

    /// Wait for the merge to complete. All connected handlers must have been
    /// finished or dropped, otherwise the funnel stays open and this blocks.
    pub fn shutdown(mut self) -> Result<()> {
        // Release our own sender so the funnel closes once every handler
        // has let go of its clone.
        self.funnel_tx = None;
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| PipelineError::ThreadError("multiplexer".into()))?;
        }
        Ok(())
    }
}
