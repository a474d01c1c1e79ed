use crate::error::Result;
use crate::tracker::{self, TrackerSlot};
use std::marker::PhantomData;

/// The unit of per-item computation.
///
/// A processor consumes one input item and produces zero or more output
/// items; it may accumulate state across items and emit an aggregate result
/// from [`finalize`](Processor::finalize) once the stream ends. Processors
/// know nothing about threading: exactly one hosting strategy
/// ([`Module`](crate::Module), [`Pipe`](crate::Pipe) or
/// [`EventHandler`](crate::EventHandler)) wraps a processor instance and
/// guarantees it is invoked from at most one thread at a time.
pub trait Processor: Send + 'static {
    /// The type of items this processor consumes.
    type Input: Send + 'static;
    /// The type of items this processor produces.
    type Output: Send + 'static;

    /// Process one input item, producing 0, 1 or multiple outputs.
    fn process(&mut self, item: Self::Input) -> Result<Vec<Self::Output>>;

    /// Produce an aggregate result after all items have been consumed.
    ///
    /// Returns `None` by default. A returned item is forwarded downstream as
    /// a final item during shutdown.
    fn finalize(&mut self) -> Result<Option<Self::Output>> {
        Ok(None)
    }

    /// Human-readable name for diagnostics.
    fn name(&self) -> &str {
        "processor"
    }
}

/// The contract between a processor and whichever hosting strategy executes
/// it: drives the processor, forwards emitted items into the strategy's sink,
/// and carries the stage's tracker.
///
/// Owned exclusively by its hosting strategy; not independently
/// constructible.
pub struct Socket<P: Processor> {
    processor: P,
    tracker: TrackerSlot,
}

impl<P: Processor> Socket<P> {
    pub(crate) fn new(processor: P) -> Self {
        Self {
            processor,
            tracker: tracker::new_slot(),
        }
    }

    pub(crate) fn tracker_slot(&self) -> &TrackerSlot {
        &self.tracker
    }

    pub(crate) fn processor_name(&self) -> &str {
        self.processor.name()
    }

    /// Feed one item to the processor, handing every output to `emit`.
    pub(crate) fn consume<F>(&mut self, item: P::Input, emit: &mut F) -> Result<()>
    where
        F: FnMut(P::Output),
    {
        if let Some(tracker) = self.tracker.lock().clone() {
            tracker.track();
        }
        for output in self.processor.process(item)? {
            emit(output);
        }
        Ok(())
    }

    /// Run the finalize hook, handing an aggregate result to `emit`.
    pub(crate) fn finish<F>(&mut self, emit: &mut F) -> Result<()>
    where
        F: FnMut(P::Output),
    {
        if let Some(result) = self.processor.finalize()? {
            emit(result);
        }
        Ok(())
    }
}

/// A processor applying a fallible transform to each item.
pub struct MapProcessor<I, O, F>
where
    F: FnMut(I) -> Result<O> + Send + 'static,
{
    name: String,
    mapper: F,
    _marker: PhantomData<fn(I) -> O>,
}

impl<I, O, F> MapProcessor<I, O, F>
where
    F: FnMut(I) -> Result<O> + Send + 'static,
{
    pub fn new(name: impl Into<String>, mapper: F) -> Self {
        Self {
            name: name.into(),
            mapper,
            _marker: PhantomData,
        }
    }
}

impl<I, O, F> Processor for MapProcessor<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: FnMut(I) -> Result<O> + Send + 'static,
{
    type Input = I;
    type Output = O;

    fn process(&mut self, item: I) -> Result<Vec<O>> {
        Ok(vec![(self.mapper)(item)?])
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A processor passing through items matching a predicate.
pub struct FilterProcessor<T, F>
where
    F: FnMut(&T) -> bool + Send + 'static,
{
    name: String,
    predicate: F,
    _marker: PhantomData<fn(T)>,
}

impl<T, F> FilterProcessor<T, F>
where
    F: FnMut(&T) -> bool + Send + 'static,
{
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
            _marker: PhantomData,
        }
    }
}

impl<T, F> Processor for FilterProcessor<T, F>
where
    T: Send + 'static,
    F: FnMut(&T) -> bool + Send + 'static,
{
    type Input = T;
    type Output = T;

    fn process(&mut self, item: T) -> Result<Vec<T>> {
        if (self.predicate)(&item) {
            Ok(vec![item])
        } else {
            Ok(vec![])
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A processor collecting every item and emitting the whole collection from
/// its finalize hook. Demonstrates the accumulate-across-the-stream pattern.
pub struct CollectingProcessor<T> {
    name: String,
    items: Vec<T>,
}

impl<T> CollectingProcessor<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }
}

impl<T: Send + 'static> Processor for CollectingProcessor<T> {
    type Input = T;
    type Output = Vec<T>;

    fn process(&mut self, item: T) -> Result<Vec<Vec<T>>> {
        self.items.push(item);
        Ok(vec![])
    }

    fn finalize(&mut self) -> Result<Option<Vec<T>>> {
        Ok(Some(std::mem::take(&mut self.items)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
