use crate::error::Result;
use crate::processor::{Processor, Socket};
use crate::tracker::{Trackable, TrackerSlot};
use crossbeam::channel::Sender;

/// Event-driven hosting strategy: the processor as a callback invoked by an
/// externally supplied worker.
///
/// Used when the consuming mechanism already owns the thread — a
/// [`Multiplexer`](crate::Multiplexer) collecting fan-out results, or an
/// embedding application's own worker pool. Outputs flow into the connected
/// outbox; an unconnected handler discards them.
pub struct EventHandler<P: Processor> {
    socket: Socket<P>,
    outbox: Option<Sender<P::Output>>,
}

impl<P: Processor> EventHandler<P> {
    pub fn new(processor: P) -> Self {
        Self {
            socket: Socket::new(processor),
            outbox: None,
        }
    }

    /// The wrapped processor's name.
    pub fn name(&self) -> &str {
        self.socket.processor_name()
    }

    /// Wire this handler's emission point into a funnel. Called by
    /// [`Multiplexer::connect`](crate::Multiplexer::connect); also usable for
    /// manual wiring into any channel.
    pub fn connect(&mut self, outbox: Sender<P::Output>) {
        self.outbox = Some(outbox);
    }

    /// Process one item on the calling (external) thread, emitting outputs
    /// into the outbox.
    pub fn handle(&mut self, item: P::Input) -> Result<()> {
        let outbox = &self.outbox;
        self.socket.consume(item, &mut |out| {
            if let Some(tx) = outbox {
                // Receiver gone means the consumer has shut down; discard.
                let _ = tx.send(out);
            }
        })
    }

    /// Run the processor's finalize hook, emitting an aggregate result into
    /// the outbox, and disconnect.
    pub fn finish(&mut self) -> Result<()> {
        let outbox = &self.outbox;
        let result = self.socket.finish(&mut |out| {
            if let Some(tx) = outbox {
                let _ = tx.send(out);
            }
        });
        self.outbox = None;
        result
    }
}

impl<P: Processor> Trackable for EventHandler<P> {
    fn tracker_slot(&self) -> &TrackerSlot {
        self.socket.tracker_slot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{CollectingProcessor, MapProcessor};
    use crossbeam::channel;

    #[test]
    fn unconnected_handler_discards_outputs() {
        let mut handler = EventHandler::new(MapProcessor::new("id", |x: u32| Ok(x)));
        handler.handle(1).unwrap();
    }

    #[test]
    fn connected_handler_emits_into_outbox() {
        let (tx, rx) = channel::unbounded();
        let mut handler = EventHandler::new(MapProcessor::new("double", |x: u32| Ok(x * 2)));
        handler.connect(tx);
        handler.handle(3).unwrap();
        handler.handle(4).unwrap();
        drop(handler);
        assert_eq!(rx.iter().collect::<Vec<_>>(), vec![6, 8]);
    }

    #[test]
    fn finish_flushes_aggregate_and_disconnects() {
        let (tx, rx) = channel::unbounded();
        let mut handler = EventHandler::new(CollectingProcessor::new("collect"));
        handler.connect(tx);
        handler.handle(1).unwrap();
        handler.handle(2).unwrap();
        handler.finish().unwrap();
        assert_eq!(rx.iter().collect::<Vec<_>>(), vec![vec![1, 2]]);
    }
}
