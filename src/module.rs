use crate::error::Result;
use crate::pipe::Pipe;
use crate::processor::{Processor, Socket};
use crate::tracker::{Trackable, TrackerSlot};

/// Synchronous hosting strategy: runs the processor directly on the caller's
/// thread and returns its outputs immediately. No internal buffering, no
/// worker thread; used for simple call/response composition.
pub struct Module<P: Processor> {
    socket: Socket<P>,
}

impl<P: Processor> Module<P> {
    pub fn new(processor: P) -> Self {
        Self {
            socket: Socket::new(processor),
        }
    }

    /// Process one item synchronously, returning every produced output.
    pub fn submit(&mut self, item: P::Input) -> Result<Vec<P::Output>> {
        let mut outputs = Vec::new();
        self.socket.consume(item, &mut |out| outputs.push(out))?;
        Ok(outputs)
    }

    /// Process an optional item. `None` is a no-op.
    pub fn submit_opt(&mut self, item: Option<P::Input>) -> Result<Vec<P::Output>> {
        match item {
            Some(item) => self.submit(item),
            None => Ok(Vec::new()),
        }
    }

    /// Run the processor's finalize hook, returning its aggregate result.
    pub fn finalize(&mut self) -> Result<Option<P::Output>> {
        let mut result = None;
        self.socket.finish(&mut |out| result = Some(out))?;
        Ok(result)
    }

    /// The wrapped processor's name.
    pub fn name(&self) -> &str {
        self.socket.processor_name()
    }

    /// Trade the synchronous view for the queued one. The views are mutually
    /// exclusive, so the module is consumed; its tracker moves along.
    pub fn into_pipe(self, capacity: usize) -> Pipe<P> {
        Pipe::from_socket(self.socket, capacity)
    }
}

impl<P: Processor> Trackable for Module<P> {
    fn tracker_slot(&self) -> &TrackerSlot {
        self.socket.tracker_slot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{CollectingProcessor, MapProcessor};

    #[test]
    fn module_is_synchronous() {
        let mut module = Module::new(MapProcessor::new("double", |x: u32| Ok(x * 2)));
        assert_eq!(module.submit(4).unwrap(), vec![8]);
        assert_eq!(module.submit(5).unwrap(), vec![10]);
    }

    #[test]
    fn module_none_is_noop() {
        let mut module = Module::new(MapProcessor::new("double", |x: u32| Ok(x * 2)));
        assert!(module.submit_opt(None).unwrap().is_empty());
    }

    #[test]
    fn module_finalize_returns_aggregate() {
        let mut module = Module::new(CollectingProcessor::new("collect"));
        module.submit(1).unwrap();
        module.submit(2).unwrap();
        assert_eq!(module.finalize().unwrap(), Some(vec![1, 2]));
    }

    #[test]
    fn module_tracks_items() {
        let mut module = Module::new(MapProcessor::new("id", |x: u32| Ok(x)));
        module.enable_tracking();
        module.submit(1).unwrap();
        module.submit(2).unwrap();
        assert_eq!(module.tracker().unwrap().count(), 2);
    }
}
