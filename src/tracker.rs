use log::info;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A shared progress counter with a configurable reporting cadence.
///
/// Cheap to clone; all clones observe the same count. Reports through the
/// `log` facade every `step_width` items (and for the first item).
#[derive(Debug, Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug)]
struct TrackerInner {
    count: AtomicU64,
    step_width: u64,
}

impl Tracker {
    /// Tracker reporting every item.
    pub fn new() -> Self {
        Self::with_step_width(1)
    }

    /// Tracker reporting every `step_width` items.
    pub fn with_step_width(step_width: u64) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                count: AtomicU64::new(0),
                step_width: step_width.max(1),
            }),
        }
    }

    /// Count one processed element.
    pub fn track(&self) {
        let count = self.inner.count.fetch_add(1, Ordering::Relaxed) + 1;
        if count == 1 || count % self.inner.step_width == 0 {
            info!("processed {count} elements");
        }
    }

    /// Count one processed element with a context message.
    pub fn track_msg(&self, msg: &str) {
        let count = self.inner.count.fetch_add(1, Ordering::Relaxed) + 1;
        if count == 1 || count % self.inner.step_width == 0 {
            info!("processed {count} elements ({msg})");
        }
    }

    pub fn count(&self) -> u64 {
        self.inner.count.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.inner.count.store(0, Ordering::Relaxed);
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared cell holding a stage's optional tracker. Stages and their worker
/// threads hold clones of the same slot, so delegation works while a chain
/// is running.
pub type TrackerSlot = Arc<Mutex<Option<Tracker>>>;

pub(crate) fn new_slot() -> TrackerSlot {
    Arc::new(Mutex::new(None))
}

/// Progress-tracking surface shared by all hosting strategies and the tree
/// walker. A tracker has exactly one owning stage at any moment; delegation
/// moves the handle, disabling the source and enabling the target with the
/// accumulated count intact.
pub trait Trackable {
    /// The stage's tracker slot.
    fn tracker_slot(&self) -> &TrackerSlot;

    /// Install a fresh tracker reporting every item.
    fn enable_tracking(&self) {
        self.set_tracker(Some(Tracker::new()));
    }

    /// Install a fresh tracker with the given reporting cadence.
    fn enable_tracking_with_step(&self, step_width: u64) {
        self.set_tracker(Some(Tracker::with_step_width(step_width)));
    }

    /// Install a specific tracker instance.
    fn enable_tracking_with(&self, tracker: Tracker) {
        self.set_tracker(Some(tracker));
    }

    /// Remove the tracker, if any.
    fn disable_tracking(&self) {
        self.set_tracker(None);
    }

    fn is_tracking(&self) -> bool {
        self.tracker_slot().lock().is_some()
    }

    /// A handle to the current tracker, if tracking is enabled.
    fn tracker(&self) -> Option<Tracker> {
        self.tracker_slot().lock().clone()
    }

    fn set_tracker(&self, tracker: Option<Tracker>) {
        *self.tracker_slot().lock() = tracker;
    }

    /// Move this stage's tracker to `target`. A no-op when tracking is
    /// disabled here.
    fn delegate_tracking_to(&self, target: &dyn Trackable) {
        if let Some(tracker) = self.tracker_slot().lock().take() {
            target.set_tracker(Some(tracker));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Holder {
        slot: TrackerSlot,
    }

    impl Trackable for Holder {
        fn tracker_slot(&self) -> &TrackerSlot {
            &self.slot
        }
    }

    #[test]
    fn tracker_counts() {
        let tracker = Tracker::with_step_width(10);
        for _ in 0..25 {
            tracker.track();
        }
        assert_eq!(tracker.count(), 25);
        tracker.reset();
        assert_eq!(tracker.count(), 0);
    }

    #[test]
    fn delegation_moves_count() {
        let source = Holder { slot: new_slot() };
        let target = Holder { slot: new_slot() };

        source.enable_tracking();
        source.tracker().unwrap().track();
        source.tracker().unwrap().track();

        source.delegate_tracking_to(&target);
        assert!(!source.is_tracking());
        assert!(target.is_tracking());
        assert_eq!(target.tracker().unwrap().count(), 2);
    }

    #[test]
    fn delegation_without_tracker_is_noop() {
        let source = Holder { slot: new_slot() };
        let target = Holder { slot: new_slot() };
        source.delegate_tracking_to(&target);
        assert!(!target.is_tracking());
    }
}
