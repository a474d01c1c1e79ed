use crate::error::{PipelineError, Result};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use log::{debug, error, warn};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// A bounded pool of worker threads with a blocking submission path.
///
/// `core_size` workers run for the pool's whole lifetime; when the task
/// queue backs up, extra workers are spawned on demand up to `max_size` and
/// retire again after sitting idle for `keep_alive`. The task queue is
/// bounded at twice `max_size`, so [`submit`](WorkerPool::submit) blocks the
/// caller once the pool is saturated — the backpressure that keeps a large
/// producer (like a tree walk) from outrunning slow task processing.
pub struct WorkerPool {
    task_tx: Option<Sender<Task>>,
    task_rx: Receiver<Task>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    live: Arc<AtomicUsize>,
    core_size: usize,
    max_size: usize,
    keep_alive: Duration,
}

impl WorkerPool {
    /// Create a pool. Fails with a configuration error when `core_size` is
    /// zero or `max_size` is below `core_size`.
    pub fn new(core_size: usize, max_size: usize, keep_alive: Duration) -> Result<Self> {
        if core_size == 0 {
            return Err(PipelineError::ConfigError(
                "worker pool needs at least one core thread".into(),
            ));
        }
        if max_size < core_size {
            return Err(PipelineError::ConfigError(format!(
                "worker pool max size {max_size} is below core size {core_size}"
            )));
        }

        let (task_tx, task_rx) = channel::bounded::<Task>(max_size * 2);
        let live = Arc::new(AtomicUsize::new(core_size));
        let mut workers = Vec::with_capacity(core_size);
        for _ in 0..core_size {
            workers.push(spawn_core_worker(task_rx.clone()));
        }

        Ok(Self {
            task_tx: Some(task_tx),
            task_rx,
            workers: Mutex::new(workers),
            live,
            core_size,
            max_size,
            keep_alive,
        })
    }

    /// Fixed-size pool with a one second keep-alive.
    pub fn with_size(size: usize) -> Result<Self> {
        Self::new(size, size, Duration::from_secs(1))
    }

    /// Submit a task, blocking while the queue is saturated. A full queue
    /// first tries to grow the pool towards `max_size`.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(tx) = self.task_tx.as_ref() else {
            warn!("worker pool is shut down, dropping task");
            return;
        };

        let mut task: Task = Box::new(task);
        match tx.try_send(task) {
            Ok(()) => return,
            Err(TrySendError::Full(returned)) => {
                task = returned;
                self.try_grow();
            }
            Err(TrySendError::Disconnected(_)) => return,
        }
        // Blocking send: backpressure once the pool cannot grow further.
        let _ = tx.send(task);
    }

    /// Spawn one extra worker if the pool is below `max_size`.
    fn try_grow(&self) {
        loop {
            let current = self.live.load(Ordering::Acquire);
            if current >= self.max_size {
                return;
            }
            if self
                .live
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                debug!("worker pool growing to {} threads", current + 1);
                let handle = spawn_extra_worker(
                    self.task_rx.clone(),
                    Arc::clone(&self.live),
                    self.core_size,
                    self.keep_alive,
                );
                self.workers.lock().push(handle);
                return;
            }
        }
    }

    /// Number of currently live workers.
    pub fn size(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Close the queue, let every queued task run to completion, and join
    /// all workers.
    pub fn shutdown_and_await(mut self) -> Result<()> {
        self.close_and_join()
    }

    fn close_and_join(&mut self) -> Result<()> {
        self.task_tx = None;
        let mut result = Ok(());
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in workers {
            if handle.join().is_err() {
                result = Err(PipelineError::ThreadError("worker-pool".into()));
            }
        }
        result
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let _ = self.close_and_join();
    }
}

fn run_task(task: Task) {
    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
        error!("worker pool task panicked");
    }
}

fn spawn_core_worker(rx: Receiver<Task>) -> JoinHandle<()> {
    thread::spawn(move || {
        for task in rx {
            run_task(task);
        }
    })
}

fn spawn_extra_worker(
    rx: Receiver<Task>,
    live: Arc<AtomicUsize>,
    core_size: usize,
    keep_alive: Duration,
) -> JoinHandle<()> {
    thread::spawn(move || {
        loop {
            match rx.recv_timeout(keep_alive) {
                Ok(task) => run_task(task),
                Err(channel::RecvTimeoutError::Timeout) => {
                    // Retire if the pool is still above its core size.
                    let current = live.load(Ordering::Acquire);
                    if current > core_size
                        && live
                            .compare_exchange(
                                current,
                                current - 1,
                                Ordering::AcqRel,
                                Ordering::Acquire,
                            )
                            .is_ok()
                    {
                        debug!("worker pool shrinking to {} threads", current - 1);
                        return;
                    }
                }
                Err(channel::RecvTimeoutError::Disconnected) => return,
            }
        }
    })
}
