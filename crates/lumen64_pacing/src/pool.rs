//! Fixed-size worker pool.
//!
//! Jobs go through one bounded channel shared by every worker. A panicking
//! job is caught and counted; the worker keeps running. Shutdown closes the
//! channel, lets the workers drain what is queued, then joins them.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use lumen64_core::error::PacingResult;
use lumen64_core::PacingError;
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Threads reserved for the graphics and audio stages.
const RESERVED_THREADS: usize = 2;

/// Queued jobs allowed per worker before `execute` blocks.
const JOBS_PER_WORKER: usize = 16;

/// Worker count for a configured value. Zero means available parallelism
/// minus the graphics and audio threads, at least one.
#[must_use]
pub fn resolve_worker_count(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    thread::available_parallelism()
        .map_or(1, std::num::NonZeroUsize::get)
        .saturating_sub(RESERVED_THREADS)
        .max(1)
}

/// Pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerPoolStats {
    /// Jobs that ran to completion.
    pub completed: u64,
    /// Jobs that panicked.
    pub panicked: u64,
}

#[derive(Debug, Default)]
struct Counters {
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// Fixed set of worker threads.
///
/// An inline pool has no threads and runs every job on the caller.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
    inline: bool,
}

impl WorkerPool {
    /// Starts `count` workers (see [`resolve_worker_count`]).
    ///
    /// # Errors
    ///
    /// Returns [`PacingError::ThreadSpawn`] if a thread cannot be created.
    pub fn new(count: usize) -> PacingResult<Self> {
        let count = resolve_worker_count(count);
        let (sender, receiver) = bounded::<Job>(count * JOBS_PER_WORKER);
        let counters = Arc::new(Counters::default());
        let mut pool = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(count),
            counters,
            inline: false,
        };

        for id in 0..count {
            let receiver = receiver.clone();
            let counters = Arc::clone(&pool.counters);
            let handle = thread::Builder::new()
                .name(format!("lumen64-worker-{id}"))
                .spawn(move || worker_loop(id, &receiver, &counters))
                .map_err(PacingError::ThreadSpawn)?;
            pool.workers.push(handle);
        }

        debug!(workers = count, "worker pool started");
        Ok(pool)
    }

    /// A pool without threads.
    #[must_use]
    pub fn inline() -> Self {
        Self {
            sender: None,
            workers: Vec::new(),
            counters: Arc::new(Counters::default()),
            inline: true,
        }
    }

    /// Number of worker threads (zero when inline).
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// True when jobs run on worker threads.
    #[must_use]
    pub fn is_threaded(&self) -> bool {
        !self.inline && self.sender.is_some()
    }

    /// Queues a job. Blocks while the job queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`PacingError::WorkerPoolClosed`] after shutdown.
    pub fn execute<F>(&self, job: F) -> PacingResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.inline {
            run_job(Box::new(job), &self.counters);
            return Ok(());
        }
        let sender = self.sender.as_ref().ok_or(PacingError::WorkerPoolClosed)?;
        sender.send(Box::new(job)).map_err(|_| PacingError::WorkerPoolClosed)
    }

    /// Applies `f` to every item across the pool and returns the results in
    /// input order.
    ///
    /// # Errors
    ///
    /// Returns [`PacingError::WorkerPanicked`] if any job panicked and
    /// [`PacingError::WorkerPoolClosed`] after shutdown.
    pub fn map_ordered<T, R, F>(&self, items: Vec<T>, f: F) -> PacingResult<Vec<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let len = items.len();
        let (tx, rx): (Sender<(usize, R)>, Receiver<(usize, R)>) = bounded(len.max(1));
        let f = Arc::new(f);
        for (index, item) in items.into_iter().enumerate() {
            let f = Arc::clone(&f);
            let tx = tx.clone();
            self.execute(move || {
                let result = f(item);
                // The receiver outlives every job; a failed send means the
                // caller already returned with an error.
                let _ = tx.send((index, result));
            })?;
        }
        drop(tx);

        let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(len).collect();
        for (index, result) in rx.iter() {
            slots[index] = Some(result);
        }
        let missing = slots.iter().filter(|slot| slot.is_none()).count();
        if missing > 0 {
            return Err(PacingError::WorkerPanicked(missing));
        }
        Ok(slots.into_iter().flatten().collect())
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> WorkerPoolStats {
        WorkerPoolStats {
            completed: self.counters.completed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
        }
    }

    /// Runs queued jobs to completion and joins every worker.
    pub fn shutdown(&mut self) {
        // Closing the channel ends each worker once the queue is empty.
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread exited by panic");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .field("inline", &self.inline)
            .field("stats", &self.stats())
            .finish()
    }
}

fn worker_loop(id: usize, receiver: &Receiver<Job>, counters: &Counters) {
    for job in receiver.iter() {
        run_job(job, counters);
    }
    debug!(worker = id, "worker exiting");
}

fn run_job(job: Job, counters: &Counters) {
    match catch_unwind(AssertUnwindSafe(job)) {
        Ok(()) => {
            counters.completed.fetch_add(1, Ordering::Relaxed);
        }
        Err(_) => {
            counters.panicked.fetch_add(1, Ordering::Relaxed);
            warn!("worker job panicked");
        }
    }
}
