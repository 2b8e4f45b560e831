//! A fixed-size pool of worker threads.
use crate::EvalError;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, info, warn};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread::JoinHandle,
};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle to the result of a job submitted to a [`WorkerPool`].
pub struct JobHandle<T> {
    id: usize,
    receiver: Receiver<T>,
}

impl<T> JobHandle<T> {
    /// Index of the job in submission order.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Blocks until the job finishes and returns its result.
    ///
    /// Fails if the job panicked or was discarded by [`WorkerPool::cancel_pending`].
    pub fn join(self) -> Result<T, EvalError> {
        self.receiver
            .recv()
            .map_err(|_| EvalError::WorkerLost(self.id))
    }
}

/// A fixed number of threads executing submitted jobs in submission order.
///
/// Jobs are queued without blocking the caller. Each job reports its result
/// through its own [`JobHandle`], so results can be collected in any order,
/// regardless of which worker finishes first.
///
/// Dropping the pool discards jobs not started yet and waits for running jobs.
pub struct WorkerPool {
    /// Sender of jobs to the workers, `None` after shutdown.
    sender: Option<Sender<Job>>,

    /// Thread handles.
    threads: Vec<JoinHandle<()>>,

    /// Flag to discard queued jobs.
    cancelled: Arc<AtomicBool>,

    /// The number of submitted jobs.
    n_submitted: AtomicUsize,
}

impl WorkerPool {
    /// Spawns `n_workers` threads, at least one.
    pub fn new(n_workers: usize) -> Self {
        let n_workers = n_workers.max(1);
        let (sender, receiver) = unbounded::<Job>();
        let cancelled = Arc::new(AtomicBool::new(false));

        let threads = (0..n_workers)
            .map(|id| {
                let receiver = receiver.clone();
                let cancelled = cancelled.clone();
                std::thread::spawn(move || Self::run_worker(id, receiver, cancelled))
            })
            .collect();
        info!("Started {} worker threads", n_workers);

        Self {
            sender: Some(sender),
            threads,
            cancelled,
            n_submitted: AtomicUsize::new(0),
        }
    }

    /// Queues a job and returns the handle to its result.
    pub fn submit<T, F>(&self, f: F) -> JobHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let id = self.n_submitted.fetch_add(1, Ordering::SeqCst);
        let (s, r) = bounded(1);
        let job: Job = Box::new(move || {
            // The receiver is gone if the caller dropped the handle
            let _ = s.send(f());
        });

        if let Some(sender) = &self.sender {
            if sender.send(job).is_err() {
                warn!("No worker is alive to run job {}", id);
            }
        }

        JobHandle { id, receiver: r }
    }

    /// Discards jobs not started yet. Running jobs are completed.
    pub fn cancel_pending(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Waits until all queued jobs finish and stops the workers.
    pub fn join(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Closing the channel ends the loop of each worker once the queue is empty
        self.sender = None;
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("A worker thread panicked");
            }
        }
    }

    fn run_worker(id: usize, receiver: Receiver<Job>, cancelled: Arc<AtomicBool>) {
        for job in receiver.iter() {
            if cancelled.load(Ordering::SeqCst) {
                continue;
            }
            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                warn!("A job panicked in worker {}", id);
            }
        }
        debug!("Stopped worker {}", id);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.threads.is_empty() {
            self.cancel_pending();
            self.shutdown();
        }
    }
}
