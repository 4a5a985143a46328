//! A small bounded thread pool for servicing accepted connections.
//!
//! Spawning a raw thread per connection is unbounded under a connection
//! storm and gives the process no orderly way to wind down. This pool caps
//! the number of live workers and gives `WorkerPool` a `Drop` impl that
//! closes the job queue and joins every thread, so dropping it is a real
//! shutdown, not just letting threads leak.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed set of worker threads pulling jobs off a shared channel.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    // `None` once `drop` has run; `Some` otherwise. Dropping the sender
    // closes the channel, which unblocks every worker's `recv` with an
    // `Err`, which is each worker's cue to return.
    sender: Option<mpsc::Sender<Job>>,
}

impl WorkerPool {
    /// Build a pool of `size` worker threads. `size` must be nonzero.
    pub fn new(size: usize) -> WorkerPool {
        assert!(size > 0, "a worker pool needs at least one thread");

        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|id| {
                let receiver = Arc::clone(&receiver);
                thread::Builder::new()
                    .name(format!("captive-proxy-worker-{id}"))
                    .spawn(move || worker_loop(id, receiver))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        WorkerPool {
            workers,
            sender: Some(sender),
        }
    }

    /// Number of core-style small multiples to size a pool by default: a
    /// connection spends most of its time blocked on socket I/O, so a
    /// modest oversubscription relative to CPU count keeps throughput up
    /// without threads piling up unbounded.
    pub fn default_size() -> usize {
        const MULTIPLIER: usize = 8;
        thread::available_parallelism()
            .map(|n| n.get() * MULTIPLIER)
            .unwrap_or(MULTIPLIER)
    }

    /// Queue a job for some worker to run. Silently dropped if the pool is
    /// already shutting down (the receiving half of the channel is gone).
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(sender) = &self.sender {
            let _ = sender.send(Box::new(job));
        }
    }
}

fn worker_loop(id: usize, receiver: Arc<Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let job = {
            let queue = receiver.lock().expect("worker pool queue lock poisoned");
            queue.recv()
        };
        match job {
            Ok(job) => job(),
            Err(_) => {
                log::trace!("worker {id} shutting down, queue closed");
                break;
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_every_queued_job() {
        let pool = WorkerPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        drop(pool); // blocks until every queued job has run and threads joined
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn default_size_is_at_least_the_multiplier() {
        assert!(WorkerPool::default_size() >= 8);
    }
}
