//! Fixed-size worker pool
//!
//! A set of OS threads draining one FIFO queue. Tasks may push follow-up
//! work through a [`Submitter`] while they run. Shutdown stops intake
//! immediately but lets workers drain everything already queued.

use crossbeam_channel::Receiver;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Submit on stopped worker pool")]
    Stopped,

    #[error("Task panicked")]
    TaskPanicked,

    #[error("Task was dropped before it ran")]
    Canceled,

    #[error("Failed to start worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Default)]
struct Queue {
    jobs: VecDeque<Job>,
    active: usize,
    stop: bool,
}

#[derive(Default)]
struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Awaitable result of a submitted task
pub struct TaskHandle<T> {
    receiver: Receiver<thread::Result<T>>,
}

impl<T> TaskHandle<T> {
    /// Block until the task has run.
    pub fn join(self) -> Result<T, PoolError> {
        match self.receiver.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(PoolError::TaskPanicked),
            Err(_) => Err(PoolError::Canceled),
        }
    }
}

/// Cloneable handle for pushing work onto a pool
#[derive(Clone)]
pub struct Submitter {
    shared: Arc<Shared>,
}

impl Submitter {
    /// Queue a task and wake one idle worker.
    pub fn submit<F, T>(&self, task: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let job: Job = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(task));
            if result.is_err() {
                error!("Worker task panicked");
            }
            // The caller may have dropped its handle.
            let _ = sender.send(result);
        });

        {
            let mut queue = self.shared.lock();
            if queue.stop {
                return Err(PoolError::Stopped);
            }
            queue.jobs.push_back(job);
        }
        self.shared.available.notify_one();
        Ok(TaskHandle { receiver })
    }

    /// True when nothing is queued and no worker is running a task.
    pub fn is_idle(&self) -> bool {
        let queue = self.shared.lock();
        queue.jobs.is_empty() && queue.active == 0
    }
}

/// Fixed set of worker threads sharing one queue
pub struct WorkerPool {
    submitter: Submitter,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `size` workers (at least one).
    pub fn new(size: usize) -> Result<Self, PoolError> {
        let shared = Arc::new(Shared::default());
        let mut pool = Self {
            submitter: Submitter {
                shared: shared.clone(),
            },
            workers: Vec::with_capacity(size.max(1)),
        };

        for idx in 0..size.max(1) {
            let shared = shared.clone();
            let worker = thread::Builder::new()
                .name(format!("gtest-pool-{idx}"))
                .spawn(move || worker_loop(idx, &shared));
            match worker {
                Ok(handle) => pool.workers.push(handle),
                Err(e) => {
                    pool.stop_and_join();
                    return Err(PoolError::Spawn(e));
                }
            }
        }

        debug!("Started worker pool with {} threads", pool.workers.len());
        Ok(pool)
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn submitter(&self) -> Submitter {
        self.submitter.clone()
    }

    pub fn submit<F, T>(&self, task: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submitter.submit(task)
    }

    pub fn is_idle(&self) -> bool {
        self.submitter.is_idle()
    }

    /// Refuse new work, finish queued work, then join every worker.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.submitter.shared.lock().stop = true;
        self.submitter.shared.available.notify_all();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("Worker thread exited abnormally");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.stop_and_join();
        }
    }
}

fn worker_loop(idx: usize, shared: &Shared) {
    loop {
        let job = {
            let queue = shared.lock();
            let mut queue = shared
                .available
                .wait_while(queue, |q| !q.stop && q.jobs.is_empty())
                .unwrap_or_else(PoisonError::into_inner);
            match queue.jobs.pop_front() {
                Some(job) => {
                    queue.active += 1;
                    job
                }
                // Stopped and drained.
                None => break,
            }
        };

        job();
        shared.lock().active -= 1;
    }
    debug!("Worker {} exiting", idx);
}
