//! Bounded task queue serviced by a fixed pool of worker threads.
//!
//! Producers call [`TaskQueue::submit`]; workers pop tasks in FIFO order and
//! run them outside the lock. With a non-zero bound, producers block while the
//! queue is full instead of letting it grow without limit.
//!
//! A queue started with zero workers runs every submitted task inline on the
//! caller's thread.

use crate::builder::TaskQueueBuilder;
use crate::error::{Error, Result};

use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Hook run once per worker before it starts taking tasks.
pub(crate) type InitHook = Arc<dyn Fn() + Send + Sync + 'static>;

struct State {
    queue: VecDeque<Task>,
    running: bool,
    workers: usize,
}

struct Shared {
    name: String,
    max_queue_size: usize,
    state: Mutex<State>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl Shared {
    // Caller holds the lock.
    fn is_full(&self, state: &State) -> bool {
        self.max_queue_size > 0 && state.queue.len() >= self.max_queue_size
    }

    /// Blocks until a task is available or the queue stops with nothing left.
    fn take(&self) -> Option<Task> {
        let mut state = self.state.lock();

        while state.queue.is_empty() && state.running {
            self.not_empty.wait(&mut state);
        }

        let task = state.queue.pop_front()?;

        if self.max_queue_size > 0 {
            self.not_full.notify_one();
        }

        Some(task)
    }
}

/// A thread-safe FIFO of [`Task`]s and the workers that drain it.
///
/// Cloning is not supported; share it behind an `Arc` when several
/// producers need it.
pub struct TaskQueue {
    shared: Arc<Shared>,
    init_hook: Option<InitHook>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskQueue {
    /// Creates an unbounded, stopped queue named `TaskQueue`.
    pub fn new() -> Self {
        TaskQueueBuilder::new().build()
    }

    pub(crate) fn from_builder(
        name: String,
        max_queue_size: usize,
        init_hook: Option<InitHook>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                name,
                max_queue_size,
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    running: false,
                    workers: 0,
                }),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
            }),
            init_hook,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Starts a [`TaskQueueBuilder`] for a named, bounded or hooked queue.
    pub fn builder() -> TaskQueueBuilder {
        TaskQueueBuilder::new()
    }

    /// The queue name, also the prefix of every worker thread name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The configured bound; 0 means unbounded.
    pub fn max_queue_size(&self) -> usize {
        self.shared.max_queue_size
    }

    /// Checks whether the queue is between `start` and `stop`.
    ///
    /// # Returns
    /// true once started, false before the first start and after stop
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Number of live worker threads; 0 when stopped or started inline.
    pub fn worker_count(&self) -> usize {
        self.shared.state.lock().workers
    }

    /// Number of tasks waiting to be picked up.
    pub fn queue_size(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Spawns `workers` threads named `<name>1`, `<name>2`, ... and marks the
    /// queue running.
    ///
    /// With `workers == 0` no thread is spawned and the init hook, if any,
    /// runs once right here.
    ///
    /// # Arguments
    /// * `workers` - Number of worker threads to spawn
    ///
    /// # Returns
    /// `Error::AlreadyRunning` if the queue was already started, or
    /// `Error::Spawn` if a thread could not be created (the queue is stopped
    /// again in that case)
    pub fn start(&self, workers: usize) -> Result<()> {
        let mut handles = self.handles.lock();

        {
            let mut state = self.shared.state.lock();
            if state.running {
                return Err(Error::AlreadyRunning(self.shared.name.clone()));
            }

            state.running = true;
        }

        for index in 1..=workers {
            let shared = self.shared.clone();
            let init_hook = self.init_hook.clone();

            let spawned = thread::Builder::new()
                .name(format!("{}{}", self.shared.name, index))
                .spawn(move || run_worker(&shared, init_hook.as_deref()));

            match spawned {
                Ok(handle) => {
                    handles.push(handle);
                    self.shared.state.lock().workers += 1;
                }
                Err(error) => {
                    drop(handles);
                    self.stop();
                    return Err(Error::Spawn(error));
                }
            }
        }

        if workers == 0
            && let Some(hook) = &self.init_hook
        {
            hook();
        }

        tracing::debug!(pool = %self.shared.name, workers, "task queue started");

        Ok(())
    }

    /// Enqueues `task`, blocking while a bounded queue is full.
    ///
    /// Without running workers the task runs immediately on the calling
    /// thread.
    ///
    /// # Arguments
    /// * `task` - The closure to run on a worker
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.state.lock();

        while state.running && state.workers > 0 && self.shared.is_full(&state) {
            self.shared.not_full.wait(&mut state);
        }

        if state.workers == 0 || !state.running {
            drop(state);
            task();
            return;
        }

        state.queue.push_back(Box::new(task));
        self.shared.not_empty.notify_one();
    }

    /// Stops the queue and joins every worker.
    ///
    /// Workers finish whatever is still queued before they exit, so every
    /// task submitted before `stop` has run once this returns.
    pub fn stop(&self) {
        let mut handles = self.handles.lock();

        {
            let mut state = self.shared.state.lock();
            state.running = false;
            self.shared.not_empty.notify_all();
            self.shared.not_full.notify_all();
        }

        // A panicking task aborts the process, so a join never reports one.
        for handle in handles.drain(..) {
            let _ = handle.join();
        }

        self.shared.state.lock().workers = 0;

        tracing::debug!(pool = %self.shared.name, "task queue stopped");
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

fn run_worker(shared: &Shared, init_hook: Option<&(dyn Fn() + Send + Sync)>) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        if let Some(hook) = init_hook {
            hook();
        }

        tracing::trace!(pool = %shared.name, "worker started");

        while let Some(task) = shared.take() {
            task();
        }

        tracing::trace!(pool = %shared.name, "worker exiting");
    }));

    if let Err(payload) = outcome {
        let worker = thread::current();
        tracing::error!(
            pool = %shared.name,
            worker = worker.name().unwrap_or("<unnamed>"),
            reason = %panic_message(payload.as_ref()),
            "task panicked in task queue; aborting",
        );

        std::process::abort();
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}
