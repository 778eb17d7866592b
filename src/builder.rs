//! Fluent builder for [`TaskQueue`] construction.
//!
//! Everything a queue needs is handed over here; nothing is read from
//! process-wide state.

use crate::runtime::queue::InitHook;
use crate::runtime::TaskQueue;

use std::sync::Arc;

/// Builder for constructing [`TaskQueue`] instances with a fluent API.
///
/// # Example
/// ```
/// use netbase::TaskQueueBuilder;
///
/// let queue = TaskQueueBuilder::new()
///     .name("decode")
///     .max_queue_size(1024)
///     .build();
///
/// queue.start(4).unwrap();
/// queue.submit(|| println!("decoded"));
/// queue.stop();
/// ```
pub struct TaskQueueBuilder {
    name: String,
    max_queue_size: usize,
    init_hook: Option<InitHook>,
}

impl Default for TaskQueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueueBuilder {
    /// Starts from an unbounded queue named `TaskQueue` with no init hook.
    pub fn new() -> Self {
        Self {
            name: "TaskQueue".to_owned(),
            max_queue_size: 0,
            init_hook: None,
        }
    }

    /// Names the queue. Worker threads are called `<name>1`, `<name>2`, ...
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Caps the number of waiting tasks; producers block at the cap.
    /// `0` leaves the queue unbounded.
    pub fn max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    /// Runs `hook` on every worker thread before it takes its first task.
    ///
    /// A queue started with zero workers calls it once from `start`.
    pub fn on_worker_start<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.init_hook = Some(Arc::new(hook));
        self
    }

    /// Builds a stopped queue; call [`TaskQueue::start`] to spawn workers.
    pub fn build(self) -> TaskQueue {
        TaskQueue::from_builder(self.name, self.max_queue_size, self.init_hook)
    }
}
