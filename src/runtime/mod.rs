//! Work offloading.
//!
//! - [`queue`]: the bounded [`TaskQueue`] and its worker pool

pub mod queue;

pub use queue::{Task, TaskQueue};
