//! Task submission seams for parallel fan-out.
//!
//! [`ParallelFor`](crate::ParallelFor) is written against the [`Executor`]
//! trait rather than any particular pool so callers keep control of thread
//! budgets. The crate ships two implementations: [`InlineExecutor`], which
//! runs every task on the submitting thread, and a blanket impl for
//! `rayon::ThreadPool`, the worker pool the rest of the stack uses.

use crate::error::{CoreadError, Result};

/// A unit of work submitted to an [`Executor`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Minimal task-submission interface.
///
/// `add` must be thread-safe; beyond that, an executor is free to run tasks
/// in any order, on any thread, including the submitting one.
pub trait Executor: Send + Sync {
    /// Enqueue `task` to run at the executor's discretion.
    fn add(&self, task: Task);
}

/// Borrowed executors are executors, so wrappers can stack without taking
/// ownership.
impl<E: Executor + ?Sized> Executor for &E {
    fn add(&self, task: Task) {
        (**self).add(task);
    }
}

/// Runs every task immediately on the submitting thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn add(&self, task: Task) {
        task();
    }
}

/// Rayon thread pools are executors.
impl Executor for rayon::ThreadPool {
    fn add(&self, task: Task) {
        self.spawn(task);
    }
}

/// Build a rayon pool sized for `threads` workers.
pub fn build_pool(threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|err| CoreadError::Executor(err.to_string()))
}
