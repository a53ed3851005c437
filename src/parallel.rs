//! Bounded fan-out over half-open index ranges.
//!
//! [`ParallelFor`] splits `[from, to)` into `D = min(parallelism_factor, N)`
//! contiguous sub-ranges with sizes differing by at most one, then runs a
//! user function either per index or per sub-range. Every index is visited
//! exactly once; there is no ordering between sub-ranges.
//!
//! The dispatch accounting is exact and testable:
//!
//! - `D <= 1`, or no executor: everything runs inline on the caller and the
//!   executor is not touched (zero tasks submitted).
//! - `D > 1` with an executor: exactly `D` tasks are submitted, one per
//!   sub-range, and with `wait = true` the caller blocks until all of them
//!   complete.
//!
//! A panic inside one sub-range is caught, the remaining in-flight
//! sub-ranges finish, and the first payload is re-raised on the caller when
//! it waits. With `wait = false` an unobserved failure is logged instead.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! use coread::executor::build_pool;
//! use coread::ParallelFor;
//!
//! let pool = build_pool(4)?;
//! let visited = Arc::new(AtomicUsize::new(0));
//!
//! let counter = Arc::clone(&visited);
//! ParallelFor::new(Some(&pool), 0, 128, 4).execute(
//!     move |_row_group| {
//!         counter.fetch_add(1, Ordering::Relaxed);
//!     },
//!     true,
//! );
//!
//! assert_eq!(visited.load(Ordering::Relaxed), 128);
//! # Ok::<(), coread::CoreadError>(())
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};

use crate::executor::Executor;

/// A planned fan-out of `[from, to)` across an executor.
///
/// The executor is either borrowed for the duration of the call or held as a
/// shared handle, which lets `wait = false` work outlive its creator.
pub struct ParallelFor<'a> {
    executor: ExecutorHandle<'a>,
    ranges: Vec<(usize, usize)>,
}

enum ExecutorHandle<'a> {
    None,
    Borrowed(&'a dyn Executor),
    Shared(Arc<dyn Executor>),
}

impl ExecutorHandle<'_> {
    fn get(&self) -> Option<&dyn Executor> {
        match self {
            Self::None => None,
            Self::Borrowed(executor) => Some(*executor),
            Self::Shared(executor) => Some(executor.as_ref()),
        }
    }
}

impl<'a> ParallelFor<'a> {
    /// Plan a fan-out of `[from, to)` into at most `parallelism_factor`
    /// sub-ranges on a borrowed executor.
    ///
    /// `parallelism_factor` 0 and 1 are both legal and mean inline
    /// execution, as does `executor = None`.
    ///
    /// # Panics
    ///
    /// `from > to` is a programmer error and fails here, before any task can
    /// be submitted.
    pub fn new(
        executor: Option<&'a dyn Executor>,
        from: usize,
        to: usize,
        parallelism_factor: usize,
    ) -> Self {
        let factor = if executor.is_some() {
            parallelism_factor
        } else {
            1
        };
        Self {
            ranges: make_ranges(from, to, factor),
            executor: match executor {
                Some(executor) => ExecutorHandle::Borrowed(executor),
                None => ExecutorHandle::None,
            },
        }
    }
}

impl ParallelFor<'static> {
    /// Plan a fan-out holding a share of the executor.
    ///
    /// Use this for `wait = false` callers that may outlive the scope owning
    /// the pool.
    ///
    /// # Panics
    ///
    /// `from > to` is a programmer error and fails here, before any task can
    /// be submitted.
    pub fn with_shared(
        executor: Arc<dyn Executor>,
        from: usize,
        to: usize,
        parallelism_factor: usize,
    ) -> Self {
        Self {
            ranges: make_ranges(from, to, parallelism_factor),
            executor: ExecutorHandle::Shared(executor),
        }
    }
}

impl ParallelFor<'_> {
    /// Run `f` once for every index in `[from, to)`.
    ///
    /// With `wait = true` the call returns only after every sub-range has
    /// completed; with `wait = false` it returns as soon as all sub-ranges
    /// have been submitted and the caller owns any further synchronization.
    pub fn execute<F>(&self, f: F, wait: bool)
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.execute_ranges(
            move |begin, end| {
                for i in begin..end {
                    f(i);
                }
            },
            wait,
        );
    }

    /// Run `f` once per planned sub-range, receiving `(begin, end)`.
    ///
    /// Same wait semantics as [`execute`](Self::execute).
    pub fn execute_ranges<F>(&self, f: F, wait: bool)
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        if self.ranges.is_empty() {
            return;
        }

        let executor = match self.executor.get() {
            Some(executor) if self.ranges.len() > 1 => executor,
            _ => {
                for &(begin, end) in &self.ranges {
                    f(begin, end);
                }
                return;
            }
        };

        let barrier = Arc::new(CompletionBarrier::new(self.ranges.len()));
        let f = Arc::new(f);
        for &(begin, end) in &self.ranges {
            let barrier = Arc::clone(&barrier);
            let f = Arc::clone(&f);
            executor.add(Box::new(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(begin, end)));
                barrier.complete(outcome.err());
            }));
        }

        if wait {
            barrier.wait();
        }
    }

    /// The planned sub-ranges, for introspection.
    pub fn ranges(&self) -> &[(usize, usize)] {
        &self.ranges
    }
}

/// Split `[from, to)` into `min(parallelism_factor, to - from)` contiguous
/// sub-ranges with sizes differing by at most one.
fn make_ranges(from: usize, to: usize, parallelism_factor: usize) -> Vec<(usize, usize)> {
    assert!(from <= to, "invalid fan-out range: from {from} > to {to}");

    let count = to - from;
    if count == 0 {
        return Vec::new();
    }

    let tasks = parallelism_factor.clamp(1, count);
    let chunk = count / tasks;
    let remainder = count % tasks;

    let mut ranges = Vec::with_capacity(tasks);
    let mut begin = from;
    for i in 0..tasks {
        let end = begin + chunk + usize::from(i < remainder);
        ranges.push((begin, end));
        begin = end;
    }
    ranges
}

/// Completion counter shared by the tasks of one `execute` call.
///
/// Captures the first panic payload; `wait` re-raises it on the caller once
/// every task has finished.
struct CompletionBarrier {
    state: Mutex<BarrierState>,
    done: Condvar,
}

struct BarrierState {
    pending: usize,
    failure: Option<Box<dyn Any + Send>>,
}

impl CompletionBarrier {
    fn new(pending: usize) -> Self {
        Self {
            state: Mutex::new(BarrierState {
                pending,
                failure: None,
            }),
            done: Condvar::new(),
        }
    }

    fn complete(&self, failure: Option<Box<dyn Any + Send>>) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if state.failure.is_none() {
            // First failure wins; later ones are dropped.
            state.failure = failure;
        }
        state.pending -= 1;
        if state.pending == 0 {
            self.done.notify_all();
        }
    }

    fn wait(&self) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        while state.pending > 0 {
            state = self
                .done
                .wait(state)
                .unwrap_or_else(|p| p.into_inner());
        }
        if let Some(payload) = state.failure.take() {
            drop(state);
            panic::resume_unwind(payload);
        }
    }
}

impl Drop for CompletionBarrier {
    fn drop(&mut self) {
        let state = match self.state.get_mut() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(payload) = &state.failure {
            log::error!(
                "detached parallel task panicked: {}",
                panic_message(payload.as_ref())
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
