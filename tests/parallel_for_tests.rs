//! Fan-out contract: exact visitation, exact dispatch counts, wait
//! semantics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use coread::executor::{build_pool, Executor, InlineExecutor, Task};
use coread::ParallelFor;

/// Counts every task submitted before forwarding it.
struct CountingExecutor<E> {
    inner: E,
    count: AtomicUsize,
}

impl<E: Executor> CountingExecutor<E> {
    fn new(inner: E) -> Self {
        Self {
            inner,
            count: AtomicUsize::new(0),
        }
    }

    fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl<E: Executor> Executor for CountingExecutor<E> {
    fn add(&self, task: Task) {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.inner.add(task);
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Index,
    Range,
}

/// Runs one `(from, to, parallelism)` case and checks both the visitation
/// and the dispatch-count contracts.
fn check_parallel_for<E: Executor>(executor: &E, from: usize, to: usize, factor: usize, mode: Mode) {
    let counted = CountingExecutor::new(executor);
    let visited: Arc<Vec<AtomicUsize>> =
        Arc::new((from..to).map(|_| AtomicUsize::new(0)).collect());

    let pf = ParallelFor::new(Some(&counted), from, to, factor);
    match mode {
        Mode::Index => {
            let visited = Arc::clone(&visited);
            pf.execute(
                move |i| {
                    visited[i - from].fetch_add(1, Ordering::SeqCst);
                },
                true,
            );
        }
        Mode::Range => {
            let visited = Arc::clone(&visited);
            pf.execute_ranges(
                move |begin, end| {
                    for i in begin..end {
                        visited[i - from].fetch_add(1, Ordering::SeqCst);
                    }
                },
                true,
            );
        }
    }

    for (i, count) in visited.iter().enumerate() {
        assert_eq!(
            count.load(Ordering::SeqCst),
            1,
            "index {} visited wrong number of times (from={from}, to={to}, factor={factor})",
            from + i
        );
    }

    let work = to - from;
    let degree = factor.min(work);
    let expected = if degree > 1 { degree } else { 0 };
    assert_eq!(
        counted.count(),
        expected,
        "wrong dispatch count (from={from}, to={to}, factor={factor})"
    );
}

#[test]
fn inline_grid_visits_every_index_exactly_once() {
    for factor in 0..8 {
        for from in 0..10 {
            for to in from..10 {
                check_parallel_for(&InlineExecutor, from, to, factor, Mode::Index);
                check_parallel_for(&InlineExecutor, from, to, factor, Mode::Range);
            }
        }
    }
}

#[test]
fn pooled_grid_visits_every_index_exactly_once() {
    let pool = build_pool(2).expect("pool");
    for factor in [1, 2, 3, 5, 9] {
        for (from, to) in [(0, 0), (0, 1), (0, 7), (3, 20), (10, 10), (5, 6)] {
            check_parallel_for(&pool, from, to, factor, Mode::Index);
            check_parallel_for(&pool, from, to, factor, Mode::Range);
        }
    }
}

#[test]
fn dispatch_count_equals_effective_degree() {
    // from=0, to=10, factor=4: D = 4, so exactly 4 tasks reach the
    // executor.
    let pool = build_pool(2).expect("pool");
    check_parallel_for(&pool, 0, 10, 4, Mode::Index);
    check_parallel_for(&pool, 0, 10, 4, Mode::Range);
}

#[test]
fn single_range_runs_inline_without_touching_the_executor() {
    check_parallel_for(&InlineExecutor, 0, 5, 1, Mode::Index);
    check_parallel_for(&InlineExecutor, 0, 1, 8, Mode::Range);
    check_parallel_for(&InlineExecutor, 0, 5, 0, Mode::Index);
}

#[test]
fn no_executor_runs_inline() {
    let visited = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&visited);
    ParallelFor::new(None, 0, 16, 4).execute(
        move |_i| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
        true,
    );
    assert_eq!(visited.load(Ordering::SeqCst), 16);
}

#[test]
fn sub_range_sizes_differ_by_at_most_one() {
    for (from, to, factor) in [(0, 10, 4), (0, 17, 5), (3, 4, 7), (0, 100, 9), (2, 2, 3)] {
        let pf = ParallelFor::new(Some(&InlineExecutor), from, to, factor);
        let ranges = pf.ranges();

        // Contiguous cover of [from, to).
        let mut cursor = from;
        for &(begin, end) in ranges {
            assert_eq!(begin, cursor);
            assert!(end > begin);
            cursor = end;
        }
        assert_eq!(cursor, if from == to { from } else { to });

        if let (Some(min), Some(max)) = (
            ranges.iter().map(|(b, e)| e - b).min(),
            ranges.iter().map(|(b, e)| e - b).max(),
        ) {
            assert!(max - min <= 1, "uneven split {ranges:?}");
        }
    }
}

#[test]
fn no_wait_returns_while_tasks_still_run() {
    let pool = build_pool(2).expect("pool");
    let gate = Arc::new((Mutex::new(false), Condvar::new()));
    let started = Arc::new((Mutex::new(0usize), Condvar::new()));
    let finished = Arc::new((Mutex::new(0usize), Condvar::new()));
    let completed = Arc::new(AtomicUsize::new(0));

    let pf = ParallelFor::new(Some(&pool), 0, 2, 2);
    {
        let gate = Arc::clone(&gate);
        let started = Arc::clone(&started);
        let finished = Arc::clone(&finished);
        let completed = Arc::clone(&completed);
        pf.execute(
            move |_i| {
                {
                    let (count, cv) = &*started;
                    *count.lock().unwrap() += 1;
                    cv.notify_all();
                }
                {
                    let (open, cv) = &*gate;
                    let mut open = open.lock().unwrap();
                    while !*open {
                        open = cv.wait(open).unwrap();
                    }
                }
                completed.fetch_add(1, Ordering::SeqCst);
                let (count, cv) = &*finished;
                *count.lock().unwrap() += 1;
                cv.notify_all();
            },
            false,
        );
    }

    // Both tasks are running (blocked on the gate) and execute() has
    // already returned.
    {
        let (count, cv) = &*started;
        let mut count = count.lock().unwrap();
        while *count < 2 {
            count = cv.wait(count).unwrap();
        }
    }
    assert_eq!(completed.load(Ordering::SeqCst), 0);

    {
        let (open, cv) = &*gate;
        *open.lock().unwrap() = true;
        cv.notify_all();
    }
    {
        let (count, cv) = &*finished;
        let mut count = count.lock().unwrap();
        while *count < 2 {
            count = cv.wait(count).unwrap();
        }
    }
    assert_eq!(completed.load(Ordering::SeqCst), 2);
}

#[test]
#[should_panic(expected = "invalid fan-out range")]
fn inverted_range_fails_fast() {
    let _pf = ParallelFor::new(None, 5, 3, 2);
}

#[test]
fn shared_executor_outlives_the_planner() {
    let executor: Arc<dyn Executor> = Arc::new(build_pool(2).expect("pool"));
    let visited: Arc<Vec<AtomicUsize>> =
        Arc::new((0..100).map(|_| AtomicUsize::new(0)).collect());

    let pf = ParallelFor::with_shared(executor, 0, 100, 9);
    {
        let visited = Arc::clone(&visited);
        pf.execute(
            move |i| {
                visited[i].fetch_add(1, Ordering::SeqCst);
            },
            true,
        );
    }

    for count in visited.iter() {
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}

#[test]
#[should_panic(expected = "row group 2 is corrupt")]
fn worker_panic_propagates_to_the_waiting_caller() {
    let pool = build_pool(2).expect("pool");
    ParallelFor::new(Some(&pool), 0, 4, 4).execute(
        |i| {
            assert!(i != 2, "row group {i} is corrupt");
        },
        true,
    );
}
