//! The enqueue/coalesce/materialize engine.
//!
//! Columnar readers issue many small, scattered reads per row group: column
//! chunks, indexes, dictionaries, bloom filters. Against a high-latency
//! block store, one request per range is prohibitive. [`BufferedInput`]
//! inverts the pattern: the reader first *enqueues* every range it will
//! eventually need, receiving one [`LazyStream`] per call, then triggers a
//! single *load* pass that sorts the ranges, merges neighbors within the
//! configured gap, issues the few large reads that remain, and publishes the
//! buffers for stream resolution.
//!
//! ## Load cycles
//!
//! A load is an atomic state transition from "N pending regions" to "N' ≤ N
//! buffers in the index". Each cycle starts fresh: the previous cycle's
//! index entries and pool accounting are dropped before the new reads are
//! issued, and streams from the previous cycle are invalidated. There is no
//! caching across cycles — with one deliberate exception: `enqueue` first
//! checks whether the requested range is still covered by the live index
//! (footer metadata being re-read, typically) and hands out an
//! already-resolved stream without touching the region set.
//!
//! ## Threading
//!
//! A `BufferedInput` is single-threaded per instance: `enqueue`, `load`, and
//! the first read of each stream must be externally serialized. Once `load`
//! has returned, distinct streams may be read concurrently — the index is
//! immutable for the rest of the cycle.
//!
//! ## Dispatch
//!
//! The merged regions are read either scalar (one backend `read` per region,
//! in ascending offset order) or vectored (one backend `vread` carrying all
//! regions), chosen per instance with a process-wide default.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::{CoreadError, Result};
use crate::index::BufferIndex;
use crate::io::{LogType, RandomAccessInput, StreamIdentifier};
use crate::pool::MemoryPool;
use crate::region::{self, Region, DEFAULT_MAX_MERGE_DISTANCE};
use crate::stream::LazyStream;

/// Process-wide default for the vectored-read preference.
static VECTORED_READ_DEFAULT: AtomicBool = AtomicBool::new(false);

/// Set the process-wide default for the vectored-read preference.
///
/// Instances constructed with [`ReadOptions::vectored_read`] `= None` follow
/// this flag; instances may override it.
pub fn set_default_vectored_read(enabled: bool) {
    VECTORED_READ_DEFAULT.store(enabled, Ordering::Relaxed);
}

/// The current process-wide vectored-read default.
pub fn default_vectored_read() -> bool {
    VECTORED_READ_DEFAULT.load(Ordering::Relaxed)
}

/// Construction options for [`BufferedInput`].
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Maximum tolerated gap in bytes between two consecutive sorted regions
    /// for them to be coalesced into one read.
    pub max_merge_distance: u64,
    /// Scalar vs vectored dispatch. `None` follows the process-wide default
    /// set by [`set_default_vectored_read`].
    pub vectored_read: Option<bool>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            max_merge_distance: DEFAULT_MAX_MERGE_DISTANCE,
            vectored_read: None,
        }
    }
}

/// The read-coalescing buffered input over one logical file.
///
/// See the [module documentation](self) for the enqueue/load protocol.
pub struct BufferedInput<I> {
    input: I,
    pool: Arc<dyn MemoryPool>,
    max_merge_distance: u64,
    vectored_read: bool,
    regions: Vec<Region>,
    index: Arc<RwLock<BufferIndex>>,
    cycles_completed: u64,
}

impl<I: std::fmt::Debug> std::fmt::Debug for BufferedInput<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedInput")
            .field("input", &self.input)
            .field("max_merge_distance", &self.max_merge_distance)
            .field("vectored_read", &self.vectored_read)
            .field("pending_regions", &self.regions.len())
            .field("cycles_completed", &self.cycles_completed)
            .finish_non_exhaustive()
    }
}

impl<I: RandomAccessInput> BufferedInput<I> {
    /// A buffered input over `input`, allocating its cycle buffers from
    /// `pool`.
    pub fn new(input: I, pool: Arc<dyn MemoryPool>, options: ReadOptions) -> Self {
        Self {
            input,
            pool,
            max_merge_distance: options.max_merge_distance,
            vectored_read: options.vectored_read.unwrap_or_else(default_vectored_read),
            regions: Vec::new(),
            index: Arc::new(RwLock::new(BufferIndex::default())),
            cycles_completed: 0,
        }
    }

    /// The backend handle.
    pub fn input(&self) -> &I {
        &self.input
    }

    /// Promise that `region` will be needed and hand out its lazy stream.
    ///
    /// Zero-length regions short-circuit to an empty stream and never enter
    /// the region set. A region already covered by the live index (footer
    /// metadata from a previous cycle, typically) returns an
    /// already-resolved stream without enqueueing anything. Everything else
    /// is appended to the pending set and resolves after the next
    /// [`load`](Self::load).
    pub fn enqueue(&mut self, region: Region) -> LazyStream {
        if region.is_empty() {
            return LazyStream::empty();
        }

        if let Some(stream) = self.read_buffer(region.offset, region.length) {
            return stream;
        }

        self.regions.push(region);
        LazyStream::pending(
            Arc::clone(&self.index),
            region.offset,
            region.length,
            self.cycles_completed + 1,
        )
    }

    /// [`enqueue`](Self::enqueue) with an advisory stream identifier.
    ///
    /// The identifier is ignored beyond trace logging.
    pub fn enqueue_identified(&mut self, region: Region, id: StreamIdentifier) -> LazyStream {
        log::trace!(
            "enqueue stream {} over [{}, {})",
            id.0,
            region.offset,
            region.end()
        );
        self.enqueue(region)
    }

    /// Materialize every pending region in one coalesced pass.
    ///
    /// No-op on an empty region set. On success every stream enqueued since
    /// the previous load is readable; on failure the instance is consistent
    /// but empty, and those streams report the dead cycle when read.
    pub fn load(&mut self, log_type: LogType) -> Result<()> {
        if self.regions.is_empty() {
            return Ok(());
        }
        let outcome = self.load_pending(log_type);
        // The region set is consumed whatever happens; a failed cycle is not
        // retried with stale regions.
        self.regions.clear();
        outcome
    }

    fn load_pending(&mut self, log_type: LogType) -> Result<()> {
        // Drop the previous cycle before buying the next one.
        self.lock_index_mut()?.clear();
        self.pool.clear();

        region::coalesce(&mut self.regions, self.max_merge_distance, self.input.stats());

        let mut buffers = Vec::with_capacity(self.regions.len());
        for region in &self.regions {
            buffers.push(self.pool.allocate(region.length as usize)?);
        }

        if self.vectored_read {
            let mut views: Vec<&mut [u8]> = buffers.iter_mut().map(Vec::as_mut_slice).collect();
            self.input.vread(&mut views, &self.regions, log_type)?;
        } else {
            // Merged-region order.
            for (region, buf) in self.regions.iter().zip(buffers.iter_mut()) {
                self.input.read(buf, region.offset, log_type)?;
            }
        }

        log::debug!(
            "loaded {} coalesced region(s), {} bytes ({log_type})",
            self.regions.len(),
            buffers.iter().map(Vec::len).sum::<usize>()
        );

        let offsets: Vec<u64> = self.regions.iter().map(|region| region.offset).collect();
        let frozen: Vec<Arc<[u8]>> = buffers.into_iter().map(Arc::from).collect();
        self.lock_index_mut()?.publish(offsets, frozen);
        self.cycles_completed += 1;
        Ok(())
    }

    /// The pre-load fast path: a ready stream when the live index already
    /// covers the range.
    fn read_buffer(&self, offset: u64, length: u64) -> Option<LazyStream> {
        let index = self.index.read().ok()?;
        index.find(offset, length).map(LazyStream::ready)
    }

    /// Number of merged regions in the live index.
    pub fn buffer_count(&self) -> usize {
        self.index
            .read()
            .map(|index| index.entry_count())
            .unwrap_or(0)
    }

    fn lock_index_mut(&self) -> Result<std::sync::RwLockWriteGuard<'_, BufferIndex>> {
        self.index
            .write()
            .map_err(|_| CoreadError::Internal("buffer index lock poisoned".into()))
    }
}
