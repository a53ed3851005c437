//! The backend I/O contract and the provided byte sources.
//!
//! [`BufferedInput`](crate::BufferedInput) is written against the
//! [`RandomAccessInput`] trait: a synchronous random-access byte provider
//! with a scalar [`read`](RandomAccessInput::read) and an optional vectored
//! [`vread`](RandomAccessInput::vread). Backends that have no native scatter
//! read inherit a default `vread` that falls back to a scalar loop.
//!
//! The module also carries the observability surface threaded through every
//! read: a [`LogType`] tag naming what the bytes are for, the optional
//! [`IoStatistics`] counter sink, and the advisory [`StreamIdentifier`]
//! accepted at enqueue time.
//!
//! [`DataSourceInput`] is the provided backend. It serves ranges out of a
//! [`DataSource`] — a memory-mapped file or an owned byte vector — and is
//! what tests and single-process readers use directly.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[cfg(feature = "mmap")]
use std::fs::File;
#[cfg(feature = "mmap")]
use std::path::Path;

#[cfg(feature = "mmap")]
use memmap2::Mmap;

use crate::error::{CoreadError, Result};
use crate::region::Region;

/// Purpose tag threaded through backend reads for I/O observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogType {
    /// File header bytes.
    Header,
    /// File footer / postscript metadata.
    FileFooter,
    /// Whole-stripe reads.
    Stripe,
    /// Stripe footer metadata.
    StripeFooter,
    /// Row and column index streams.
    StripeIndex,
    /// Column chunk data streams.
    StripeData,
    /// Generic block reads.
    Block,
    /// Test traffic.
    Test,
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Header => "header",
            Self::FileFooter => "file footer",
            Self::Stripe => "stripe",
            Self::StripeFooter => "stripe footer",
            Self::StripeIndex => "stripe index",
            Self::StripeData => "stripe data",
            Self::Block => "block",
            Self::Test => "test",
        };
        f.write_str(name)
    }
}

/// Advisory identifier a reader may attach to an enqueued range.
///
/// The core ignores it beyond trace logging; it exists so column readers can
/// correlate their streams in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamIdentifier(
    /// Numeric stream id, e.g. a column or stream index.
    pub u64,
);

/// Atomic I/O counters shared between the backend and the coalescing pass.
///
/// The sink is optional everywhere it appears; the core tolerates its
/// absence.
#[derive(Debug, Default)]
pub struct IoStatistics {
    raw_bytes_read: AtomicU64,
    raw_overread_bytes: AtomicU64,
}

impl IoStatistics {
    /// Fresh counters, all zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `bytes` read from the backend.
    pub fn inc_raw_bytes_read(&self, bytes: u64) {
        self.raw_bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record `bytes` read that no enqueued region asked for (absorbed merge
    /// gaps).
    pub fn inc_raw_overread_bytes(&self, bytes: u64) {
        self.raw_overread_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Total bytes read from the backend.
    pub fn raw_bytes_read(&self) -> u64 {
        self.raw_bytes_read.load(Ordering::Relaxed)
    }

    /// Total over-read bytes.
    pub fn raw_overread_bytes(&self) -> u64 {
        self.raw_overread_bytes.load(Ordering::Relaxed)
    }
}

/// Synchronous random-access byte provider.
///
/// Implementations must be thread-safe: once a load cycle completes, lazy
/// streams may resolve concurrently against buffers the provider filled.
pub trait RandomAccessInput: Send + Sync {
    /// Fill `buf` with the `buf.len()` bytes starting at `offset`.
    ///
    /// Short reads are errors; on success the whole buffer is valid.
    fn read(&self, buf: &mut [u8], offset: u64, log_type: LogType) -> Result<()>;

    /// Scatter read: fill `buffers[i]` from `regions[i]`.
    ///
    /// Both slices have the same length and the entries are independent; any
    /// physical issuance order is allowed, but every region is complete when
    /// the call returns. The default implementation loops over
    /// [`read`](Self::read).
    fn vread(
        &self,
        buffers: &mut [&mut [u8]],
        regions: &[Region],
        log_type: LogType,
    ) -> Result<()> {
        debug_assert_eq!(buffers.len(), regions.len());
        log::debug!(
            "backend has no native vread, falling back to {} scalar reads ({log_type})",
            regions.len()
        );
        for (buf, region) in buffers.iter_mut().zip(regions) {
            self.read(buf, region.offset, log_type)?;
        }
        Ok(())
    }

    /// Total size of the underlying file in bytes.
    fn size(&self) -> u64;

    /// Optional statistics sink.
    fn stats(&self) -> Option<&IoStatistics> {
        None
    }
}

/// Borrowed providers are providers.
impl<I: RandomAccessInput + ?Sized> RandomAccessInput for &I {
    fn read(&self, buf: &mut [u8], offset: u64, log_type: LogType) -> Result<()> {
        (**self).read(buf, offset, log_type)
    }

    fn vread(
        &self,
        buffers: &mut [&mut [u8]],
        regions: &[Region],
        log_type: LogType,
    ) -> Result<()> {
        (**self).vread(buffers, regions, log_type)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn stats(&self) -> Option<&IoStatistics> {
        (**self).stats()
    }
}

// --- Provided byte sources ---

/// Where the bytes live: a memory-mapped file or an owned vector.
///
/// Cheap to clone; both variants share their backing through `Arc`.
#[derive(Debug, Clone)]
pub enum DataSource {
    /// Memory-mapped file contents.
    #[cfg(feature = "mmap")]
    Mmap(Arc<Mmap>),
    /// Owned in-memory bytes.
    Memory(Arc<Vec<u8>>),
}

impl Deref for DataSource {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &Self::Target {
        match self {
            #[cfg(feature = "mmap")]
            Self::Mmap(mmap) => mmap.as_ref(),
            Self::Memory(vec) => vec.as_slice(),
        }
    }
}

/// The provided backend: serves byte ranges out of a [`DataSource`].
#[derive(Debug)]
pub struct DataSourceInput {
    source: DataSource,
    stats: Option<Arc<IoStatistics>>,
}

impl DataSourceInput {
    /// A backend over owned in-memory bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            source: DataSource::Memory(Arc::new(bytes)),
            stats: None,
        }
    }

    /// A backend over an existing [`DataSource`].
    pub fn from_source(source: DataSource) -> Self {
        Self {
            source,
            stats: None,
        }
    }

    /// Memory-map the file at `path`.
    ///
    /// The mapping assumes the file is immutable while mapped; truncating or
    /// rewriting it externally invalidates the view.
    #[cfg(feature = "mmap")]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        // Safety: the file is assumed immutable for the lifetime of the map.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            source: DataSource::Mmap(Arc::new(mmap)),
            stats: None,
        })
    }

    /// Attach a statistics sink.
    pub fn with_stats(mut self, stats: Arc<IoStatistics>) -> Self {
        self.stats = Some(stats);
        self
    }
}

impl RandomAccessInput for DataSourceInput {
    fn read(&self, buf: &mut [u8], offset: u64, log_type: LogType) -> Result<()> {
        let data: &[u8] = &self.source;
        let length = buf.len() as u64;
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= data.len() as u64)
            .ok_or_else(|| {
                CoreadError::from(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!(
                        "read of {length} bytes at offset {offset} past end of \
                         {}-byte source ({log_type})",
                        data.len()
                    ),
                ))
            })?;
        buf.copy_from_slice(&data[offset as usize..end as usize]);
        if let Some(stats) = &self.stats {
            stats.inc_raw_bytes_read(length);
        }
        Ok(())
    }

    fn size(&self) -> u64 {
        self.source.len() as u64
    }

    fn stats(&self) -> Option<&IoStatistics> {
        self.stats.as_deref()
    }
}
