//! # coread
//!
//! The read-coalescing I/O layer of a columnar file reader. Row-group
//! oriented formats (ORC/Parquet-family layouts) need many small, scattered
//! byte ranges per row group — column chunks, indexes, dictionaries, bloom
//! filters — and issuing one storage request per range against a
//! high-latency block store is prohibitively slow. coread solves this with
//! an enqueue/load protocol:
//!
//! 1. The reader **enqueues** every range it will eventually need. Each call
//!    returns a [`LazyStream`] immediately.
//! 2. One **load** pass sorts the ranges, merges the ones separated by at
//!    most a configured gap into single reads, issues those reads (scalar or
//!    vectored), and publishes the buffers.
//! 3. The lazy streams resolve against the buffered data on first read.
//!
//! Gaps absorbed by merging are *over-read* bytes; they are reported to an
//! optional [`IoStatistics`] sink so operators can tune the merge distance.
//!
//! The crate's second piece is [`ParallelFor`], the bounded fan-out
//! primitive the decoder uses to split per-row-group work across a
//! caller-supplied [`Executor`] with an exact, testable parallelism
//! contract.
//!
//! ## Example
//!
//! ```rust
//! use std::io::Read;
//! use std::sync::Arc;
//!
//! use coread::{BufferedInput, DataSourceInput, HeapPool, LogType, ReadOptions, Region};
//!
//! let file: Vec<u8> = (0u8..=255).cycle().take(4096).collect();
//! let backend = DataSourceInput::from_bytes(file.clone());
//! let mut buffered = BufferedInput::new(
//!     backend,
//!     Arc::new(HeapPool::new()),
//!     ReadOptions::default(),
//! );
//!
//! // Declare everything the row group needs, then load once.
//! let mut index_stream = buffered.enqueue(Region::new(0, 16));
//! let mut data_stream = buffered.enqueue(Region::new(1024, 64));
//! buffered.load(LogType::Test)?;
//!
//! let mut bytes = Vec::new();
//! index_stream.read_to_end(&mut bytes)?;
//! assert_eq!(bytes, &file[..16]);
//!
//! bytes.clear();
//! data_stream.read_to_end(&mut bytes)?;
//! assert_eq!(bytes, &file[1024..1088]);
//! # Ok::<(), coread::CoreadError>(())
//! ```
//!
//! ## Scope
//!
//! coread buffers exactly what was enqueued, once per load cycle. It does
//! not cache across cycles, prefetch beyond the enqueued set, or touch
//! encryption, checksums, or decompression — those belong to the readers
//! above it. A range is either fully buffered after `load` returns, or was
//! not requested.
//!
//! ## Guarantees
//!
//! - No `unwrap()` or `panic!()` in the library; runtime failures are
//!   [`CoreadError`] values. Programmer errors (invalid fan-out range,
//!   corrupt region set) fail fast through assertions.
//! - `unsafe` appears once, for memory-mapping files, and assumes mapped
//!   files are immutable.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

pub mod buffered;
pub mod error;
pub mod executor;
pub mod io;
pub mod parallel;
pub mod pool;
pub mod region;
pub mod stream;

mod index;

pub use buffered::{
    default_vectored_read, set_default_vectored_read, BufferedInput, ReadOptions,
};
pub use error::{CoreadError, Result};
pub use executor::{Executor, InlineExecutor, Task};
pub use io::{
    DataSource, DataSourceInput, IoStatistics, LogType, RandomAccessInput, StreamIdentifier,
};
pub use parallel::ParallelFor;
pub use pool::{HeapPool, MemoryPool};
pub use region::{Region, DEFAULT_MAX_MERGE_DISTANCE};
pub use stream::LazyStream;
