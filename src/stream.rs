//! Lazy input streams handed out by `enqueue`.
//!
//! A [`LazyStream`] is the promise side of the enqueue/load contract: it is
//! created when a range is enqueued, stays dormant until the load pass
//! buffers the bytes, and resolves against the shared buffer index on first
//! read. Streams whose range was already buffered (the enqueue fast path)
//! are born resolved.
//!
//! Distinct streams may be read concurrently once their load has returned;
//! each stream owns its read position and resolution only takes a shared
//! lock on the immutable index.
//!
//! Reading a stream before its load, or after a later load replaced its
//! buffers, is a contract violation and fails with
//! [`CoreadError::Internal`]. A fast-path stream keeps its buffer alive
//! through a shared reference and stays readable past later loads.

use std::io::{self, Read};
use std::sync::{Arc, RwLock};

use crate::error::{CoreadError, Result};
use crate::index::{BufferIndex, SliceView};

/// A deferred sequential-read view over a promised byte range.
#[derive(Debug)]
pub struct LazyStream {
    state: State,
    pos: usize,
}

#[derive(Debug)]
enum State {
    /// Zero-length promise.
    Empty,
    /// Resolved against a loaded buffer.
    Ready(SliceView),
    /// Waiting for its load cycle.
    Pending(Pending),
}

#[derive(Debug)]
struct Pending {
    index: Arc<RwLock<BufferIndex>>,
    offset: u64,
    length: u64,
    /// The load cycle this stream becomes readable in.
    ready_cycle: u64,
}

impl LazyStream {
    pub(crate) fn empty() -> Self {
        Self {
            state: State::Empty,
            pos: 0,
        }
    }

    pub(crate) fn ready(view: SliceView) -> Self {
        Self {
            state: State::Ready(view),
            pos: 0,
        }
    }

    pub(crate) fn pending(
        index: Arc<RwLock<BufferIndex>>,
        offset: u64,
        length: u64,
        ready_cycle: u64,
    ) -> Self {
        Self {
            state: State::Pending(Pending {
                index,
                offset,
                length,
                ready_cycle,
            }),
            pos: 0,
        }
    }

    /// Promised length of the stream in bytes.
    pub fn len(&self) -> u64 {
        match &self.state {
            State::Empty => 0,
            State::Ready(view) => view.len() as u64,
            State::Pending(pending) => pending.length,
        }
    }

    /// `true` when the stream promises no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes left to read from the current position.
    pub fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.pos as u64)
    }

    /// Returns all bytes from the current position to the end of the range
    /// without copying, advancing the position to the end. `None` once the
    /// range is exhausted.
    pub fn next_chunk(&mut self) -> Result<Option<&[u8]>> {
        self.resolve()?;
        let start = self.pos;
        match &self.state {
            State::Ready(view) if start < view.len() => {
                self.pos = view.len();
                Ok(Some(&view.as_bytes()[start..]))
            }
            _ => Ok(None),
        }
    }

    /// Advance the read position by `count` bytes.
    pub fn skip(&mut self, count: u64) -> Result<()> {
        self.resolve()?;
        let target = self.pos.saturating_add(count as usize);
        let total = self.len() as usize;
        if target > total {
            return Err(CoreadError::Internal(format!(
                "skip past end of stream ({target} > {total})"
            )));
        }
        self.pos = target;
        Ok(())
    }

    /// Reset the read position to the start of the promised range.
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    /// Swap a pending state for the resolved buffer slice.
    fn resolve(&mut self) -> Result<()> {
        let pending = match &self.state {
            State::Pending(pending) => pending,
            _ => return Ok(()),
        };

        let index = pending
            .index
            .read()
            .map_err(|_| CoreadError::Internal("buffer index lock poisoned".into()))?;

        let cycle = index.cycle();
        let span = (pending.offset, pending.offset + pending.length);
        if cycle < pending.ready_cycle {
            return Err(CoreadError::Internal(format!(
                "stream over [{}, {}) read before its load cycle completed",
                span.0, span.1
            )));
        }
        if cycle > pending.ready_cycle {
            return Err(CoreadError::Internal(format!(
                "stream over [{}, {}) was invalidated by a later load",
                span.0, span.1
            )));
        }

        let view = index.find(pending.offset, pending.length).ok_or_else(|| {
            CoreadError::Internal(format!(
                "no loaded buffer covers [{}, {})",
                span.0, span.1
            ))
        })?;
        drop(index);

        self.state = State::Ready(view);
        Ok(())
    }
}

impl Read for LazyStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.resolve().map_err(io::Error::other)?;
        let bytes = match &self.state {
            State::Ready(view) => view.as_bytes(),
            _ => &[],
        };
        let remaining = &bytes[self.pos.min(bytes.len())..];
        let count = remaining.len().min(buf.len());
        buf[..count].copy_from_slice(&remaining[..count]);
        self.pos += count;
        Ok(count)
    }
}
