//! Offset-to-buffer lookup for loaded regions.
//!
//! Two parallel sequences: `offsets[i]` is the starting file offset of merged
//! region `i`, `buffers[i]` the shared buffer covering it. Offsets are
//! strictly increasing, so one binary search finds the only candidate buffer
//! for any requested range.

use std::sync::Arc;

/// A resolved view into one loaded buffer.
#[derive(Debug, Clone)]
pub(crate) struct SliceView {
    data: Arc<[u8]>,
    start: usize,
    len: usize,
}

impl SliceView {
    pub(crate) fn empty() -> Self {
        Self {
            data: Arc::from(Vec::new()),
            start: 0,
            len: 0,
        }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.data[self.start..self.start + self.len]
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

/// The buffer index of one load cycle plus the cycle counter used to
/// invalidate streams from earlier cycles.
#[derive(Debug, Default)]
pub(crate) struct BufferIndex {
    offsets: Vec<u64>,
    buffers: Vec<Arc<[u8]>>,
    cycle: u64,
}

impl BufferIndex {
    /// Completed load cycles. A pending stream resolves only while this
    /// matches the cycle it was enqueued for.
    pub(crate) fn cycle(&self) -> u64 {
        self.cycle
    }

    pub(crate) fn entry_count(&self) -> usize {
        self.offsets.len()
    }

    /// Drop the previous cycle's entries without bumping the cycle.
    pub(crate) fn clear(&mut self) {
        self.offsets.clear();
        self.buffers.clear();
    }

    /// Install the buffers of a freshly loaded cycle.
    pub(crate) fn publish(&mut self, offsets: Vec<u64>, buffers: Vec<Arc<[u8]>>) {
        debug_assert_eq!(offsets.len(), buffers.len());
        debug_assert!(
            offsets.windows(2).all(|pair| pair[0] < pair[1]),
            "offsets must be strictly increasing"
        );
        self.offsets = offsets;
        self.buffers = buffers;
        self.cycle += 1;
    }

    /// Locate the buffer slice covering `[offset, offset + length)`.
    ///
    /// Zero-length requests succeed with an empty view. A miss returns
    /// `None`; that is the normal signal during the enqueue fast path, not an
    /// error.
    pub(crate) fn find(&self, offset: u64, length: u64) -> Option<SliceView> {
        if length == 0 {
            return Some(SliceView::empty());
        }

        // Largest i with offsets[i] <= offset.
        let after = self.offsets.partition_point(|&start| start <= offset);
        if after == 0 {
            return None;
        }
        let at = after - 1;

        let buffer = &self.buffers[at];
        let start = self.offsets[at];
        if start + buffer.len() as u64 >= offset + length {
            Some(SliceView {
                data: Arc::clone(buffer),
                start: (offset - start) as usize,
                len: length as usize,
            })
        } else {
            None
        }
    }
}
