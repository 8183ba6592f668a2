//! Gap buffer text store.
//!
//! Backing layout:
//!
//! ```text
//!  [ data before gap | gap (unused) | data after gap ]
//!    0..gap_start      gap_start..gap_end  gap_end..buf.len()
//! ```
//!
//! Positions in this module are logical byte offsets (gap excluded). The store
//! itself knows nothing about UTF-8; boundary checks live on `Buffer`.

use std::borrow::Cow;

use tracing::trace;

use crate::error::{EditError, EditResult};

/// Default physical capacity of a fresh store.
pub const DEFAULT_CAPACITY: usize = 64;

/// Smallest capacity a store will grow to.
pub const MIN_CAPACITY: usize = 16;

/// Raw layout numbers, consumed by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapLayout {
    pub len: usize,
    pub capacity: usize,
    pub gap_start: usize,
    pub gap_end: usize,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct GapBuffer {
    buf: Vec<u8>,
    gap_start: usize,
    gap_end: usize,
    limit: Option<usize>,
}

impl Default for GapBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, None)
    }
}

impl GapBuffer {
    /// Empty store whose gap spans `capacity` bytes. `limit` caps future growth.
    pub fn with_capacity(capacity: usize, limit: Option<usize>) -> Self {
        let mut capacity = capacity.max(MIN_CAPACITY);
        if let Some(limit) = limit {
            capacity = capacity.min(limit);
        }
        Self {
            buf: vec![0u8; capacity],
            gap_start: 0,
            gap_end: capacity,
            limit,
        }
    }

    /// Store pre-loaded with `bytes`, gap placed at the end so appends are cheap.
    pub fn from_bytes(bytes: &[u8], extra: usize, limit: Option<usize>) -> EditResult<Self> {
        if let Some(limit) = limit
            && bytes.len() > limit
        {
            return Err(EditError::AllocationFailure {
                requested: bytes.len(),
            });
        }
        let mut capacity = bytes.len() + extra.max(MIN_CAPACITY);
        if let Some(limit) = limit {
            capacity = capacity.min(limit);
        }
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)
            .map_err(|_| EditError::AllocationFailure {
                requested: capacity,
            })?;
        buf.extend_from_slice(bytes);
        buf.resize(capacity, 0);
        Ok(Self {
            buf,
            gap_start: bytes.len(),
            gap_end: capacity,
            limit,
        })
    }

    /// Unbounded store that takes ownership of `buf` as its content.
    ///
    /// Allocates like any `Vec`, so it cannot report `AllocationFailure`.
    pub fn from_vec(mut buf: Vec<u8>, extra: usize) -> Self {
        let len = buf.len();
        let capacity = len + extra.max(MIN_CAPACITY);
        buf.resize(capacity, 0);
        Self {
            buf,
            gap_start: len,
            gap_end: capacity,
            limit: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len() - self.gap_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Physical size of the backing store (text plus gap).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn gap_len(&self) -> usize {
        self.gap_end - self.gap_start
    }

    /// Logical offset of the gap (the current edit point).
    #[inline]
    pub fn gap_position(&self) -> usize {
        self.gap_start
    }

    pub fn layout(&self) -> GapLayout {
        GapLayout {
            len: self.len(),
            capacity: self.capacity(),
            gap_start: self.gap_start,
            gap_end: self.gap_end,
            limit: self.limit,
        }
    }

    /// Byte at logical `pos`, `None` past the end.
    #[inline]
    pub fn byte_at(&self, pos: usize) -> Option<u8> {
        if pos >= self.len() {
            None
        } else if pos < self.gap_start {
            Some(self.buf[pos])
        } else {
            Some(self.buf[pos + self.gap_len()])
        }
    }

    /// The two text segments on either side of the gap.
    pub fn slices(&self) -> (&[u8], &[u8]) {
        (&self.buf[..self.gap_start], &self.buf[self.gap_end..])
    }

    /// Contiguous view of the text; borrowed when the gap sits at either end.
    pub fn contents(&self) -> Cow<'_, [u8]> {
        let (before, after) = self.slices();
        if after.is_empty() {
            Cow::Borrowed(before)
        } else if before.is_empty() {
            Cow::Borrowed(after)
        } else {
            let mut out = Vec::with_capacity(before.len() + after.len());
            out.extend_from_slice(before);
            out.extend_from_slice(after);
            Cow::Owned(out)
        }
    }

    /// Copy of the logical range `[start, end)`. Caller guarantees `start <= end <= len`.
    pub fn copy_range(&self, start: usize, end: usize) -> Vec<u8> {
        debug_assert!(start <= end && end <= self.len());
        let mut out = Vec::with_capacity(end - start);
        if start < self.gap_start {
            out.extend_from_slice(&self.buf[start..end.min(self.gap_start)]);
        }
        if end > self.gap_start {
            let seg_start = start.max(self.gap_start) + self.gap_len();
            out.extend_from_slice(&self.buf[seg_start..end + self.gap_len()]);
        }
        out
    }

    /// Relocate the gap to logical `pos`, shifting only the bytes in between.
    pub fn move_gap_to(&mut self, pos: usize) {
        let pos = pos.min(self.len());
        if pos < self.gap_start {
            let shift = self.gap_start - pos;
            self.buf
                .copy_within(pos..self.gap_start, self.gap_end - shift);
            self.gap_start = pos;
            self.gap_end -= shift;
        } else if pos > self.gap_start {
            let shift = pos - self.gap_start;
            self.buf
                .copy_within(self.gap_end..self.gap_end + shift, self.gap_start);
            self.gap_start += shift;
            self.gap_end += shift;
        }
    }

    /// Grow in place so the gap holds at least `needed` bytes, keeping its position.
    /// On failure nothing changes.
    fn ensure_gap(&mut self, needed: usize) -> EditResult<()> {
        if self.gap_len() >= needed {
            return Ok(());
        }
        let required = self
            .len()
            .checked_add(needed)
            .ok_or(EditError::AllocationFailure {
                requested: usize::MAX,
            })?;
        let mut new_cap = self
            .buf
            .len()
            .saturating_mul(2)
            .max(required)
            .max(MIN_CAPACITY);
        if let Some(limit) = self.limit {
            if required > limit {
                return Err(EditError::AllocationFailure {
                    requested: required,
                });
            }
            new_cap = new_cap.min(limit);
        }
        let old_len = self.buf.len();
        self.buf
            .try_reserve_exact(new_cap - old_len)
            .map_err(|_| EditError::AllocationFailure { requested: new_cap })?;
        let tail = old_len - self.gap_end;
        self.buf.resize(new_cap, 0);
        if tail > 0 {
            self.buf.copy_within(self.gap_end..old_len, new_cap - tail);
        }
        self.gap_end = new_cap - tail;
        trace!(target: "text.buffer", old_capacity = old_len, new_capacity = new_cap, len = self.len(), "gap_grow");
        Ok(())
    }

    /// Insert `bytes` at logical `pos`; the gap ends up right after the new text.
    pub fn insert(&mut self, pos: usize, bytes: &[u8]) -> EditResult<()> {
        debug_assert!(pos <= self.len());
        if bytes.is_empty() {
            return Ok(());
        }
        self.move_gap_to(pos);
        self.ensure_gap(bytes.len())?;
        self.buf[self.gap_start..self.gap_start + bytes.len()].copy_from_slice(bytes);
        self.gap_start += bytes.len();
        Ok(())
    }

    /// Remove logical `[start, end)` and return the removed bytes.
    pub fn delete(&mut self, start: usize, end: usize) -> Vec<u8> {
        debug_assert!(start <= end && end <= self.len());
        if start == end {
            return Vec::new();
        }
        self.move_gap_to(start);
        let removed = self.buf[self.gap_end..self.gap_end + (end - start)].to_vec();
        self.gap_end += end - start;
        removed
    }

    /// Replace logical `[start, end)` with `bytes`, all-or-nothing.
    pub fn replace(&mut self, start: usize, end: usize, bytes: &[u8]) -> EditResult<Vec<u8>> {
        debug_assert!(start <= end && end <= self.len());
        self.move_gap_to(start);
        let span = end - start;
        let removed = self.buf[self.gap_end..self.gap_end + span].to_vec();
        // Swallowed bytes stay physically in place until the insert succeeds.
        self.gap_end += span;
        if let Err(err) = self.ensure_gap(bytes.len()) {
            self.gap_end -= span;
            return Err(err);
        }
        self.buf[self.gap_start..self.gap_start + bytes.len()].copy_from_slice(bytes);
        self.gap_start += bytes.len();
        Ok(removed)
    }

    pub fn clear(&mut self) {
        self.gap_start = 0;
        self.gap_end = self.buf.len();
    }
}
