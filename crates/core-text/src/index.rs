//! Lazily rebuilt Unicode index over the text store.
//!
//! The index is derived, never authoritative: it caches codepoint and grapheme
//! counts and is dropped by any mutation that cannot adjust the counts in
//! place. Offset mappings are computed from the current content on demand.
//!
//! Malformed UTF-8 is decoded tolerantly. Every invalid sequence reported by
//! the decoder is one "replacement" unit: one codepoint, one grapheme cluster,
//! one display cell. The validator, not the index, decides that such content is
//! corrupted.

use tracing::trace;
use unicode_segmentation::UnicodeSegmentation;

use crate::Buffer;
use crate::error::{EditError, EditResult};

/// Cached counts; present in the buffer only while valid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexCounts {
    pub codepoints: usize,
    pub graphemes: usize,
}

/// Unit in which offsets are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Codepoint,
    Grapheme,
}

/// One decoded run of the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Unit<'a> {
    Text(&'a str),
    Malformed(&'a [u8]),
}

/// Decode `bytes` into well-formed text runs and malformed sequences, with their offsets.
pub(crate) fn units(bytes: &[u8]) -> impl Iterator<Item = (usize, Unit<'_>)> {
    let mut offset = 0usize;
    bytes.utf8_chunks().flat_map(move |chunk| {
        let valid = chunk.valid();
        let invalid = chunk.invalid();
        let start = offset;
        offset += valid.len() + invalid.len();
        let text = (!valid.is_empty()).then_some((start, Unit::Text(valid)));
        let bad = (!invalid.is_empty()).then_some((start + valid.len(), Unit::Malformed(invalid)));
        text.into_iter().chain(bad)
    })
}

/// Full rescan.
pub(crate) fn scan(bytes: &[u8]) -> IndexCounts {
    let mut counts = IndexCounts::default();
    for (_, unit) in units(bytes) {
        match unit {
            Unit::Text(s) => {
                counts.codepoints += s.chars().count();
                counts.graphemes += s.graphemes(true).count();
            }
            Unit::Malformed(_) => {
                counts.codepoints += 1;
                counts.graphemes += 1;
            }
        }
    }
    counts
}

/// Sorted start offsets of every unit at `granularity`, followed by `bytes.len()`.
pub(crate) fn boundaries(bytes: &[u8], granularity: Granularity) -> Vec<usize> {
    let mut out = Vec::new();
    for (start, unit) in units(bytes) {
        match (unit, granularity) {
            (Unit::Text(s), Granularity::Codepoint) => {
                out.extend(s.char_indices().map(|(i, _)| start + i))
            }
            (Unit::Text(s), Granularity::Grapheme) => {
                out.extend(s.grapheme_indices(true).map(|(i, _)| start + i))
            }
            (Unit::Malformed(_), _) => out.push(start),
        }
    }
    out.push(bytes.len());
    out
}

#[inline]
pub(crate) fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

/// Inserted or removed bytes whose grapheme count equals their byte length.
pub(crate) fn is_plain_ascii(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .all(|b| b.is_ascii() && *b != b'\r' && *b != b'\n')
}

impl Buffer {
    /// True if `offset` starts a codepoint (or a malformed sequence), or is `0` / `len`.
    pub fn is_boundary(&self, offset: usize) -> bool {
        let len = self.len();
        if offset == 0 || offset == len {
            return true;
        }
        let Some(byte) = self.store.byte_at(offset) else {
            return false;
        };
        if !is_continuation(byte) {
            return true;
        }
        // Decoding always restarts at a non-continuation byte.
        let mut start = offset;
        while start > 0
            && self
                .store
                .byte_at(start)
                .is_some_and(is_continuation)
        {
            start -= 1;
        }
        let window = self.store.copy_range(start, offset + 1);
        boundaries(&window, Granularity::Codepoint).contains(&(offset - start))
    }

    /// Splicing at `[before, after)` keeps grapheme counts additive when both
    /// neighbours are ASCII and no CR/LF pair can form.
    pub(crate) fn ascii_neighbours(&self, before: usize, after: usize) -> bool {
        let prev_ok = before == 0
            || self
                .store
                .byte_at(before - 1)
                .is_some_and(|b| b.is_ascii() && b != b'\r');
        let next_ok = self.store.byte_at(after).is_none_or(|b| b.is_ascii());
        prev_ok && next_ok
    }

    pub fn is_index_valid(&self) -> bool {
        self.index.get().is_some()
    }

    /// Current counts, rebuilding the cache if a mutation invalidated it.
    pub fn index_counts(&self) -> IndexCounts {
        *self.index.get_or_init(|| {
            let counts = scan(&self.store.contents());
            trace!(target: "text.index", len = self.len(), codepoints = counts.codepoints, graphemes = counts.graphemes, "index_rebuild");
            counts
        })
    }

    pub fn codepoint_count(&self) -> usize {
        self.index_counts().codepoints
    }

    pub fn grapheme_count(&self) -> usize {
        self.index_counts().graphemes
    }

    /// Unit boundaries of the whole buffer.
    pub(crate) fn unit_boundaries(&self, granularity: Granularity) -> Vec<usize> {
        boundaries(&self.store.contents(), granularity)
    }

    /// Byte offset at which codepoint `n` starts (`n == codepoint_count()` maps to `len`).
    pub fn byte_offset_for_codepoint(&self, n: usize) -> EditResult<usize> {
        self.byte_offset_for(n, Granularity::Codepoint)
    }

    /// Byte offset at which grapheme cluster `n` starts.
    pub fn byte_offset_for_grapheme(&self, n: usize) -> EditResult<usize> {
        self.byte_offset_for(n, Granularity::Grapheme)
    }

    fn byte_offset_for(&self, n: usize, granularity: Granularity) -> EditResult<usize> {
        let counts = self.index_counts();
        let total = match granularity {
            Granularity::Codepoint => counts.codepoints,
            Granularity::Grapheme => counts.graphemes,
        };
        if n > total {
            return Err(EditError::InvalidOffset {
                offset: n,
                len: total,
            });
        }
        if total == self.len() {
            return Ok(n);
        }
        Ok(self.unit_boundaries(granularity)[n])
    }

    /// Number of codepoints before byte offset `b`.
    pub fn codepoint_for_byte_offset(&self, b: usize) -> EditResult<usize> {
        self.check_boundary(b)?;
        if self.codepoint_count() == self.len() {
            return Ok(b);
        }
        let starts = self.unit_boundaries(Granularity::Codepoint);
        Ok(starts.partition_point(|&start| start < b))
    }

    /// Index of the grapheme cluster containing byte offset `b` (`grapheme_count()` at `len`).
    pub fn grapheme_for_byte_offset(&self, b: usize) -> EditResult<usize> {
        self.check_boundary(b)?;
        if self.grapheme_count() == self.len() {
            return Ok(b);
        }
        let starts = self.unit_boundaries(Granularity::Grapheme);
        Ok(starts.partition_point(|&start| start <= b) - 1)
    }

    /// Terminal cells occupied by the whole content.
    pub fn display_width(&self) -> usize {
        crate::width::tolerant_width(&self.store.contents())
    }

    /// Terminal column of byte offset `b` within its line.
    pub fn display_column(&self, b: usize) -> EditResult<usize> {
        self.check_boundary(b)?;
        let line_start = self.line_start_before(b);
        let prefix = self.store.copy_range(line_start, b);
        Ok(crate::width::tolerant_width(&prefix))
    }
}
