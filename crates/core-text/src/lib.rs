//! Gap-buffer text store for a shell line editor.
//!
//! `Buffer` is the aggregate root: it owns the byte store, the lazily rebuilt
//! Unicode index, the cursor, mutation counters and the read-only flag. Every
//! mutation is all-or-nothing: offsets are validated, growth is attempted, and
//! only then are content, counters, index and cursor updated together.
//!
//! Offsets are bytes. A valid offset is `0`, `len`, or the start of a codepoint
//! (or, in corrupted content, the start of a malformed sequence).
//!
//! Cursor adjustment on edits:
//! - insert at or before the cursor shifts it forward by the inserted length;
//! - delete entirely before the cursor shifts it back;
//! - delete spanning the cursor clamps it to the deletion start;
//! - replace behaves as delete followed by insert.

use std::borrow::Cow;
use std::cell::OnceCell;

use tracing::debug;

pub mod cursor;
pub mod error;
pub mod gap;
pub mod index;
pub mod operation;
pub mod segment;
pub mod validate;
pub mod width;

pub use cursor::{Cursor, MoveOutcome};
pub use error::{EditError, EditResult};
pub use index::{Granularity, IndexCounts};
pub use operation::{Operation, OperationKind};
pub use validate::{Checks, ValidationIssue, ValidationReport};
pub use width::egc_width;

use gap::GapBuffer;

/// A position inside a buffer expressed as (line index, byte offset within that line).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub byte: usize,
}

impl Position {
    pub fn new(line: usize, byte: usize) -> Self {
        Self { line, byte }
    }
    pub fn origin() -> Self {
        Self { line: 0, byte: 0 }
    }
}

/// Construction options for the text store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferOptions {
    /// Physical bytes allocated up front.
    pub initial_capacity: usize,
    /// Hard cap on physical capacity; growth beyond it is `AllocationFailure`.
    pub max_capacity: Option<usize>,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            initial_capacity: gap::DEFAULT_CAPACITY,
            max_capacity: None,
        }
    }
}

/// Monotonic mutation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationCounters {
    pub inserts: u64,
    pub deletes: u64,
    pub moves: u64,
}

/// Immutable copy of the buffer for collaborators that must not hold a live reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    bytes: Vec<u8>,
    cursor: usize,
    generation: u64,
}

impl Snapshot {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
    pub fn cursor(&self) -> usize {
        self.cursor
    }
    /// Buffer generation at capture; compare with `Buffer::generation` to detect staleness.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone)]
pub struct Buffer {
    pub(crate) store: GapBuffer,
    pub(crate) index: OnceCell<IndexCounts>,
    pub(crate) cursor: Cursor,
    pub(crate) counters: MutationCounters,
    generation: u64,
    read_only: bool,
    options: BufferOptions,
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Buffer {
    pub fn new() -> Self {
        Self::with_options(BufferOptions::default())
    }

    pub fn with_options(options: BufferOptions) -> Self {
        Self {
            store: GapBuffer::with_capacity(options.initial_capacity, options.max_capacity),
            index: OnceCell::new(),
            cursor: Cursor::default(),
            counters: MutationCounters::default(),
            generation: 0,
            read_only: false,
            options,
        }
    }

    /// Buffer pre-loaded with `text`, cursor at the end.
    ///
    /// Uses the default options, which carry no capacity limit, so loading
    /// cannot fail. Use `with_options` and `insert` to load under a limit.
    pub fn from_text(text: &str) -> Self {
        let options = BufferOptions::default();
        let store = GapBuffer::from_vec(text.as_bytes().to_vec(), options.initial_capacity);
        Self {
            cursor: Cursor::at(store.len()),
            store,
            index: OnceCell::new(),
            counters: MutationCounters::default(),
            generation: 0,
            read_only: false,
            options,
        }
    }

    pub fn options(&self) -> BufferOptions {
        self.options
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    pub fn gap_len(&self) -> usize {
        self.store.gap_len()
    }

    pub fn counters(&self) -> MutationCounters {
        self.counters
    }

    /// Bumped by every successful non-empty mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Contiguous content bytes.
    pub fn contents(&self) -> Cow<'_, [u8]> {
        self.store.contents()
    }

    /// Content as text; malformed sequences show as U+FFFD.
    pub fn text(&self) -> Cow<'_, str> {
        match self.store.contents() {
            Cow::Borrowed(bytes) => String::from_utf8_lossy(bytes),
            Cow::Owned(bytes) => Cow::Owned(
                String::from_utf8(bytes)
                    .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned()),
            ),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            bytes: self.store.contents().into_owned(),
            cursor: self.cursor.byte(),
            generation: self.generation,
        }
    }

    /// Copy of `[offset, offset + length)`. Fails only when out of range.
    pub fn read(&self, offset: usize, length: usize) -> EditResult<Vec<u8>> {
        let end = self.check_range(offset, length)?;
        Ok(self.store.copy_range(offset, end))
    }

    /// Lossy text of `[offset, offset + length)`.
    pub fn read_str(&self, offset: usize, length: usize) -> EditResult<String> {
        let bytes = self.read(offset, length)?;
        Ok(String::from_utf8(bytes)
            .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned()))
    }

    pub fn line_count(&self) -> usize {
        let (before, after) = self.store.slices();
        1 + before
            .iter()
            .chain(after.iter())
            .filter(|b| **b == b'\n')
            .count()
    }

    /// Start offset of the line containing `byte`.
    pub(crate) fn line_start_before(&self, byte: usize) -> usize {
        (0..byte)
            .rev()
            .find(|&i| self.store.byte_at(i) == Some(b'\n'))
            .map_or(0, |nl| nl + 1)
    }

    /// Line/byte-in-line position of a byte offset.
    pub fn position_of(&self, byte: usize) -> EditResult<Position> {
        self.check_boundary(byte)?;
        let line_start = self.line_start_before(byte);
        let line = (0..line_start)
            .filter(|&i| self.store.byte_at(i) == Some(b'\n'))
            .count();
        Ok(Position::new(line, byte - line_start))
    }

    pub(crate) fn ensure_writable(&self) -> EditResult<()> {
        if self.read_only {
            Err(EditError::BufferReadOnly)
        } else {
            Ok(())
        }
    }

    pub(crate) fn check_range(&self, offset: usize, length: usize) -> EditResult<usize> {
        let len = self.len();
        offset
            .checked_add(length)
            .filter(|end| *end <= len)
            .ok_or(EditError::InvalidOffset { offset, len })
    }

    pub(crate) fn check_boundary(&self, offset: usize) -> EditResult<()> {
        if offset <= self.len() && self.is_boundary(offset) {
            Ok(())
        } else {
            Err(EditError::InvalidOffset {
                offset,
                len: self.len(),
            })
        }
    }

    fn check_span(&self, offset: usize, length: usize) -> EditResult<usize> {
        let end = self.check_range(offset, length)?;
        self.check_boundary(offset)?;
        if self.is_boundary(end) {
            Ok(end)
        } else {
            Err(EditError::InvalidOffset {
                offset: end,
                len: self.len(),
            })
        }
    }

    /// Drop or adjust the cached index after a splice of `removed` bytes by `inserted` bytes.
    fn update_index(&mut self, additive: Option<(usize, usize)>) {
        match (additive, self.index.get_mut()) {
            (Some((added, removed)), Some(counts)) => {
                counts.codepoints = counts.codepoints + added - removed;
                counts.graphemes = counts.graphemes + added - removed;
            }
            _ => {
                self.index.take();
            }
        }
        self.generation += 1;
    }

    /// Splice is ASCII-only with ASCII neighbours: counts change by byte lengths.
    fn additive_splice(&self, start: usize, end: usize, inserted: &[u8]) -> Option<(usize, usize)> {
        let removed_plain = start == end
            || (0..end - start).all(|i| {
                self.store
                    .byte_at(start + i)
                    .is_some_and(|b| b.is_ascii() && b != b'\r' && b != b'\n')
            });
        (removed_plain && index::is_plain_ascii(inserted) && self.ascii_neighbours(start, end))
            .then_some((inserted.len(), end - start))
    }

    /// Insert `bytes` at `offset`.
    pub fn insert(&mut self, offset: usize, bytes: impl AsRef<[u8]>) -> EditResult<Operation> {
        let bytes = bytes.as_ref();
        self.ensure_writable()?;
        self.check_boundary(offset)?;
        if bytes.is_empty() {
            return Ok(Operation::insert(offset, Vec::new()));
        }
        let additive = self.additive_splice(offset, offset, bytes);
        self.store.insert(offset, bytes)?;
        self.update_index(additive);
        self.counters.inserts += 1;
        if self.cursor.byte() >= offset {
            self.cursor = Cursor::at(self.cursor.byte() + bytes.len());
        }
        Ok(Operation::insert(offset, bytes))
    }

    /// Delete `length` bytes starting at `offset`.
    pub fn delete(&mut self, offset: usize, length: usize) -> EditResult<Operation> {
        self.ensure_writable()?;
        let end = self.check_span(offset, length)?;
        if length == 0 {
            return Ok(Operation::delete(offset, Vec::new()));
        }
        let additive = self.additive_splice(offset, end, &[]);
        let removed = self.store.delete(offset, end);
        self.update_index(additive);
        self.counters.deletes += 1;
        let cursor = self.cursor.byte();
        if cursor >= end {
            self.cursor = Cursor::at(cursor - length);
        } else if cursor > offset {
            self.cursor = Cursor::at(offset);
        }
        Ok(Operation::delete(offset, removed))
    }

    /// Replace `length` bytes at `offset` with `bytes`, atomically.
    pub fn replace(
        &mut self,
        offset: usize,
        length: usize,
        bytes: impl AsRef<[u8]>,
    ) -> EditResult<Operation> {
        let bytes = bytes.as_ref();
        self.ensure_writable()?;
        let end = self.check_span(offset, length)?;
        if length == 0 && bytes.is_empty() {
            return Ok(Operation::replace(offset, Vec::new(), Vec::new()));
        }
        let additive = self.additive_splice(offset, end, bytes);
        let removed = self.store.replace(offset, end, bytes)?;
        self.update_index(additive);
        if length > 0 {
            self.counters.deletes += 1;
        }
        if !bytes.is_empty() {
            self.counters.inserts += 1;
        }
        let cursor = self.cursor.byte();
        if cursor >= end {
            self.cursor = Cursor::at(cursor - length + bytes.len());
        } else if cursor >= offset {
            self.cursor = Cursor::at(offset + bytes.len());
        }
        Ok(Operation::replace(offset, removed, bytes))
    }

    /// Insert at the cursor (typing).
    pub fn insert_at_cursor(&mut self, bytes: impl AsRef<[u8]>) -> EditResult<Operation> {
        self.insert(self.cursor.byte(), bytes)
    }

    /// Insert pasted text at the cursor after line-ending and NFC normalization.
    pub fn paste_at_cursor(&mut self, text: &str) -> EditResult<Operation> {
        let normalized = segment::normalize_paste(text);
        self.insert(self.cursor.byte(), normalized.as_bytes())
    }

    /// Delete the grapheme cluster before the cursor (backspace). `None` at the start.
    pub fn delete_backward_grapheme(&mut self) -> EditResult<Option<Operation>> {
        self.ensure_writable()?;
        let cursor = self.cursor.byte();
        if cursor == 0 {
            return Ok(None);
        }
        let start = self.prev_boundary(cursor, Granularity::Grapheme);
        self.delete(start, cursor - start).map(Some)
    }

    /// Delete the grapheme cluster under the cursor. `None` at the end.
    pub fn delete_forward_grapheme(&mut self) -> EditResult<Option<Operation>> {
        self.ensure_writable()?;
        let cursor = self.cursor.byte();
        if cursor >= self.len() {
            return Ok(None);
        }
        let end = self.next_boundary(cursor, Granularity::Grapheme);
        self.delete(cursor, end - cursor).map(Some)
    }

    /// Remove all content.
    pub fn clear(&mut self) -> EditResult<Operation> {
        self.delete(0, self.len())
    }

    /// Hand the finalized text over and leave the buffer empty.
    ///
    /// Malformed content is refused with `CorruptedContent` and left in place
    /// so the caller can `repair` it first.
    pub fn take_text(&mut self) -> EditResult<String> {
        self.ensure_writable()?;
        let text = String::from_utf8(self.store.contents().into_owned()).map_err(|e| {
            EditError::CorruptedContent(ValidationIssue::MalformedUtf8 {
                offset: e.utf8_error().valid_up_to(),
            })
        })?;
        if !self.is_empty() {
            self.store.clear();
            self.update_index(None);
            self.counters.deletes += 1;
        }
        self.cursor = Cursor::default();
        debug!(target: "text.buffer", len = text.len(), "take_text");
        Ok(text)
    }

    /// Rebuild the store from already decoded content (used by repair).
    pub(crate) fn reload(&mut self, bytes: &[u8], cursor: usize) -> EditResult<()> {
        let store = GapBuffer::from_bytes(
            bytes,
            self.options.initial_capacity,
            self.options.max_capacity,
        )?;
        self.store = store;
        self.cursor = Cursor::at(cursor.min(bytes.len()));
        self.update_index(None);
        Ok(())
    }
}
