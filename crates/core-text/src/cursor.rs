//! Cursor placement and motion.
//!
//! The cursor is a single byte offset owned by its `Buffer`. It always sits on
//! a codepoint boundary; codepoint and grapheme positions are derived on demand
//! from the Unicode index. Movement clamps silently at either end and reports
//! what happened through `MoveOutcome`.

use crate::error::EditResult;
use crate::index::Granularity;
use crate::{Buffer, Position};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    byte: usize,
}

impl Cursor {
    pub fn at(byte: usize) -> Self {
        Self { byte }
    }

    #[inline]
    pub fn byte(&self) -> usize {
        self.byte
    }
}

/// Result of a cursor movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Cursor byte offset after the move.
    pub offset: usize,
    /// The offset changed.
    pub moved: bool,
    /// The request ran past either end and was clamped.
    pub clamped: bool,
}

fn is_blank(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n')
}

impl Buffer {
    /// Cursor byte offset.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor.byte()
    }

    /// Number of codepoints before the cursor.
    pub fn cursor_codepoint(&self) -> usize {
        self.codepoint_for_byte_offset(self.cursor())
            .unwrap_or_else(|_| self.codepoint_count())
    }

    /// Index of the grapheme cluster the cursor is in.
    pub fn cursor_grapheme(&self) -> usize {
        self.grapheme_for_byte_offset(self.cursor())
            .unwrap_or_else(|_| self.grapheme_count())
    }

    pub fn cursor_position(&self) -> Position {
        self.position_of(self.cursor()).unwrap_or_default()
    }

    pub fn cursor_display_column(&self) -> usize {
        self.display_column(self.cursor()).unwrap_or(0)
    }

    /// Place the cursor at byte offset `b`. Fails without moving if `b` is out
    /// of range or inside a codepoint.
    pub fn set_byte_offset(&mut self, b: usize) -> EditResult<MoveOutcome> {
        self.check_boundary(b)?;
        Ok(self.place(b, false))
    }

    pub fn move_to_start(&mut self) -> MoveOutcome {
        self.place(0, false)
    }

    pub fn move_to_end(&mut self) -> MoveOutcome {
        self.place(self.len(), false)
    }

    pub fn move_by_codepoints(&mut self, delta: isize) -> MoveOutcome {
        self.step(delta, Granularity::Codepoint)
    }

    pub fn move_by_graphemes(&mut self, delta: isize) -> MoveOutcome {
        self.step(delta, Granularity::Grapheme)
    }

    fn place(&mut self, target: usize, clamped: bool) -> MoveOutcome {
        let moved = target != self.cursor();
        if moved {
            self.cursor = Cursor::at(target);
            self.counters.moves += 1;
        }
        MoveOutcome {
            offset: target,
            moved,
            clamped,
        }
    }

    fn step(&mut self, delta: isize, granularity: Granularity) -> MoveOutcome {
        let cursor = self.cursor();
        let counts = self.index_counts();
        let total = match granularity {
            Granularity::Codepoint => counts.codepoints,
            Granularity::Grapheme => counts.graphemes,
        };
        if total == self.len() {
            // every byte is its own unit
            let target = (cursor as isize).saturating_add(delta);
            let clamped = target < 0 || target > total as isize;
            return self.place(target.clamp(0, total as isize) as usize, clamped);
        }
        let starts = self.unit_boundaries(granularity);
        let idx = starts.partition_point(|&s| s <= cursor) - 1;
        // A cursor inside a cluster counts as sitting just past its start.
        let base = if delta < 0 && starts[idx] != cursor {
            idx as isize + 1
        } else {
            idx as isize
        };
        let target = base.saturating_add(delta);
        let last = (starts.len() - 1) as isize;
        let clamped = target < 0 || target > last;
        self.place(starts[target.clamp(0, last) as usize], clamped)
    }

    /// Start of the unit ending at or containing `b` (`0` at the start).
    pub(crate) fn prev_boundary(&self, b: usize, granularity: Granularity) -> usize {
        let starts = self.unit_boundaries(granularity);
        let i = starts.partition_point(|&s| s < b);
        if i == 0 { 0 } else { starts[i - 1] }
    }

    /// End of the unit starting at or containing `b` (`len` at the end).
    pub(crate) fn next_boundary(&self, b: usize, granularity: Granularity) -> usize {
        let starts = self.unit_boundaries(granularity);
        let i = starts.partition_point(|&s| s <= b);
        starts.get(i).copied().unwrap_or(self.len())
    }

    /// Start of the blank-delimited word before `b`, as a shell's Ctrl-W sees it:
    /// trailing blanks are skipped, then the word itself.
    pub fn word_start_before(&self, b: usize) -> usize {
        let mut pos = b.min(self.len());
        while pos > 0 && self.store.byte_at(pos - 1).is_some_and(is_blank) {
            pos -= 1;
        }
        while pos > 0 && self.store.byte_at(pos - 1).is_some_and(|c| !is_blank(c)) {
            pos -= 1;
        }
        pos
    }
}

#[cfg(test)]
mod tests {
    use crate::{Buffer, EditError, Position};

    #[test]
    fn set_byte_offset_rejects_mid_codepoint() {
        let mut b = Buffer::from_text("a€b");
        b.set_byte_offset(1).unwrap();
        let moves = b.counters().moves;
        assert_eq!(
            b.set_byte_offset(2),
            Err(EditError::InvalidOffset { offset: 2, len: 5 })
        );
        assert!(b.set_byte_offset(3).is_err());
        assert!(b.set_byte_offset(9).is_err());
        assert_eq!(b.cursor(), 1);
        assert_eq!(b.counters().moves, moves);
    }

    #[test]
    fn codepoint_moves_clamp_at_ends() {
        let mut b = Buffer::from_text("h€llo");
        b.move_to_start();
        let out = b.move_by_codepoints(2);
        assert_eq!(out.offset, 4);
        assert!(out.moved && !out.clamped);
        let out = b.move_by_codepoints(-5);
        assert_eq!(out.offset, 0);
        assert!(out.moved && out.clamped);
        let out = b.move_by_codepoints(-1);
        assert!(!out.moved && out.clamped);
        let out = b.move_by_codepoints(99);
        assert_eq!(out.offset, b.len());
        assert!(out.clamped);
    }

    #[test]
    fn extreme_deltas_clamp_instead_of_overflowing() {
        for text in ["abc", "héllo", "e\u{0301}👍🏽x"] {
            let mut b = Buffer::from_text(text);
            b.move_to_start();
            b.move_by_codepoints(1);
            let out = b.move_by_codepoints(isize::MAX);
            assert_eq!((out.offset, out.clamped), (b.len(), true), "{text:?}");
            b.move_to_start();
            b.move_by_graphemes(1);
            let out = b.move_by_graphemes(isize::MAX);
            assert_eq!((out.offset, out.clamped), (b.len(), true), "{text:?}");
            b.move_by_codepoints(-1);
            let out = b.move_by_codepoints(isize::MIN);
            assert_eq!((out.offset, out.clamped), (0, true), "{text:?}");
            b.move_to_end();
            b.move_by_graphemes(-1);
            let out = b.move_by_graphemes(isize::MIN);
            assert_eq!((out.offset, out.clamped), (0, true), "{text:?}");
        }
    }

    #[test]
    fn ascii_moves_use_byte_arithmetic() {
        let mut b = Buffer::from_text("abcdef");
        b.move_by_codepoints(-2);
        assert_eq!(b.cursor(), 4);
        assert_eq!(b.cursor_codepoint(), 4);
        b.move_by_graphemes(1);
        assert_eq!(b.cursor(), 5);
    }

    #[test]
    fn grapheme_moves_skip_whole_clusters() {
        let mut b = Buffer::from_text("e\u{0301}👍🏽x");
        b.move_to_start();
        b.move_by_graphemes(1);
        assert_eq!(b.cursor(), 3);
        b.move_by_graphemes(1);
        assert_eq!(b.cursor(), 11);
        assert_eq!(b.cursor_grapheme(), 2);
        b.move_by_codepoints(-1);
        assert_eq!(b.cursor(), 7);
        assert_eq!(b.cursor_grapheme(), 1);
        // inside the thumbs-up cluster, one step back lands on its start
        b.move_by_graphemes(-1);
        assert_eq!(b.cursor(), 3);
    }

    #[test]
    fn moves_count_only_real_motion() {
        let mut b = Buffer::from_text("ab");
        b.move_to_end();
        b.move_by_codepoints(1);
        assert_eq!(b.counters().moves, 0);
        b.move_to_start();
        assert_eq!(b.counters().moves, 1);
    }

    #[test]
    fn position_and_column_queries() {
        let mut b = Buffer::from_text("echo 漢\nfoo");
        assert_eq!(b.cursor_position(), Position::new(1, 3));
        assert_eq!(b.cursor_display_column(), 3);
        b.set_byte_offset(8).unwrap();
        assert_eq!(b.cursor_position(), Position::new(0, 8));
        assert_eq!(b.cursor_display_column(), 7);
    }

    #[test]
    fn word_start_skips_trailing_blanks() {
        let b = Buffer::from_text("git commit  -m ");
        assert_eq!(b.word_start_before(b.len()), 12);
        assert_eq!(b.word_start_before(12), 4);
        assert_eq!(b.word_start_before(3), 0);
    }
}
