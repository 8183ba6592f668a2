//! Structural self-check of a `Buffer`, plus the single repair path for
//! corrupted content.
//!
//! Each check runs independently so one failure never hides another. The
//! validator only reads; `repair` is the one operation allowed to rewrite
//! malformed bytes.

use bitflags::bitflags;
use thiserror::Error;
use tracing::debug;

use crate::Buffer;
use crate::error::EditResult;
use crate::index::{self, IndexCounts};

bitflags! {
    /// Set of validator checks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Checks: u8 {
        /// Length, capacity and gap bookkeeping agree.
        const LAYOUT = 1 << 0;
        /// Content is well-formed UTF-8.
        const UTF8 = 1 << 1;
        /// Cursor lies within `[0, len]` on a codepoint boundary.
        const CURSOR = 1 << 2;
        /// Cached index counts match a fresh scan.
        const INDEX = 1 << 3;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("gap layout inconsistent: len={len} capacity={capacity} gap={gap_start}..{gap_end}")]
    Layout {
        len: usize,
        capacity: usize,
        gap_start: usize,
        gap_end: usize,
    },
    #[error("malformed UTF-8 at byte {offset}")]
    MalformedUtf8 { offset: usize },
    #[error("cursor {cursor} beyond end of content ({len} bytes)")]
    CursorOutOfRange { cursor: usize, len: usize },
    #[error("cursor {cursor} inside a codepoint")]
    CursorMidCodepoint { cursor: usize },
    #[error("stale index: cached {cached:?}, actual {actual:?}")]
    StaleIndex {
        cached: IndexCounts,
        actual: IndexCounts,
    },
}

impl ValidationIssue {
    /// The check that reported this issue.
    pub fn check(&self) -> Checks {
        match self {
            ValidationIssue::Layout { .. } => Checks::LAYOUT,
            ValidationIssue::MalformedUtf8 { .. } => Checks::UTF8,
            ValidationIssue::CursorOutOfRange { .. } | ValidationIssue::CursorMidCodepoint { .. } => {
                Checks::CURSOR
            }
            ValidationIssue::StaleIndex { .. } => Checks::INDEX,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn failed(&self) -> Checks {
        self.issues
            .iter()
            .fold(Checks::empty(), |acc, issue| acc | issue.check())
    }

    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    /// `CorruptedContent` carrying the first issue, if any.
    pub fn into_result(self) -> EditResult<()> {
        match self.issues.into_iter().next() {
            Some(issue) => Err(crate::EditError::CorruptedContent(issue)),
            None => Ok(()),
        }
    }
}

impl Buffer {
    /// Run every check. Never mutates.
    pub fn validate(&self) -> ValidationReport {
        let mut issues = Vec::new();

        let layout = self.store.layout();
        let layout_ok = layout.gap_start <= layout.gap_end
            && layout.gap_end <= layout.capacity
            && layout.len + (layout.gap_end - layout.gap_start.min(layout.gap_end)) == layout.capacity
            && layout.limit.is_none_or(|limit| layout.capacity <= limit);
        if !layout_ok {
            issues.push(ValidationIssue::Layout {
                len: layout.len,
                capacity: layout.capacity,
                gap_start: layout.gap_start,
                gap_end: layout.gap_end,
            });
        }

        let contents = self.store.contents();
        if let Err(err) = std::str::from_utf8(&contents) {
            issues.push(ValidationIssue::MalformedUtf8 {
                offset: err.valid_up_to(),
            });
        }

        let cursor = self.cursor();
        if cursor > self.len() {
            issues.push(ValidationIssue::CursorOutOfRange {
                cursor,
                len: self.len(),
            });
        } else if !self.is_boundary(cursor) {
            issues.push(ValidationIssue::CursorMidCodepoint { cursor });
        }

        if let Some(cached) = self.index.get() {
            let actual = index::scan(&contents);
            if *cached != actual {
                issues.push(ValidationIssue::StaleIndex {
                    cached: *cached,
                    actual,
                });
            }
        }

        ValidationReport { issues }
    }

    /// Replace each malformed byte run with U+FFFD and re-clamp the cursor.
    ///
    /// The cursor keeps its codepoint index: every malformed run counted as one
    /// codepoint before repair and is exactly one U+FFFD after. Returns whether
    /// anything changed.
    pub fn repair(&mut self) -> EditResult<bool> {
        self.ensure_writable()?;
        let contents = self.store.contents().into_owned();
        let cursor = self.cursor().min(contents.len());
        let cursor_ok = self.is_boundary(cursor) && cursor == self.cursor();
        if std::str::from_utf8(&contents).is_ok() && cursor_ok {
            return Ok(false);
        }
        let starts = index::boundaries(&contents, index::Granularity::Codepoint);
        let cursor_cp = starts.partition_point(|&s| s < cursor);
        let repaired = String::from_utf8_lossy(&contents).into_owned();
        let new_cursor = repaired
            .char_indices()
            .map(|(i, _)| i)
            .nth(cursor_cp)
            .unwrap_or(repaired.len());
        self.reload(repaired.as_bytes(), new_cursor)?;
        debug!(target: "text.buffer", old_len = contents.len(), new_len = repaired.len(), cursor = new_cursor, "repair");
        Ok(true)
    }
}
