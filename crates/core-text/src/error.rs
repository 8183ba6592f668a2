//! Error kinds surfaced by buffer operations.
//!
//! Every failure is returned to the immediate caller; nothing in this crate
//! logs-and-continues except the tolerant Unicode index build.

use crate::validate::ValidationIssue;

/// Errors returned from Text Store, Cursor and Unicode Index operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EditError {
    /// Offset is out of range or does not fall on a codepoint boundary. No mutation was performed.
    #[error("invalid offset {offset} (length {len})")]
    InvalidOffset { offset: usize, len: usize },

    /// Mutation attempted on a read-only buffer.
    #[error("buffer is read-only")]
    BufferReadOnly,

    /// Growing the text store failed (reservation failure or capacity limit).
    #[error("cannot grow buffer to {requested} bytes")]
    AllocationFailure { requested: usize },

    /// Content failed validation; the buffer is readable but should be repaired before editing.
    #[error("corrupted content: {0}")]
    CorruptedContent(ValidationIssue),

    /// A recorded operation no longer matches the bytes at its offset.
    #[error("content at offset {offset} does not match the recorded operation")]
    ContentMismatch { offset: usize },
}

impl EditError {
    /// True for the only condition that should end editing of a buffer.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EditError::AllocationFailure { .. })
    }
}

pub type EditResult<T> = Result<T, EditError>;
