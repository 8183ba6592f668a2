//! The exact effect of one successful text store mutation.

use crate::Buffer;
use crate::error::{EditError, EditResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Insert,
    Delete,
    Replace,
}

/// Returned by every `Buffer` mutation so a caller can record it for undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    /// Byte offset where the edit occurred.
    pub offset: usize,
    /// Bytes that were removed (empty for inserts).
    pub removed: Vec<u8>,
    /// Bytes that were inserted (empty for deletes).
    pub inserted: Vec<u8>,
}

impl Operation {
    pub fn insert(offset: usize, inserted: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: OperationKind::Insert,
            offset,
            removed: Vec::new(),
            inserted: inserted.into(),
        }
    }

    pub fn delete(offset: usize, removed: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: OperationKind::Delete,
            offset,
            removed: removed.into(),
            inserted: Vec::new(),
        }
    }

    pub fn replace(offset: usize, removed: impl Into<Vec<u8>>, inserted: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: OperationKind::Replace,
            offset,
            removed: removed.into(),
            inserted: inserted.into(),
        }
    }

    /// True when applying the operation changes nothing.
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.inserted.is_empty()
    }

    /// Byte offset just past the inserted text.
    pub fn inserted_end(&self) -> usize {
        self.offset + self.inserted.len()
    }

    /// Byte offset just past the removed text (in pre-edit coordinates).
    pub fn removed_end(&self) -> usize {
        self.offset + self.removed.len()
    }

    /// The operation that reverts this one.
    pub fn inverse(&self) -> Self {
        let kind = match self.kind {
            OperationKind::Insert => OperationKind::Delete,
            OperationKind::Delete => OperationKind::Insert,
            OperationKind::Replace => OperationKind::Replace,
        };
        Self {
            kind,
            offset: self.offset,
            removed: self.inserted.clone(),
            inserted: self.removed.clone(),
        }
    }

    /// Re-apply this operation, refusing if the bytes it removes are no longer there.
    pub fn apply(&self, buffer: &mut Buffer) -> EditResult<Operation> {
        if !self.removed.is_empty() {
            let current = buffer.read(self.offset, self.removed.len())?;
            if current != self.removed {
                return Err(EditError::ContentMismatch {
                    offset: self.offset,
                });
            }
        }
        match self.kind {
            OperationKind::Insert => buffer.insert(self.offset, &self.inserted),
            OperationKind::Delete => buffer.delete(self.offset, self.removed.len()),
            OperationKind::Replace => {
                buffer.replace(self.offset, self.removed.len(), &self.inserted)
            }
        }
    }
}
