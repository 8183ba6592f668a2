//! Editing state: change tracking (undo/redo) and the per-session context that
//! ties a buffer, its history and the continuation check together.
//!
//! Change Sequences:
//! - Every buffer mutation returns an `Operation`; the tracker records it into the
//!   active `ChangeSequence`. Sequences never nest.
//! - Undo applies the inverse of each record in reverse order; redo re-applies them
//!   forward. Both are atomic: a record that no longer applies rolls back the ones
//!   already applied and leaves the sequence where it was.
//! - History is bounded (`TrackerOptions::max_depth`); the oldest sequences go first.
//!
//! Typing Runs:
//! - `EditSession` wraps keystrokes (`type_char`, `backspace`, `delete_forward`,
//!   `delete_word_before`) in an implicit typing sequence. The sequence stays open
//!   while the tracker keeps folding records into one run, and closes when it
//!   refuses (run length, pause, newline, non-adjacent edit) or when any other
//!   operation arrives.
//! - Bulk edits (`insert_str`, `paste`, `replace`, `delete_range`) are one sequence
//!   each unless the caller opened an explicit sequence with `begin`.
//!
//! Telemetry: sequence lifecycle emits trace events at target `state.undo`
//! (`push_sequence`, `undo_pop`, `redo_pop`, `record_merge`, stack trims, redo clear).

use core_text::EditError;
use thiserror::Error;

pub mod session;
pub mod undo;

pub use session::EditSession;
pub use undo::{
    COALESCE_GAP, COALESCE_MAX_RUN, ChangeRecord, ChangeSequence, ChangeTracker,
    HISTORY_MAX_DEPTH, RecordOutcome, SequenceId, TrackerOptions,
};

/// Errors returned by the change tracker and the edit session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("change sequence {0} is already active")]
    SequenceAlreadyActive(SequenceId),
    #[error("no change sequence is active")]
    SequenceNotActive,
    #[error(transparent)]
    Edit(#[from] EditError),
}

impl TrackerError {
    /// True when the underlying buffer error should end the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TrackerError::Edit(e) if e.is_fatal())
    }
}
