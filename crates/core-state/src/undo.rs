use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use core_text::{Buffer, Operation, OperationKind};
use tracing::{trace, warn};

use crate::TrackerError;

/// Maximum number of completed sequences retained in undo history.
pub const HISTORY_MAX_DEPTH: usize = 200;

/// Longest typing run (in codepoints) folded into one record.
pub const COALESCE_MAX_RUN: usize = 32;

/// Pause after which the next keystroke starts a new record.
pub const COALESCE_GAP: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequenceId(u64);

impl SequenceId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerOptions {
    pub max_depth: usize,
    pub coalesce_max_run: usize,
    pub coalesce_gap: Duration,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            max_depth: HISTORY_MAX_DEPTH,
            coalesce_max_run: COALESCE_MAX_RUN,
            coalesce_gap: COALESCE_GAP,
        }
    }
}

/// One recorded operation. Merging replaces the record rather than mutating it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    sequence: SequenceId,
    operation: Operation,
    /// Codepoints folded into this record.
    run: usize,
    at: Instant,
}

impl ChangeRecord {
    pub fn sequence(&self) -> SequenceId {
        self.sequence
    }
    pub fn operation(&self) -> &Operation {
        &self.operation
    }
    pub fn run(&self) -> usize {
        self.run
    }
}

/// Ordered records undone and redone as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSequence {
    id: SequenceId,
    description: String,
    records: Vec<ChangeRecord>,
    completed: bool,
}

impl ChangeSequence {
    pub fn id(&self) -> SequenceId {
        self.id
    }
    pub fn description(&self) -> &str {
        &self.description
    }
    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }
    pub fn is_completed(&self) -> bool {
        self.completed
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// How `record` stored an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Appended,
    /// Folded into the previous record of the run.
    Merged,
    /// Empty operation; nothing to undo.
    Skipped,
}

/// The text of a one-codepoint payload that may join a typing run.
fn run_char(bytes: &[u8]) -> Option<char> {
    let s = std::str::from_utf8(bytes).ok()?;
    let mut chars = s.chars();
    let c = chars.next()?;
    (chars.next().is_none() && c != '\n').then_some(c)
}

fn ends_line(bytes: &[u8]) -> bool {
    bytes.contains(&b'\n')
}

/// Undo/redo history made of change sequences.
///
/// At most one sequence is active; operations are recorded into it after the
/// caller has applied them to the buffer. Completing pushes it on the undo
/// stack and clears redo. Consecutive single-codepoint typing, backspace and
/// forward-delete operations inside a sequence fold into one record, bounded by
/// `coalesce_max_run` and `coalesce_gap`.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    undo_stack: VecDeque<ChangeSequence>,
    redo_stack: VecDeque<ChangeSequence>,
    active: Option<ChangeSequence>,
    next_id: u64,
    options: TrackerOptions,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: TrackerOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> TrackerOptions {
        self.options
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }
    pub fn active_sequence(&self) -> Option<&ChangeSequence> {
        self.active.as_ref()
    }
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn begin_sequence(
        &mut self,
        description: impl Into<String>,
    ) -> Result<SequenceId, TrackerError> {
        if let Some(active) = &self.active {
            return Err(TrackerError::SequenceAlreadyActive(active.id));
        }
        self.next_id += 1;
        let id = SequenceId(self.next_id);
        self.active = Some(ChangeSequence {
            id,
            description: description.into(),
            records: Vec::new(),
            completed: false,
        });
        trace!(target: "state.undo", sequence = id.0, "sequence_begin");
        Ok(id)
    }

    pub fn record(&mut self, operation: Operation) -> Result<RecordOutcome, TrackerError> {
        self.record_at(operation, Instant::now())
    }

    /// Record with an explicit timestamp (deterministic callers and tests).
    pub fn record_at(
        &mut self,
        operation: Operation,
        at: Instant,
    ) -> Result<RecordOutcome, TrackerError> {
        if self.active.is_none() {
            return Err(TrackerError::SequenceNotActive);
        }
        if operation.is_noop() {
            return Ok(RecordOutcome::Skipped);
        }
        if self.can_merge_at(&operation, at) {
            let Some(active) = self.active.as_mut() else {
                return Err(TrackerError::SequenceNotActive);
            };
            let Some(last) = active.records.pop() else {
                return Err(TrackerError::SequenceNotActive);
            };
            let merged = merge(&last.operation, operation);
            trace!(target: "state.undo", sequence = active.id.0, run = last.run + 1, "record_merge");
            active.records.push(ChangeRecord {
                sequence: active.id,
                operation: merged,
                run: last.run + 1,
                at,
            });
            return Ok(RecordOutcome::Merged);
        }
        let Some(active) = self.active.as_mut() else {
            return Err(TrackerError::SequenceNotActive);
        };
        let run = match operation.kind {
            OperationKind::Insert => usize::from(run_char(&operation.inserted).is_some()),
            OperationKind::Delete => usize::from(run_char(&operation.removed).is_some()),
            OperationKind::Replace => 0,
        };
        active.records.push(ChangeRecord {
            sequence: active.id,
            operation,
            run,
            at,
        });
        Ok(RecordOutcome::Appended)
    }

    /// Would `operation`, recorded at `at`, fold into the active sequence's last record?
    pub fn can_merge_at(&self, operation: &Operation, at: Instant) -> bool {
        let Some(last) = self.active.as_ref().and_then(|s| s.records.last()) else {
            return false;
        };
        if last.run == 0 || last.run >= self.options.coalesce_max_run {
            return false;
        }
        if at.saturating_duration_since(last.at) > self.options.coalesce_gap {
            return false;
        }
        let prev = &last.operation;
        match (prev.kind, operation.kind) {
            (OperationKind::Insert, OperationKind::Insert) => {
                run_char(&operation.inserted).is_some()
                    && !ends_line(&prev.inserted)
                    && operation.offset == prev.inserted_end()
            }
            (OperationKind::Delete, OperationKind::Delete) => {
                run_char(&operation.removed).is_some()
                    && !ends_line(&prev.removed)
                    && (operation.removed_end() == prev.offset || operation.offset == prev.offset)
            }
            _ => false,
        }
    }

    /// Push the active sequence on the undo stack. Empty sequences are dropped.
    pub fn complete_sequence(&mut self) -> Result<Option<SequenceId>, TrackerError> {
        let Some(mut sequence) = self.active.take() else {
            return Err(TrackerError::SequenceNotActive);
        };
        if sequence.is_empty() {
            trace!(target: "state.undo", sequence = sequence.id.0, "sequence_discard_empty");
            return Ok(None);
        }
        sequence.completed = true;
        let id = sequence.id;
        self.undo_stack.push_back(sequence);
        trace!(target: "state.undo", undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len(), sequence = id.0, "push_sequence");
        if self.undo_stack.len() > self.options.max_depth {
            self.undo_stack.pop_front();
            trace!(target: "state.undo", "undo_stack_trimmed");
        }
        if !self.redo_stack.is_empty() {
            self.redo_stack.clear();
            trace!(target: "state.undo", "redo_stack_cleared_on_new_edit");
        }
        Ok(Some(id))
    }

    /// Discard the active sequence without touching the buffer or either stack.
    pub fn cancel_sequence(&mut self) -> Result<ChangeSequence, TrackerError> {
        let sequence = self.active.take().ok_or(TrackerError::SequenceNotActive)?;
        trace!(target: "state.undo", sequence = sequence.id.0, records = sequence.records.len(), "sequence_cancel");
        Ok(sequence)
    }

    /// Revert the active sequence's records in `buffer`, then discard it.
    pub fn rollback_sequence(&mut self, buffer: &mut Buffer) -> Result<ChangeSequence, TrackerError> {
        let Some(active) = self.active.as_ref() else {
            return Err(TrackerError::SequenceNotActive);
        };
        let inverses = active
            .records
            .iter()
            .rev()
            .map(|r| r.operation.inverse())
            .collect();
        let last = apply_all(buffer, inverses)?;
        place_cursor(buffer, last.as_ref());
        self.cancel_sequence()
    }

    /// Undo the most recent sequence. `Ok(false)` when there is nothing to undo.
    pub fn undo(&mut self, buffer: &mut Buffer) -> Result<bool, TrackerError> {
        if let Some(active) = &self.active {
            return Err(TrackerError::SequenceAlreadyActive(active.id));
        }
        let Some(sequence) = self.undo_stack.pop_back() else {
            return Ok(false);
        };
        let inverses = sequence
            .records
            .iter()
            .rev()
            .map(|r| r.operation.inverse())
            .collect();
        match apply_all(buffer, inverses) {
            Ok(last) => {
                place_cursor(buffer, last.as_ref());
                trace!(target: "state.undo", undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len() + 1, sequence = sequence.id.0, "undo_pop");
                self.redo_stack.push_back(sequence);
                Ok(true)
            }
            Err(err) => {
                self.undo_stack.push_back(sequence);
                Err(err)
            }
        }
    }

    /// Re-apply the most recently undone sequence. `Ok(false)` when there is nothing to redo.
    pub fn redo(&mut self, buffer: &mut Buffer) -> Result<bool, TrackerError> {
        if let Some(active) = &self.active {
            return Err(TrackerError::SequenceAlreadyActive(active.id));
        }
        let Some(sequence) = self.redo_stack.pop_back() else {
            return Ok(false);
        };
        let ops = sequence
            .records
            .iter()
            .map(|r| r.operation.clone())
            .collect();
        match apply_all(buffer, ops) {
            Ok(last) => {
                place_cursor(buffer, last.as_ref());
                trace!(target: "state.undo", redo_depth = self.redo_stack.len(), undo_depth = self.undo_stack.len() + 1, sequence = sequence.id.0, "redo_pop");
                self.undo_stack.push_back(sequence);
                Ok(true)
            }
            Err(err) => {
                self.redo_stack.push_back(sequence);
                Err(err)
            }
        }
    }

    /// Drop all history and any active sequence.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.active = None;
        trace!(target: "state.undo", "history_cleared");
    }
}

fn merge(prev: &Operation, next: Operation) -> Operation {
    match next.kind {
        OperationKind::Insert => {
            let mut inserted = prev.inserted.clone();
            inserted.extend_from_slice(&next.inserted);
            Operation::insert(prev.offset, inserted)
        }
        // backspace: the new byte range ends where the previous one began
        _ if next.removed_end() == prev.offset => {
            let mut removed = next.removed;
            removed.extend_from_slice(&prev.removed);
            Operation::delete(next.offset, removed)
        }
        _ => {
            let mut removed = prev.removed.clone();
            removed.extend_from_slice(&next.removed);
            Operation::delete(prev.offset, removed)
        }
    }
}

/// Apply `ops` in order. On failure, revert the ones already applied and return the error.
fn apply_all(buffer: &mut Buffer, ops: Vec<Operation>) -> Result<Option<Operation>, TrackerError> {
    let mut applied: Vec<Operation> = Vec::with_capacity(ops.len());
    for op in ops {
        match op.apply(buffer) {
            Ok(done) => applied.push(done),
            Err(err) => {
                for done in applied.iter().rev() {
                    if let Err(revert) = done.inverse().apply(buffer) {
                        warn!(target: "state.undo", error = %revert, "revert_failed");
                        break;
                    }
                }
                trace!(target: "state.undo", error = %err, reverted = applied.len(), "apply_failed");
                return Err(err.into());
            }
        }
    }
    Ok(applied.pop())
}

/// Cursor goes to the end of the text the last operation restored.
fn place_cursor(buffer: &mut Buffer, last: Option<&Operation>) {
    if let Some(op) = last
        && let Err(err) = buffer.set_byte_offset(op.inserted_end())
    {
        trace!(target: "state.undo", error = %err, "cursor_not_restored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_text::EditError;
    use pretty_assertions::assert_eq;

    fn typed(tracker: &mut ChangeTracker, buf: &mut Buffer, s: &str, start: Instant) {
        for (i, c) in s.chars().enumerate() {
            let op = buf.insert_at_cursor(c.to_string()).unwrap();
            tracker
                .record_at(op, start + Duration::from_millis(i as u64 * 10))
                .unwrap();
        }
    }

    #[test]
    fn record_requires_active_sequence() {
        let mut t = ChangeTracker::new();
        assert_eq!(
            t.record(Operation::insert(0, "a")),
            Err(TrackerError::SequenceNotActive)
        );
        assert_eq!(t.complete_sequence(), Err(TrackerError::SequenceNotActive));
        assert_eq!(
            t.cancel_sequence().unwrap_err(),
            TrackerError::SequenceNotActive
        );
    }

    #[test]
    fn sequences_never_nest() {
        let mut t = ChangeTracker::new();
        let id = t.begin_sequence("outer").unwrap();
        assert_eq!(
            t.begin_sequence("inner"),
            Err(TrackerError::SequenceAlreadyActive(id))
        );
        let mut b = Buffer::new();
        assert_eq!(t.undo(&mut b), Err(TrackerError::SequenceAlreadyActive(id)));
    }

    #[test]
    fn typing_run_folds_into_one_record() {
        let mut t = ChangeTracker::new();
        let mut b = Buffer::new();
        t.begin_sequence("typing").unwrap();
        typed(&mut t, &mut b, "héllo", Instant::now());
        let seq = t.active_sequence().unwrap();
        assert_eq!(seq.records().len(), 1);
        assert_eq!(seq.records()[0].operation().inserted, "héllo".as_bytes());
        assert_eq!(seq.records()[0].run(), 5);
        t.complete_sequence().unwrap();
        assert!(t.undo(&mut b).unwrap());
        assert_eq!(b.text(), "");
    }

    #[test]
    fn run_length_and_gap_limits() {
        let mut t = ChangeTracker::with_options(TrackerOptions {
            coalesce_max_run: 3,
            ..TrackerOptions::default()
        });
        let mut b = Buffer::new();
        let start = Instant::now();
        t.begin_sequence("typing").unwrap();
        typed(&mut t, &mut b, "abcde", start);
        assert_eq!(t.active_sequence().unwrap().records().len(), 2);

        let op = b.insert_at_cursor("f").unwrap();
        let later = start + Duration::from_secs(5);
        assert!(!t.can_merge_at(&op, later));
        assert_eq!(t.record_at(op, later), Ok(RecordOutcome::Appended));
        assert_eq!(t.active_sequence().unwrap().records().len(), 3);
    }

    #[test]
    fn non_adjacent_and_newline_inserts_do_not_merge() {
        let mut t = ChangeTracker::new();
        let now = Instant::now();
        t.begin_sequence("edit").unwrap();
        t.record_at(Operation::insert(0, "a"), now).unwrap();
        assert!(!t.can_merge_at(&Operation::insert(5, "b"), now));
        assert!(!t.can_merge_at(&Operation::insert(1, "\n"), now));
        assert!(!t.can_merge_at(&Operation::insert(1, "bc"), now));
        assert!(t.can_merge_at(&Operation::insert(1, "é"), now));
        t.record_at(Operation::insert(1, "\n"), now).unwrap();
        assert!(!t.can_merge_at(&Operation::insert(2, "x"), now));
    }

    #[test]
    fn backspace_and_forward_delete_runs() {
        let mut t = ChangeTracker::new();
        let mut b = Buffer::from_text("hello world");
        let now = Instant::now();
        t.begin_sequence("bs").unwrap();
        for _ in 0..3 {
            let op = b.delete_backward_grapheme().unwrap().unwrap();
            t.record_at(op, now).unwrap();
        }
        b.move_to_start();
        for _ in 0..2 {
            let op = b.delete_forward_grapheme().unwrap().unwrap();
            assert_eq!(op.offset, 0);
            t.record_at(op, now).unwrap();
        }
        let records = t.active_sequence().unwrap().records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].operation().removed, b"rld");
        assert_eq!(records[0].operation().offset, 8);
        assert_eq!(records[1].operation().removed, b"he");
        t.complete_sequence().unwrap();
        assert_eq!(b.text(), "llo wo");
        t.undo(&mut b).unwrap();
        assert_eq!(b.text(), "hello world");
    }

    #[test]
    fn empty_sequence_is_discarded() {
        let mut t = ChangeTracker::new();
        t.begin_sequence("nothing").unwrap();
        assert_eq!(
            t.record(Operation::insert(0, "")),
            Ok(RecordOutcome::Skipped)
        );
        assert_eq!(t.complete_sequence(), Ok(None));
        assert!(!t.can_undo());
    }

    #[test]
    fn new_edit_clears_redo_and_depth_is_bounded() {
        let mut t = ChangeTracker::with_options(TrackerOptions {
            max_depth: 2,
            ..TrackerOptions::default()
        });
        let mut b = Buffer::new();
        for word in ["a", "b", "c"] {
            t.begin_sequence(word).unwrap();
            let op = b.insert_at_cursor(word).unwrap();
            t.record(op).unwrap();
            t.complete_sequence().unwrap();
        }
        assert_eq!(t.undo_depth(), 2);
        assert!(t.undo(&mut b).unwrap());
        assert!(t.undo(&mut b).unwrap());
        assert!(!t.undo(&mut b).unwrap());
        assert_eq!(b.text(), "a");
        assert_eq!(t.redo_depth(), 2);

        t.begin_sequence("d").unwrap();
        let op = b.insert_at_cursor("d").unwrap();
        t.record(op).unwrap();
        t.complete_sequence().unwrap();
        assert!(!t.can_redo());
        assert!(!t.redo(&mut b).unwrap());
    }

    #[test]
    fn cancel_leaves_buffer_and_rollback_reverts() {
        let mut t = ChangeTracker::new();
        let mut b = Buffer::from_text("x");
        t.begin_sequence("abandon").unwrap();
        let op = b.insert_at_cursor("yz").unwrap();
        t.record(op).unwrap();
        let seq = t.cancel_sequence().unwrap();
        assert_eq!(seq.records().len(), 1);
        assert_eq!(b.text(), "xyz");
        assert!(!t.can_undo());

        t.begin_sequence("rollback").unwrap();
        let op = b.replace(0, 1, "X").unwrap();
        t.record(op).unwrap();
        let op = b.insert(3, "!").unwrap();
        t.record(op).unwrap();
        t.rollback_sequence(&mut b).unwrap();
        assert_eq!(b.text(), "xyz");
        assert_eq!(b.cursor(), 1);
        assert!(t.active_sequence().is_none());
    }

    #[test]
    fn undo_is_atomic_when_a_record_no_longer_applies() {
        let mut t = ChangeTracker::new();
        let mut b = Buffer::from_text("hello");
        let now = Instant::now();
        t.begin_sequence("two").unwrap();
        t.record_at(b.insert(0, "x").unwrap(), now).unwrap();
        t.record_at(b.insert(6, "y").unwrap(), now).unwrap();
        t.complete_sequence().unwrap();
        // change the first record's bytes behind the tracker's back
        b.replace(0, 1, "z").unwrap();
        assert_eq!(b.text(), "zhelloy");

        let err = t.undo(&mut b).unwrap_err();
        assert_eq!(err, TrackerError::Edit(EditError::ContentMismatch { offset: 0 }));
        assert_eq!(b.text(), "zhelloy");
        assert_eq!(t.undo_depth(), 1);
        assert_eq!(t.redo_depth(), 0);
    }

    #[test]
    fn undo_on_read_only_buffer_changes_nothing() {
        let mut t = ChangeTracker::new();
        let mut b = Buffer::new();
        t.begin_sequence("s").unwrap();
        t.record(b.insert(0, "abc").unwrap()).unwrap();
        t.complete_sequence().unwrap();
        b.set_read_only(true);
        assert_eq!(
            t.undo(&mut b),
            Err(TrackerError::Edit(EditError::BufferReadOnly))
        );
        assert_eq!(b.text(), "abc");
        assert!(t.can_undo());
    }
}
