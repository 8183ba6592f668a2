use std::borrow::Cow;
use std::time::Instant;

use core_construct::{ConstructTracker, Prompt};
use core_text::{Buffer, BufferOptions, EditResult, MoveOutcome, Operation, ValidationReport};
use tracing::debug;

use crate::undo::{ChangeSequence, ChangeTracker, SequenceId, TrackerOptions};
use crate::TrackerError;

const TYPING: &str = "typing";

/// One editing session: a buffer, its history, and the continuation check.
#[derive(Debug, Default)]
pub struct EditSession {
    buffer: Buffer,
    tracker: ChangeTracker,
    /// An implicit typing sequence is open in the tracker.
    typing: bool,
    /// The caller opened a sequence with `begin`.
    explicit: bool,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(buffer: BufferOptions, tracker: TrackerOptions) -> Self {
        Self {
            buffer: Buffer::with_options(buffer),
            tracker: ChangeTracker::with_options(tracker),
            typing: false,
            explicit: false,
        }
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    pub fn text(&self) -> Cow<'_, str> {
        self.buffer.text()
    }

    pub fn cursor(&self) -> usize {
        self.buffer.cursor()
    }

    // ---------------------------------------------------------------------------------------------
    // Typing
    // ---------------------------------------------------------------------------------------------

    pub fn type_char(&mut self, ch: char) -> Result<Operation, TrackerError> {
        self.type_char_at(ch, Instant::now())
    }

    pub fn type_char_at(&mut self, ch: char, at: Instant) -> Result<Operation, TrackerError> {
        let mut utf8 = [0u8; 4];
        let op = self
            .buffer
            .insert_at_cursor(ch.encode_utf8(&mut utf8).as_bytes())?;
        self.track_typing(&op, at)?;
        Ok(op)
    }

    /// Delete the grapheme before the cursor. `None` at the start of the buffer.
    pub fn backspace(&mut self) -> Result<Option<Operation>, TrackerError> {
        self.backspace_at(Instant::now())
    }

    pub fn backspace_at(&mut self, at: Instant) -> Result<Option<Operation>, TrackerError> {
        let Some(op) = self.buffer.delete_backward_grapheme()? else {
            return Ok(None);
        };
        self.track_typing(&op, at)?;
        Ok(Some(op))
    }

    /// Delete the grapheme under the cursor. `None` at the end of the buffer.
    pub fn delete_forward(&mut self) -> Result<Option<Operation>, TrackerError> {
        self.delete_forward_at(Instant::now())
    }

    pub fn delete_forward_at(&mut self, at: Instant) -> Result<Option<Operation>, TrackerError> {
        let Some(op) = self.buffer.delete_forward_grapheme()? else {
            return Ok(None);
        };
        self.track_typing(&op, at)?;
        Ok(Some(op))
    }

    /// Ctrl-W: delete the blank-delimited word before the cursor.
    pub fn delete_word_before(&mut self) -> Result<Option<Operation>, TrackerError> {
        let cursor = self.buffer.cursor();
        let start = self.buffer.word_start_before(cursor);
        if start == cursor {
            return Ok(None);
        }
        let op = self.buffer.delete(start, cursor - start)?;
        self.track_typing(&op, Instant::now())?;
        Ok(Some(op))
    }

    fn track_typing(&mut self, op: &Operation, at: Instant) -> Result<(), TrackerError> {
        if op.is_noop() {
            return Ok(());
        }
        if self.explicit {
            self.tracker.record_at(op.clone(), at)?;
            return Ok(());
        }
        if self.typing && !self.tracker.can_merge_at(op, at) {
            self.close_typing()?;
        }
        if !self.typing {
            self.tracker.begin_sequence(TYPING)?;
            self.typing = true;
        }
        self.tracker.record_at(op.clone(), at)?;
        Ok(())
    }

    fn close_typing(&mut self) -> Result<(), TrackerError> {
        if self.typing {
            self.typing = false;
            self.tracker.complete_sequence()?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------------------------------
    // Bulk edits
    // ---------------------------------------------------------------------------------------------

    pub fn insert_str(&mut self, text: &str) -> Result<Operation, TrackerError> {
        self.discrete("insert", |b| b.insert_at_cursor(text))
    }

    /// Insert pasted text (line endings and NFC normalized) at the cursor.
    pub fn paste(&mut self, text: &str) -> Result<Operation, TrackerError> {
        self.discrete("paste", |b| b.paste_at_cursor(text))
    }

    pub fn replace(
        &mut self,
        offset: usize,
        length: usize,
        text: &str,
    ) -> Result<Operation, TrackerError> {
        self.discrete("replace", |b| b.replace(offset, length, text))
    }

    pub fn delete_range(&mut self, offset: usize, length: usize) -> Result<Operation, TrackerError> {
        self.discrete("delete", |b| b.delete(offset, length))
    }

    fn discrete(
        &mut self,
        description: &str,
        edit: impl FnOnce(&mut Buffer) -> EditResult<Operation>,
    ) -> Result<Operation, TrackerError> {
        self.close_typing()?;
        let op = edit(&mut self.buffer)?;
        if self.explicit {
            self.tracker.record(op.clone())?;
        } else if !op.is_noop() {
            self.tracker.begin_sequence(description)?;
            self.tracker.record(op.clone())?;
            self.tracker.complete_sequence()?;
        }
        Ok(op)
    }

    // ---------------------------------------------------------------------------------------------
    // Explicit sequences and history
    // ---------------------------------------------------------------------------------------------

    /// Group the following edits into one undo unit until `complete` or `cancel`.
    pub fn begin(&mut self, description: &str) -> Result<SequenceId, TrackerError> {
        self.close_typing()?;
        let id = self.tracker.begin_sequence(description)?;
        self.explicit = true;
        Ok(id)
    }

    pub fn complete(&mut self) -> Result<Option<SequenceId>, TrackerError> {
        if !self.explicit {
            return Err(TrackerError::SequenceNotActive);
        }
        self.explicit = false;
        self.tracker.complete_sequence()
    }

    /// Abandon the explicit sequence, reverting the edits it already made.
    pub fn cancel(&mut self) -> Result<ChangeSequence, TrackerError> {
        if !self.explicit {
            return Err(TrackerError::SequenceNotActive);
        }
        let sequence = self.tracker.rollback_sequence(&mut self.buffer)?;
        self.explicit = false;
        Ok(sequence)
    }

    pub fn undo(&mut self) -> Result<bool, TrackerError> {
        self.close_typing()?;
        self.tracker.undo(&mut self.buffer)
    }

    pub fn redo(&mut self) -> Result<bool, TrackerError> {
        self.close_typing()?;
        self.tracker.redo(&mut self.buffer)
    }

    // ---------------------------------------------------------------------------------------------
    // Cursor
    // ---------------------------------------------------------------------------------------------

    pub fn move_by_graphemes(&mut self, delta: isize) -> Result<MoveOutcome, TrackerError> {
        self.close_typing()?;
        Ok(self.buffer.move_by_graphemes(delta))
    }

    pub fn move_by_codepoints(&mut self, delta: isize) -> Result<MoveOutcome, TrackerError> {
        self.close_typing()?;
        Ok(self.buffer.move_by_codepoints(delta))
    }

    pub fn move_to_start(&mut self) -> Result<MoveOutcome, TrackerError> {
        self.close_typing()?;
        Ok(self.buffer.move_to_start())
    }

    pub fn move_to_end(&mut self) -> Result<MoveOutcome, TrackerError> {
        self.close_typing()?;
        Ok(self.buffer.move_to_end())
    }

    pub fn set_cursor(&mut self, byte: usize) -> Result<MoveOutcome, TrackerError> {
        self.close_typing()?;
        Ok(self.buffer.set_byte_offset(byte)?)
    }

    // ---------------------------------------------------------------------------------------------
    // Completion
    // ---------------------------------------------------------------------------------------------

    /// A fresh construct tracker run over the whole buffer.
    pub fn construct(&self) -> ConstructTracker {
        let mut tracker = ConstructTracker::new();
        tracker.analyze(&self.buffer.text());
        tracker
    }

    pub fn is_complete(&self) -> bool {
        self.construct().is_complete()
    }

    pub fn continuation_prompt(&self) -> Option<Prompt> {
        self.construct().get_prompt()
    }

    /// Hand over the finished command. `None` while input still needs continuation.
    /// On success the buffer is emptied and history cleared, since recorded
    /// offsets refer to the discarded text. Malformed content is refused with
    /// `CorruptedContent` and stays in the buffer.
    pub fn accept(&mut self) -> Result<Option<String>, TrackerError> {
        if self.explicit
            && let Some(active) = self.tracker.active_sequence()
        {
            return Err(TrackerError::SequenceAlreadyActive(active.id()));
        }
        self.close_typing()?;
        if !self.is_complete() {
            return Ok(None);
        }
        let text = self.buffer.take_text()?;
        self.tracker.clear();
        debug!(target: "state.undo", len = text.len(), "accept");
        Ok(Some(text))
    }

    pub fn validate(&self) -> ValidationReport {
        self.buffer.validate()
    }
}
