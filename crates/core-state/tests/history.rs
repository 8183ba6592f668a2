//! Undo/redo behaviour over whole sequences, driven through the tracker and the session.

use core_state::{ChangeTracker, EditSession, TrackerError};
use core_text::Buffer;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn delete_then_undo_then_redo() {
    let mut buffer = Buffer::new();
    let mut tracker = ChangeTracker::new();

    tracker.begin_sequence("insert").unwrap();
    tracker.record(buffer.insert(0, "ab").unwrap()).unwrap();
    tracker.complete_sequence().unwrap();

    tracker.begin_sequence("delete").unwrap();
    tracker.record(buffer.delete(1, 1).unwrap()).unwrap();
    tracker.complete_sequence().unwrap();
    assert_eq!(buffer.text(), "a");

    assert!(tracker.undo(&mut buffer).unwrap());
    assert_eq!(buffer.text(), "ab");
    assert!(tracker.redo(&mut buffer).unwrap());
    assert_eq!(buffer.contents().into_owned(), b"a".to_vec());
    assert!(!tracker.redo(&mut buffer).unwrap());
}

#[test]
fn misuse_is_reported_not_applied() {
    let mut tracker = ChangeTracker::new();
    let mut buffer = Buffer::from_text("x");
    assert_eq!(
        tracker.record(buffer.insert(1, "y").unwrap()),
        Err(TrackerError::SequenceNotActive)
    );
    let id = tracker.begin_sequence("outer").unwrap();
    assert_eq!(
        tracker.begin_sequence("inner"),
        Err(TrackerError::SequenceAlreadyActive(id))
    );
    assert!(tracker.undo(&mut Buffer::new()).is_err());
}

#[test]
fn session_script_round_trip() {
    let mut s = EditSession::new();
    for c in "for f in *".chars() {
        s.type_char(c).unwrap();
    }
    s.paste("; do\n  echo $f\n").unwrap();
    assert_eq!(s.continuation_prompt().map(|p| p.to_string()), Some("for> ".into()));
    s.insert_str("done").unwrap();
    let before = s.text().into_owned();

    while s.undo().unwrap() {}
    assert_eq!(s.text(), "");
    while s.redo().unwrap() {}
    assert_eq!(s.text(), before);
    assert_eq!(s.accept().unwrap().as_deref(), Some(before.as_str()));
}

#[derive(Debug, Clone)]
enum Edit {
    Insert(usize, &'static str),
    Delete(usize, usize),
    Replace(usize, usize, &'static str),
}

const PIECES: &[&str] = &["a", "é", "\u{1F600}", "e\u{0301}", "\n", "xyz", ""];

fn edit() -> impl Strategy<Value = Edit> {
    let piece = prop::sample::select(PIECES);
    prop_oneof![
        (any::<usize>(), piece.clone()).prop_map(|(o, p)| Edit::Insert(o, p)),
        (any::<usize>(), 0usize..4).prop_map(|(o, n)| Edit::Delete(o, n)),
        (any::<usize>(), 0usize..4, piece).prop_map(|(o, n, p)| Edit::Replace(o, n, p)),
    ]
}

/// Snap an arbitrary offset onto a codepoint boundary inside `text`.
fn boundary(text: &str, raw: usize) -> usize {
    let mut at = raw % (text.len() + 1);
    while !text.is_char_boundary(at) {
        at -= 1;
    }
    at
}

fn span(text: &str, raw: usize, chars: usize) -> (usize, usize) {
    let start = boundary(text, raw);
    let len = text[start..].chars().take(chars).map(char::len_utf8).sum();
    (start, len)
}

proptest! {
    #[test]
    fn undo_then_redo_is_byte_identical(
        seed in "[a-z é]{0,12}",
        edits in prop::collection::vec(edit(), 1..12),
    ) {
        let mut buffer = Buffer::from_text(&seed);
        let mut tracker = ChangeTracker::new();
        let start = buffer.text().into_owned();

        tracker.begin_sequence("script").unwrap();
        for e in edits {
            let text = buffer.text().into_owned();
            let op = match e {
                Edit::Insert(o, p) => buffer.insert(boundary(&text, o), p),
                Edit::Delete(o, n) => {
                    let (at, len) = span(&text, o, n);
                    buffer.delete(at, len)
                }
                Edit::Replace(o, n, p) => {
                    let (at, len) = span(&text, o, n);
                    buffer.replace(at, len, p)
                }
            };
            tracker.record(op.unwrap()).unwrap();
        }
        let completed = tracker.complete_sequence().unwrap();
        let after = buffer.text().into_owned();

        if completed.is_some() {
            prop_assert!(tracker.undo(&mut buffer).unwrap());
            prop_assert_eq!(buffer.text(), start.as_str());
            prop_assert!(tracker.redo(&mut buffer).unwrap());
        }
        prop_assert_eq!(buffer.text(), after.as_str());
        prop_assert!(buffer.validate().is_ok());
    }
}
