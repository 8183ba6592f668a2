//! Property tests: arbitrary valid edit scripts keep the buffer structurally sound.

use core_text::{Buffer, BufferOptions};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    Insert(usize, String),
    Delete(usize, usize),
    Replace(usize, usize, String),
    Move(isize),
    MoveGraphemes(isize),
    Backspace,
}

fn piece() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "a", "echo ", "é", "e\u{0301}", "漢字", "😀", "👍🏽", "\n", "\r\n", "'", "🇺🇸", "",
    ])
    .prop_map(str::to_owned)
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (any::<usize>(), piece()).prop_map(|(at, s)| Step::Insert(at, s)),
        (any::<usize>(), 0usize..4).prop_map(|(at, n)| Step::Delete(at, n)),
        (any::<usize>(), 0usize..3, piece()).prop_map(|(at, n, s)| Step::Replace(at, n, s)),
        (-6isize..6).prop_map(Step::Move),
        (-4isize..4).prop_map(Step::MoveGraphemes),
        Just(Step::Backspace),
    ]
}

/// Pick a codepoint-aligned span `[start, start + len)` from raw numbers.
fn span(buf: &Buffer, at: usize, codepoints: usize) -> (usize, usize) {
    let count = buf.codepoint_count();
    let first = at % (count + 1);
    let last = (first + codepoints).min(count);
    let start = buf.byte_offset_for_codepoint(first).unwrap();
    let end = buf.byte_offset_for_codepoint(last).unwrap();
    (start, end - start)
}

fn run(buf: &mut Buffer, step: &Step) {
    match step {
        Step::Insert(at, s) => {
            let (start, _) = span(buf, *at, 0);
            buf.insert(start, s).unwrap();
        }
        Step::Delete(at, n) => {
            let (start, len) = span(buf, *at, *n);
            buf.delete(start, len).unwrap();
        }
        Step::Replace(at, n, s) => {
            let (start, len) = span(buf, *at, *n);
            buf.replace(start, len, s).unwrap();
        }
        Step::Move(d) => {
            buf.move_by_codepoints(*d);
        }
        Step::MoveGraphemes(d) => {
            buf.move_by_graphemes(*d);
        }
        Step::Backspace => {
            buf.delete_backward_grapheme().unwrap();
        }
    }
}

proptest! {
    #[test]
    fn validator_clean_after_any_edit_script(steps in prop::collection::vec(step(), 0..40)) {
        let mut buf = Buffer::with_options(BufferOptions { initial_capacity: 16, max_capacity: None });
        for s in &steps {
            run(&mut buf, s);
            let report = buf.validate();
            prop_assert!(report.is_ok(), "{:?} after {:?}", report.issues(), s);
        }
    }

    #[test]
    fn cursor_never_inside_a_codepoint(steps in prop::collection::vec(step(), 0..40)) {
        let mut buf = Buffer::from_text("start ");
        for s in &steps {
            run(&mut buf, s);
            prop_assert!(buf.cursor() <= buf.len());
            prop_assert!(buf.text().is_char_boundary(buf.cursor()));
        }
    }

    #[test]
    fn cached_counts_match_fresh_scan(steps in prop::collection::vec(step(), 0..30)) {
        let mut buf = Buffer::new();
        for s in &steps {
            // keep the cache warm so in-place adjustments are exercised
            buf.codepoint_count();
            run(&mut buf, s);
            let fresh = Buffer::from_text(&buf.text());
            prop_assert_eq!(buf.index_counts(), fresh.index_counts());
        }
    }

    #[test]
    fn ascii_typing_keeps_index_valid(text in "[a-z0-9 ;|&]{0,64}") {
        let mut buf = Buffer::new();
        buf.codepoint_count();
        for ch in text.chars() {
            buf.insert_at_cursor(ch.to_string()).unwrap();
            prop_assert!(buf.is_index_valid());
        }
        prop_assert_eq!(buf.codepoint_count(), text.len());
        prop_assert_eq!(buf.grapheme_count(), text.len());
    }

    #[test]
    fn operation_inverse_restores_content(
        seed in prop::collection::vec(piece(), 1..8),
        at in any::<usize>(),
        n in 0usize..4,
        with in piece(),
    ) {
        let mut buf = Buffer::from_text(&seed.concat());
        let before = buf.contents().into_owned();
        let (start, len) = span(&buf, at, n);
        let op = buf.replace(start, len, &with).unwrap();
        op.inverse().apply(&mut buf).unwrap();
        prop_assert_eq!(buf.contents().into_owned(), before);
    }
}
