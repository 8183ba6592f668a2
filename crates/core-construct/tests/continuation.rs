//! Multi-line continuation scenarios and lexer robustness properties.

use core_construct::{ConstructTracker, Keyword, LexState, Prompt};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn prompts(script: &str) -> Vec<Option<String>> {
    let mut t = ConstructTracker::new();
    script
        .lines()
        .map(|l| {
            t.analyze_line(l);
            t.get_prompt().map(|p| p.to_string())
        })
        .collect()
}

#[test]
fn script_prompt_sequence() {
    let script = "\
if [ -d build ]; then
  for f in build/*; do
    echo \"removing
$f\"
    rm \"$f\"
  done
fi";
    assert_eq!(
        prompts(script),
        vec![
            Some("if> ".into()),
            Some("for> ".into()),
            Some("dquote> ".into()),
            Some("for> ".into()),
            Some("for> ".into()),
            Some("if> ".into()),
            None,
        ]
    );
}

#[test]
fn heredoc_inside_function() {
    let mut t = ConstructTracker::new();
    t.analyze("usage() {\n\tcat <<-EOF\n\tusage: tool [opts]\n\t(see docs\n\tEOF\n");
    assert_eq!(t.open_keywords(), vec![Keyword::BraceGroup]);
    assert_eq!(t.state(), LexState::Neutral);
    t.analyze_line("}");
    assert!(t.is_complete());
}

#[test]
fn quote_prompt_wins_over_keyword() {
    let mut t = ConstructTracker::new();
    t.analyze_line("while true; do echo 'x");
    assert_eq!(t.get_prompt(), Some(Prompt::Quote));
    t.analyze_line("'");
    assert_eq!(t.get_prompt().unwrap().to_string(), "while> ");
}

const RESERVED: &[&str] = &[
    "if", "then", "else", "elif", "fi", "for", "while", "until", "select", "do", "done", "case",
    "esac", "function", "time",
];

fn plain_word() -> impl Strategy<Value = String> {
    "[a-z0-9_./-]{1,8}".prop_filter("reserved word", |w| !RESERVED.contains(&w.as_str()))
}

proptest! {
    #[test]
    fn plain_commands_are_complete(words in prop::collection::vec(plain_word(), 1..6)) {
        let mut t = ConstructTracker::new();
        t.analyze_line(&words.join(" "));
        prop_assert!(t.is_complete());
    }

    #[test]
    fn single_quotes_hide_everything(body in "[^'\n]{0,40}") {
        let mut t = ConstructTracker::new();
        t.analyze_line(&format!("echo '{body}'"));
        prop_assert!(t.is_complete(), "{:?}", t.get_prompt());
    }

    #[test]
    fn unterminated_single_quote_always_continues(body in "[^'\n]{0,40}") {
        let mut t = ConstructTracker::new();
        t.analyze_line(&format!("echo '{body}"));
        prop_assert_eq!(t.state(), LexState::SingleQuote);
        prop_assert!(t.needs_continuation());
    }

    #[test]
    fn arbitrary_input_never_panics_and_resets_clean(lines in prop::collection::vec(".{0,30}", 0..8)) {
        let mut t = ConstructTracker::new();
        for l in &lines {
            t.analyze_line(l);
            prop_assert_eq!(t.is_complete(), t.get_prompt().is_none());
        }
        t.reset();
        prop_assert!(t.is_complete());
    }
}
