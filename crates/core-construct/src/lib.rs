//! core-construct: shell continuation detection.
//!
//! Answers one question for the line editor: is the pending input a complete
//! command, or does it need another line? The tracker is fed one line at a
//! time and keeps only the lexical state that spans lines:
//! - the open quote (single, double, backtick);
//! - bracket depths and the order in which brackets and control keywords were opened;
//! - pending here-document delimiters;
//! - a line join (trailing backslash, `|`, `&&`, `||`).
//!
//! It deliberately understands only the subset of shell lexing needed for
//! that answer. It never builds a parse tree and never rejects malformed
//! input: unmatched closers are ignored and depths clamp at zero.

use std::collections::VecDeque;
use std::fmt;

use smallvec::SmallVec;
use tracing::{debug, trace};

mod scan;

// -------------------------------------------------------------------------------------------------
// Public state types
// -------------------------------------------------------------------------------------------------

/// Lexical state carried from one line to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LexState {
    #[default]
    Neutral,
    SingleQuote,
    DoubleQuote,
    Backtick,
    /// Reading here-document bodies until each pending delimiter line is seen.
    Heredoc,
    /// The previous line asked to be joined with the next one.
    LineJoin,
}

/// Why a line asked to be joined with the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Backslash,
    Pipe,
    And,
    Or,
}

/// Control keywords that open a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    For,
    While,
    Until,
    Select,
    Case,
    /// `function name` seen, body brace not yet opened.
    Function,
    /// Body of a `function name { ... }` definition.
    FunctionBody,
    /// Standalone `{ ...; }` group.
    BraceGroup,
}

impl Keyword {
    fn hint(self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::For => "for",
            Keyword::While => "while",
            Keyword::Until => "until",
            Keyword::Select => "select",
            Keyword::Case => "case",
            Keyword::Function | Keyword::FunctionBody => "function",
            Keyword::BraceGroup => "cursh",
        }
    }
}

/// One open construct, in opening order on the nesting stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nest {
    Paren,
    Brace,
    Bracket,
    Keyword(Keyword),
}

/// Open bracket counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Depths {
    pub paren: usize,
    pub brace: usize,
    pub bracket: usize,
}

impl Depths {
    pub fn is_zero(&self) -> bool {
        *self == Depths::default()
    }
}

/// A here-document waiting for its terminator line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingHeredoc {
    pub delimiter: String,
    /// `<<-`: leading tabs are stripped before comparing against the delimiter.
    pub strip_tabs: bool,
}

/// Continuation hint for the innermost open context. Displays zsh-style (`dquote> `).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Quote,
    DoubleQuote,
    Backtick,
    Heredoc,
    Join(JoinKind),
    Nest(Nest),
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hint = match self {
            Prompt::Quote => "quote",
            Prompt::DoubleQuote => "dquote",
            Prompt::Backtick => "bquote",
            Prompt::Heredoc => "heredoc",
            Prompt::Join(JoinKind::Backslash) => return f.write_str("> "),
            Prompt::Join(JoinKind::Pipe) => "pipe",
            Prompt::Join(JoinKind::And) => "cmdand",
            Prompt::Join(JoinKind::Or) => "cmdor",
            Prompt::Nest(Nest::Paren) => "subsh",
            Prompt::Nest(Nest::Brace) => "brace",
            Prompt::Nest(Nest::Bracket) => "bracket",
            Prompt::Nest(Nest::Keyword(k)) => k.hint(),
        };
        write!(f, "{hint}> ")
    }
}

/// What the next word means inside a `case` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Expect {
    #[default]
    Command,
    CaseSubject,
    CaseIn,
    Pattern,
}

// -------------------------------------------------------------------------------------------------
// ConstructTracker
// -------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ConstructTracker {
    pub(crate) state: LexState,
    pub(crate) depths: Depths,
    pub(crate) stack: SmallVec<[Nest; 8]>,
    pub(crate) heredocs: VecDeque<PendingHeredoc>,
    pub(crate) join: Option<JoinKind>,
    /// Command position at the end of a line joined by a trailing backslash.
    pub(crate) join_command: bool,
    /// Paren depth outside the innermost open `((` / `$((`, while one is open.
    pub(crate) arith_base: Option<usize>,
    pub(crate) expect: Expect,
    lines: usize,
}

impl ConstructTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan one line of input. A trailing `\n` or `\r\n` is ignored.
    pub fn analyze_line(&mut self, line: &str) {
        let line = line
            .strip_suffix('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .unwrap_or(line);
        self.lines += 1;
        match self.state {
            LexState::Heredoc => self.heredoc_line(line),
            LexState::LineJoin => {
                let operator_join = matches!(
                    self.join,
                    Some(JoinKind::Pipe | JoinKind::And | JoinKind::Or)
                );
                // a blank line after `|` keeps waiting for the command
                if operator_join && line.trim().is_empty() {
                    return;
                }
                let command = self.join != Some(JoinKind::Backslash) || self.join_command;
                self.state = LexState::Neutral;
                self.join = None;
                self.scan_line(line, command);
            }
            _ => self.scan_line(line, true),
        }
        trace!(
            target: "construct",
            line = self.lines,
            state = ?self.state,
            nesting = self.stack.len(),
            heredocs = self.heredocs.len(),
            "line_analyzed"
        );
    }

    /// Scan multi-line text line by line.
    pub fn analyze(&mut self, text: &str) {
        for line in text.lines() {
            self.analyze_line(line);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == LexState::Neutral && self.depths.is_zero() && self.stack.is_empty()
    }

    pub fn needs_continuation(&self) -> bool {
        !self.is_complete()
    }

    /// Hint for the innermost open context, `None` when the input is complete.
    pub fn get_prompt(&self) -> Option<Prompt> {
        match self.state {
            LexState::SingleQuote => return Some(Prompt::Quote),
            LexState::DoubleQuote => return Some(Prompt::DoubleQuote),
            LexState::Backtick => return Some(Prompt::Backtick),
            LexState::Heredoc => return Some(Prompt::Heredoc),
            LexState::LineJoin => {
                if let Some(kind) = self.join {
                    return Some(Prompt::Join(kind));
                }
            }
            LexState::Neutral => {}
        }
        self.stack.last().map(|nest| Prompt::Nest(*nest))
    }

    pub fn state(&self) -> LexState {
        self.state
    }

    pub fn depths(&self) -> Depths {
        self.depths
    }

    /// Every open construct, outermost first.
    pub fn nesting(&self) -> &[Nest] {
        &self.stack
    }

    /// Open control keywords, outermost first.
    pub fn open_keywords(&self) -> Vec<Keyword> {
        self.stack
            .iter()
            .filter_map(|n| match n {
                Nest::Keyword(k) => Some(*k),
                _ => None,
            })
            .collect()
    }

    /// Delimiters still awaited, in the order their bodies will be read.
    pub fn pending_heredocs(&self) -> impl Iterator<Item = &PendingHeredoc> {
        self.heredocs.iter()
    }

    /// Forget everything; used once a complete command has been accepted.
    pub fn reset(&mut self) {
        if self.lines > 0 {
            debug!(target: "construct", lines = self.lines, complete = self.is_complete(), "reset");
        }
        *self = Self::default();
    }

    fn heredoc_line(&mut self, line: &str) {
        let Some(front) = self.heredocs.front() else {
            self.finish_heredocs();
            return;
        };
        let candidate = if front.strip_tabs {
            line.trim_start_matches('\t')
        } else {
            line
        };
        if candidate == front.delimiter {
            self.heredocs.pop_front();
            debug!(target: "construct", remaining = self.heredocs.len(), "heredoc_close");
            if self.heredocs.is_empty() {
                self.finish_heredocs();
            }
        }
    }

    fn finish_heredocs(&mut self) {
        self.state = if self.join.is_some() {
            LexState::LineJoin
        } else {
            LexState::Neutral
        };
    }
}
