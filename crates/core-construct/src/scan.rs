//! Single-line lexer driving `ConstructTracker`.
//!
//! Works on bytes: every character that matters to shell lexing is ASCII, and
//! anything else is an ordinary word character. Slices into the line are only
//! taken at ASCII positions.

use tracing::debug;

use crate::{ConstructTracker, Expect, JoinKind, Keyword, LexState, Nest, PendingHeredoc};

#[inline]
fn is_blank(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

#[inline]
fn is_meta(b: u8) -> bool {
    matches!(b, b';' | b'&' | b'|' | b'(' | b')' | b'<' | b'>')
}

fn word_end(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|b| is_blank(*b) || is_meta(*b))
        .map_or(bytes.len(), |n| from + n)
}

impl ConstructTracker {
    /// Scan one line. `command` is false when a backslash join left the
    /// previous line in the middle of a command.
    pub(crate) fn scan_line(&mut self, line: &str, mut command: bool) {
        let bytes = line.as_bytes();
        let mut i = 0usize;
        let mut word_start = true;
        let mut join = None;

        while i < bytes.len() {
            let b = bytes[i];
            match self.state {
                LexState::SingleQuote => {
                    if b == b'\'' {
                        self.state = LexState::Neutral;
                    }
                    i += 1;
                    continue;
                }
                LexState::DoubleQuote | LexState::Backtick => {
                    let close = if self.state == LexState::DoubleQuote {
                        b'"'
                    } else {
                        b'`'
                    };
                    if b == b'\\' {
                        i += 2;
                        continue;
                    }
                    if b == close {
                        self.state = LexState::Neutral;
                    }
                    i += 1;
                    continue;
                }
                _ => {}
            }

            if is_blank(b) {
                word_start = true;
                i += 1;
                continue;
            }
            if b == b'#' && word_start {
                break;
            }
            join = None;

            if word_start && !is_meta(b) && b != b'\\' {
                word_start = false;
                let end = word_end(bytes, i);
                let word = line.get(i..end).unwrap_or("");
                if self.word(word, &mut command) {
                    i = end;
                    continue;
                }
            }

            let next = bytes.get(i + 1).copied();
            match b {
                b'\\' => {
                    if next.is_none() {
                        join = Some(JoinKind::Backslash);
                        i += 1;
                    } else {
                        i += 2;
                        command = false;
                    }
                    continue;
                }
                b'\'' => self.state = LexState::SingleQuote,
                b'"' => self.state = LexState::DoubleQuote,
                b'`' => self.state = LexState::Backtick,
                b';' => {
                    let mut n = 1;
                    if next == Some(b';') {
                        n = if bytes.get(i + 2) == Some(&b'&') { 3 } else { 2 };
                    } else if next == Some(b'&') {
                        n = 2;
                    }
                    if n > 1 && self.in_case_body() {
                        self.expect = Expect::Pattern;
                    }
                    command = true;
                    word_start = true;
                    i += n;
                    continue;
                }
                b'&' => {
                    match next {
                        Some(b'&') => {
                            join = Some(JoinKind::And);
                            command = true;
                            i += 2;
                        }
                        Some(b'>') => i += 2,
                        _ => {
                            command = true;
                            i += 1;
                        }
                    }
                    word_start = true;
                    continue;
                }
                b'|' => {
                    if self.expect == Expect::Pattern {
                        i += 1;
                    } else if next == Some(b'|') {
                        join = Some(JoinKind::Or);
                        i += 2;
                    } else {
                        join = Some(JoinKind::Pipe);
                        i += if next == Some(b'&') { 2 } else { 1 };
                    }
                    command = true;
                    word_start = true;
                    continue;
                }
                b'(' => {
                    // optional leading paren of a case pattern
                    if self.expect != Expect::Pattern {
                        if next == Some(b'(') && self.arith_base.is_none() {
                            self.arith_base = Some(self.depths.paren);
                        }
                        self.open(Nest::Paren);
                        command = true;
                    }
                    word_start = true;
                }
                b')' => {
                    if self.in_case_body() {
                        self.expect = Expect::Command;
                    } else {
                        self.close_bracket(Nest::Paren);
                        if self.arith_base.is_some_and(|base| self.depths.paren <= base) {
                            self.arith_base = None;
                        }
                    }
                    command = true;
                    word_start = true;
                }
                b'<' => {
                    word_start = true;
                    // `<<` inside arithmetic is a shift
                    if next == Some(b'<') && self.arith_base.is_none() {
                        i = if bytes.get(i + 2) == Some(&b'<') {
                            i + 3
                        } else {
                            self.capture_heredoc(line, i + 2)
                        };
                        continue;
                    }
                }
                b'>' => word_start = true,
                b'{' => self.open(Nest::Brace),
                b'}' => self.close_bracket(Nest::Brace),
                b'[' => self.open(Nest::Bracket),
                b']' => self.close_bracket(Nest::Bracket),
                _ => {}
            }
            i += 1;
        }

        if self.state == LexState::Neutral {
            self.join = join;
            self.join_command = command;
            if !self.heredocs.is_empty() {
                self.state = LexState::Heredoc;
            } else if join.is_some() {
                self.state = LexState::LineJoin;
            }
        } else {
            self.join = None;
        }
    }

    /// Handle a word starting at a word boundary. Returns true when the word
    /// was consumed as syntax and its characters need no further scanning.
    fn word(&mut self, word: &str, command: &mut bool) -> bool {
        match self.expect {
            Expect::CaseSubject => {
                self.expect = Expect::CaseIn;
                *command = false;
                return false;
            }
            Expect::CaseIn => {
                if word == "in" {
                    self.expect = Expect::Pattern;
                    return true;
                }
                self.expect = Expect::Command;
            }
            Expect::Pattern => {
                if word == "esac" {
                    self.close_keyword(&[Keyword::Case]);
                    self.expect = Expect::Command;
                    *command = false;
                    return true;
                }
                return false;
            }
            Expect::Command => {}
        }

        if word == "{" && self.stack.last() == Some(&Nest::Keyword(Keyword::Function)) {
            self.stack.pop();
            self.stack.push(Nest::Keyword(Keyword::FunctionBody));
            *command = true;
            return true;
        }
        if !*command {
            return false;
        }
        match word {
            "if" | "while" | "until" => self.open(Nest::Keyword(keyword(word))),
            "for" | "select" | "function" => {
                self.open(Nest::Keyword(keyword(word)));
                *command = false;
            }
            "case" => {
                self.open(Nest::Keyword(Keyword::Case));
                self.expect = Expect::CaseSubject;
                *command = false;
            }
            "{" => self.open(Nest::Keyword(Keyword::BraceGroup)),
            "then" | "do" | "else" | "elif" | "!" | "time" => {}
            "fi" => {
                self.close_keyword(&[Keyword::If]);
                *command = false;
            }
            "done" => {
                self.close_keyword(&[
                    Keyword::For,
                    Keyword::While,
                    Keyword::Until,
                    Keyword::Select,
                ]);
                *command = false;
            }
            "esac" => {
                self.close_keyword(&[Keyword::Case]);
                self.expect = Expect::Command;
                *command = false;
            }
            "}" => {
                if !self.close_keyword(&[Keyword::FunctionBody, Keyword::BraceGroup]) {
                    self.close_bracket(Nest::Brace);
                }
                *command = false;
            }
            _ => {
                *command = false;
                return false;
            }
        }
        true
    }

    /// Read the delimiter word after `<<` / `<<-` starting at `i`; returns the index after it.
    fn capture_heredoc(&mut self, line: &str, mut i: usize) -> usize {
        let bytes = line.as_bytes();
        let strip_tabs = bytes.get(i) == Some(&b'-');
        if strip_tabs {
            i += 1;
        }
        while bytes.get(i).copied().is_some_and(is_blank) {
            i += 1;
        }
        let start = i;
        let mut quote = None;
        while let Some(&b) = bytes.get(i) {
            match quote {
                Some(q) if b == q => quote = None,
                Some(_) => {}
                None if is_blank(b) || is_meta(b) => break,
                None if b == b'\'' || b == b'"' => quote = Some(b),
                None => {}
            }
            i += 1;
        }
        let delimiter: String = line
            .get(start..i)
            .unwrap_or("")
            .chars()
            .filter(|c| !matches!(c, '\'' | '"' | '\\'))
            .collect();
        if !delimiter.is_empty() {
            self.heredocs.push_back(PendingHeredoc {
                delimiter,
                strip_tabs,
            });
            debug!(target: "construct", pending = self.heredocs.len(), strip_tabs, "heredoc_capture");
        }
        i
    }

    fn in_case_body(&self) -> bool {
        matches!(self.stack.last(), Some(Nest::Keyword(Keyword::Case)))
    }

    fn open(&mut self, nest: Nest) {
        match nest {
            Nest::Paren => self.depths.paren += 1,
            Nest::Brace => self.depths.brace += 1,
            Nest::Bracket => self.depths.bracket += 1,
            Nest::Keyword(_) => {}
        }
        self.stack.push(nest);
    }

    /// Decrement a bracket depth (clamped) and drop its innermost stack entry.
    fn close_bracket(&mut self, nest: Nest) {
        let depth = match nest {
            Nest::Paren => &mut self.depths.paren,
            Nest::Brace => &mut self.depths.brace,
            Nest::Bracket => &mut self.depths.bracket,
            Nest::Keyword(_) => return,
        };
        *depth = depth.saturating_sub(1);
        if let Some(i) = self.stack.iter().rposition(|n| *n == nest) {
            self.stack.remove(i);
        }
    }

    /// Drop the innermost open keyword among `openers`. False when none is open.
    fn close_keyword(&mut self, openers: &[Keyword]) -> bool {
        let found = self
            .stack
            .iter()
            .rposition(|n| matches!(n, Nest::Keyword(k) if openers.contains(k)));
        match found {
            Some(i) => {
                self.stack.remove(i);
                true
            }
            None => false,
        }
    }
}

fn keyword(word: &str) -> Keyword {
    match word {
        "if" => Keyword::If,
        "for" => Keyword::For,
        "while" => Keyword::While,
        "until" => Keyword::Until,
        "select" => Keyword::Select,
        "case" => Keyword::Case,
        "function" => Keyword::Function,
        _ => Keyword::BraceGroup,
    }
}
