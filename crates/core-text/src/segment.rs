//! Normalization applied to bulk input (paste, IME commits) before it reaches the store.
//!
//! Contract:
//! - Input: raw `&str` from a paste handler.
//! - Output: NFC-normalized text with CRLF and lone CR rewritten to LF.
//! - Typed keystrokes bypass this; only bulk input is normalized.
//! - Does not log content.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::{IsNormalized, is_nfc_quick};

/// Rewrite CRLF / CR line endings to LF. Borrowed when nothing needs rewriting.
pub fn normalize_line_endings(input: &str) -> std::borrow::Cow<'_, str> {
    if !input.contains('\r') {
        return std::borrow::Cow::Borrowed(input);
    }
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut seg_start = 0usize;
    let mut j = 0usize;
    // Only slices at '\r' so multi-byte sequences stay intact.
    while j < bytes.len() {
        if bytes[j] == b'\r' {
            out.push_str(&input[seg_start..j]);
            out.push('\n');
            j += if bytes.get(j + 1) == Some(&b'\n') { 2 } else { 1 };
            seg_start = j;
        } else {
            j += 1;
        }
    }
    out.push_str(&input[seg_start..]);
    std::borrow::Cow::Owned(out)
}

/// Normalize pasted text: line endings first, then NFC.
pub fn normalize_paste(input: &str) -> String {
    let lf = normalize_line_endings(input);
    if is_nfc_quick(lf.chars()) == IsNormalized::Yes {
        return lf.into_owned();
    }
    lf.nfc().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_endings_rewritten() {
        assert_eq!(normalize_line_endings("a\r\nb\rc\n"), "a\nb\nc\n");
        assert!(matches!(
            normalize_line_endings("plain\n"),
            std::borrow::Cow::Borrowed(_)
        ));
    }

    #[test]
    fn nfc_composes_decomposed_marks() {
        let decomposed = "cafe\u{0301}";
        assert_eq!(normalize_paste(decomposed), "caf\u{00E9}");
        assert_eq!(normalize_paste("caf\u{00E9}"), "caf\u{00E9}");
    }

    #[test]
    fn crlf_and_nfc_combined() {
        assert_eq!(normalize_paste("e\u{0301}\r\nx"), "\u{00E9}\nx");
    }
}
