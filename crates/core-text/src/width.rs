//! Grapheme cluster display width.
//!
//! A single authoritative function, `egc_width`, decides how many terminal
//! cells one extended grapheme cluster (EGC) occupies. The render layer asks
//! the buffer for widths through `Buffer::display_width` / `display_column`,
//! which route every cluster through here.
//!
//! Width precedence:
//! 1. Control clusters (including CR LF and tab) occupy no cells here; the
//!    caller expands tabs if it renders them.
//! 2. Classifier: emoji-like sequences (pictographic base, flags, keycaps,
//!    ZWJ joins, skin tones) are wide.
//! 3. `unicode_width` for the base character, clamped to `1..=2`.
//!
//! The classifier errs toward over-estimating: an extra blank cell is
//! harmless, under-estimation makes the cursor drift.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthChar;

use crate::index::{Unit, units};

const ZWJ: char = '\u{200D}';
const VS16: char = '\u{FE0F}';
const KEYCAP_COMBINING: char = '\u{20E3}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EgcKind {
    Control,
    Ascii,
    Narrow,
    Wide,
    Emoji,
}

fn is_regional_indicator(c: char) -> bool {
    ('\u{1F1E6}'..='\u{1F1FF}').contains(&c)
}

fn is_skin_tone_modifier(c: char) -> bool {
    ('\u{1F3FB}'..='\u{1F3FF}').contains(&c)
}

// Rough Extended Pictographic heuristic (emoji blocks + misc symbols / dingbats).
fn is_extended_pictographic(c: char) -> bool {
    ('\u{1F300}'..='\u{1FAFF}').contains(&c) || ('\u{2600}'..='\u{27BF}').contains(&c)
}

fn classify(egc: &str) -> EgcKind {
    let Some(first) = egc.chars().next() else {
        return EgcKind::Control;
    };
    if first.is_control() {
        return EgcKind::Control;
    }
    if first.is_ascii() && egc.len() == 1 {
        return EgcKind::Ascii;
    }
    let mut pictographic = 0usize;
    let mut regional = 0usize;
    let mut emoji_signal = false;
    for c in egc.chars() {
        if is_extended_pictographic(c) {
            pictographic += 1;
        }
        if is_regional_indicator(c) {
            regional += 1;
        }
        if c == ZWJ || c == VS16 || c == KEYCAP_COMBINING || is_skin_tone_modifier(c) {
            emoji_signal = true;
        }
    }
    if regional >= 1 || (pictographic >= 1 && (emoji_signal || is_extended_pictographic(first))) {
        return EgcKind::Emoji;
    }
    if emoji_signal && egc.contains(KEYCAP_COMBINING) {
        return EgcKind::Emoji;
    }
    match first.width() {
        Some(2) => EgcKind::Wide,
        _ => EgcKind::Narrow,
    }
}

/// Display width of a single grapheme cluster.
///
/// Precondition: `egc` is one cluster as produced by grapheme segmentation.
#[inline]
pub fn egc_width(egc: &str) -> u16 {
    match classify(egc) {
        EgcKind::Control => 0,
        EgcKind::Ascii | EgcKind::Narrow => 1,
        EgcKind::Wide | EgcKind::Emoji => 2,
    }
}

/// Width of possibly malformed bytes; each malformed sequence shows as one replacement cell.
pub(crate) fn tolerant_width(bytes: &[u8]) -> usize {
    units(bytes)
        .map(|(_, unit)| match unit {
            Unit::Text(s) => s.graphemes(true).map(|g| egc_width(g) as usize).sum(),
            Unit::Malformed(_) => 1,
        })
        .sum()
}
