//! Title and artist normalization for catalog matching.
//!
//! Local file titles and uta-net titles disagree in track-number prefixes,
//! bracketed annotations, full-width forms, punctuation and diacritics.
//! Everything here maps a raw string onto a canonical comparison key.
//!
//! CRITICAL: `normalize_title` must stay idempotent. The matcher normalizes
//! catalog titles and track titles independently and relies on equal keys
//! for equal inputs. Run the property tests after changes.

use any_ascii::any_ascii_char;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Matches audio file extensions left over from filename-derived titles
pub static FILE_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(?:mp3|flac|m4a|ogg|aac|wav)$").unwrap());

/// Matches track number prefixes like "03 - ", "Track 5 - ", "01. ", "7_"
pub static TRACK_NUMBER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:track\s*)?\d{1,4}\s*[-–—._]\s*").unwrap());

/// Matches track number prefix without separator: "16 Eleanor Rigby" → "Eleanor Rigby"
/// Only 1-99 followed by an uppercase ASCII letter, so "1970 Somethin'" and
/// "17才" are left alone.
pub static TRACK_NUMBER_SPACE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:0[1-9]|[1-9]\d?)\s+([A-Z])").unwrap());

/// Matches track number in brackets: "[01] Song", "[12] Title"
pub static TRACK_NUMBER_BRACKET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[\d{1,3}\]\s*").unwrap());

/// Innermost bracketed annotation group: "(TV size)", "[Live]", "【アニメ主題歌】".
/// Applied repeatedly so nested groups collapse from the inside out.
pub static ANNOTATION_GROUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\([^()]*\)|\[[^\[\]]*\]|\{[^{}]*\}|【[^【】]*】|〔[^〔〕]*〕|〈[^〈〉]*〉|《[^《》]*》",
    )
    .unwrap()
});

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F)
}

/// Latin-1 supplement and Latin extended letters, the only characters
/// `fold_latin` transliterates.
fn is_accented_latin(c: char) -> bool {
    matches!(c as u32, 0x00C0..=0x024F | 0x1E00..=0x1EFF) && c != '\u{00D7}' && c != '\u{00F7}'
}

/// CJK ideographs plus the iteration mark 々.
pub fn is_ideograph(c: char) -> bool {
    matches!(c as u32,
        0x3005 | 0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF | 0x20000..=0x2A6DF)
}

/// Fold accented Latin letters to ASCII ("Beyoncé" → "Beyonce", "Straße" → "Strasse").
///
/// Kana and kanji are left untouched: a full NFKD fold would turn "が" into "か".
pub fn fold_latin(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if is_accented_latin(c) {
            out.push_str(any_ascii_char(c));
        } else if !is_combining_mark(c) {
            out.push(c);
        }
    }
    out
}

/// Collapse any run of whitespace into a single space and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove bracketed annotation groups.
///
/// When the whole string is annotation (e.g. "(untitled)"), the input is
/// returned unchanged so the title does not vanish.
pub fn strip_annotations(s: &str) -> String {
    let mut current = s.to_string();
    loop {
        let next = ANNOTATION_GROUP.replace_all(&current, " ").to_string();
        if next == current {
            break;
        }
        current = next;
    }
    if current.trim().is_empty() {
        s.to_string()
    } else {
        current
    }
}

/// Strip a leading track-number token in any of the supported shapes.
pub fn strip_track_number(s: &str) -> String {
    let s = s.trim_start();
    for pattern in [&*TRACK_NUMBER_BRACKET, &*TRACK_NUMBER_PREFIX] {
        if pattern.is_match(s) {
            let stripped = pattern.replace(s, "").to_string();
            // "1-2-3" or "[01] 1984": the digits are the title, keep them
            if stripped.chars().any(char::is_alphabetic) {
                return stripped;
            }
            return s.to_string();
        }
    }
    // Keep the captured capital letter: replace "16 E" with "E"
    TRACK_NUMBER_SPACE_PREFIX.replace(s, "$1").to_string()
}

/// Lowercase and keep only letters, digits and whitespace.
fn strip_punctuation(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect()
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Remove filename noise but keep the title's own script, case and punctuation.
///
/// This is the form sent to the catalog search endpoint: "03 - 輪舞－revolution－ (TV size).mp3"
/// becomes "輪舞-revolution-".
pub fn clean_title(raw: &str) -> String {
    let mut result: String = raw.nfkc().collect();
    result = FILE_EXTENSION.replace(result.trim(), "").to_string();
    result = strip_track_number(&result);
    result = strip_annotations(&result);
    collapse_whitespace(&result)
}

/// Normalize a title for matching.
/// Strips extensions, track numbers, bracketed annotations, punctuation and symbols;
/// folds full-width forms and Latin diacritics; lowercases.
///
/// Lowercasing happens before the Latin fold: a few capitals ("Ƛ", "Ȿ") only
/// lowercase into the folded ranges.
pub fn normalize_title(raw: &str) -> String {
    let cleaned = clean_title(raw).to_lowercase();
    collapse_whitespace(&strip_punctuation(&fold_latin(&cleaned)))
}

/// Normalize an artist name for matching.
///
/// Same as [`normalize_title`] except that leading numbers and extensions are
/// kept ("10-FEET" must not become "feet").
pub fn normalize_artist(raw: &str) -> String {
    let nfkc: String = raw.nfkc().collect();
    let stripped = strip_annotations(nfkc.trim()).to_lowercase();
    collapse_whitespace(&strip_punctuation(&fold_latin(&stripped)))
}

/// Normalize a display name for the exact-equality check: NFKC plus trim.
pub fn canonical_name(raw: &str) -> String {
    let nfkc: String = raw.nfkc().collect();
    nfkc.trim().to_string()
}

/// Longest run of ideographic characters in `s` (first one wins on ties).
///
/// Used to narrow a catalog search to the kanji core of a title:
/// "輪舞revolution" → "輪舞".
pub fn longest_ideographic_run(s: &str) -> Option<String> {
    fn flush(run: &mut String, best: &mut Option<String>) {
        if !run.is_empty() {
            let longer = best
                .as_ref()
                .map_or(true, |b| run.chars().count() > b.chars().count());
            if longer {
                *best = Some(run.clone());
            }
            run.clear();
        }
    }

    let mut best: Option<String> = None;
    let mut current = String::new();
    for c in s.chars() {
        if is_ideograph(c) {
            current.push(c);
        } else {
            flush(&mut current, &mut best);
        }
    }
    flush(&mut current, &mut best);
    best
}

// ============================================================================
// TESTS
// ============================================================================
