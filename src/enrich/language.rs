//! Cheap English detection for deciding whether a record needs translating.

use serde_json::Value;

const MIN_ASCII_LETTER_SHARE: f64 = 0.6;

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x30FF     // hiragana, katakana
        | 0x3400..=0x4DBF   // CJK extension A
        | 0x4E00..=0x9FFF   // CJK unified
        | 0xAC00..=0xD7AF   // hangul syllables
        | 0x1100..=0x11FF   // hangul jamo
        | 0xF900..=0xFAFF   // compatibility ideographs
        | 0xFF66..=0xFF9F   // half-width katakana
        | 0x20000..=0x2A6DF)
}

/// Empty text counts as English. Any CJK, kana or hangul character makes it
/// non-English, as does a letter mix where under 60% of letters are ASCII.
pub fn is_probably_english(text: &str) -> bool {
    let mut letters = 0usize;
    let mut ascii_letters = 0usize;
    for c in text.chars() {
        if is_cjk(c) {
            return false;
        }
        if c.is_alphabetic() {
            letters += 1;
            if c.is_ascii_alphabetic() {
                ascii_letters += 1;
            }
        }
    }
    letters == 0 || ascii_letters as f64 / letters as f64 >= MIN_ASCII_LETTER_SHARE
}

/// Strings are checked directly, arrays element-wise. Other values never
/// need translation.
pub fn value_is_english(value: &Value) -> bool {
    match value {
        Value::String(s) => is_probably_english(s),
        Value::Array(items) => items.iter().all(value_is_english),
        _ => true,
    }
}
