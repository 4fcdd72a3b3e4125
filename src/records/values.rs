//! Cleanup for raw Klook page text keyed by URL.

use crate::common::types::Record;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

static USAGE_IMAGES_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)(usage_images).*?(latest_best_review)").expect("valid usage_images regex")
});

static CHAT_INFO_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)(chat_info).*?(\{name:\["activity_internal_link"\]\})"#)
        .expect("valid chat_info regex")
});

/// Cleans every string value: drops the bulky blocks between the
/// `usage_images`/`latest_best_review` and `chat_info`/internal-link markers
/// (the markers stay), then decodes `\uXXXX` escapes. Returns the cleaned
/// map and the number of values whose escapes could not all be decoded.
pub fn clean_scraped_values(map: Record) -> (Record, usize) {
    let mut undecodable = 0;
    let cleaned = map
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(text) => {
                let (cleaned, ok) = clean_value(&text);
                if !ok {
                    warn!("could not decode every unicode escape in '{}'", key);
                    undecodable += 1;
                }
                (key, Value::String(cleaned))
            }
            other => (key, other),
        })
        .collect();
    (cleaned, undecodable)
}

/// Returns the cleaned text and whether every escape decoded.
pub fn clean_value(text: &str) -> (String, bool) {
    let text = USAGE_IMAGES_BLOCK.replace_all(text, "$1$2");
    let text = CHAT_INFO_BLOCK.replace_all(&text, "$1$2");
    let text = text.replace("\\\\u", "\\u");
    decode_unicode_escapes(&text)
}

fn hex_unit(chars: &[char], at: usize) -> Option<u32> {
    if chars.get(at) != Some(&'\\') || chars.get(at + 1) != Some(&'u') {
        return None;
    }
    let digits: String = chars.get(at + 2..at + 6)?.iter().collect();
    u32::from_str_radix(&digits, 16).ok()
}

/// Decodes `\uXXXX` escapes, joining surrogate pairs. Lone surrogates are
/// left as written.
pub fn decode_unicode_escapes(text: &str) -> (String, bool) {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut ok = true;
    let mut i = 0;

    while i < chars.len() {
        let unit = match hex_unit(&chars, i) {
            Some(unit) => unit,
            None => {
                out.push(chars[i]);
                i += 1;
                continue;
            }
        };

        if (0xD800..0xDC00).contains(&unit) {
            if let Some(low) = hex_unit(&chars, i + 6).filter(|u| (0xDC00..0xE000).contains(u)) {
                let combined = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                if let Some(c) = char::from_u32(combined) {
                    out.push(c);
                    i += 12;
                    continue;
                }
            }
        }

        match char::from_u32(unit) {
            Some(c) => out.push(c),
            None => {
                ok = false;
                out.extend(&chars[i..i + 6]);
            }
        }
        i += 6;
    }
    (out, ok)
}
