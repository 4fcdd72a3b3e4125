//! Lexical fixups for "almost JSON": the shapes LLMs and hand-edited
//! scrape dumps actually produce.

use super::scanner::{ScanEvent, ScanState};

/// Rewrites JSON-ish text into something `serde_json` can parse.
///
/// - single-quoted strings become double-quoted
/// - bare object keys are quoted
/// - Python literals `True`/`False`/`None` become `true`/`false`/`null`
/// - trailing commas before `}` or `]` are removed
/// - raw newlines and tabs inside strings are escaped, other control
///   characters are dropped
///
/// Content inside well-formed double-quoted strings is otherwise untouched.
pub fn lenient_fixups(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                i = copy_string(&chars, i, '"', &mut out);
            }
            '\'' => {
                i = copy_string(&chars, i, '\'', &mut out);
            }
            ',' => {
                let next = next_significant(&chars, i + 1);
                if !matches!(next.map(|j| chars[j]), Some('}') | Some(']')) {
                    out.push(',');
                }
                i += 1;
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let is_key = matches!(next_significant(&chars, i).map(|j| chars[j]), Some(':'));
                match word.as_str() {
                    _ if is_key => {
                        out.push('"');
                        out.push_str(&word);
                        out.push('"');
                    }
                    "True" => out.push_str("true"),
                    "False" => out.push_str("false"),
                    "None" => out.push_str("null"),
                    _ => out.push_str(&word),
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Copies a string literal starting at `start` (the opening quote) into
/// `out` as a double-quoted JSON string. Returns the index after the
/// closing quote, or the end of input for an unterminated string.
fn copy_string(chars: &[char], start: usize, quote: char, out: &mut String) -> usize {
    out.push('"');
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            match chars.get(i + 1) {
                // \' is not a JSON escape
                Some('\'') => out.push('\''),
                Some(next) => {
                    out.push('\\');
                    out.push(*next);
                }
                None => {}
            }
            i += 2;
            continue;
        }
        if c == quote {
            out.push('"');
            return i + 1;
        }
        match c {
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {}
            c => out.push(c),
        }
        i += 1;
    }
    out.push('"');
    chars.len()
}

fn next_significant(chars: &[char], from: usize) -> Option<usize> {
    (from..chars.len()).find(|&j| !chars[j].is_whitespace())
}

/// Where a truncated document stands once the scan runs out of input.
struct Tail {
    state: ScanState,
    /// Per open container, the offset to cut back to: just past its opener
    /// or at its last separating comma.
    cut_points: Vec<usize>,
    /// The last string was an object key with no `:` after it yet.
    dangling_key: bool,
}

fn scan_tail(text: &str) -> Tail {
    let mut state = ScanState::new();
    let mut cut_points = Vec::new();
    let mut last_significant: Option<u8> = None;
    let mut in_key = false;
    let mut dangling_key = false;

    for (i, b) in text.as_bytes().iter().enumerate() {
        let was_in_string = state.in_string;
        match state.feed(*b) {
            ScanEvent::Open(_) => cut_points.push(i + 1),
            ScanEvent::Close(_) => cut_points.truncate(state.depth()),
            ScanEvent::Other => {}
        }
        if was_in_string {
            if !state.in_string {
                dangling_key = in_key;
                last_significant = Some(b'"');
            }
            continue;
        }
        if state.in_string {
            in_key = state.innermost() == Some(b'{')
                && matches!(last_significant, Some(b'{') | Some(b','));
            dangling_key = in_key;
        } else if *b == b',' {
            if let Some(cut) = cut_points.last_mut() {
                *cut = i;
            }
        }
        if !b.is_ascii_whitespace() {
            if *b != b'"' {
                dangling_key = false;
            }
            last_significant = Some(*b);
        }
    }
    Tail {
        state,
        cut_points,
        dangling_key,
    }
}

/// True when the text ends in a bare token that is not a complete JSON
/// scalar, e.g. `tru` or `nul`.
fn ends_with_partial_scalar(text: &str) -> bool {
    let token_start = text
        .rfind(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-')))
        .map_or(0, |i| i + 1);
    let token = &text[token_start..];
    !token.is_empty() && serde_json::from_str::<serde_json::Value>(token).is_err()
}

/// Terminates an open string and appends the closers a truncated document
/// is missing, innermost first.
///
/// A document cut inside an object key or a bare literal drops back to the
/// previous `,` or opener. A dangling `:` gets a `null` value.
pub fn close_truncated(text: &str) -> String {
    let tail = scan_tail(text);
    let mut out = text.to_string();

    if tail.state.in_string && !tail.dangling_key {
        if tail.state.escaped() {
            out.pop();
        }
        out.push('"');
    } else {
        let trimmed_len = out.trim_end().len();
        out.truncate(trimmed_len);
        if tail.dangling_key || ends_with_partial_scalar(&out) {
            if let Some(cut) = tail.cut_points.last() {
                out.truncate(*cut);
            }
        }
    }

    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    if out.ends_with(',') {
        out.pop();
    }
    if out.ends_with(':') {
        out.push_str(" null");
    }

    for opener in tail.state.stack.iter().rev() {
        out.push(if *opener == b'{' { '}' } else { ']' });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn parse(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn single_quotes_become_double_quotes() {
        let fixed = lenient_fixups("{'name': 'Kicho', 'tip': 'say \"hi\"'}");
        assert_eq!(parse(&fixed), json!({"name": "Kicho", "tip": "say \"hi\""}));
    }

    #[test]
    fn apostrophes_inside_double_quoted_strings_survive() {
        let fixed = lenient_fixups(r#"{"name": "Lan Kwai Fong's best", }"#);
        assert_eq!(parse(&fixed), json!({"name": "Lan Kwai Fong's best"}));
    }

    #[test]
    fn bare_keys_and_python_literals() {
        let fixed = lenient_fixups("{score: 85, open: True, closed: False, note: None,}");
        assert_eq!(
            parse(&fixed),
            json!({"score": 85, "open": true, "closed": false, "note": null})
        );
    }

    #[test]
    fn trailing_commas_in_arrays_are_removed() {
        let fixed = lenient_fixups("[1, 2, [3, ],\n]");
        assert_eq!(parse(&fixed), json!([1, 2, [3]]));
    }

    #[test]
    fn raw_newlines_in_strings_are_escaped() {
        let fixed = lenient_fixups("{\"d\": \"line one\nline two\"}");
        assert_eq!(parse(&fixed), json!({"d": "line one\nline two"}));
    }

    #[test]
    fn close_truncated_appends_missing_closers() {
        let closed = close_truncated(r#"{"bars": [{"name": "Quinary", "tags": ["cocktail"#);
        assert_eq!(
            parse(&closed),
            json!({"bars": [{"name": "Quinary", "tags": ["cocktail"]}]})
        );
    }

    #[test]
    fn close_truncated_handles_dangling_key() {
        let closed = close_truncated(r#"{"a": 1, "b":"#);
        assert_eq!(parse(&closed), json!({"a": 1, "b": null}));
    }

    #[test]
    fn close_truncated_drops_a_key_cut_in_half() {
        let closed = close_truncated(r#"{"enrich_type": "events", "enrich_desc"#);
        assert_eq!(parse(&closed), json!({"enrich_type": "events"}));
    }

    #[test]
    fn close_truncated_drops_a_complete_key_without_value() {
        let closed = close_truncated(r#"{"a": {"b": 1}, "c""#);
        assert_eq!(parse(&closed), json!({"a": {"b": 1}}));
    }

    #[test]
    fn close_truncated_drops_partial_literals() {
        assert_eq!(parse(&close_truncated(r#"{"a": 1, "b": tru"#)), json!({"a": 1}));
        assert_eq!(parse(&close_truncated("[1, 2, nul")), json!([1, 2]));
        assert_eq!(parse(&close_truncated(r#"{"only": fal"#)), json!({}));
    }

    #[test]
    fn close_truncated_keeps_complete_literals() {
        let closed = close_truncated(r#"{"a": true, "b": 12"#);
        assert_eq!(parse(&closed), json!({"a": true, "b": 12}));
    }

    #[test]
    fn close_truncated_respects_escaped_backslashes() {
        let closed = close_truncated(r#"{"path": "C:\\"#);
        assert_eq!(parse(&closed), json!({"path": "C:\\"}));

        let closed = close_truncated(r#"{"quote": "say \"#);
        assert_eq!(parse(&closed), json!({"quote": "say "}));
    }

    #[test]
    fn string_values_in_arrays_are_closed_not_dropped() {
        let closed = close_truncated(r#"{"tags": ["rooftop", "cock"#);
        assert_eq!(parse(&closed), json!({"tags": ["rooftop", "cock"]}));
    }
}
