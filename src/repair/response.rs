//! Pulling the JSON payload out of free-form LLM output.

use once_cell::sync::Lazy;
use regex::Regex;

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid think-block regex"));
static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").expect("valid fence regex"));

/// Removes `<think>…</think>` reasoning blocks some models prepend.
///
/// An unterminated `<think>` (output cut off mid-reasoning) is dropped along
/// with everything up to the first `{` that follows it.
pub fn strip_think_blocks(text: &str) -> String {
    let cleaned = THINK_BLOCK.replace_all(text, "");
    let without_open_tag = match cleaned.find("<think>") {
        Some(pos) => {
            let rest = &cleaned[pos + "<think>".len()..];
            match rest.find('{') {
                Some(brace) => format!("{}{}", &cleaned[..pos], &rest[brace..]),
                None => cleaned[..pos].to_string(),
            }
        }
        None => cleaned.into_owned(),
    };
    without_open_tag.trim().to_string()
}

/// Best-effort extraction of the JSON document inside a model response.
///
/// Order: think blocks removed, then the first fenced block whose body looks
/// like JSON, then the outermost `[`…`]` when the text starts with an array,
/// then the first `{` to the last `}`. A `{` with no closing brace yields the
/// tail of the text so truncation repair can still run on it.
pub fn extract_json_from_response(text: &str) -> Option<String> {
    let cleaned = strip_think_blocks(text);

    for caps in FENCED_BLOCK.captures_iter(&cleaned) {
        let body = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        if body.starts_with('{') || body.starts_with('[') {
            return Some(body.to_string());
        }
    }

    let trimmed = cleaned.trim().trim_start_matches("```json").trim();
    if trimmed.starts_with('[') {
        if let Some(end) = trimmed.rfind(']') {
            return Some(trimmed[..=end].to_string());
        }
    }

    let start = trimmed.find('{')?;
    match trimmed.rfind('}') {
        Some(end) if end > start => Some(trimmed[start..=end].to_string()),
        _ => Some(trimmed[start..].to_string()),
    }
}

/// Everything from the first `{` or `[` onwards, once think blocks are gone.
/// `None` when there is no opener or nothing precedes it.
pub fn json_tail(text: &str) -> Option<String> {
    let cleaned = strip_think_blocks(text);
    let start = cleaned.find(|c| c == '{' || c == '[')?;
    if start == 0 && cleaned.len() == text.len() {
        return None;
    }
    Some(cleaned[start..].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_block_wins() {
        let text = "Here you go:\n```json\n{\"a\": 1}\n```\nAnything else?";
        assert_eq!(extract_json_from_response(text).as_deref(), Some("{\"a\": 1}"));
    }

    #[test]
    fn think_block_is_removed_before_brace_search() {
        let text = "<think>maybe {\"wrong\": true}</think>\n{\"right\": true}";
        assert_eq!(
            extract_json_from_response(text).as_deref(),
            Some("{\"right\": true}")
        );
    }

    #[test]
    fn unterminated_think_block_is_skipped() {
        let text = "<think>I should answer with JSON {\"enrich_type\": \"events\"}";
        assert_eq!(
            extract_json_from_response(text).as_deref(),
            Some("{\"enrich_type\": \"events\"}")
        );
    }

    #[test]
    fn prose_around_object_is_dropped() {
        let text = "Sure! {\"a\": {\"b\": 2}} Hope this helps.";
        assert_eq!(
            extract_json_from_response(text).as_deref(),
            Some("{\"a\": {\"b\": 2}}")
        );
    }

    #[test]
    fn truncated_object_returns_tail() {
        let text = "{\"a\": [1, 2";
        assert_eq!(extract_json_from_response(text).as_deref(), Some("{\"a\": [1, 2"));
    }

    #[test]
    fn no_json_at_all() {
        assert_eq!(extract_json_from_response("I cannot help with that."), None);
    }
}
