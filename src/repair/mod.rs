//! JSON repair engine.
//!
//! One ordered chain of strategies over one string-aware scanner. Each
//! strategy is tried only when every cheaper one has failed, and the report
//! says which one produced the document.

pub mod lenient;
pub mod response;
pub mod scanner;

use crate::common::error::{Result, ScraperError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

pub use lenient::{close_truncated, lenient_fixups};
pub use response::{extract_json_from_response, json_tail, strip_think_blocks};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Strict,
    ResponseExtraction,
    Lenient,
    CloseTruncated,
    ObjectSalvage,
    KeyedSalvage,
}

#[derive(Debug, Clone, Serialize)]
pub struct DroppedFragment {
    pub offset: usize,
    pub reason: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    pub strategy: Strategy,
    /// Nested record arrays inlined into their parent array.
    pub flattened: usize,
    /// Objects recovered by a salvage strategy.
    pub recovered: usize,
    pub dropped: Vec<DroppedFragment>,
}

impl RepairReport {
    fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            flattened: 0,
            recovered: 0,
            dropped: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Repaired {
    pub value: Value,
    pub report: RepairReport,
}

#[derive(Debug, Clone)]
pub struct RepairEngine {
    flatten_nested: bool,
    salvage: bool,
}

impl Default for RepairEngine {
    fn default() -> Self {
        Self {
            flatten_nested: true,
            salvage: true,
        }
    }
}

impl RepairEngine {
    /// Engine for scraped listing files: flattens nested record arrays and
    /// salvages individual objects as a last resort.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine for a single LLM answer: no flattening, no salvage, since a
    /// partial object list is never a valid enrichment.
    pub fn for_llm_response() -> Self {
        Self {
            flatten_nested: false,
            salvage: false,
        }
    }

    pub fn with_flatten(mut self, flatten: bool) -> Self {
        self.flatten_nested = flatten;
        self
    }

    pub fn repair(&self, text: &str) -> Result<Repaired> {
        let strict_err = match serde_json::from_str::<Value>(text) {
            Ok(value) => return Ok(self.finish(value, RepairReport::new(Strategy::Strict))),
            Err(e) => e,
        };
        debug!("strict parse failed: {}", strict_err);

        // Longest first: a truncated document's last closer usually belongs to
        // an earlier nested value, so a shorter slice loses everything after it.
        let mut candidates: Vec<String> = vec![text.to_string()];
        if let Some(tail) = json_tail(text) {
            candidates.push(tail);
        }
        if let Some(extracted) = extract_json_from_response(text) {
            if let Ok(value) = serde_json::from_str::<Value>(&extracted) {
                return Ok(self.finish(value, RepairReport::new(Strategy::ResponseExtraction)));
            }
            candidates.push(extracted);
        }
        candidates.sort_by(|a, b| b.len().cmp(&a.len()));
        candidates.dedup();

        let fixed: Vec<String> = candidates.iter().map(|c| lenient_fixups(c)).collect();
        for candidate in &fixed {
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                return Ok(self.finish(value, RepairReport::new(Strategy::Lenient)));
            }
        }
        for candidate in &fixed {
            if let Ok(value) = serde_json::from_str::<Value>(&close_truncated(candidate)) {
                return Ok(self.finish(value, RepairReport::new(Strategy::CloseTruncated)));
            }
        }

        if self.salvage {
            let mut report = RepairReport::new(Strategy::ObjectSalvage);
            let objects = salvage_objects(text, &mut report);
            if !objects.is_empty() {
                report.recovered = objects.len();
                info!(
                    "salvaged {} objects ({} dropped)",
                    report.recovered,
                    report.dropped.len()
                );
                return Ok(Repaired {
                    value: Value::Array(objects),
                    report,
                });
            }
        }

        Err(ScraperError::Repair(format!(
            "no strategy produced valid JSON (strict parse: {})",
            strict_err
        )))
    }

    /// Repairs a listing container shaped `{"source_url": …, "<list_key>": […]}`.
    ///
    /// Entries that are themselves containers (they carry their own
    /// `list_key` array) are replaced by their children. When the document
    /// cannot be parsed at all, the container is rebuilt from the first
    /// `source_url` and every salvageable entry.
    pub fn repair_listing(&self, text: &str, list_key: &str) -> Result<Repaired> {
        let mut salvaged = None;
        if let Ok(mut repaired) = self.repair(text) {
            if let Value::Object(map) = &mut repaired.value {
                if let Some(Value::Array(items)) = map.remove(list_key) {
                    let mut hoisted = 0;
                    let flat = hoist_nested_entries(items, list_key, &mut hoisted);
                    repaired.report.flattened += hoisted;
                    map.insert(list_key.to_string(), Value::Array(flat));
                    return Ok(repaired);
                }
            }
            if repaired.report.strategy != Strategy::ObjectSalvage {
                return Ok(repaired);
            }
            salvaged = Some(repaired);
        }

        let mut report = RepairReport::new(Strategy::KeyedSalvage);
        let entries = salvage_keyed_entries(text, "source_url", &mut report);
        if entries.is_empty() {
            return salvaged.ok_or_else(|| {
                ScraperError::Repair(format!("no '{}' entries could be salvaged", list_key))
            });
        }
        report.recovered = entries.len();

        let mut container = Map::new();
        container.insert(
            "source_url".to_string(),
            Value::String(first_source_url(text).unwrap_or_default()),
        );
        container.insert(list_key.to_string(), Value::Array(entries));
        Ok(Repaired {
            value: Value::Object(container),
            report,
        })
    }

    fn finish(&self, value: Value, mut report: RepairReport) -> Repaired {
        let value = if self.flatten_nested {
            let (value, flattened) = flatten_nested_arrays(value);
            report.flattened = flattened;
            value
        } else {
            value
        };
        Repaired { value, report }
    }
}

/// Inlines record arrays nested inside a top-level array, at any depth.
/// Returns the new value and the number of arrays inlined.
pub fn flatten_nested_arrays(value: Value) -> (Value, usize) {
    match value {
        Value::Array(items) => {
            let mut flattened = 0;
            let mut out = Vec::with_capacity(items.len());
            push_flattened(items, &mut out, &mut flattened);
            (Value::Array(out), flattened)
        }
        other => (other, 0),
    }
}

fn push_flattened(items: Vec<Value>, out: &mut Vec<Value>, flattened: &mut usize) {
    for item in items {
        match item {
            Value::Array(inner) if !inner.is_empty() && inner.iter().all(is_record_like) => {
                *flattened += 1;
                push_flattened(inner, out, flattened);
            }
            other => out.push(other),
        }
    }
}

fn is_record_like(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

fn hoist_nested_entries(items: Vec<Value>, list_key: &str, hoisted: &mut usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Object(mut map) if map.get(list_key).map_or(false, Value::is_array) => {
                *hoisted += 1;
                if let Some(Value::Array(children)) = map.remove(list_key) {
                    out.extend(hoist_nested_entries(children, list_key, hoisted));
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn parse_fragment(fragment: &str) -> std::result::Result<Value, String> {
    serde_json::from_str::<Value>(fragment)
        .or_else(|_| serde_json::from_str::<Value>(&lenient_fixups(fragment)))
        .or_else(|_| serde_json::from_str::<Value>(&close_truncated(&lenient_fixups(fragment))))
        .map_err(|e| e.to_string())
}

fn snippet(text: &str) -> String {
    text.chars().take(100).collect()
}

/// Collects every record object (an object whose enclosing containers are
/// all arrays) that parses on its own, strictly or leniently. A trailing
/// unterminated object is closed and kept if it parses.
pub fn salvage_objects(text: &str, report: &mut RepairReport) -> Vec<Value> {
    let spans = scanner::record_object_spans(text);
    let mut objects = Vec::new();

    let mut fragments: Vec<(usize, &str)> = spans
        .complete
        .iter()
        .map(|(start, end)| (*start, &text[*start..=*end]))
        .collect();
    if let Some(start) = spans.truncated_start {
        fragments.push((start, &text[start..]));
    }

    for (offset, fragment) in fragments {
        match parse_fragment(fragment) {
            Ok(value @ Value::Object(_)) => objects.push(value),
            Ok(_) => report.dropped.push(DroppedFragment {
                offset,
                reason: "not an object".to_string(),
                snippet: snippet(fragment),
            }),
            Err(e) => {
                warn!("dropping unparsable object at offset {}: {}", offset, e);
                report.dropped.push(DroppedFragment {
                    offset,
                    reason: e,
                    snippet: snippet(fragment),
                });
            }
        }
    }
    objects
}

/// Salvages entries that start with `{"<key>": …`, one per occurrence.
///
/// An unbalanced occurrence whose innermost open container at the start of
/// the next occurrence is an array is a container of entries and is skipped;
/// its children are picked up as their own occurrences. The last occurrence
/// is always treated as a truncated entry.
pub fn salvage_keyed_entries(text: &str, key: &str, report: &mut RepairReport) -> Vec<Value> {
    let pattern = format!(r#"\{{\s*"{}"\s*:"#, regex::escape(key));
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(_) => return Vec::new(),
    };
    let starts: Vec<usize> = re.find_iter(text).map(|m| m.start()).collect();
    let mut entries = Vec::new();

    for (idx, start) in starts.iter().enumerate() {
        let limit = starts.get(idx + 1).copied().unwrap_or(text.len());
        let slice = &text[*start..limit];

        let fragment = match scanner::balanced_end(slice, 0) {
            Some(end) => slice[..=end].to_string(),
            None => {
                let mut state = scanner::ScanState::new();
                for b in slice.as_bytes() {
                    state.feed(*b);
                }
                let has_next = idx + 1 < starts.len();
                if has_next && state.innermost() == Some(b'[') && !state.in_string {
                    debug!("skipping container entry at offset {}", start);
                    continue;
                }
                slice.trim_end().trim_end_matches(',').to_string()
            }
        };

        match parse_fragment(&fragment) {
            Ok(value @ Value::Object(_)) => entries.push(value),
            Ok(_) => {}
            Err(e) => report.dropped.push(DroppedFragment {
                offset: *start,
                reason: e,
                snippet: snippet(&fragment),
            }),
        }
    }
    entries
}

static SOURCE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""source_url"\s*:\s*"([^"]+)""#).expect("valid source_url regex"));

fn first_source_url(text: &str) -> Option<String> {
    SOURCE_URL
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_json_is_untouched() {
        let repaired = RepairEngine::new().repair(r#"[{"a": 1}, {"b": 2}]"#).unwrap();
        assert_eq!(repaired.report.strategy, Strategy::Strict);
        assert_eq!(repaired.value, json!([{"a": 1}, {"b": 2}]));
    }

    #[test]
    fn nested_array_is_inlined_into_parent() {
        let text = r#"[{"n": 1}, {"n": 2}, [{"n": 3}, {"n": 4}]]"#;
        let repaired = RepairEngine::new().repair(text).unwrap();
        assert_eq!(repaired.report.flattened, 1);
        assert_eq!(
            repaired.value,
            json!([{"n": 1}, {"n": 2}, {"n": 3}, {"n": 4}])
        );
    }

    #[test]
    fn llm_engine_keeps_nested_arrays() {
        let text = r#"[[{"n": 1}]]"#;
        let repaired = RepairEngine::for_llm_response().repair(text).unwrap();
        assert_eq!(repaired.value, json!([[{"n": 1}]]));
    }

    #[test]
    fn truncated_listing_is_closed() {
        let text = "[\n  {\"n\": 1},\n  [\n    {\"n\": 2},\n    {\"n\": 3}";
        let repaired = RepairEngine::new().repair(text).unwrap();
        assert_eq!(repaired.report.strategy, Strategy::CloseTruncated);
        assert_eq!(repaired.value, json!([{"n": 1}, {"n": 2}, {"n": 3}]));
    }

    #[test]
    fn truncation_after_a_nested_array_keeps_later_records() {
        let text = r#"[{"n": 1, "tags": ["a"]}, {"n": 2}, {"n": 3, "note": "cut"#;
        let repaired = RepairEngine::new().repair(text).unwrap();
        assert_eq!(repaired.report.strategy, Strategy::CloseTruncated);
        assert_eq!(
            repaired.value,
            json!([{"n": 1, "tags": ["a"]}, {"n": 2}, {"n": 3, "note": "cut"}])
        );
    }

    #[test]
    fn truncated_answer_keeps_fields_after_nested_object() {
        let text = r#"{"enrich_tagsType": {"Food": 50}, "enrich_type": "events", "enrich_description": "A rooftop"#;
        let repaired = RepairEngine::for_llm_response().repair(text).unwrap();
        assert_eq!(repaired.report.strategy, Strategy::CloseTruncated);
        assert_eq!(
            repaired.value,
            json!({
                "enrich_tagsType": {"Food": 50},
                "enrich_type": "events",
                "enrich_description": "A rooftop"
            })
        );
    }

    #[test]
    fn truncated_answer_behind_prose_is_closed() {
        let text = r#"Sure, here it is: {"enrich_tagsType": {"Bar": 90}, "enrich_type": "bars"#;
        let repaired = RepairEngine::for_llm_response().repair(text).unwrap();
        assert_eq!(
            repaired.value,
            json!({"enrich_tagsType": {"Bar": 90}, "enrich_type": "bars"})
        );
    }

    #[test]
    fn answer_cut_inside_a_key_drops_the_key() {
        let text = r#"{"enrich_type": "events", "enrich_desc"#;
        let repaired = RepairEngine::for_llm_response().repair(text).unwrap();
        assert_eq!(repaired.value, json!({"enrich_type": "events"}));
    }

    #[test]
    fn salvage_drops_only_the_broken_object() {
        let text = r#"[{"n": 1}, {"n": 2 "oops": }, {"n": 3}] trailing garbage ]]"#;
        let repaired = RepairEngine::new().repair(text).unwrap();
        assert_eq!(repaired.report.strategy, Strategy::ObjectSalvage);
        assert_eq!(repaired.value, json!([{"n": 1}, {"n": 3}]));
        assert_eq!(repaired.report.dropped.len(), 1);
    }

    #[test]
    fn llm_engine_does_not_salvage() {
        let err = RepairEngine::for_llm_response()
            .repair("no json here at all")
            .unwrap_err();
        assert!(matches!(err, ScraperError::Repair(_)));
    }

    #[test]
    fn listing_with_nested_container_is_hoisted() {
        let text = r#"{"source_url": "https://wanderlog.com/list/1", "bars": [
            {"source_url": "https://a", "source_name": "A"},
            {"source_url": "https://wanderlog.com/list/1", "bars": [
                {"source_url": "https://b", "source_name": "B"}
            ]}
        ]}"#;
        let repaired = RepairEngine::new().repair_listing(text, "bars").unwrap();
        let bars = repaired.value["bars"].as_array().unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1]["source_name"], "B");
        assert_eq!(repaired.report.flattened, 1);
    }

    #[test]
    fn broken_listing_is_rebuilt_from_keyed_entries() {
        let text = r#"{"source_url": "https://wanderlog.com/list/685", "bars": [
            {"source_url": "https://a", "source_name": "A",},
            {"source_url": "https://b", "source_name": "B" "rating": 4.5},
            {"source_url": "https://c", "source_name": "C", "tags": ["rooftop""#;
        let repaired = RepairEngine::new().repair_listing(text, "bars").unwrap();
        assert_eq!(repaired.report.strategy, Strategy::KeyedSalvage);
        assert_eq!(
            repaired.value["source_url"],
            "https://wanderlog.com/list/685"
        );
        let names: Vec<&str> = repaired.value["bars"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["source_name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["A", "C"]);
        assert_eq!(repaired.report.dropped.len(), 1);
    }
}
