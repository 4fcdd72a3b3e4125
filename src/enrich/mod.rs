//! Turning LLM answers into record fields.

pub mod language;
pub mod prompts;
pub mod tasks;
pub mod validate;

use crate::common::error::{Result, ScraperError};
use crate::common::types::{json_kind, Record};
use crate::repair::RepairEngine;
use serde_json::Value;
use tracing::debug;

pub use language::is_probably_english;
pub use tasks::{EnrichTask, EnrichmentTask, FullObjectTask, PriceTask, StructureTask, TranslateTask};
pub use validate::EnrichmentSchema;

/// Parses a model answer into a JSON object, tolerating fences, think blocks
/// and the usual syntax slips.
pub fn parse_object(response: &str) -> Result<Record> {
    let repaired = RepairEngine::for_llm_response().repair(response)?;
    debug!(strategy = ?repaired.report.strategy, "parsed model response");
    match repaired.value {
        Value::Object(map) => Ok(map),
        other => Err(ScraperError::Repair(format!(
            "expected a JSON object, model returned {}",
            json_kind(&other)
        ))),
    }
}

/// Overlays `enrichment` onto `record`; enrichment wins on shared keys.
pub fn merge_enrichment(mut record: Record, enrichment: Record) -> Record {
    for (key, value) in enrichment {
        record.insert(key, value);
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fenced_answer_with_think_block_parses() {
        let answer = "<think>scoring...</think>\n```json\n{\"enrich_type\": \"events\",}\n```";
        let parsed = parse_object(answer).unwrap();
        assert_eq!(parsed["enrich_type"], "events");
    }

    #[test]
    fn array_answer_is_rejected() {
        assert!(matches!(parse_object("[1, 2]"), Err(ScraperError::Repair(_))));
    }

    #[test]
    fn merge_is_right_biased_and_keeps_order() {
        let record = json!({"klook_id": 1, "enrich_type": "old"}).as_object().cloned().unwrap();
        let enrichment = json!({"enrich_type": "events", "enrich_description": "Tea"})
            .as_object()
            .cloned()
            .unwrap();
        let merged = merge_enrichment(record, enrichment);
        let keys: Vec<&str> = merged.keys().map(String::as_str).collect();
        assert_eq!(keys, ["klook_id", "enrich_type", "enrich_description"]);
        assert_eq!(merged["enrich_type"], "events");
    }
}
