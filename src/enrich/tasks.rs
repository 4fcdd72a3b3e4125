//! Per-record LLM jobs run by the checkpointed pipeline.

use super::language::value_is_english;
use super::prompts::{
    enrichment_prompt, full_object_prompt, gemini_enrichment_prompt, price_query,
    structuring_prompt, translation_prompt,
};
use super::validate::EnrichmentSchema;
use super::{merge_enrichment, parse_object};
use crate::common::constants::TRANSLATABLE_FIELDS;
use crate::common::error::{Result, ScraperError};
use crate::common::types::{str_field, Record};
use crate::llm::Prompt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{info, warn};

/// One kind of LLM job over a record.
pub trait EnrichmentTask: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` means the record needs no model call and passes through as is.
    fn prompt(&self, record: &Record) -> Result<Option<Prompt>>;

    /// Builds the output record from the input and the model's answer.
    fn apply(&self, record: &Record, response: &str) -> Result<Record>;

    /// Stem used for the unparsable-response dump of this item.
    fn dump_name(&self, id: &str) -> String {
        id.to_string()
    }
}

enum EnrichStyle {
    Sample(Record),
    Scored,
}

/// Adds `enrich_*` fields to a record.
pub struct EnrichTask {
    style: EnrichStyle,
    schema: EnrichmentSchema,
}

impl EnrichTask {
    /// Full enrichment shaped after the `enrich_*` fields of `sample`.
    pub fn with_sample(sample: Record, schema: EnrichmentSchema) -> Self {
        Self {
            style: EnrichStyle::Sample(sample),
            schema,
        }
    }

    /// The five scored fields only.
    pub fn scored(schema: EnrichmentSchema) -> Self {
        Self {
            style: EnrichStyle::Scored,
            schema,
        }
    }
}

impl EnrichmentTask for EnrichTask {
    fn name(&self) -> &'static str {
        "enrich"
    }

    fn prompt(&self, record: &Record) -> Result<Option<Prompt>> {
        Ok(Some(match &self.style {
            EnrichStyle::Sample(sample) => enrichment_prompt(record, sample),
            EnrichStyle::Scored => gemini_enrichment_prompt(record),
        }))
    }

    fn apply(&self, record: &Record, response: &str) -> Result<Record> {
        let enrichment = parse_object(response)?;
        self.schema.validate(&enrichment)?;
        Ok(merge_enrichment(record.clone(), enrichment))
    }
}

/// Builds a whole record from a web search on the item's name and tags.
pub struct FullObjectTask {
    sample: Record,
}

pub const FULL_OBJECT_INPUT_KEY: &str = "name";
pub const FULL_OBJECT_TRACKING_KEY: &str = "cityline_name";

impl FullObjectTask {
    pub fn new(sample: Record) -> Self {
        Self { sample }
    }

    pub fn search_query(record: &Record) -> Option<String> {
        let name = str_field(record, FULL_OBJECT_INPUT_KEY)?;
        let tags: Vec<&str> = match record.get("tags") {
            Some(Value::Array(tags)) => tags.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        Some(format!("{} {}", name, tags.join(" ")).trim_end().to_string())
    }
}

impl EnrichmentTask for FullObjectTask {
    fn name(&self) -> &'static str {
        "enrich-full"
    }

    fn prompt(&self, record: &Record) -> Result<Option<Prompt>> {
        let query = Self::search_query(record)
            .ok_or_else(|| ScraperError::MissingField(FULL_OBJECT_INPUT_KEY.into()))?;
        info!("search query: {}", query);
        Ok(Some(full_object_prompt(&query, &self.sample)))
    }

    fn apply(&self, record: &Record, response: &str) -> Result<Record> {
        let mut generated = parse_object(response)?;
        if let Some(name) = record.get(FULL_OBJECT_INPUT_KEY) {
            generated.insert(FULL_OBJECT_TRACKING_KEY.into(), name.clone());
        }
        Ok(generated)
    }
}

/// Translates the free-text fields to English when any of them is not.
#[derive(Default)]
pub struct TranslateTask;

impl TranslateTask {
    pub fn needs_translation(record: &Record) -> bool {
        TRANSLATABLE_FIELDS
            .iter()
            .filter_map(|field| record.get(*field))
            .any(|value| !value_is_english(value))
    }
}

impl EnrichmentTask for TranslateTask {
    fn name(&self) -> &'static str {
        "translate"
    }

    fn prompt(&self, record: &Record) -> Result<Option<Prompt>> {
        if Self::needs_translation(record) {
            Ok(Some(translation_prompt(record)))
        } else {
            Ok(None)
        }
    }

    /// Keys the model dropped keep their original values.
    fn apply(&self, record: &Record, response: &str) -> Result<Record> {
        let translated = parse_object(response)?;
        Ok(merge_enrichment(record.clone(), translated))
    }
}

pub const STRUCTURE_URL_KEY: &str = "source_url";
pub const STRUCTURE_CONTENT_KEY: &str = "content";

/// Raw Klook page text to an `ActivityDetails` object.
pub struct StructureTask {
    type_definition: String,
    sample: Value,
}

impl StructureTask {
    pub fn new(type_definition: impl Into<String>, sample: Value) -> Self {
        Self {
            type_definition: type_definition.into(),
            sample,
        }
    }

    /// `{url: content}` scrape output as pipeline items.
    pub fn items_from_pages(pages: Map<String, Value>) -> Vec<Record> {
        pages
            .into_iter()
            .map(|(url, content)| {
                let mut item = Record::new();
                item.insert(STRUCTURE_URL_KEY.into(), Value::String(url));
                item.insert(STRUCTURE_CONTENT_KEY.into(), content);
                item
            })
            .collect()
    }
}

impl EnrichmentTask for StructureTask {
    fn name(&self) -> &'static str {
        "structure"
    }

    fn prompt(&self, record: &Record) -> Result<Option<Prompt>> {
        let url = str_field(record, STRUCTURE_URL_KEY)
            .ok_or_else(|| ScraperError::MissingField(STRUCTURE_URL_KEY.into()))?;
        let mut raw = Map::new();
        raw.insert(
            url.to_string(),
            record.get(STRUCTURE_CONTENT_KEY).cloned().unwrap_or(Value::Null),
        );
        Ok(Some(structuring_prompt(&raw, &self.type_definition, &self.sample)))
    }

    /// The page URL is written to `url` when the model left it out, so the
    /// output can be resumed against the input.
    fn apply(&self, record: &Record, response: &str) -> Result<Record> {
        let mut structured = parse_object(response)?;
        let has_url = str_field(&structured, "url").map_or(false, |u| !u.is_empty());
        if !has_url {
            if let Some(url) = record.get(STRUCTURE_URL_KEY) {
                structured.insert("url".into(), url.clone());
            }
        }
        Ok(structured)
    }

    fn dump_name(&self, id: &str) -> String {
        match id.trim_end_matches('/').rsplit('/').next() {
            Some(last) if !last.is_empty() => last.to_string(),
            _ => "unknown_activity".to_string(),
        }
    }
}

static PRICE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\${1,4}").expect("valid price regex"));

pub const PRICE_FIELD: &str = "source_pricepoint";

/// Most frequent `$`..`$$$$` run in `text`; earliest wins ties.
pub fn most_common_price(text: &str) -> Option<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (order, m) in PRICE_TOKEN.find_iter(text).enumerate() {
        counts.entry(m.as_str()).or_insert((0, order)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, fa)), (_, (cb, fb))| ca.cmp(cb).then(fb.cmp(fa)))
        .map(|(token, _)| token.to_string())
}

/// Asks for a bar's price band when it has none.
#[derive(Default)]
pub struct PriceTask;

impl EnrichmentTask for PriceTask {
    fn name(&self) -> &'static str {
        "price"
    }

    fn prompt(&self, record: &Record) -> Result<Option<Prompt>> {
        let has_price = str_field(record, PRICE_FIELD).map_or(false, |p| !p.trim().is_empty());
        if has_price {
            return Ok(None);
        }
        let name = str_field(record, "source_name").filter(|s| !s.is_empty());
        let address = str_field(record, "source_address").filter(|s| !s.is_empty());
        match (name, address) {
            (Some(name), Some(address)) => Ok(Some(price_query(name, address))),
            _ => Ok(None),
        }
    }

    fn apply(&self, record: &Record, response: &str) -> Result<Record> {
        let mut updated = record.clone();
        match most_common_price(response) {
            Some(price) => {
                updated.insert(PRICE_FIELD.into(), Value::String(price));
            }
            None => warn!("no price band in answer: {}", response.chars().take(200).collect::<String>()),
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::validate::SCORED_FIELDS;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn price_prefers_most_common_then_first_seen() {
        assert_eq!(most_common_price("It is $$ to $$$, mostly $$."), Some("$$".into()));
        assert_eq!(most_common_price("$$$ or $$"), Some("$$$".into()));
        assert_eq!(most_common_price("no idea"), None);
    }

    #[test]
    fn price_task_skips_priced_and_incomplete_bars() {
        let task = PriceTask;
        assert!(task.prompt(&record(json!({"source_pricepoint": "$$"}))).unwrap().is_none());
        assert!(task.prompt(&record(json!({"source_name": "Quinary"}))).unwrap().is_none());
        let prompt = task
            .prompt(&record(json!({"source_name": "Quinary", "source_address": "56-58 Hollywood Rd"})))
            .unwrap()
            .unwrap();
        assert!(prompt.user.contains("Quinary bar located at 56-58 Hollywood Rd"));
    }

    #[test]
    fn full_object_query_and_tracking_key() {
        let item = record(json!({"name": "Jazz Night", "tags": ["music", "live"]}));
        assert_eq!(FullObjectTask::search_query(&item).unwrap(), "Jazz Night music live");
        let bare = record(json!({"name": "Jazz Night"}));
        assert_eq!(FullObjectTask::search_query(&bare).unwrap(), "Jazz Night");

        let task = FullObjectTask::new(Record::new());
        let out = task.apply(&item, "{\"source_name\": \"Jazz Night HK\"}").unwrap();
        assert_eq!(out["cityline_name"], "Jazz Night");
        assert_eq!(out["source_name"], "Jazz Night HK");
    }

    #[test]
    fn english_records_skip_translation() {
        let english = record(json!({"source_name": "A", "source_address": "Central", "enrich_description": "Tea"}));
        assert!(TranslateTask.prompt(&english).unwrap().is_none());
        let chinese = record(json!({"source_name": "A", "source_address": "中環"}));
        assert!(TranslateTask.prompt(&chinese).unwrap().is_some());
    }

    #[test]
    fn translation_keeps_fields_the_model_dropped() {
        let item = record(json!({"cityline_name": "A", "source_address": "中環", "source_rating": 4.5}));
        let out = TranslateTask
            .apply(&item, "<think>ok</think>{\"source_address\": \"Central\"}")
            .unwrap();
        assert_eq!(out["source_address"], "Central");
        assert_eq!(out["cityline_name"], "A");
        assert_eq!(out["source_rating"], 4.5);
    }

    #[test]
    fn scored_enrichment_requires_every_field() {
        let task = EnrichTask::scored(EnrichmentSchema::scored(false));
        let item = record(json!({"source_name": "Kicho"}));
        let err = task.apply(&item, "{\"enrich_hiddenGemScore\": 80}").unwrap_err();
        assert!(matches!(err, ScraperError::Validation(_)));
        assert_eq!(SCORED_FIELDS.len(), 5);
    }

    #[test]
    fn structure_dump_name_is_last_url_segment() {
        let task = StructureTask::new("interface A {}", json!({}));
        assert_eq!(task.dump_name("https://www.klook.com/activity/123-tea/"), "123-tea");
        assert_eq!(task.dump_name(""), "unknown_activity");
    }

    #[test]
    fn structure_backfills_url() {
        let task = StructureTask::new("interface A {}", json!({}));
        let item = record(json!({"source_url": "https://k/activity/1", "content": "text"}));
        let out = task.apply(&item, "{\"title\": \"Tea\"}").unwrap();
        assert_eq!(out["url"], "https://k/activity/1");
    }
}
