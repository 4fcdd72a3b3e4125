//! Shape checks for LLM enrichment output.

use crate::common::constants::{BUDGET_TAGS, GROUP_TAGS, TYPE_TAGS};
use crate::common::error::{Result, ScraperError};
use crate::common::types::Record;
use jsonschema::{Draft, JSONSchema};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use tracing::warn;

pub const HIDDEN_GEM_SCORE: &str = "enrich_hiddenGemScore";
pub const TEXT_EMBEDDING: &str = "enrich_textEmbedding";
pub const TAGS_TYPE: &str = "enrich_tagsType";
pub const TAGS_BUDGET: &str = "enrich_tagsBudget";
pub const TAGS_GROUP: &str = "enrich_tagsGroup";

/// Fields a scored enrichment must carry.
pub const SCORED_FIELDS: &[&str] = &[HIDDEN_GEM_SCORE, TEXT_EMBEDDING, TAGS_TYPE, TAGS_BUDGET, TAGS_GROUP];

static SHAPE: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            HIDDEN_GEM_SCORE: {"type": "integer", "minimum": 0, "maximum": 100},
            TEXT_EMBEDDING: {"type": "string"},
            TAGS_TYPE: {"type": "object", "additionalProperties": {"type": "integer", "minimum": 0}},
            TAGS_BUDGET: {"type": "object", "additionalProperties": {"enum": [0, 1]}},
            TAGS_GROUP: {"type": "object", "additionalProperties": {"type": "integer", "minimum": 0}},
        }
    })
});

static COMPILED_SHAPE: Lazy<JSONSchema> = Lazy::new(|| {
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&SHAPE)
        .expect("enrichment schema compiles")
});

/// Required fields are always enforced. Any other violation is an error in
/// strict mode and a warning otherwise.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentSchema {
    required: Vec<String>,
    strict: bool,
}

impl EnrichmentSchema {
    pub fn new(required: &[&str], strict: bool) -> Self {
        Self {
            required: required.iter().map(|f| f.to_string()).collect(),
            strict,
        }
    }

    pub fn lenient() -> Self {
        Self::default()
    }

    pub fn scored(strict: bool) -> Self {
        Self::new(SCORED_FIELDS, strict)
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn missing_fields(&self, enrichment: &Record) -> Vec<String> {
        self.required
            .iter()
            .filter(|f| !enrichment.contains_key(f.as_str()))
            .cloned()
            .collect()
    }

    /// All shape problems, in field order.
    pub fn violations(&self, enrichment: &Record) -> Vec<String> {
        let instance = Value::Object(enrichment.clone());
        let mut problems: Vec<String> = match COMPILED_SHAPE.validate(&instance) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| format!("{} at {}", e, e.instance_path))
                .collect(),
        };
        for (field, vocabulary) in [(TAGS_TYPE, TYPE_TAGS), (TAGS_BUDGET, BUDGET_TAGS), (TAGS_GROUP, GROUP_TAGS)] {
            if let Some(Value::Object(tags)) = enrichment.get(field) {
                for key in tags.keys().filter(|k| !vocabulary.contains(&k.as_str())) {
                    problems.push(format!("{} has unknown tag '{}'", field, key));
                }
            }
        }
        for field in [TAGS_TYPE, TAGS_GROUP] {
            if let Some(sum) = integer_sum(enrichment.get(field)) {
                if sum != 100 {
                    problems.push(format!("{} sums to {}, expected 100", field, sum));
                }
            }
        }
        if let Some(Value::Object(budget)) = enrichment.get(TAGS_BUDGET) {
            let ones = budget.values().filter(|v| v.as_i64() == Some(1)).count();
            if ones != 1 {
                problems.push(format!("{} has {} categories set, expected exactly 1", TAGS_BUDGET, ones));
            }
        }
        problems
    }

    pub fn validate(&self, enrichment: &Record) -> Result<()> {
        let missing = self.missing_fields(enrichment);
        if !missing.is_empty() {
            return Err(ScraperError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let problems = self.violations(enrichment);
        if problems.is_empty() {
            return Ok(());
        }
        if self.strict {
            return Err(ScraperError::Validation(problems.join("; ")));
        }
        for problem in &problems {
            warn!("enrichment shape: {}", problem);
        }
        Ok(())
    }
}

fn integer_sum(value: Option<&Value>) -> Option<i64> {
    match value {
        Some(Value::Object(map)) => map.values().map(Value::as_i64).sum(),
        _ => None,
    }
}
