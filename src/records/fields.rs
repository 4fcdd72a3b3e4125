//! Bulk field edits over record lists. Every operation returns how many
//! records (or values) it changed.

use crate::common::constants::DEFAULT_BAR_CATEGORY;
use crate::common::types::{str_field, Record};
use serde_json::{Number, Value};

pub fn strip_prefixed(records: &mut [Record], prefix: &str) -> usize {
    let mut changed = 0;
    for record in records.iter_mut() {
        let before = record.len();
        record.retain(|key, _| !key.starts_with(prefix));
        if record.len() != before {
            changed += 1;
        }
    }
    changed
}

pub fn remove_field(records: &mut [Record], name: &str) -> usize {
    records
        .iter_mut()
        .filter_map(|record| record.remove(name))
        .count()
}

/// Multiplies numeric values of `field`; strings and other types are left
/// alone. Integers stay integers when the product is whole.
pub fn scale_numeric(records: &mut [Record], field: &str, factor: f64) -> usize {
    let mut changed = 0;
    for record in records.iter_mut() {
        let Some(Value::Number(n)) = record.get(field) else {
            continue;
        };
        let scaled = match (n.as_i64(), factor.fract() == 0.0) {
            (Some(i), true) => Value::Number(Number::from(i.saturating_mul(factor as i64))),
            _ => match n.as_f64().and_then(|f| Number::from_f64(f * factor)) {
                Some(num) => Value::Number(num),
                None => continue,
            },
        };
        record.insert(field.to_string(), scaled);
        changed += 1;
    }
    changed
}

pub fn copy_field(records: &mut [Record], from: &str, to: &str) -> usize {
    let mut changed = 0;
    for record in records.iter_mut() {
        if let Some(value) = record.get(from).cloned() {
            record.insert(to.to_string(), value);
            changed += 1;
        }
    }
    changed
}

/// Replaces `from` with `to` inside the list stored at `field`. Counts
/// replaced values, not records.
pub fn replace_list_value(records: &mut [Record], field: &str, from: &str, to: &str) -> usize {
    let mut changed = 0;
    for record in records.iter_mut() {
        if let Some(Value::Array(items)) = record.get_mut(field) {
            for item in items.iter_mut().filter(|v| v.as_str() == Some(from)) {
                *item = Value::String(to.to_string());
                changed += 1;
            }
        }
    }
    changed
}

/// Seeds `enrich_localName` and `enrich_englishName` from `source_name`.
pub fn default_names_from_source(records: &mut [Record]) -> usize {
    let mut changed = 0;
    for record in records.iter_mut() {
        if let Some(name) = record.get("source_name").cloned() {
            record.insert("enrich_localName".to_string(), name.clone());
            record.insert("enrich_englishName".to_string(), name);
            changed += 1;
        }
    }
    changed
}

fn neighbourhood_from(record: &Record) -> String {
    let address = str_field(record, "source_address").unwrap_or_default();
    let parts: Vec<&str> = address.split(',').map(str::trim).collect();
    if parts.len() >= 2 {
        return format!("{}, {}", parts[parts.len() - 2], parts[parts.len() - 1]);
    }
    str_field(record, "source_neighbourhood")
        .unwrap_or_default()
        .to_string()
}

/// Sets `enrich_type` from the first source category and
/// `enrich_neighborhood` from the tail of the address.
pub fn derive_type_and_neighbourhood(records: &mut [Record]) -> usize {
    for record in records.iter_mut() {
        let enrich_type = record
            .get("source_categories")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .cloned()
            .unwrap_or_else(|| Value::String(DEFAULT_BAR_CATEGORY.to_string()));
        let neighbourhood = neighbourhood_from(record);
        record.insert("enrich_type".to_string(), enrich_type);
        record.insert("enrich_neighborhood".to_string(), Value::String(neighbourhood));
    }
    records.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::records_from_value;
    use serde_json::json;

    #[test]
    fn strips_prefixed_keys() {
        let mut records =
            records_from_value(json!([{"klook_a": 1, "source_b": 2}, {"x": 1}])).unwrap();
        assert_eq!(strip_prefixed(&mut records, "klook_"), 1);
        assert_eq!(Value::Object(records[0].clone()), json!({"source_b": 2}));
    }

    #[test]
    fn scales_numbers_only() {
        let mut records = records_from_value(json!([
            {"enrich_hiddenGemScore": 7},
            {"enrich_hiddenGemScore": 6.5},
            {"enrich_hiddenGemScore": "8"},
            {}
        ]))
        .unwrap();
        assert_eq!(scale_numeric(&mut records, "enrich_hiddenGemScore", 10.0), 2);
        assert_eq!(records[0]["enrich_hiddenGemScore"], 70);
        assert_eq!(records[1]["enrich_hiddenGemScore"], 65.0);
        assert_eq!(records[2]["enrich_hiddenGemScore"], "8");
    }

    #[test]
    fn replaces_list_values_and_copies() {
        let mut records = records_from_value(json!([
            {"source_categories": ["Bar", "Pub", "Bar"], "enrich_neighborhood": "Central"},
            {"source_categories": []}
        ]))
        .unwrap();
        assert_eq!(
            replace_list_value(&mut records, "source_categories", "Bar", "Bars and pubs"),
            2
        );
        assert_eq!(
            records[0]["source_categories"],
            json!(["Bars and pubs", "Pub", "Bars and pubs"])
        );
        assert_eq!(
            copy_field(&mut records, "enrich_neighborhood", "source_neighbourhood"),
            1
        );
        assert_eq!(records[0]["source_neighbourhood"], "Central");
        assert_eq!(remove_field(&mut records, "source_neighbourhood"), 1);
    }

    #[test]
    fn derives_type_and_neighbourhood() {
        let mut records = records_from_value(json!([
            {"source_categories": ["Cocktail bar"], "source_address": "G/F, 12 Ship St, Wan Chai, Hong Kong"},
            {"source_address": "", "source_neighbourhood": "Soho"},
            {"source_name": "Quinary"},
            {"source_address": "Shop 3 Pier 7"}
        ]))
        .unwrap();
        assert_eq!(derive_type_and_neighbourhood(&mut records), 4);
        assert_eq!(records[0]["enrich_type"], "Cocktail bar");
        assert_eq!(records[0]["enrich_neighborhood"], "Wan Chai, Hong Kong");
        assert_eq!(records[1]["enrich_type"], "Bars and pubs");
        assert_eq!(records[1]["enrich_neighborhood"], "Soho");
        assert_eq!(records[2]["enrich_neighborhood"], "");
        assert_eq!(records[3]["enrich_neighborhood"], "");

        assert_eq!(default_names_from_source(&mut records), 1);
        assert_eq!(records[2]["enrich_englishName"], "Quinary");
    }
}
