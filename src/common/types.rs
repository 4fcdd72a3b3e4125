use crate::common::error::{Result, ScraperError};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// A venue/activity record: a flat JSON object keyed by convention.
///
/// `source_*` keys hold scraped facts, `enrich_*` keys hold LLM annotations,
/// and `klook_*` keys hold raw mapped Klook fields.
pub type Record = Map<String, Value>;

/// Returns the first usable identity among `fields`.
///
/// Non-empty strings are used as-is; numbers are rendered to strings so that
/// numeric Klook ids and string names share one identity space.
pub fn record_identity(record: &Record, fields: &[String]) -> Option<String> {
    fields.iter().find_map(|field| match record.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Reads a JSON array of objects.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let content = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    records_from_value(value)
}

pub fn records_from_value(value: Value) -> Result<Vec<Record>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(map) => Ok(map),
                other => Err(ScraperError::Validation(format!(
                    "item {} is not an object (found {})",
                    i,
                    json_kind(&other)
                ))),
            })
            .collect(),
        other => Err(ScraperError::Validation(format!(
            "expected a JSON array of objects, found {}",
            json_kind(&other)
        ))),
    }
}

pub fn save_records(path: &Path, records: &[Record]) -> Result<()> {
    write_json_pretty(path, &records)
}

/// Serializes with a four-space indent and writes via a sibling temp file
/// followed by a rename, so readers never observe a half-written file.
pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    buf.push(b'\n');

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = temp_path_for(path);
    fs::write(&tmp, &buf)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Reads a string field, treating JSON null and absence the same way.
pub fn str_field<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}
