use crate::common::constants::FALLBACK_ADDRESS;
use crate::common::types::Record;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static COORDINATES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\s*,\s*)?(-?\d{1,3}\.\d+,-?\d{1,3}\.\d+)\s*").expect("valid coordinate regex")
});

/// Normalizes a single address against its coordinate string.
pub fn clean_address(address: &str, coordinates: Option<&str>) -> String {
    if address.is_empty() {
        return FALLBACK_ADDRESS.to_string();
    }
    if let Some(coordinates) = coordinates {
        if address.trim() == coordinates.trim() {
            return FALLBACK_ADDRESS.to_string();
        }
    }
    let stripped = COORDINATES.replace_all(address, "");
    let stripped = stripped.trim_matches(|c: char| c == ' ' || c == ',');
    if stripped.is_empty() {
        FALLBACK_ADDRESS.to_string()
    } else {
        stripped.to_string()
    }
}

/// Rewrites `klook_location.address` on every record that has a location
/// object. Returns how many addresses changed.
pub fn clean_location(records: &mut [Record]) -> usize {
    let mut changed = 0;
    for record in records.iter_mut() {
        let Some(Value::Object(location)) = record.get_mut("klook_location") else {
            continue;
        };
        let address = match location.get("address") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(_) => continue,
        };
        let coordinates = location.get("coordinates").and_then(Value::as_str);
        let cleaned = clean_address(&address, coordinates);
        if cleaned != address {
            changed += 1;
        }
        location.insert("address".to_string(), Value::String(cleaned));
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn addresses_are_normalized() {
        assert_eq!(clean_address("", None), "Hong Kong");
        assert_eq!(
            clean_address(" 22.28,114.15 ", Some("22.28,114.15")),
            "Hong Kong"
        );
        assert_eq!(
            clean_address("1 Peak Road, 22.271,114.149", Some("22.271,114.149")),
            "1 Peak Road"
        );
        assert_eq!(clean_address("22.1,114.2", None), "Hong Kong");
        assert_eq!(clean_address("Central Pier 7", None), "Central Pier 7");
    }

    #[test]
    fn only_location_objects_are_touched() {
        let mut records = crate::common::types::records_from_value(json!([
            {"klook_location": {"address": "", "coordinates": ""}},
            {"klook_location": "not an object"},
            {"klook_location": {"address": "Tsim Sha Tsui,", "coordinates": "1.0,2.0"}}
        ]))
        .unwrap();
        assert_eq!(clean_location(&mut records), 2);
        assert_eq!(records[0]["klook_location"]["address"], "Hong Kong");
        assert_eq!(records[1]["klook_location"], "not an object");
        assert_eq!(records[2]["klook_location"]["address"], "Tsim Sha Tsui");
    }
}
