//! Klook activity mapping: structured page data to `klook_*` records, and
//! `klook_*` records to the shared `source_*` shape.

use crate::common::constants::{HKD_CURRENCY, KLOOK_BASE_URL, KLOOK_IGNORED_BREADCRUMBS, USD_TO_HKD};
use crate::common::error::Result;
use crate::common::types::Record;
use crate::records::dedup::unique_preserving_order;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActivityDetails {
    pub id: Value,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(deserialize_with = "null_as_default")]
    pub highlights: Vec<Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub price: Price,
    #[serde(deserialize_with = "null_as_default")]
    pub location: Location,
    #[serde(deserialize_with = "null_as_default")]
    pub review: Review,
    pub no_past_participants: Value,
    #[serde(deserialize_with = "null_as_default")]
    pub images: Vec<Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub breadcrumbs: Vec<Value>,
}

/// Prices arrive as strings ("12.5") or numbers depending on the page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Price {
    pub market_price: Value,
    pub selling_price: Value,
    pub currency: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Location {
    #[serde(deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(deserialize_with = "null_as_default")]
    pub coordinates: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Review {
    pub count: Value,
    pub score: Value,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
}

fn parse_price(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Rounds half to even, the way Python's `round` does.
pub fn round_half_even(value: f64) -> f64 {
    let rounded = value.round();
    if (value - value.trunc()).abs() == 0.5 {
        2.0 * (value / 2.0).round()
    } else {
        rounded
    }
}

fn or_default(value: &Value, default: Value) -> Value {
    if value.is_null() {
        default
    } else {
        value.clone()
    }
}

pub fn map_activity(details: &ActivityDetails) -> Record {
    let tags: Vec<Value> = details
        .breadcrumbs
        .iter()
        .filter_map(|b| b.get("name").and_then(Value::as_str))
        .filter(|name| !name.is_empty() && !KLOOK_IGNORED_BREADCRUMBS.contains(name))
        .map(|name| Value::String(name.to_string()))
        .collect();

    let images: Vec<Value> = details
        .images
        .iter()
        .filter_map(|img| img.get("url"))
        .filter(|url| url.as_str().map_or(false, |s| !s.is_empty()))
        .cloned()
        .collect();

    let market = round_2dp(parse_price(&details.price.market_price) * USD_TO_HKD);
    let selling = round_2dp(parse_price(&details.price.selling_price) * USD_TO_HKD);

    let mapped = json!({
        "klook_id": details.id,
        "klook_title": details.title,
        "klook_url": details.url,
        "klook_description": details.description,
        "klook_summary": details.summary,
        "klook_highlights": details.highlights,
        "klook_price": {
            "marketPrice": market,
            "sellingPrice": selling,
            "currency": HKD_CURRENCY,
        },
        "klook_location": {
            "address": details.location.address,
            "coordinates": details.location.coordinates,
        },
        "klook_review": {
            "count": or_default(&details.review.count, json!(0)),
            "score": or_default(&details.review.score, json!(0.0)),
            "description": details.review.description,
        },
        "klook_noPastParticipants": or_default(&details.no_past_participants, json!("")),
        "klook_images": images,
        "klook_tags": tags,
    });

    match mapped {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// Maps every non-empty object in `items`. Items that are not objects or do
/// not fit `ActivityDetails` are reported by index.
pub fn map_activities(items: &[Value]) -> (Vec<Record>, Vec<(usize, String)>) {
    let mut mapped = Vec::new();
    let mut rejected = Vec::new();
    for (idx, item) in items.iter().enumerate() {
        match item {
            Value::Object(map) if map.is_empty() => continue,
            Value::Object(_) => match ActivityDetails::deserialize(item) {
                Ok(details) => mapped.push(map_activity(&details)),
                Err(e) => rejected.push((idx, e.to_string())),
            },
            Value::Null => continue,
            _ => rejected.push((idx, "not an object".to_string())),
        }
    }
    (mapped, rejected)
}

fn price_point(record: &Record) -> Value {
    match record
        .get("klook_price")
        .and_then(|p| p.get("sellingPrice"))
        .and_then(Value::as_f64)
    {
        Some(price) => {
            let rounded = (round_half_even(price / 10.0) * 10.0) as i64;
            Value::String(format!("${}", rounded))
        }
        None => Value::Null,
    }
}

pub fn transform_to_source(record: &Record) -> Record {
    let mut out = record.clone();
    let get = |key: &str| record.get(key).cloned().unwrap_or(Value::Null);

    out.insert("source_url".to_string(), get("klook_url"));
    out.insert("source_name".to_string(), get("klook_title"));
    let address = record
        .get("klook_location")
        .filter(|l| l.is_object())
        .and_then(|l| l.get("address"))
        .cloned()
        .unwrap_or(Value::Null);
    out.insert("source_address".to_string(), address);
    out.insert("source_pricePoint".to_string(), price_point(record));
    out.insert("source_savedCount".to_string(), get("klook_noPastParticipants"));
    let rating = record
        .get("klook_review")
        .filter(|r| r.is_object())
        .and_then(|r| r.get("score"))
        .cloned()
        .unwrap_or(Value::Null);
    out.insert("source_rating".to_string(), rating);
    out.insert("source_introduction".to_string(), get("klook_summary"));

    let photos: Vec<Value> = record
        .get("klook_images")
        .and_then(Value::as_array)
        .map(|images| {
            images
                .iter()
                .filter(|url| url.as_str().map_or(false, |s| s.starts_with("http")))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    out.insert("source_photoUrls".to_string(), Value::Array(photos));

    let categories = match record.get("klook_tags") {
        Some(Value::Array(tags)) => Value::String(
            tags.iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(","),
        ),
        _ => Value::Null,
    };
    out.insert("source_Categories".to_string(), categories);
    out
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityLinks {
    pub total_activity_links: usize,
    pub original_total_links: u64,
    pub filtered_activity_links: Vec<String>,
}

/// Keeps activity links, absolutizing relative `/activity…` paths.
pub fn filter_activity_links(all_links: &[String]) -> Vec<String> {
    let absolute_prefix = format!("{}/activity", KLOOK_BASE_URL);
    let filtered = all_links.iter().filter_map(|link| {
        if link.starts_with("/activity") {
            Some(format!("{}{}", KLOOK_BASE_URL, link))
        } else if link.starts_with(&absolute_prefix) {
            Some(link.clone())
        } else {
            None
        }
    });
    unique_preserving_order(filtered)
}

/// Builds the filtered-links document from a `{total_links_found, all_links}`
/// scrape result.
pub fn filter_links_document(scraped: &Value) -> Result<ActivityLinks> {
    let all_links: Vec<String> = match scraped.get("all_links") {
        Some(links) => serde_json::from_value(links.clone())?,
        None => Vec::new(),
    };
    let filtered = filter_activity_links(&all_links);
    Ok(ActivityLinks {
        total_activity_links: filtered.len(),
        original_total_links: scraped
            .get("total_links_found")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        filtered_activity_links: filtered,
    })
}
