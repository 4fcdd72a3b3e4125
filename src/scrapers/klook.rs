use super::Fetcher;
use crate::common::error::Result;
use crate::common::types::{write_json_pretty, Record};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Stored for a URL whose page could not be fetched.
pub const SCRAPE_FAILED: &str = "Failed to scrape or empty body";

static ACTIVITY_DETAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)activityDetail:(.*?),"dynamic_component""#).expect("valid activityDetail regex")
});

/// Raw text of the embedded `activityDetail` state object.
pub fn extract_activity_detail(html: &str) -> Option<&str> {
    ACTIVITY_DETAIL
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// What gets stored for one page: the extracted text as-is, `null` when
/// nothing was found. The text is JS object notation, not JSON, so it is
/// left for the structuring step to interpret.
pub fn page_value(html: &str) -> Value {
    extract_activity_detail(html).map_or(Value::Null, |text| Value::String(text.to_string()))
}

/// A URL counts as done once it holds something other than `null` or the
/// failure marker.
pub fn is_done(results: &Record, url: &str) -> bool {
    match results.get(url) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => s != SCRAPE_FAILED,
        Some(_) => true,
    }
}

/// Scrapes activity pages into a URL-keyed map, saving `output` after every
/// page so an interrupted run resumes where it stopped.
#[instrument(skip(fetcher, urls, results))]
pub async fn scrape_activity_pages(
    fetcher: &Fetcher,
    urls: &[String],
    results: &mut Record,
    output: &Path,
    delay: Duration,
) -> Result<usize> {
    let pending: Vec<&String> = urls.iter().filter(|u| !is_done(results, u)).collect();
    info!(
        "{} URLs to scrape ({} already done)",
        pending.len(),
        urls.len() - pending.len()
    );

    let mut scraped = 0;
    for (idx, url) in pending.iter().enumerate() {
        let value = match fetcher.fetch_html(url).await {
            Ok(html) if !html.trim().is_empty() => {
                scraped += 1;
                page_value(&html)
            }
            Ok(_) => Value::String(SCRAPE_FAILED.to_string()),
            Err(e) => {
                warn!("Failed to scrape {}: {}", url, e);
                Value::String(SCRAPE_FAILED.to_string())
            }
        };
        if value.is_null() {
            warn!("No activityDetail found on {}", url);
        }
        results.insert(url.to_string(), value);
        write_json_pretty(output, results)?;
        info!("Processed {}/{}", idx + 1, pending.len());

        if idx + 1 < pending.len() && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    Ok(scraped)
}
