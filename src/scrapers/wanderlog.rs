//! Wanderlog place pages.
//!
//! Wanderlog list pages render client-side, so listing files arrive from
//! elsewhere; this module fills in the detail-page fields of an existing
//! `{"bars": [...]}` file.

use super::{collapse_whitespace, element_text, selector, Fetcher};
use crate::common::types::{str_field, Record};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::json;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub const NOT_RATED: &str = "Not rated";
pub const DEFAULT_SIGNATURE: &str = "Signature cocktails and drinks";

const ABOUT_SENTENCES: usize = 2;

static HEADING: Lazy<Selector> = Lazy::new(|| selector("h2"));
static RATING_ROW: Lazy<Selector> = Lazy::new(|| selector("div.d-flex.flex-wrap.align-items-center"));
static RATING_VALUE: Lazy<Selector> = Lazy::new(|| selector("span.font-weight-bold"));
static MUTED: Lazy<Selector> = Lazy::new(|| selector("span.text-muted"));
static SLIDE: Lazy<Selector> = Lazy::new(|| selector("div.slide"));
static TIP_ITEM: Lazy<Selector> = Lazy::new(|| selector("ul.fa-ul li"));

static REVIEW_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((\d+)\)").expect("valid review count regex"));

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WanderlogDetail {
    pub about: Option<String>,
    /// `"4.5 (257 reviews)"`
    pub rating: Option<String>,
    pub menu_items: Vec<String>,
    pub tips: Vec<String>,
}

impl WanderlogDetail {
    /// Writes the four `enrich_*` fields. Anything the page did not have
    /// gets stock text built from the record's name or neighbourhood.
    pub fn apply_to(&self, record: &mut Record) {
        let name = str_field(record, "source_name").unwrap_or("this bar").to_string();
        let neighbourhood = str_field(record, "source_neighbourhood")
            .filter(|n| !n.is_empty())
            .unwrap_or("Hong Kong")
            .to_string();

        let description = self
            .about
            .clone()
            .unwrap_or_else(|| format!("A popular bar in {}.", neighbourhood));
        let recognition = self.rating.clone().unwrap_or_else(|| NOT_RATED.to_string());
        let signature = if self.menu_items.is_empty() {
            DEFAULT_SIGNATURE.to_string()
        } else {
            self.menu_items.join(", ")
        };
        let tips = if self.tips.is_empty() {
            format!("Visit {} for a unique Hong Kong drinking experience.", name)
        } else {
            format!("• {}", self.tips.join("\n• "))
        };

        record.insert("enrich_description".into(), json!(description));
        record.insert("enrich_recognition".into(), json!(recognition));
        record.insert("enrich_signature".into(), json!(signature));
        record.insert("enrich_localTips".into(), json!(tips));
    }
}

/// The `h2` whose text passes `matches`, and the element holding it.
fn section<'a>(document: &'a Html, matches: impl Fn(&str) -> bool) -> Option<(ElementRef<'a>, ElementRef<'a>)> {
    document.select(&HEADING).find_map(|h2| {
        if !matches(&h2.text().collect::<String>()) {
            return None;
        }
        let parent = h2.parent().and_then(ElementRef::wrap)?;
        Some((h2, parent))
    })
}

/// The first `count` sentences, where a sentence ends in `.`, `!` or `?`
/// followed by whitespace.
pub fn first_sentences(text: &str, count: usize) -> String {
    let mut seen = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let ends_sentence = matches!(c, '.' | '!' | '?')
            && chars.peek().map_or(false, |(_, next)| next.is_whitespace());
        if ends_sentence {
            seen += 1;
            if seen == count {
                return text[..i + c.len_utf8()].to_string();
            }
        }
    }
    text.to_string()
}

fn about_from(document: &Html) -> Option<String> {
    let (heading, container) = section(document, |t| t.contains("About"))?;
    let following = heading
        .next_sibling()
        .and_then(|node| node.value().as_text().map(|t| t.trim().to_string()))
        .filter(|t| !t.is_empty());
    let text = match following {
        Some(text) => text,
        None => {
            let full = container.text().collect::<String>();
            let title = heading.text().collect::<String>();
            full.replacen(&title, "", 1)
        }
    };
    let text = collapse_whitespace(&text);
    (!text.is_empty()).then(|| first_sentences(&text, ABOUT_SENTENCES))
}

fn rating_from(document: &Html) -> Option<String> {
    let row = document.select(&RATING_ROW).next()?;
    let rating = row
        .select(&RATING_VALUE)
        .next()
        .map(|span| element_text(&span))
        .filter(|r| !r.is_empty())?;
    let reviews = row
        .select(&MUTED)
        .next()
        .and_then(|span| {
            REVIEW_COUNT
                .captures(&element_text(&span))
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        })
        .unwrap_or_else(|| "0".to_string());
    Some(format!("{} ({} reviews)", rating, reviews))
}

fn is_menu_item(text: &str) -> bool {
    !text.is_empty() && text != "Menu" && !text.contains('•')
}

fn menu_items_from(document: &Html) -> Vec<String> {
    let Some((_, container)) = section(document, |t| {
        t.contains("Menu") && t.to_lowercase().contains("popular items")
    }) else {
        return Vec::new();
    };
    let slides: Vec<ElementRef> = container.select(&SLIDE).collect();
    let spans: Vec<ElementRef> = if slides.is_empty() {
        container.select(&MUTED).collect()
    } else {
        slides.iter().flat_map(|slide| slide.select(&MUTED)).collect()
    };
    spans
        .iter()
        .map(element_text)
        .filter(|text| is_menu_item(text))
        .collect()
}

fn tips_from(document: &Html) -> Vec<String> {
    let Some((_, container)) = section(document, |t| t.contains("Know before you go")) else {
        return Vec::new();
    };
    container
        .select(&TIP_ITEM)
        .map(|li| element_text(&li))
        .filter(|tip| !tip.is_empty())
        .collect()
}

pub fn parse_detail(html: &str) -> WanderlogDetail {
    let document = Html::parse_document(html);
    WanderlogDetail {
        about: about_from(&document),
        rating: rating_from(&document),
        menu_items: menu_items_from(&document),
        tips: tips_from(&document),
    }
}

/// Fetches each record's `source_url` and merges the place page into it.
pub struct WanderlogDetails {
    fetcher: Fetcher,
    delay: Duration,
    attempts: u32,
    backoff: Duration,
}

impl WanderlogDetails {
    pub fn new(fetcher: Fetcher, delay: Duration) -> Self {
        Self {
            fetcher,
            delay,
            attempts: 3,
            backoff: Duration::from_secs(20),
        }
    }

    pub fn with_retries(mut self, attempts: u32, backoff: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.backoff = backoff;
        self
    }

    /// Annotates every record; records whose page is missing or cannot be
    /// fetched get the stock text. Returns how many pages were fetched.
    #[instrument(skip_all)]
    pub async fn annotate(&self, records: &mut [Record]) -> usize {
        let total = records.len();
        let mut fetched = 0;
        for (idx, record) in records.iter_mut().enumerate() {
            let name = str_field(record, "source_name").unwrap_or("unknown").to_string();
            info!("Processing {}/{}: {}", idx + 1, total, name);

            let url = str_field(record, "source_url")
                .filter(|u| !u.is_empty())
                .map(str::to_string);
            let detail = match &url {
                Some(url) => match self.fetcher.fetch_html_retrying(url, self.attempts, self.backoff).await {
                    Ok(html) => {
                        fetched += 1;
                        parse_detail(&html)
                    }
                    Err(e) => {
                        warn!("Error processing {}: {}", name, e);
                        WanderlogDetail::default()
                    }
                },
                None => WanderlogDetail::default(),
            };
            detail.apply_to(record);

            if url.is_some() && idx + 1 < total && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
        info!("Fetched {} of {} place pages", fetched, total);
        fetched
    }
}
