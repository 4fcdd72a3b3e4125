use super::{collapse_whitespace, element_text, selector, Fetcher, VenueSource};
use crate::common::constants::EVENTBRITE_SOURCE;
use crate::common::error::Result;
use crate::common::types::Record;
use crate::pipeline::checkpoint::CheckpointStore;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, instrument, warn};

static HERO_IMAGE: Lazy<Selector> = Lazy::new(|| selector(r#"img[data-testid="hero-img"]"#));
static GALLERY_IMAGE: Lazy<Selector> = Lazy::new(|| selector("img.eds-max-img"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("h1.event-title"));
static SUMMARY: Lazy<Selector> = Lazy::new(|| selector("p.summary strong"));
static ORGANIZER: Lazy<Selector> =
    Lazy::new(|| selector("strong.organizer-listing-info-variant-b__name-link"));
static DATE_CARD_TIME: Lazy<Selector> =
    Lazy::new(|| selector("div.DateCard-module__root___28_4K time[datetime]"));
static FULL_DATETIME: Lazy<Selector> = Lazy::new(|| selector("span.date-info__full-datetime"));
static JSON_LD: Lazy<Selector> = Lazy::new(|| selector(r#"script[type="application/ld+json"]"#));
static DESCRIPTION: Lazy<Selector> = Lazy::new(|| selector("div.eds-text--left"));
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| selector("p"));

/// First JSON-LD block that describes an event location with an address.
fn event_json_ld(document: &Html) -> Option<Value> {
    document.select(&JSON_LD).find_map(|script| {
        let data: Value = serde_json::from_str(&script.text().collect::<String>()).ok()?;
        data.get("location")?.get("address")?;
        Some(data)
    })
}

fn venue_from(json_ld: &Value) -> Option<String> {
    let location = json_ld.get("location")?;
    let name = location.get("name").and_then(Value::as_str).unwrap_or_default();
    let address = location.get("address")?;
    let parts: Vec<&str> = ["streetAddress", "addressLocality", "addressRegion"]
        .iter()
        .filter_map(|key| address.get(*key).and_then(Value::as_str))
        .filter(|part| !part.is_empty())
        .collect();
    Some(format!("{}, {}", name, parts.join(", ")))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn price_from(json_ld: &Value) -> Option<String> {
    json_ld
        .get("offers")?
        .as_array()?
        .iter()
        .find_map(|offer| match (offer.get("price"), offer.get("priceCurrency")) {
            (Some(price), Some(currency)) => {
                Some(format!("{} {}", scalar_text(price), scalar_text(currency)))
            }
            _ => None,
        })
}

/// Parses an Eventbrite event page. Missing parts come back as `null` (or
/// empty lists); `url` falls back to the page that was fetched.
pub fn parse_event_page(html: &str, fallback_url: &str) -> Record {
    let document = Html::parse_document(html);

    let mut images: Vec<String> = document
        .select(&HERO_IMAGE)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(str::to_string)
        .into_iter()
        .collect();
    images.extend(
        document
            .select(&GALLERY_IMAGE)
            .filter_map(|img| img.value().attr("src"))
            .map(str::to_string),
    );

    let first_text = |sel: &Selector| {
        document
            .select(sel)
            .next()
            .map(|el| element_text(&el))
    };

    let mut dates: Vec<String> = document
        .select(&DATE_CARD_TIME)
        .filter_map(|t| t.value().attr("datetime"))
        .map(str::to_string)
        .collect();
    if dates.is_empty() {
        dates = document
            .select(&FULL_DATETIME)
            .map(|span| span.text().collect::<String>().trim().to_string())
            .collect();
    }

    let description = document.select(&DESCRIPTION).next().map(|div| {
        div.select(&PARAGRAPH)
            .map(|p| collapse_whitespace(&p.text().collect::<String>()))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    });

    let json_ld = event_json_ld(&document);
    let venue = json_ld.as_ref().and_then(venue_from);
    let price = json_ld.as_ref().and_then(price_from);
    let url = json_ld
        .as_ref()
        .and_then(|j| j.get("url"))
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
        .unwrap_or(fallback_url)
        .to_string();

    let record = json!({
        "imagesUrls": images,
        "title": first_text(&TITLE),
        "summary": first_text(&SUMMARY),
        "organizer": first_text(&ORGANIZER),
        "datesAndTimes": dates,
        "venue": venue,
        "description": description,
        "price": price,
        "url": url,
    });
    match record {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// Event pages from a fixed list of links.
pub struct EventbriteSource {
    fetcher: Fetcher,
    links: Vec<String>,
    delay: Duration,
}

impl EventbriteSource {
    pub fn new(fetcher: Fetcher, links: Vec<String>, delay: Duration) -> Self {
        Self {
            fetcher,
            links,
            delay,
        }
    }

    async fn scrape_one(&self, link: &str) -> Result<Record> {
        let html = self.fetcher.fetch_html(link).await?;
        Ok(parse_event_page(&html, link))
    }

    /// Scrapes every link not already in `store`, checkpointing after each
    /// event. Returns the number of new events.
    #[instrument(skip(self, store))]
    pub async fn scrape_into(&self, store: &mut CheckpointStore) -> Result<usize> {
        let mut scraped = 0;
        for link in &self.links {
            if store.contains(link) {
                continue;
            }
            match self.scrape_one(link).await {
                Ok(record) => {
                    store.append(record)?;
                    store.mark(link.clone());
                    scraped += 1;
                    info!("Scraped: {}", link);
                }
                Err(e) => warn!("Error scraping {}: {}", link, e),
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
        info!("Done. {} events in {}", store.len(), store.path().display());
        Ok(scraped)
    }
}

#[async_trait::async_trait]
impl VenueSource for EventbriteSource {
    fn source_name(&self) -> &'static str {
        EVENTBRITE_SOURCE
    }

    async fn fetch_listing(&self) -> Result<Vec<Record>> {
        let mut events = Vec::new();
        for link in &self.links {
            match self.scrape_one(link).await {
                Ok(record) => events.push(record),
                Err(e) => warn!("Error scraping {}: {}", link, e),
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head>
        <script type="application/ld+json">{"@type": "Organization"}</script>
        <script type="application/ld+json">{
            "url": "https://www.eventbrite.hk/e/jazz-night-1",
            "location": {"name": "The Fringe", "address": {
                "streetAddress": "2 Lower Albert Rd", "addressLocality": "Central", "addressRegion": ""}},
            "offers": [{"name": "free"}, {"price": "150.00", "priceCurrency": "HKD"}]
        }</script></head><body>
        <img data-testid="hero-img" src="https://img/hero.jpg">
        <img class="eds-max-img" src="https://img/2.jpg">
        <h1 class="event-title">  Jazz
            Night </h1>
        <p class="summary"><strong>Live   music</strong></p>
        <strong class="organizer-listing-info-variant-b__name-link">Fringe Club</strong>
        <span class="date-info__full-datetime"> Fri, 1 Nov 2024 </span>
        <div class="eds-text--left"><p>Doors at 8.</p><p>  </p><p>Bring   friends.</p></div>
    </body></html>"#;

    #[test]
    fn event_page_is_parsed() {
        let record = parse_event_page(PAGE, "https://fallback");
        assert_eq!(
            record["imagesUrls"],
            json!(["https://img/hero.jpg", "https://img/2.jpg"])
        );
        assert_eq!(record["title"], "Jazz Night");
        assert_eq!(record["summary"], "Live music");
        assert_eq!(record["organizer"], "Fringe Club");
        assert_eq!(record["datesAndTimes"], json!(["Fri, 1 Nov 2024"]));
        assert_eq!(record["venue"], "The Fringe, 2 Lower Albert Rd, Central");
        assert_eq!(record["description"], "Doors at 8. Bring friends.");
        assert_eq!(record["price"], "150.00 HKD");
        assert_eq!(record["url"], "https://www.eventbrite.hk/e/jazz-night-1");
    }

    #[test]
    fn bare_page_falls_back() {
        let record = parse_event_page("<html><body></body></html>", "https://fallback");
        assert_eq!(record["title"], Value::Null);
        assert_eq!(record["venue"], Value::Null);
        assert_eq!(record["datesAndTimes"], json!([]));
        assert_eq!(record["url"], "https://fallback");
    }
}
