use super::{absolutize, collapse_whitespace, element_text, find_by_name, selector, Fetcher, VenueSource};
use crate::common::constants::{TIMEOUT_BARS_URL, TIMEOUT_BASE_URL, TIMEOUT_SOURCE};
use crate::common::error::Result;
use crate::common::types::{str_field, Record};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, instrument, warn};

static ZONE_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"h2[data-testid="zone-title_testID"]"#));
static ARTICLE: Lazy<Selector> = Lazy::new(|| selector("article"));
static TILE_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"h3[data-testid="tile-title_testID"]"#));
static TILE_IMAGE: Lazy<Selector> = Lazy::new(|| selector(r#"img[data-testid="responsive-image_testID"]"#));
static LINK: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static DETAILS: Lazy<Selector> = Lazy::new(|| selector(r#"div[class*="_details_"]"#));
static TERM: Lazy<Selector> = Lazy::new(|| selector("dt"));
static TAG: Lazy<Selector> = Lazy::new(|| selector(r#"li[class*="_tag_"]"#));
static DETAIL_IMAGE: Lazy<Selector> = Lazy::new(|| selector(r#"img[class*="_image_"]"#));
static ARTICLE_HEADING: Lazy<Selector> = Lazy::new(|| selector("h1, h2, h3"));
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| selector("p"));
static REGULAR_WEIGHT: Lazy<Selector> = Lazy::new(|| selector(r#"span[style*="font-weight: 400"]"#));
static SUMMARY: Lazy<Selector> = Lazy::new(|| selector(r#"div[data-testid="summary_testID"]"#));
static H3: Lazy<Selector> = Lazy::new(|| selector("h3"));
static STYLED_AWARDS_HEADING: Lazy<Selector> =
    Lazy::new(|| selector(r#"h3[class*="xs-text-3"][style*="border-top: 4px solid #000000"]"#));
static AWARD_ITEM: Lazy<Selector> = Lazy::new(|| selector("p, li"));

static LEADING_RANK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+\.").expect("valid rank regex"));
static PRICE_SYMBOLS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[$£€¥]{1,4}").expect("valid price regex"));

const TIP_MARKER: &str = "Time Out tip:";
const SUMMARY_MARKER: &str = "What is it?";
const AWARDS_HEADING: &str = "Time Out Awards";

/// One tile from the listing page and the detail page it links to.
#[derive(Debug, Clone)]
pub struct ListingEntry {
    pub record: Record,
    pub detail_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeoutDetail {
    pub address: Option<String>,
    pub neighbourhood: Option<String>,
    pub photo_urls: Vec<String>,
    pub price_point: Option<String>,
    pub awards: Vec<String>,
}

impl TimeoutDetail {
    pub fn apply_to(&self, record: &mut Record) {
        record.insert("enrich_recognition".into(), json!(self.awards));
        if let Some(address) = &self.address {
            record.insert("source_address".into(), json!(address));
        }
        if let Some(neighbourhood) = &self.neighbourhood {
            record.insert("source_neighbourhood".into(), json!(neighbourhood));
        }
        if let Some(price) = &self.price_point {
            record.insert("source_pricepoint".into(), json!(price));
        }
        if let Some(Value::Array(photos)) = record.get_mut("source_photoUrls") {
            for url in &self.photo_urls {
                let value = json!(url);
                if !photos.contains(&value) {
                    photos.push(value);
                }
            }
        }
    }
}

fn listing_section<'a>(document: &'a Html) -> Option<ElementRef<'a>> {
    let heading = document.select(&ZONE_TITLE).next()?;
    heading
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "section")
}

/// Parses the ranked tiles of a TimeOut "best of" page. Tiles without a
/// title are dropped.
pub fn parse_listing(html: &str, page_url: &str) -> Vec<ListingEntry> {
    let document = Html::parse_document(html);
    let Some(section) = listing_section(&document) else {
        warn!("No listing section found; the page structure might have changed");
        return Vec::new();
    };

    section
        .select(&ARTICLE)
        .filter_map(|tile| {
            let title = tile.select(&TILE_TITLE).next()?;
            let name = LEADING_RANK
                .replace(&title.text().collect::<String>(), "")
                .trim()
                .to_string();
            let photos: Vec<String> = tile
                .select(&TILE_IMAGE)
                .next()
                .and_then(|img| img.value().attr("src"))
                .map(str::to_string)
                .into_iter()
                .collect();
            let detail_url = tile
                .select(&LINK)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(|href| absolutize(TIMEOUT_BASE_URL, href));

            let record = json!({
                "source_url": page_url,
                "source_name": name,
                "source_address": "",
                "source_neighbourhood": "",
                "source_pricepoint": "",
                "source_photoUrls": photos,
                "source_categories": ["Bar"],
                "name": name,
            });
            match record {
                Value::Object(record) => Some(ListingEntry { record, detail_url }),
                _ => None,
            }
        })
        .collect()
}

fn address_from(document: &Html) -> Option<String> {
    let details = document.select(&DETAILS).next()?;
    let term = details
        .select(&TERM)
        .find(|dt| dt.text().collect::<String>().trim() == "Address")?;
    let parts: Vec<String> = term
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "dd")
        .map(|dd| dd.text().collect::<String>().trim().to_string())
        .collect();
    Some(parts.join(", "))
}

/// A short tag without digits is taken as the neighbourhood.
fn neighbourhood_from(document: &Html) -> Option<String> {
    document
        .select(&TAG)
        .map(|li| element_text(&li))
        .find(|text| {
            !text.is_empty()
                && text.split_whitespace().count() <= 3
                && !text.chars().any(|c| c.is_ascii_digit())
        })
}

fn price_from(document: &Html) -> Option<String> {
    document.root_element().descendants().find_map(|node| {
        let Node::Text(text) = node.value() else {
            return None;
        };
        let in_code = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| matches!(e.name(), "script" | "style")))
            .unwrap_or(false);
        if in_code {
            return None;
        }
        PRICE_SYMBOLS.find(text).map(|m| m.as_str().to_string())
    })
}

/// Paragraphs and list items under the "Time Out Awards" heading, up to
/// the next heading. When the heading has no such siblings, every `p`/`li`
/// in its enclosing `div` is taken instead.
fn awards_from(document: &Html) -> Vec<String> {
    let heading = document
        .select(&H3)
        .find(|h3| h3.text().collect::<String>().contains(AWARDS_HEADING))
        .or_else(|| document.select(&STYLED_AWARDS_HEADING).next());
    let Some(heading) = heading else {
        return Vec::new();
    };

    let mut awards: Vec<String> = heading
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .take_while(|el| !matches!(el.value().name(), "h2" | "h3"))
        .filter(|el| matches!(el.value().name(), "p" | "li"))
        .map(|el| element_text(&el))
        .filter(|award| !award.is_empty())
        .collect();
    if awards.is_empty() {
        if let Some(container) = heading
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "div")
        {
            awards = container
                .select(&AWARD_ITEM)
                .map(|el| element_text(&el))
                .filter(|award| !award.is_empty())
                .collect();
        }
    }
    awards
}

pub fn parse_detail(html: &str) -> TimeoutDetail {
    let document = Html::parse_document(html);
    TimeoutDetail {
        awards: awards_from(&document),
        address: address_from(&document),
        neighbourhood: neighbourhood_from(&document),
        photo_urls: document
            .select(&DETAIL_IMAGE)
            .filter_map(|img| img.value().attr("src"))
            .map(str::to_string)
            .collect(),
        price_point: price_from(&document).map(|p| collapse_whitespace(&p)),
    }
}

/// Every article on the page that carries a heading, keyed by the heading
/// with its rank number removed.
fn named_articles(document: &Html) -> Vec<(String, ElementRef<'_>)> {
    document
        .select(&ARTICLE)
        .filter_map(|article| {
            let heading = article.select(&ARTICLE_HEADING).next()?;
            let name = LEADING_RANK.replace(&element_text(&heading), "").trim().to_string();
            Some((name, article))
        })
        .collect()
}

/// The text after "Time Out tip:". Spans set in regular weight hold the tip
/// itself when the marker is bold.
fn tip_from(paragraph: ElementRef) -> Option<String> {
    let text = element_text(&paragraph);
    let (_, after_marker) = text.split_once(TIP_MARKER)?;
    let spans: Vec<ElementRef> = paragraph.select(&REGULAR_WEIGHT).collect();
    let tip = if spans.is_empty() {
        after_marker.trim().to_string()
    } else {
        collapse_whitespace(&spans.iter().flat_map(|span| span.text()).collect::<String>())
    };
    (!tip.is_empty()).then_some(tip)
}

/// `(name, tip)` for every listing article with a "Time Out tip:".
pub fn parse_tips(html: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    named_articles(&document)
        .into_iter()
        .filter_map(|(name, article)| {
            let tip = article.select(&PARAGRAPH).find_map(tip_from)?;
            Some((name, tip))
        })
        .collect()
}

/// `(name, description)` from each article summary's "What is it?" line.
pub fn parse_descriptions(html: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    named_articles(&document)
        .into_iter()
        .filter_map(|(name, article)| {
            let summary = article.select(&SUMMARY).next()?;
            let description = summary.select(&PARAGRAPH).find_map(|p| {
                let text = element_text(&p);
                if !text.contains(SUMMARY_MARKER) {
                    return None;
                }
                let description = text.replacen(SUMMARY_MARKER, "", 1).trim().to_string();
                (!description.is_empty()).then_some(description)
            })?;
            Some((name, description))
        })
        .collect()
}

/// Writes `enrich_localTips` and `enrich_description` from the listing
/// page, matched on `source_name`. Unmatched bars get stock text. Returns
/// how many records matched a tip.
pub fn apply_listing_notes(
    records: &mut [Record],
    tips: &[(String, String)],
    descriptions: &[(String, String)],
) -> usize {
    let mut matched = 0;
    for record in records.iter_mut() {
        let name = str_field(record, "source_name").unwrap_or_default().to_string();
        let tip = match find_by_name(tips, &name) {
            Some(tip) => {
                matched += 1;
                tip.clone()
            }
            None => format!(
                "Visit {} for a unique bar experience in Hong Kong. Be sure to check their signature cocktails and atmosphere that make this spot a Time Out recommendation.",
                name
            ),
        };
        let description = find_by_name(descriptions, &name).cloned().unwrap_or_else(|| {
            format!(
                "{} is one of Hong Kong's recommended bars featured in Time Out's best bars list.",
                name
            )
        });
        record.insert("enrich_localTips".into(), json!(tip));
        record.insert("enrich_description".into(), json!(description));
    }
    matched
}

/// Detail page address derived from a bar's name, for records saved
/// without their detail link.
pub fn detail_url_for(name: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| !matches!(c, ':' | '\''))
        .collect();
    format!("{}/hong-kong/bars-and-pubs/{}", TIMEOUT_BASE_URL, slug)
}

/// TimeOut Hong Kong bar rankings, with each tile's detail page merged in.
pub struct TimeoutSource {
    fetcher: Fetcher,
    listing_url: String,
    delay: Duration,
}

impl TimeoutSource {
    pub fn new(fetcher: Fetcher, delay: Duration) -> Self {
        Self::with_listing_url(fetcher, TIMEOUT_BARS_URL, delay)
    }

    pub fn with_listing_url(fetcher: Fetcher, listing_url: &str, delay: Duration) -> Self {
        Self {
            fetcher,
            listing_url: listing_url.to_string(),
            delay,
        }
    }
}

#[async_trait::async_trait]
impl VenueSource for TimeoutSource {
    fn source_name(&self) -> &'static str {
        TIMEOUT_SOURCE
    }

    #[instrument(skip(self))]
    async fn fetch_listing(&self) -> Result<Vec<Record>> {
        info!("Fetching data from {}", self.listing_url);
        let html = self.fetcher.fetch_html(&self.listing_url).await?;
        let entries = parse_listing(&html, &self.listing_url);
        let tips = parse_tips(&html);
        let descriptions = parse_descriptions(&html);
        info!("Found {} bars ({} with a tip)", entries.len(), tips.len());

        let mut records = Vec::with_capacity(entries.len());
        for (idx, mut entry) in entries.into_iter().enumerate() {
            if let Some(detail_url) = &entry.detail_url {
                match self.fetcher.fetch_html(detail_url).await {
                    Ok(detail_html) => parse_detail(&detail_html).apply_to(&mut entry.record),
                    Err(e) => warn!("Error scraping detail page {}: {}", detail_url, e),
                }
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
            }
            info!("Processed bar {}", idx + 1);
            records.push(entry.record);
        }
        apply_listing_notes(&mut records, &tips, &descriptions);
        Ok(records)
    }
}

impl TimeoutSource {
    /// Refreshes tips, descriptions and awards on records scraped earlier.
    /// Detail pages are addressed by [`detail_url_for`]. Returns how many
    /// bars received at least one award.
    #[instrument(skip(self, records))]
    pub async fn annotate(&self, records: &mut [Record]) -> Result<usize> {
        let html = self.fetcher.fetch_html(&self.listing_url).await?;
        let tips = parse_tips(&html);
        let descriptions = parse_descriptions(&html);
        info!("Found {} tips and {} descriptions", tips.len(), descriptions.len());
        apply_listing_notes(records, &tips, &descriptions);

        let mut awarded = 0;
        for record in records.iter_mut() {
            let name = str_field(record, "source_name").unwrap_or_default().to_string();
            if name.is_empty() {
                record.insert("enrich_recognition".into(), json!([]));
                continue;
            }
            let url = detail_url_for(&name);
            let awards = match self.fetcher.fetch_html(&url).await {
                Ok(detail_html) => parse_detail(&detail_html).awards,
                Err(e) => {
                    warn!("Error extracting awards from {}: {}", url, e);
                    Vec::new()
                }
            };
            if !awards.is_empty() {
                awarded += 1;
            }
            record.insert("enrich_recognition".into(), json!(awards));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
        Ok(awarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<html><body>
        <section><h2>Elsewhere</h2><article><h3 data-testid="tile-title_testID">Ignored</h3></article></section>
        <section>
          <h2 data-testid="zone-title_testID">The best bars</h2>
          <article>
            <h3 data-testid="tile-title_testID">1. Bar Leone</h3>
            <img data-testid="responsive-image_testID" src="https://img/leone.jpg">
            <a href="/hong-kong/bars-and-pubs/bar-leone">Read more</a>
          </article>
          <article><p>advert without a title</p></article>
          <article>
            <h3 data-testid="tile-title_testID">2.  Coa</h3>
            <a href="https://www.timeout.com/hong-kong/bars-and-pubs/coa">Read more</a>
          </article>
        </section>
    </body></html>"#;

    const DETAIL: &str = r#"<html><head><script>var x = "$$$$";</script></head><body>
        <ul><li class="_tag_1x">Award winner 2024</li><li class="_tag_1x">Sheung Wan</li></ul>
        <div class="_details_abc"><dl>
          <dt>Address</dt><dd>G/F, 14 Ship Street</dd><dd>Wan Chai</dd>
          <dt>Opening hours</dt>
        </dl></div>
        <img class="_image_z" src="https://img/leone.jpg">
        <img class="_image_z" src="https://img/inside.jpg">
        <p>Drinks from $$ upwards</p>
    </body></html>"#;

    #[test]
    fn listing_tiles_are_parsed() {
        let entries = parse_listing(LISTING, TIMEOUT_BARS_URL);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].record["source_name"], "Bar Leone");
        assert_eq!(entries[0].record["source_url"], TIMEOUT_BARS_URL);
        assert_eq!(entries[0].record["source_categories"], json!(["Bar"]));
        assert_eq!(
            entries[0].detail_url.as_deref(),
            Some("https://www.timeout.com/hong-kong/bars-and-pubs/bar-leone")
        );
        assert_eq!(entries[1].record["name"], "Coa");
        assert_eq!(entries[1].record["source_photoUrls"], json!([]));
    }

    #[test]
    fn detail_page_is_merged() {
        let detail = parse_detail(DETAIL);
        assert_eq!(detail.address.as_deref(), Some("G/F, 14 Ship Street, Wan Chai"));
        assert_eq!(detail.neighbourhood.as_deref(), Some("Sheung Wan"));
        assert_eq!(detail.price_point.as_deref(), Some("$$"));

        let mut entries = parse_listing(LISTING, TIMEOUT_BARS_URL);
        detail.apply_to(&mut entries[0].record);
        assert_eq!(
            entries[0].record["source_photoUrls"],
            json!(["https://img/leone.jpg", "https://img/inside.jpg"])
        );
        assert_eq!(entries[0].record["source_address"], "G/F, 14 Ship Street, Wan Chai");
    }

    const LISTING_NOTES: &str = r#"<html><body>
        <article>
          <h3>1. Bar Leone</h3>
          <div data-testid="summary_testID">
            <p><b>What is it?</b> A Roman-style neighbourhood bar.</p>
            <p><b>Time Out tip:</b><span style="font-weight: 400;"> Order the </span><span style="font-weight: 400;">Negroni.</span></p>
          </div>
        </article>
        <article>
          <h2>2. Coa</h2>
          <p>Time Out tip: Arrive before 7pm.</p>
        </article>
        <article><p>Time Out tip: orphan tip</p></article>
    </body></html>"#;

    #[test]
    fn listing_tips_and_descriptions_are_parsed() {
        assert_eq!(
            parse_tips(LISTING_NOTES),
            vec![
                ("Bar Leone".to_string(), "Order the Negroni.".to_string()),
                ("Coa".to_string(), "Arrive before 7pm.".to_string()),
            ]
        );
        assert_eq!(
            parse_descriptions(LISTING_NOTES),
            vec![("Bar Leone".to_string(), "A Roman-style neighbourhood bar.".to_string())]
        );
    }

    #[test]
    fn listing_notes_fall_back_to_stock_text() {
        let mut records = crate::common::types::records_from_value(json!([
            {"source_name": "bar leone"},
            {"source_name": "Quinary"}
        ]))
        .unwrap();
        let matched = apply_listing_notes(
            &mut records,
            &parse_tips(LISTING_NOTES),
            &parse_descriptions(LISTING_NOTES),
        );
        assert_eq!(matched, 1);
        assert_eq!(records[0]["enrich_localTips"], "Order the Negroni.");
        assert_eq!(records[0]["enrich_description"], "A Roman-style neighbourhood bar.");
        assert!(records[1]["enrich_localTips"]
            .as_str()
            .unwrap()
            .starts_with("Visit Quinary for a unique bar experience"));
        assert_eq!(
            records[1]["enrich_description"],
            "Quinary is one of Hong Kong's recommended bars featured in Time Out's best bars list."
        );
    }

    #[test]
    fn awards_stop_at_the_next_heading() {
        let html = r#"<div>
            <h3>Time Out Awards</h3>
            <p>Best Bar 2024</p>
            <p>  </p>
            <p>Bartender of the Year</p>
            <h3>Opening hours</h3>
            <p>Daily 6pm</p>
        </div>"#;
        assert_eq!(parse_detail(html).awards, vec!["Best Bar 2024", "Bartender of the Year"]);
        assert!(parse_detail(DETAIL).awards.is_empty());
    }

    #[test]
    fn awards_inside_a_list_are_found_through_the_container() {
        let html = r#"<div><h3>Time Out Awards</h3><ul><li>Critics' Choice</li></ul></div>"#;
        assert_eq!(parse_detail(html).awards, vec!["Critics' Choice"]);

        let mut record = crate::common::types::records_from_value(json!([{"source_name": "Coa"}]))
            .unwrap()
            .remove(0);
        parse_detail(html).apply_to(&mut record);
        assert_eq!(record["enrich_recognition"], json!(["Critics' Choice"]));
    }

    #[test]
    fn detail_urls_are_slugged_from_names() {
        assert_eq!(
            detail_url_for("The Old Man: Hemingway's"),
            "https://www.timeout.com/hong-kong/bars-and-pubs/the-old-man-hemingways"
        );
    }
}
