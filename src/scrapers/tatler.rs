use super::{absolutize, element_text, selector, Fetcher, VenueSource};
use crate::common::constants::{TATLER_BASE_URL, TATLER_LISTING_URL, TATLER_SOURCE};
use crate::common::error::Result;
use crate::common::types::{str_field, Record};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, instrument, warn};

const PLACEHOLDER_IMAGE: &str = "tatler-placeholder.svg";
const DESCRIPTION_WORDS: usize = 20;

static CARD_HEADING: Lazy<Selector> = Lazy::new(|| selector(r#"h2[class*="heading-xl"]"#));
static DINING_LINK: Lazy<Selector> = Lazy::new(|| selector(r#"a[href*="/dining/"]"#));
static LAZY_IMAGE: Lazy<Selector> = Lazy::new(|| selector("img[data-src]"));
static IMAGE: Lazy<Selector> = Lazy::new(|| selector("img[src]"));
static NEIGHBOURHOOD: Lazy<Selector> = Lazy::new(|| selector("p.caption-s.text-opacity-50"));
static CATEGORY: Lazy<Selector> = Lazy::new(|| selector("p.uppercase.eyebrow-s"));
static INFORMATION: Lazy<Selector> = Lazy::new(|| selector(r#"div[class*="information-container"]"#));
static INFO_LABEL_OR_LINK: Lazy<Selector> = Lazy::new(|| selector("p.font-weight--700, a"));
static PRICE_MARK: Lazy<Selector> = Lazy::new(|| selector("span.text-primary-color-70"));
static AWARD_LINE: Lazy<Selector> =
    Lazy::new(|| selector(r#"div.award-container p[class*="text-body-base"]"#));
static GALLERY_IMAGE: Lazy<Selector> = Lazy::new(|| {
    selector(r#"div[class*="grid-container"] img, div[class*="gallery"] img"#)
});
static H3: Lazy<Selector> = Lazy::new(|| selector("h3"));
static MUST_TRY: Lazy<Selector> = Lazy::new(|| selector("ul.must-try li"));
static LEAD_PARAGRAPH: Lazy<Selector> =
    Lazy::new(|| selector("p.font-gt-america.font-weight--700.text-primary-color-100"));

static TIP_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Tatler\s+Tip").expect("valid tip regex"));

fn usable_image(url: &str) -> bool {
    url.starts_with("http") && !url.contains(PLACEHOLDER_IMAGE)
}

fn image_url(img: ElementRef) -> Option<&str> {
    img.value()
        .attr("data-src")
        .or_else(|| img.value().attr("src"))
}

fn card_url(heading: &ElementRef, card: &ElementRef) -> Option<String> {
    let wrapping_link = heading
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "a")
        .and_then(|a| a.value().attr("href"));
    let href = match wrapping_link {
        Some(href) => href,
        None => card.select(&DINING_LINK).next()?.value().attr("href")?,
    };
    (!href.is_empty()).then(|| absolutize(TATLER_BASE_URL, href))
}

fn card_record(heading: ElementRef) -> Option<Record> {
    let card = heading
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "div")?;
    let name = element_text(&heading);
    if name.is_empty() {
        return None;
    }

    let photo = card
        .select(&LAZY_IMAGE)
        .next()
        .or_else(|| card.select(&IMAGE).next())
        .and_then(image_url)
        .filter(|url| usable_image(url));
    let neighbourhood = card
        .select(&NEIGHBOURHOOD)
        .next()
        .map(|p| element_text(&p))
        .unwrap_or_default();
    let categories: Vec<String> = card
        .select(&CATEGORY)
        .next()
        .map(|p| element_text(&p))
        .into_iter()
        .collect();

    match json!({
        "source_url": card_url(&heading, &card).unwrap_or_default(),
        "source_name": name,
        "source_address": "",
        "source_neighbourhood": neighbourhood,
        "source_pricepoint": "",
        "source_photoUrls": photo.into_iter().collect::<Vec<_>>(),
        "source_categories": categories,
    }) {
        Value::Object(record) => Some(record),
        _ => None,
    }
}

/// Restaurant cards on a Tatler "best of" list. Cards without a name are
/// dropped.
pub fn parse_listing(html: &str) -> Vec<Record> {
    let document = Html::parse_document(html);
    document.select(&CARD_HEADING).filter_map(card_record).collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TatlerDetail {
    pub address: Option<String>,
    pub price_point: Option<String>,
    /// `{year, award}` pairs.
    pub awards: Vec<Value>,
    pub photo_urls: Vec<String>,
    /// The paragraph after the "Tatler Tip" heading.
    pub tip: Option<String>,
    pub must_try: Vec<String>,
    /// The lead paragraph, cut to its first twenty words.
    pub description: Option<String>,
}

impl TatlerDetail {
    pub fn apply_to(&self, record: &mut Record) {
        if let Some(address) = &self.address {
            record.insert("source_address".into(), json!(address));
        }
        if let Some(price) = &self.price_point {
            record.insert("source_pricepoint".into(), json!(price));
        }
        record.insert("enrich_recognition".into(), Value::Array(self.awards.clone()));
        if let Some(tip) = &self.tip {
            record.entry("enrich_localTips").or_insert_with(|| json!(tip));
        }
        if !self.must_try.is_empty() {
            record.entry("enrich_signature").or_insert_with(|| json!(self.must_try));
        }
        if let Some(description) = &self.description {
            record.insert("enrich_description".into(), json!(description));
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

fn labelled<'a>(container: ElementRef<'a>, label: &str) -> Option<ElementRef<'a>> {
    container
        .select(&INFO_LABEL_OR_LINK)
        .find(|el| el.value().name() == "p" && el.text().collect::<String>().contains(label))
}

/// The first `p` after `node` in document order.
fn next_paragraph<'a>(document: &'a Html, node: ElementRef<'a>) -> Option<ElementRef<'a>> {
    document
        .root_element()
        .descendants()
        .skip_while(|n| n.id() != node.id())
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "p")
}

fn tip_from(document: &Html) -> Option<String> {
    let heading = document
        .select(&H3)
        .find(|h3| TIP_HEADING.is_match(&h3.text().collect::<String>()))?;
    let tip = element_text(&next_paragraph(document, heading)?);
    (!tip.is_empty()).then_some(tip)
}

fn first_words(text: &str, count: usize) -> String {
    text.split_whitespace().take(count).collect::<Vec<_>>().join(" ")
}

pub fn parse_detail(html: &str) -> TatlerDetail {
    let document = Html::parse_document(html);
    let info = document.select(&INFORMATION).next();

    let address = info.and_then(|container| {
        let mut after_label = container
            .select(&INFO_LABEL_OR_LINK)
            .skip_while(|el| !(el.value().name() == "p" && el.text().collect::<String>().contains("Address")))
            .skip(1);
        after_label
            .find(|el| el.value().name() == "a")
            .map(|a| element_text(&a))
    });

    let price_point = info
        .and_then(|container| labelled(container, "Price"))
        .and_then(|label| label.parent().and_then(ElementRef::wrap))
        .map(|parent| parent.select(&PRICE_MARK).count())
        .filter(|count| *count > 0)
        .map(|count| "$".repeat(count));

    let lines: Vec<String> = document
        .select(&AWARD_LINE)
        .map(|p| element_text(&p))
        .collect();
    let awards = lines
        .chunks_exact(2)
        .filter(|pair| !pair[0].is_empty() && !pair[1].is_empty())
        .map(|pair| json!({"year": pair[0], "award": pair[1]}))
        .collect();

    let mut photo_urls: Vec<String> = Vec::new();
    for url in document.select(&GALLERY_IMAGE).filter_map(image_url) {
        if usable_image(url) && !photo_urls.iter().any(|u| u == url) {
            photo_urls.push(url.to_string());
        }
    }

    let must_try = document
        .select(&MUST_TRY)
        .map(|li| element_text(&li))
        .filter(|dish| !dish.is_empty())
        .collect();
    let description = document
        .select(&LEAD_PARAGRAPH)
        .next()
        .map(|p| first_words(&element_text(&p), DESCRIPTION_WORDS))
        .filter(|d| !d.is_empty());

    TatlerDetail {
        address,
        price_point,
        awards,
        photo_urls,
        tip: tip_from(&document),
        must_try,
        description,
    }
}

/// Tatler Dining best-restaurant list with detail pages merged in.
pub struct TatlerSource {
    fetcher: Fetcher,
    listing_url: String,
    delay: Duration,
}

impl TatlerSource {
    pub fn new(fetcher: Fetcher, delay: Duration) -> Self {
        Self {
            fetcher,
            listing_url: TATLER_LISTING_URL.to_string(),
            delay,
        }
    }

    pub fn with_listing_url(mut self, listing_url: &str) -> Self {
        self.listing_url = listing_url.to_string();
        self
    }
}

#[async_trait::async_trait]
impl VenueSource for TatlerSource {
    fn source_name(&self) -> &'static str {
        TATLER_SOURCE
    }

    #[instrument(skip(self))]
    async fn fetch_listing(&self) -> Result<Vec<Record>> {
        info!("Fetching restaurant listings from {}", self.listing_url);
        let html = self.fetcher.fetch_html(&self.listing_url).await?;
        let mut records = parse_listing(&html);
        info!("Found {} restaurant items", records.len());
        self.annotate(&mut records).await;
        Ok(records)
    }
}

impl TatlerSource {
    /// Merges each restaurant's detail page into its record. Records whose
    /// `source_url` is not a dining page are left alone. Returns how many
    /// pages were merged.
    #[instrument(skip(self, records))]
    pub async fn annotate(&self, records: &mut [Record]) -> usize {
        let total = records.len();
        let mut merged = 0;
        for (idx, record) in records.iter_mut().enumerate() {
            let Some(url) = str_field(record, "source_url")
                .filter(|u| u.contains("dining/"))
                .map(str::to_string)
            else {
                continue;
            };
            info!("Processing {}/{}: {}", idx + 1, total, str_field(record, "source_name").unwrap_or("Unknown"));
            match self.fetcher.fetch_html(&url).await {
                Ok(detail_html) => {
                    parse_detail(&detail_html).apply_to(record);
                    merged += 1;
                }
                Err(e) => warn!("Error extracting details from {}: {}", url, e),
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<html><body>
        <div class="card">
          <a href="/dining/restaurants/amber"><h2 class="heading-xl">Amber</h2></a>
          <img data-src="https://img/amber.jpg" src="https://img/tatler-placeholder.svg">
          <p class="caption-s text-opacity-50">Central</p>
          <p class="uppercase eyebrow-s">French</p>
        </div>
        <div class="card">
          <h2 class="heading-xl">Mono</h2>
          <a href="/dining/restaurants/mono">more</a>
          <img src="https://img/tatler-placeholder.svg">
        </div>
        <div><h2 class="heading-xl">   </h2></div>
    </body></html>"#;

    const DETAIL: &str = r#"<html><body>
        <div class="information-container">
          <div><p class="font-weight--700">Address</p><a href="https://maps">15 Queen's Road Central</a></div>
          <div><p class="font-weight--700">Price</p><span class="text-primary-color-70">$</span><span class="text-primary-color-70">$</span><span class="text-primary-color-70">$</span></div>
        </div>
        <div class="award-container">
          <p class="text-body-base">2025</p><p class="text-body-base">Top 20</p>
          <p class="text-body-base">2024</p><p class="text-body-base">Best Service</p>
        </div>
        <div class="image-gallery"><img data-src="https://img/dish.jpg"></div>
    </body></html>"#;

    #[test]
    fn cards_are_parsed() {
        let records = parse_listing(LISTING);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["source_name"], "Amber");
        assert_eq!(
            records[0]["source_url"],
            "https://www.tatlerasia.com/dining/restaurants/amber"
        );
        assert_eq!(records[0]["source_photoUrls"], json!(["https://img/amber.jpg"]));
        assert_eq!(records[0]["source_neighbourhood"], "Central");
        assert_eq!(records[0]["source_categories"], json!(["French"]));
        assert_eq!(
            records[1]["source_url"],
            "https://www.tatlerasia.com/dining/restaurants/mono"
        );
        assert_eq!(records[1]["source_photoUrls"], json!([]));
    }

    #[test]
    fn detail_page_is_parsed() {
        let detail = parse_detail(DETAIL);
        assert_eq!(detail.address.as_deref(), Some("15 Queen's Road Central"));
        assert_eq!(detail.price_point.as_deref(), Some("$$$"));
        assert_eq!(
            detail.awards,
            vec![
                json!({"year": "2025", "award": "Top 20"}),
                json!({"year": "2024", "award": "Best Service"})
            ]
        );
        assert_eq!(detail.photo_urls, vec!["https://img/dish.jpg"]);

        let mut record = parse_listing(LISTING).remove(0);
        detail.apply_to(&mut record);
        assert_eq!(record["source_pricepoint"], "$$$");
        assert_eq!(record["enrich_recognition"].as_array().unwrap().len(), 2);
    }

    const DETAIL_NOTES: &str = r#"<html><body>
        <p class="font-gt-america font-weight--700 text-primary-color-100">
          One of the city's most celebrated French dining rooms, Amber has reinvented itself around plant-forward cooking and a dairy-free pastry menu.
        </p>
        <div class="rich-text">
          <h3>Tatler  tip</h3>
          <div><p>Ask for the chef's counter when booking.</p></div>
        </div>
        <div><p class="text-primary-color">Must Try</p>
          <ul class="must-try"><li>Sea urchin</li><li> Amadai </li></ul>
        </div>
    </body></html>"#;

    #[test]
    fn tip_dishes_and_description_are_parsed() {
        let detail = parse_detail(DETAIL_NOTES);
        assert_eq!(detail.tip.as_deref(), Some("Ask for the chef's counter when booking."));
        assert_eq!(detail.must_try, vec!["Sea urchin", "Amadai"]);
        assert_eq!(
            detail.description.as_deref(),
            Some("One of the city's most celebrated French dining rooms, Amber has reinvented itself around plant-forward cooking and a dairy-free pastry")
        );
        assert!(parse_detail(DETAIL).tip.is_none());
    }

    #[test]
    fn existing_tips_and_signatures_are_kept() {
        let detail = parse_detail(DETAIL_NOTES);
        let mut record = parse_listing(LISTING).remove(0);
        record.insert("enrich_localTips".into(), json!("Already written"));
        detail.apply_to(&mut record);
        assert_eq!(record["enrich_localTips"], "Already written");
        assert_eq!(record["enrich_signature"], json!(["Sea urchin", "Amadai"]));
        assert!(record["enrich_description"].as_str().unwrap().starts_with("One of the city's"));
    }
}
