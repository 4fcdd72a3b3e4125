use crate::common::config::{api_key, Config, ProxyProvider, SCRAPERAPI_KEY_ENV, SCRAPINGBEE_KEY_ENV};
use crate::common::constants::{DEFAULT_USER_AGENT, SCRAPERAPI_URL, SCRAPINGBEE_URL};
use crate::common::error::{Result, ScraperError};
use crate::rate_limiter::{Limits, RateLimiter};
use crate::records::unique_preserving_order;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const LINK_EXTRACT_RULES: &str = r#"{"all_links":{"selector":"a@href","type":"list"}}"#;

static ANCHOR: Lazy<Selector> = Lazy::new(|| super::selector("a[href]"));

/// How pages are retrieved.
#[derive(Debug, Clone)]
pub enum FetchMode {
    Direct,
    ScraperApi { api_key: String },
    ScrapingBee { api_key: String, wait_ms: u64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkScrape {
    pub total_urls_scraped: usize,
    pub total_links_found: usize,
    pub all_links: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    limiter: RateLimiter,
    mode: FetchMode,
}

impl Fetcher {
    pub fn new(mode: FetchMode, limiter: RateLimiter, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            limiter,
            mode,
        })
    }

    /// Builds a fetcher from the `[proxy]` and `[rate_limits]` sections.
    /// Proxy keys come from the environment.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mode = match config.proxy.provider {
            ProxyProvider::None => FetchMode::Direct,
            ProxyProvider::ScraperApi => FetchMode::ScraperApi {
                api_key: api_key(SCRAPERAPI_KEY_ENV)?,
            },
            ProxyProvider::ScrapingBee => FetchMode::ScrapingBee {
                api_key: api_key(SCRAPINGBEE_KEY_ENV)?,
                wait_ms: config.proxy.wait_ms,
            },
        };
        let limiter = RateLimiter::new(Limits::per_minute(
            config.rate_limits.scrape_requests_per_min,
        ));
        Self::new(
            mode,
            limiter,
            Duration::from_secs(config.rate_limits.request_timeout_seconds),
        )
    }

    pub fn mode(&self) -> &FetchMode {
        &self.mode
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<String> {
        let _permit = self.limiter.acquire().await;
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ScraperError::Api {
                message: format!("GET {} returned {}: {}", url, status, truncate(&body, 200)),
            });
        }
        Ok(body)
    }

    #[instrument(skip(self))]
    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        debug!("fetching page");
        let request = match &self.mode {
            FetchMode::Direct => self.client.get(url),
            FetchMode::ScraperApi { api_key } => self
                .client
                .get(SCRAPERAPI_URL)
                .query(&[("api_key", api_key.as_str()), ("url", url)]),
            FetchMode::ScrapingBee { api_key, wait_ms } => {
                let wait = wait_ms.to_string();
                self.client.get(SCRAPINGBEE_URL).query(&[
                    ("api_key", api_key.as_str()),
                    ("url", url),
                    ("wait", wait.as_str()),
                ])
            }
        };
        self.send(request, url).await
    }

    /// `fetch_html` with up to `attempts` tries and `backoff` between them.
    pub async fn fetch_html_retrying(&self, url: &str, attempts: u32, backoff: Duration) -> Result<String> {
        let mut attempt = 1;
        loop {
            match self.fetch_html(url).await {
                Ok(html) => return Ok(html),
                Err(e) if attempt < attempts && e.is_retryable() => {
                    warn!("Attempt {}/{} for {} failed: {}", attempt, attempts, url, e);
                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Collects every `href` on the page, dropping empties and
    /// `javascript:` links.
    #[instrument(skip(self))]
    pub async fn fetch_links(&self, url: &str) -> Result<Vec<String>> {
        let links = match &self.mode {
            FetchMode::ScrapingBee { api_key, wait_ms } => {
                let wait = wait_ms.to_string();
                let request = self.client.get(SCRAPINGBEE_URL).query(&[
                    ("api_key", api_key.as_str()),
                    ("url", url),
                    ("wait", wait.as_str()),
                    ("extract_rules", LINK_EXTRACT_RULES),
                ]);
                let body = self.send(request, url).await?;
                let data: Value = serde_json::from_str(&body)?;
                data.get("all_links")
                    .and_then(Value::as_array)
                    .map(|links| {
                        links
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default()
            }
            _ => extract_links(&self.fetch_html(url).await?),
        };
        Ok(links
            .into_iter()
            .filter(|l| !l.is_empty() && !l.starts_with("javascript:"))
            .collect())
    }

    /// Scrapes links from every URL. A failing URL is logged and
    /// contributes no links.
    pub async fn scrape_links(&self, urls: &[String], delay: Duration) -> LinkScrape {
        let mut all_links = Vec::new();
        for (idx, url) in urls.iter().enumerate() {
            info!("Scraping links {}/{}: {}", idx + 1, urls.len(), url);
            match self.fetch_links(url).await {
                Ok(links) => all_links.extend(links),
                Err(e) => warn!("Failed to scrape links from {}: {}", url, e),
            }
            if idx + 1 < urls.len() && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        let all_links = unique_preserving_order(all_links);
        LinkScrape {
            total_urls_scraped: urls.len(),
            total_links_found: all_links.len(),
            all_links,
        }
    }
}

pub fn extract_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
        .collect()
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_are_collected_in_order() {
        let html = r#"<html><body>
            <a href="/activity/1">one</a>
            <a>no href</a>
            <a href=" https://x.test/2 ">two</a>
        </body></html>"#;
        assert_eq!(extract_links(html), vec!["/activity/1", "https://x.test/2"]);
    }

    #[test]
    fn direct_mode_when_no_proxy_configured() {
        let fetcher = Fetcher::from_config(&Config::default()).unwrap();
        assert!(matches!(fetcher.mode(), FetchMode::Direct));
    }
}
