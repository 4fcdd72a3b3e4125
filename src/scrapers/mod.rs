//! Page fetching and per-site HTML parsing.
//!
//! Parsing functions are pure over HTML strings; the `VenueSource`
//! implementations wire them to a [`Fetcher`].

pub mod eventbrite;
pub mod fetcher;
pub mod klook;
pub mod tatler;
pub mod timeout;
pub mod wanderlog;

use crate::common::error::Result;
use crate::common::types::Record;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};

pub use fetcher::{FetchMode, Fetcher, LinkScrape};

/// A site that yields a list of venue or event records.
#[async_trait::async_trait]
pub trait VenueSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_listing(&self) -> Result<Vec<Record>>;
}

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Compiles a selector literal.
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {}: {}", css, e))
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Text content of an element with whitespace collapsed.
pub fn element_text(element: &ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Resolves a listing link against the site root. Protocol-relative
/// `//host/path` links take the base's scheme.
pub fn absolutize(base: &str, href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        let scheme = base.split_once("://").map_or("https", |(scheme, _)| scheme);
        format!("{}://{}", scheme, rest)
    } else {
        format!("{}{}", base.trim_end_matches('/'), href)
    }
}

/// Looks a venue up by name: an exact match first, then either name
/// containing the other, ignoring case.
pub fn find_by_name<'a, T>(entries: &'a [(String, T)], name: &str) -> Option<&'a T> {
    if let Some((_, value)) = entries.iter().find(|(n, _)| n == name) {
        return Some(value);
    }
    let wanted = name.to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    entries
        .iter()
        .find(|(n, _)| {
            let candidate = n.to_lowercase();
            candidate.contains(&wanted) || wanted.contains(&candidate)
        })
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
    }

    #[test]
    fn relative_links_are_absolutized() {
        assert_eq!(absolutize("https://x.test/", "/a"), "https://x.test/a");
        assert_eq!(absolutize("https://x.test", "https://y.test/b"), "https://y.test/b");
    }

    #[test]
    fn protocol_relative_links_take_the_base_scheme() {
        assert_eq!(
            absolutize("https://www.timeout.com", "//media.timeout.com/images/1.jpg"),
            "https://media.timeout.com/images/1.jpg"
        );
        assert_eq!(absolutize("http://x.test/", "//cdn.test/a"), "http://cdn.test/a");
    }

    #[test]
    fn names_match_exactly_then_partially() {
        let entries = vec![
            ("Bar Leone".to_string(), 1),
            ("Coa".to_string(), 2),
            ("The Old Man".to_string(), 3),
        ];
        assert_eq!(find_by_name(&entries, "Coa"), Some(&2));
        assert_eq!(find_by_name(&entries, "bar leone"), Some(&1));
        assert_eq!(find_by_name(&entries, "Old Man"), Some(&3));
        assert_eq!(find_by_name(&entries, "Quinary"), None);
        assert_eq!(find_by_name(&entries, ""), None);
    }
}
