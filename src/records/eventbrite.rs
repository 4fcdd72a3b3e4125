use crate::common::constants::{EVENTBRITE_AFFILIATE_SUFFIX, EVENTBRITE_EVENT_PREFIXES};
use std::collections::BTreeSet;

/// Strips the search affiliate suffix and keeps event pages only. The result
/// is de-duplicated and sorted.
pub fn normalize_links<'a, I>(links: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    links
        .into_iter()
        .map(|link| link.strip_suffix(EVENTBRITE_AFFILIATE_SUFFIX).unwrap_or(link))
        .filter(|link| EVENTBRITE_EVENT_PREFIXES.iter().any(|p| link.starts_with(*p)))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_unique_event_links() {
        let links = vec![
            "https://www.eventbrite.hk/e/b-123?aff=ebdssbdestsearch",
            "https://www.eventbrite.hk/e/b-123",
            "https://www.eventbrite.com/e/a-9",
            "https://www.eventbrite.hk/d/hong-kong/events/",
        ];
        assert_eq!(
            normalize_links(links),
            vec![
                "https://www.eventbrite.com/e/a-9",
                "https://www.eventbrite.hk/e/b-123"
            ]
        );
    }
}
