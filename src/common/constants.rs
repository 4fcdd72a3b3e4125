/// Source names reported by each `VenueSource`.
pub const EVENTBRITE_SOURCE: &str = "eventbrite";
pub const TIMEOUT_SOURCE: &str = "timeout";
pub const TATLER_SOURCE: &str = "tatler";

// Site roots
pub const KLOOK_BASE_URL: &str = "https://www.klook.com";
pub const TIMEOUT_BASE_URL: &str = "https://www.timeout.com";
pub const TIMEOUT_BARS_URL: &str =
    "https://www.timeout.com/hong-kong/bars-and-pubs/best-bars-hong-kong";
pub const TATLER_BASE_URL: &str = "https://www.tatlerasia.com";
pub const TATLER_LISTING_URL: &str =
    "https://www.tatlerasia.com/list/best-restaurants-hong-kong?filter_3%5B%5D=2025&page=1";

// Scraping proxies
pub const SCRAPERAPI_URL: &str = "https://api.scraperapi.com/";
pub const SCRAPINGBEE_URL: &str = "https://app.scrapingbee.com/api/v1";

// LLM endpoints
pub const CEREBRAS_BASE_URL: &str = "https://api.cerebras.ai/v1";
pub const PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Fixed USD to HKD conversion used when mapping Klook prices.
pub const USD_TO_HKD: f64 = 7.85;
pub const HKD_CURRENCY: &str = "HKD";

/// Address written when a scraped address is empty or only coordinates.
pub const FALLBACK_ADDRESS: &str = "Hong Kong";

/// Breadcrumbs that say nothing about the activity itself.
pub const KLOOK_IGNORED_BREADCRUMBS: &[&str] = &["Klook Travel", "Hong Kong"];

pub const EVENTBRITE_EVENT_PREFIXES: &[&str] =
    &["https://www.eventbrite.hk/e/", "https://www.eventbrite.com/e/"];
pub const EVENTBRITE_AFFILIATE_SUFFIX: &str = "?aff=ebdssbdestsearch";

pub const DEFAULT_BAR_CATEGORY: &str = "Bars and pubs";

// Tag vocabularies for scored enrichment
pub const TYPE_TAGS: &[&str] = &[
    "Food",
    "Nature",
    "Sports",
    "Leisure",
    "Shopping",
    "Wellness",
    "Adventure",
    "Nightlife",
    "Educational",
    "Hidden Gems",
    "Photography",
    "Art & Culture",
    "Entertainment",
];
pub const BUDGET_TAGS: &[&str] = &["Free", "Budget friendly", "Moderately priced", "High-end", "Luxury"];
pub const GROUP_TAGS: &[&str] = &["Date", "Kids", "Family", "Friends", "Business", "Colleagues"];

/// Fields the translation pass rewrites into English.
pub const TRANSLATABLE_FIELDS: &[&str] = &[
    "source_address",
    "enrich_neighborhood",
    "enrich_textEmbedding",
    "source_introduction",
    "source_Categories",
    "enrich_description",
];

pub const DEFAULT_CEREBRAS_MODELS: &[&str] = &[
    "llama-4-scout-17b-16e-instruct",
    "llama3.3-70b",
    "qwen-3-235b-a22b",
    "qwen-3-32b",
];
pub const DEFAULT_PERPLEXITY_MODEL: &str = "sonar";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-pro";
