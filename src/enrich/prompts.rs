//! Prompt builders. Each embeds its target shape as example JSON; the model
//! is asked for raw JSON with no markdown around it.

use crate::common::types::{str_field, Record};
use crate::llm::Prompt;
use serde_json::{Map, Value};

const NO_MARKDOWN: &str = "Do not include any explanations, apologies, or markdown formatting (like ```json) in your response.";

const ENRICH_FIELD_DESCRIPTIONS: &str = r#"- `enrich_localName`: (string) The name of the event in Traditional Chinese. Keep company/brand names like "The Murray" or "Grand Hyatt" in English.
- `enrich_englishName`: (string) The name of the event in English.
- `enrich_type`: (string) Classify as either "local activities" or "events".
- `enrich_neighborhood`: (string) The specific district name from the address (e.g., "Central", "Tsim Sha Tsui", "Causeway Bay"). If not obvious, derive from context.
- `enrich_hiddenGemScore`: (integer) A score from 0-100. A high score (80-100) for very local, unique workshops. A low score (0-30) for major, well-known hotel spas or international brands.
- `enrich_textEmbedding`: (string) A comprehensive, paragraph-style summary of the activity, combining its title, summary, and highlights. This will be used for vector embeddings.
- `enrich_tagsType`: (JSON object) Distribute 100 points across categories: {"Food": 0, "Nature": 0, "Sports": 0, "Leisure": 0, "Shopping": 0, "Wellness": 0, "Adventure": 0, "Nightlife": 0, "Educational": 0, "Hidden Gems": 0, "Photography": 0, "Art & Culture": 0, "Entertainment": 0}. The sum of values must be 100.
- `enrich_tagsBudget`: (JSON object) Set exactly one category to 1 and all others to 0: {"Free": 0, "Budget friendly": 0, "Moderately priced": 0, "High-end": 0, "Luxury": 0}. Base this on the `source_pricePoint`.
- `enrich_tagsGroup`: (JSON object) Distribute 100 points across group types: {"Date": 0, "Kids": 0, "Family": 0, "Friends": 0, "Business": 0, "Colleagues": 0}. The sum of values must be 100.
- `enrich_description`: (string) A concise, appealing description of the activity, under 20 words."#;

const SOURCE_FIELD_DESCRIPTIONS: &str = r#"- `source_url`: (string) The direct URL to the activity's booking or information page.
- `source_name`: (string) The official name of the activity or package.
- `source_address`: (string) The full street address of the venue.
- `source_pricePoint`: (string) The starting price, formatted as a string with a currency symbol (e.g., "$1480", "Free").
- `source_rating`: (float) The public rating of the activity (e.g., 4.8). If not available, provide a reasonable estimate.
- `source_introduction`: (string) A detailed, factual paragraph describing the activity, its offerings, and what's included.
- `source_Categories`: (string) A comma-separated list of relevant categories (e.g., "Tours & experiences,Massages,Spa & massages")."#;

const SCORED_FIELDS_EXAMPLE: &str = r#"{
  "enrich_hiddenGemScore": 85,
  "enrich_textEmbedding": "Kicho is a Japanese yakitori restaurant in Central, Hong Kong, known for an omakase menu built around charcoal-grilled Kagoshima chicken and seasonal ingredients, served in an intimate 24-seat room.",
  "enrich_tagsType": {
    "Food": 70, "Nature": 0, "Sports": 0, "Leisure": 10, "Shopping": 0, "Wellness": 0, "Adventure": 0,
    "Nightlife": 10, "Educational": 0, "Hidden Gems": 10, "Photography": 0, "Art & Culture": 0, "Entertainment": 0
  },
  "enrich_tagsBudget": {
    "Free": 0, "Budget friendly": 0, "Moderately priced": 0, "High-end": 1, "Luxury": 0
  },
  "enrich_tagsGroup": {
    "Date": 40, "Kids": 0, "Family": 10, "Friends": 30, "Business": 20, "Colleagues": 0
  }
}"#;

fn pretty(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Only the `enrich_*` part of a sample record.
pub fn enrichment_fields(sample: &Record) -> Record {
    sample
        .iter()
        .filter(|(k, _)| k.starts_with("enrich_"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Asks for the `enrich_*` fields of one record, shaped like `sample`.
pub fn enrichment_prompt(record: &Record, sample: &Record) -> Prompt {
    Prompt::user(format!(
        r#"
You are an expert data enrichment AI. Your task is to take a JSON object about a local activity and generate a new JSON object containing only enrichment fields.

**Instructions:**
1.  Analyze the provided "Input Activity Data".
2.  Generate a single JSON object that includes ONLY the new `enrich_` fields.
3.  Strictly follow the structure and format of the "Example Enrichment Object (Target Format)".
4.  Adhere to the descriptions for each `enrich_` field provided below.
5.  {no_markdown} Output only the raw JSON object containing the enrichment fields.

**Field Descriptions for Enrichment:**
{descriptions}

**Example Enrichment Object (Target Format):**
```json
{sample}
```

**Input Activity Data:**
```json
{input}
```

**Your generated JSON object (enrichment fields only):**
"#,
        no_markdown = NO_MARKDOWN,
        descriptions = ENRICH_FIELD_DESCRIPTIONS,
        sample = pretty(&enrichment_fields(sample)),
        input = pretty(record),
    ))
}

/// Search-backed prompt that asks for a whole record about `query`.
pub fn full_object_prompt(query: &str, sample: &Record) -> Prompt {
    Prompt::user(format!(
        r#"
**Instructions:**
1.  Search online for "{query}" and find the event details.
2.  Gather all information about this event you can find on the internet.
3.  Generate a single, complete JSON object for this activity.
4.  Strictly follow the structure, format, and data types of the "Example Full Object (Target Schema)".
5.  Adhere to the detailed field descriptions provided below.
6.  {no_markdown} Output only the raw JSON object.

**Field Descriptions (Source Data):**
{source}

**Field Descriptions (Enrichment Data):**
{enrich}

**Example Full Object (Target Schema):**
```json
{sample}
```

**Search Query:**
"{query}"

**Your generated JSON object:**
"#,
        query = query,
        no_markdown = NO_MARKDOWN,
        source = SOURCE_FIELD_DESCRIPTIONS,
        enrich = ENRICH_FIELD_DESCRIPTIONS,
        sample = pretty(sample),
    ))
}

fn text_or(record: &Record, key: &str, default: &str) -> String {
    str_field(record, key)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default)
        .to_string()
}

fn list_or(record: &Record, key: &str) -> String {
    let joined = match record.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };
    if joined.is_empty() {
        "Not specified".to_string()
    } else {
        joined
    }
}

/// Venue-level prompt for the five scored fields.
pub fn gemini_enrichment_prompt(record: &Record) -> Prompt {
    Prompt::user(format!(
        r#"You are an expert restaurant data analyst. Your task is to enrich a restaurant entry with additional data fields.

Here is the restaurant information:
- Name: {name}
- Address: {address}
- Neighborhood: {neighbourhood}
- Price Point: {price}
- Categories: {categories}
- Description: {description}
- Local Tips: {tips}
- Signature Dishes: {signature}

Based on this information, please generate the following enrichment fields:

1. enrich_hiddenGemScore: An integer from 0-100 indicating how much of a hidden gem this venue is.
   - Score 0-30: Very well-known, mainstream establishments
   - Score 31-60: Somewhat known but not overly popular
   - Score 61-85: Hidden gems that locals know but tourists might miss
   - Score 86-100: True hidden treasures that even locals might not know about

2. enrich_textEmbedding: A comprehensive string that combines the venue's name, summary, and highlights into a single text for embedding purposes.

3. enrich_tagsType: A JSON object that distributes 100 points across the categories of the example below based on relevance.

4. enrich_tagsBudget: A JSON object with exactly one of the categories of the example below set to 1 and the rest to 0.

5. enrich_tagsGroup: A JSON object that distributes 100 points across the groups of the example below based on suitability.

Output only a JSON object with these fields, no explanations or markdown formatting.

Example output format (FOLLOW THIS EXACTLY):
{example}
"#,
        name = text_or(record, "source_name", ""),
        address = text_or(record, "source_address", ""),
        neighbourhood = text_or(record, "source_neighbourhood", ""),
        price = text_or(record, "source_pricepoint", ""),
        categories = list_or(record, "source_categories"),
        description = text_or(record, "enrich_description", ""),
        tips = text_or(record, "enrich_localTips", ""),
        signature = list_or(record, "enrich_signature"),
        example = SCORED_FIELDS_EXAMPLE,
    ))
}

/// Asks for the whole record back with the text fields in English.
pub fn translation_prompt(record: &Record) -> Prompt {
    Prompt::user(format!(
        r#"
You are an expert translation AI. Your task is to translate specific fields within a JSON object to English.

**Instructions:**
1.  Analyze the provided "Original JSON Object".
2.  Identify the following fields: `source_address`, `enrich_neighborhood`, `enrich_textEmbedding`, `source_introduction`, `source_Categories` and `enrich_description`.
3.  Translate the values of these fields into natural, fluent English.
4.  If a field is already in English, keep its original value.
5.  Return the *entire*, complete JSON object with only the specified fields translated.
6.  Do not alter the structure, keys, or any other values in the JSON object.
7.  {no_markdown} Output only the raw, updated JSON object.

**Original JSON Object:**
```json
{input}
```

**Your translated JSON object:**
"#,
        no_markdown = NO_MARKDOWN,
        input = pretty(record),
    ))
}

/// Turns raw scraped page text into an `ActivityDetails` object.
/// `raw` is keyed by the page URL.
pub fn structuring_prompt(raw: &Map<String, Value>, type_definition: &str, sample: &Value) -> Prompt {
    Prompt::user(format!(
        r#"
You are an expert data structuring AI. Your task is to convert raw scraped data into a clean, structured JSON object.

**Instructions:**
1.  Analyze the provided "Raw Scraped Data".
2.  Generate a single JSON object that strictly follows the "Target JSON Format".
3.  Use the "Example JSON Object" as a reference for the structure and style.
4.  {no_markdown} Output only the raw JSON object.

**Target JSON Format (from a TypeScript interface):**
```typescript
{type_definition}
```

**Example JSON Object:**
```json
{sample}
```

**Raw Scraped Data:**
```json
{raw}
```

**Your generated JSON object:**
"#,
        no_markdown = NO_MARKDOWN,
        type_definition = type_definition,
        sample = pretty(sample),
        raw = pretty(raw),
    ))
}

/// Free-text price question for a bar.
pub fn price_query(name: &str, address: &str) -> Prompt {
    Prompt::user(format!(
        "What is the price range ($ to $$$$) of {} bar located at {} in Hong Kong? Please respond with just the dollar signs, like $, $$, $$$, or $$$$.",
        name, address
    ))
}
