//! Cleaners, transformers and duplicate checks over scraped record lists.

pub mod dedup;
pub mod eventbrite;
pub mod fields;
pub mod klook;
pub mod location;
pub mod similarity;
pub mod values;

pub use dedup::{dedup_by_field, unique_preserving_order, DedupReport};
pub use similarity::{token_set_ratio, top_similar_pairs, SimilarPair};
