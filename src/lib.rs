pub mod common;
pub mod enrich;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod rate_limiter;
pub mod records;
pub mod repair;
pub mod scrapers;

pub use common::error::{Result, ScraperError};
pub use common::types::Record;
