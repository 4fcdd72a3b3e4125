use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_DIR: &str = "logs";
const DEFAULT_DIRECTIVE: &str = "roameo_scraper=info";

/// Console output plus a JSON file rotated daily under `logs/`.
///
/// `RUST_LOG` replaces the default filter. Keep the returned guard alive
/// until exit so buffered file lines are flushed.
pub fn init_logging() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    if let Err(e) = fs::create_dir_all(LOG_DIR) {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
        tracing::warn!("file logging disabled, cannot create {}: {}", LOG_DIR, e);
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(LOG_DIR, "roameo_scraper.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer().json().with_writer(writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
    Some(guard)
}
