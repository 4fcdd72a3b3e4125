//! Checkpointed, resumable LLM runs over a list of records.

pub mod checkpoint;
pub mod unparsable;

use crate::common::config::Config;
use crate::common::error::{Result, ScraperError};
use crate::common::types::{record_identity, Record};
use crate::enrich::EnrichmentTask;
use crate::llm::{LlmProvider, Prompt};
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

pub use checkpoint::CheckpointStore;
pub use unparsable::{sanitize_id, UnparsableDump};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Input fields tried in order for an item's identity.
    pub identity_fields: Vec<String>,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Pause after every item that reached the model.
    pub item_delay: Duration,
    /// Failed items are written to the output unchanged instead of dropped.
    pub keep_original: bool,
    pub dump: Option<UnparsableDump>,
    /// When set, every prompt and raw answer is written here.
    pub debug_dir: Option<PathBuf>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            identity_fields: vec!["source_name".to_string()],
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
            item_delay: Duration::ZERO,
            keep_original: false,
            dump: None,
            debug_dir: None,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.llm.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.llm.retry_delay_ms),
            item_delay: Duration::from_millis(config.rate_limits.llm_delay_ms),
            dump: Some(UnparsableDump::new(&config.paths.unparsable_dir)),
            ..Self::default()
        }
    }

    pub fn with_identity(mut self, fields: &[&str]) -> Self {
        self.identity_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }
}

/// Result of a complete pipeline run
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub run_id: String,
    pub task: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub total: usize,
    pub processed: usize,
    /// Items written without a model call.
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    /// Set when every model ran out of quota and the run stopped early.
    pub aborted: bool,
    pub output_file: String,
}

enum Outcome {
    Done(Record),
    Failed(ScraperError),
    Abort(ScraperError),
}

pub struct Pipeline;

impl Pipeline {
    #[instrument(skip_all, fields(task = task.name(), provider = provider.name()))]
    pub async fn run(
        items: Vec<Record>,
        task: &dyn EnrichmentTask,
        provider: &dyn LlmProvider,
        store: &mut CheckpointStore,
        opts: &PipelineOptions,
    ) -> Result<PipelineResult> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        info!("🚀 Starting {} run {} over {} items", task.name(), run_id, items.len());

        let mut result = PipelineResult {
            run_id,
            task: task.name().to_string(),
            started_at: Utc::now(),
            duration_secs: 0.0,
            total: items.len(),
            processed: 0,
            unchanged: 0,
            skipped: 0,
            failed: 0,
            errors: Vec::new(),
            aborted: false,
            output_file: store.path().display().to_string(),
        };

        for (index, item) in items.into_iter().enumerate() {
            let Some(id) = record_identity(&item, &opts.identity_fields) else {
                warn!("Skipping item {} without any of {:?}", index, opts.identity_fields);
                result.skipped += 1;
                continue;
            };
            if store.contains(&id) {
                debug!("Skipping already processed item: {}", id);
                result.skipped += 1;
                continue;
            }

            let prompt = match task.prompt(&item) {
                Ok(Some(prompt)) => prompt,
                Ok(None) => {
                    info!("Item '{}' needs no model call", id);
                    store.append(item)?;
                    store.mark(id);
                    result.unchanged += 1;
                    continue;
                }
                Err(e) => {
                    Self::record_failure(&mut result, task, &id, &e);
                    if opts.keep_original {
                        store.append(item)?;
                        store.mark(id);
                    }
                    continue;
                }
            };

            info!("Processing item {}/{}: {}", index + 1, result.total, id);
            match Self::process_item(&item, &id, &prompt, task, provider, opts).await {
                Outcome::Done(record) => {
                    store.append(record)?;
                    store.mark(id);
                    result.processed += 1;
                    counter!("roameo_items_processed_total", "task" => task.name()).increment(1);
                }
                Outcome::Failed(e) => {
                    Self::record_failure(&mut result, task, &id, &e);
                    if opts.keep_original {
                        store.append(item)?;
                        store.mark(id);
                    }
                }
                Outcome::Abort(e) => {
                    error!("Stopping run: {}", e);
                    Self::record_failure(&mut result, task, &id, &e);
                    result.aborted = true;
                    break;
                }
            }

            if !opts.item_delay.is_zero() {
                tokio::time::sleep(opts.item_delay).await;
            }
        }

        result.duration_secs = started.elapsed().as_secs_f64();
        counter!("roameo_items_skipped_total", "task" => task.name()).increment(result.skipped as u64);
        histogram!("roameo_pipeline_duration_seconds", "task" => task.name()).record(result.duration_secs);
        info!(
            "✅ {} finished: {} processed, {} unchanged, {} skipped, {} failed; output {}",
            result.task, result.processed, result.unchanged, result.skipped, result.failed, result.output_file
        );
        Ok(result)
    }

    async fn process_item(
        item: &Record,
        id: &str,
        prompt: &Prompt,
        task: &dyn EnrichmentTask,
        provider: &dyn LlmProvider,
        opts: &PipelineOptions,
    ) -> Outcome {
        let attempts = opts.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let call_started = Instant::now();
            let response = provider.complete(prompt).await;
            histogram!("roameo_llm_call_duration_seconds", "provider" => provider.name())
                .record(call_started.elapsed().as_secs_f64());

            let error = match response {
                Ok(text) => {
                    Self::write_debug(opts, id, prompt, &text);
                    match task.apply(item, &text) {
                        Ok(record) => return Outcome::Done(record),
                        Err(e) => {
                            if matches!(e, ScraperError::Repair(_)) {
                                if let Some(dump) = &opts.dump {
                                    let name = task.dump_name(id);
                                    if let Err(io) = dump.write(&name, &prompt.user, &provider.model(), &text) {
                                        warn!("could not write unparsable dump for {}: {}", id, io);
                                    }
                                }
                            }
                            e
                        }
                    }
                }
                Err(e @ ScraperError::QuotaExceeded { .. }) => return Outcome::Abort(e),
                Err(e) => e,
            };

            if !error.is_retryable() {
                return Outcome::Failed(error);
            }
            warn!("attempt {}/{} for {} failed: {}", attempt, attempts, id, error);
            last_error = Some(error);
            if attempt < attempts {
                tokio::time::sleep(opts.retry_delay).await;
            }
        }

        Outcome::Failed(last_error.unwrap_or_else(|| ScraperError::llm(provider.name(), "no attempts made")))
    }

    fn record_failure(result: &mut PipelineResult, task: &dyn EnrichmentTask, id: &str, e: &ScraperError) {
        error!("Failed to process {}: {}", id, e);
        result.failed += 1;
        result.errors.push(format!("{}: {}", id, e));
        counter!("roameo_items_failed_total", "task" => task.name()).increment(1);
    }

    fn write_debug(opts: &PipelineOptions, id: &str, prompt: &Prompt, response: &str) {
        let Some(dir) = &opts.debug_dir else {
            return;
        };
        let stem = sanitize_id(id);
        let written = fs::create_dir_all(dir)
            .and_then(|_| fs::write(dir.join(format!("prompt_{}.txt", stem)), &prompt.user))
            .and_then(|_| fs::write(dir.join(format!("content_{}.txt", stem)), response));
        if let Err(e) = written {
            warn!("could not write debug files for {}: {}", id, e);
        }
    }
}
