use anyhow::Result;
use roameo_scraper::common::types::{load_records, Record};
use roameo_scraper::enrich::{EnrichTask, EnrichmentSchema, TranslateTask};
use roameo_scraper::llm::{LlmProvider, Prompt};
use roameo_scraper::pipeline::{CheckpointStore, Pipeline, PipelineOptions, UnparsableDump};
use roameo_scraper::ScraperError;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::tempdir;

/// Replays canned answers in order; errors once the script runs out.
struct ScriptedProvider {
    answers: Mutex<VecDeque<std::result::Result<String, ScraperError>>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(answers: Vec<std::result::Result<String, ScraperError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> String {
        "scripted-1".to_string()
    }

    async fn complete(&self, _prompt: &Prompt) -> roameo_scraper::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.answers.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(ScraperError::llm("scripted", "script exhausted")))
    }
}

fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

fn ok(text: &str) -> std::result::Result<String, ScraperError> {
    Ok(text.to_string())
}

fn fast_options(identity: &[&str]) -> PipelineOptions {
    PipelineOptions {
        retry_delay: Duration::from_millis(1),
        ..PipelineOptions::default()
    }
    .with_identity(identity)
}

fn klook_sample() -> Record {
    record(json!({"source_name": "Sample", "enrich_type": "events", "enrich_description": "Short"}))
}

fn ids(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

#[tokio::test]
async fn test_enrich_resumes_from_checkpoint() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("enriched_klook_data.json");
    fs::write(&output, r#"[{"klook_id": 1, "enrich_type": "events"}]"#)?;

    let items = vec![
        record(json!({"klook_id": 1, "klook_title": "Done already"})),
        record(json!({"klook_id": 2, "klook_title": "Tea Workshop"})),
        record(json!({"klook_id": 3, "klook_title": "Harbour Cruise"})),
    ];
    let provider = ScriptedProvider::new(vec![
        ok("{\"enrich_type\": \"local activities\", \"enrich_description\": \"Brew tea\"}"),
        ok("```json\n{\"enrich_type\": \"events\", \"enrich_description\": \"Sail\",}\n```"),
    ]);
    let task = EnrichTask::with_sample(klook_sample(), EnrichmentSchema::lenient());
    let mut store = CheckpointStore::open(&output, &ids(&["klook_id"]));

    let result = Pipeline::run(items, &task, &provider, &mut store, &fast_options(&["klook_id"])).await?;

    assert_eq!(result.total, 3);
    assert_eq!(result.skipped, 1);
    assert_eq!(result.processed, 2);
    assert_eq!(result.failed, 0);
    assert_eq!(provider.calls(), 2);

    let saved = load_records(&output)?;
    assert_eq!(saved.len(), 3);
    assert_eq!(saved[1]["klook_title"], "Tea Workshop");
    assert_eq!(saved[1]["enrich_type"], "local activities");
    assert_eq!(saved[2]["enrich_description"], "Sail");
    Ok(())
}

#[tokio::test]
async fn test_unparsable_answer_is_dumped_then_retried() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("out.json");
    let dump_dir = dir.path().join("unparsable");

    let provider = ScriptedProvider::new(vec![
        ok("I could not find that activity."),
        ok("{\"enrich_type\": \"events\"}"),
    ]);
    let task = EnrichTask::with_sample(klook_sample(), EnrichmentSchema::lenient());
    let mut store = CheckpointStore::open(&output, &ids(&["klook_id"]));
    let mut opts = fast_options(&["klook_id"]);
    opts.dump = Some(UnparsableDump::new(&dump_dir));

    let items = vec![record(json!({"klook_id": "77", "klook_title": "Mystery"}))];
    let result = Pipeline::run(items, &task, &provider, &mut store, &opts).await?;

    assert_eq!(result.processed, 1);
    assert_eq!(provider.calls(), 2);
    let dumps: Vec<_> = fs::read_dir(&dump_dir)?.collect::<std::result::Result<_, _>>()?;
    assert_eq!(dumps.len(), 1);
    let content = fs::read_to_string(dumps[0].path())?;
    assert!(content.contains("---MODEL---\nscripted-1"));
    assert!(content.ends_with("I could not find that activity."));
    Ok(())
}

#[tokio::test]
async fn test_quota_exhaustion_stops_the_run() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("out.json");
    let provider = ScriptedProvider::new(vec![Err(ScraperError::QuotaExceeded {
        model: "qwen-3-32b".to_string(),
    })]);
    let task = EnrichTask::with_sample(klook_sample(), EnrichmentSchema::lenient());
    let mut store = CheckpointStore::open(&output, &ids(&["klook_id"]));

    let items = vec![
        record(json!({"klook_id": 1})),
        record(json!({"klook_id": 2})),
    ];
    let result = Pipeline::run(items, &task, &provider, &mut store, &fast_options(&["klook_id"])).await?;

    assert!(result.aborted);
    assert_eq!(result.failed, 1);
    assert_eq!(result.processed, 0);
    assert_eq!(provider.calls(), 1);
    assert!(!output.exists());
    Ok(())
}

#[tokio::test]
async fn test_keep_original_writes_failed_items_unchanged() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("tatler_results_2.json");
    let provider = ScriptedProvider::new(vec![
        ok("{\"enrich_hiddenGemScore\": 70}"),
        ok("{\"enrich_hiddenGemScore\": 71}"),
    ]);
    let task = EnrichTask::scored(EnrichmentSchema::scored(false));
    let mut store = CheckpointStore::open(&output, &ids(&["source_name"]));
    let mut opts = fast_options(&["source_name"]);
    opts.max_attempts = 2;
    opts.keep_original = true;

    let items = vec![record(json!({"source_name": "Kicho", "source_address": "Central"}))];
    let result = Pipeline::run(items, &task, &provider, &mut store, &opts).await?;

    assert_eq!(result.failed, 1);
    assert_eq!(provider.calls(), 2);
    assert!(result.errors[0].contains("missing required fields"));
    let saved = load_records(&output)?;
    assert_eq!(saved, vec![record(json!({"source_name": "Kicho", "source_address": "Central"}))]);
    Ok(())
}

#[tokio::test]
async fn test_english_records_pass_through_without_a_call() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("translated_cityline_data.json");
    let provider = ScriptedProvider::new(vec![ok(
        "<think>translate the address</think>{\"source_address\": \"Central\"}",
    )]);
    let mut store = CheckpointStore::open(&output, &ids(&["cityline_name", "source_name"]));

    let items = vec![
        record(json!({"cityline_name": "Jazz", "source_address": "Central", "enrich_description": "Live jazz"})),
        record(json!({"cityline_name": "Opera", "source_address": "中環"})),
        record(json!({"source_address": "no identity"})),
    ];
    let opts = fast_options(&["cityline_name", "source_name"]);
    let result = Pipeline::run(items, &TranslateTask, &provider, &mut store, &opts).await?;

    assert_eq!(result.unchanged, 1);
    assert_eq!(result.processed, 1);
    assert_eq!(result.skipped, 1);
    assert_eq!(provider.calls(), 1);

    let saved = load_records(&output)?;
    assert_eq!(saved[0]["cityline_name"], "Jazz");
    assert_eq!(saved[1]["cityline_name"], "Opera");
    assert_eq!(saved[1]["source_address"], "Central");
    Ok(())
}
