use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use roameo_scraper::common::config::{Config, DEFAULT_CONFIG_PATH};
use roameo_scraper::common::types::{load_records, records_from_value, save_records, write_json_pretty, Record};
use roameo_scraper::enrich::tasks::{FULL_OBJECT_INPUT_KEY, FULL_OBJECT_TRACKING_KEY, STRUCTURE_URL_KEY};
use roameo_scraper::enrich::{
    EnrichTask, EnrichmentSchema, EnrichmentTask, FullObjectTask, PriceTask, StructureTask, TranslateTask,
};
use roameo_scraper::llm::{CerebrasProvider, GeminiProvider, LlmProvider, PerplexityProvider};
use roameo_scraper::logging;
use roameo_scraper::pipeline::{CheckpointStore, Pipeline, PipelineOptions, PipelineResult, UnparsableDump};
use roameo_scraper::records::{self, eventbrite, fields, klook, location, values};
use roameo_scraper::repair::{lenient_fixups, RepairEngine};
use roameo_scraper::scrapers::eventbrite::EventbriteSource;
use roameo_scraper::scrapers::tatler::TatlerSource;
use roameo_scraper::scrapers::timeout::TimeoutSource;
use roameo_scraper::scrapers::wanderlog::WanderlogDetails;
use roameo_scraper::scrapers::{klook as klook_pages, Fetcher, VenueSource};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "roameo_scraper")]
#[command(about = "Scrape, repair, clean and enrich Hong Kong venue and activity listings")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML config (defaults apply when missing)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Repair a malformed JSON file
    Repair {
        #[arg(default_value = "timeout/timeout_bar_final.json")]
        input: PathBuf,
        #[arg(default_value = "timeout/timeout_bar_fixed.json")]
        output: PathBuf,
        /// Treat the file as a `{source_url, <key>: [...]}` listing container
        #[arg(long)]
        listing_key: Option<String>,
        /// Leave nested record arrays in place
        #[arg(long)]
        no_flatten: bool,
    },
    /// Drop records whose id was already seen
    Dedup {
        #[arg(default_value = "structured_activity_data.json")]
        input: PathBuf,
        #[arg(long, default_value = "id")]
        field: String,
        /// Defaults to rewriting the input
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the most similar record name pairs
    Similar {
        #[arg(default_value = "cityline/enriched_cityline_data.json")]
        input: PathBuf,
        #[arg(long, default_value = "source_name")]
        field: String,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Strip page noise and decode unicode escapes in scraped page text
    CleanValues {
        #[arg(default_value = "scraped_activity_data.json")]
        input: PathBuf,
        #[arg(default_value = "cleaned_activity_data.json")]
        output: PathBuf,
    },
    /// Normalize Klook addresses in place
    CleanLocation {
        #[arg(default_value = "klook_activity_data.json")]
        file: PathBuf,
    },
    /// Map structured activity details to klook_* records
    MapKlook {
        #[arg(default_value = "structured_activity_data.json")]
        input: PathBuf,
        #[arg(default_value = "klook_activity_data.json")]
        output: PathBuf,
    },
    /// Add source_* fields to mapped Klook records
    TransformKlook {
        #[arg(default_value = "klook_activity_data.json")]
        input: PathBuf,
        #[arg(default_value = "transformed_klook_data.json")]
        output: PathBuf,
    },
    /// Keep only Klook activity links from a link scrape
    FilterLinks {
        #[arg(default_value = "scraped_links_simple.json")]
        input: PathBuf,
        #[arg(default_value = "filtered_activity_links.json")]
        output: PathBuf,
    },
    /// Merge Eventbrite link scrapes into one sorted list of event links
    EventbriteLinks {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long, default_value = "eventbrite/unique_eventbrite_links.txt")]
        output: PathBuf,
    },
    /// Bulk field edits over a record file
    Fields {
        file: PathBuf,
        /// Defaults to rewriting the input
        #[arg(long)]
        output: Option<PathBuf>,
        #[command(subcommand)]
        op: FieldOp,
    },
    /// Scrape a site
    Scrape {
        #[command(subcommand)]
        source: ScrapeSource,
    },
    /// Add enrich_* fields to each record
    Enrich {
        #[arg(long, default_value = "transformed_klook_data.json")]
        input: PathBuf,
        #[arg(long, default_value = "sample_enriched_object.json")]
        sample: PathBuf,
        #[arg(long, default_value = "enrichment_output/enriched_klook_data.json")]
        output: PathBuf,
        #[arg(long, value_enum, default_value_t = EnrichProvider::Cerebras)]
        provider: EnrichProvider,
        /// Identity fields, tried in order
        #[arg(long = "id-field")]
        id_fields: Vec<String>,
        /// Reject enrichments whose tag weights or scores are malformed
        #[arg(long)]
        strict: bool,
    },
    /// Build whole records from a web search on each item's name and tags
    EnrichFull {
        #[arg(long, default_value = "cityline/cityline_data.json")]
        input: PathBuf,
        #[arg(long, default_value = "sample_full_object.json")]
        sample: PathBuf,
        #[arg(long, default_value = "cityline/enriched_cityline_data.json")]
        output: PathBuf,
    },
    /// Translate non-English text fields to English
    Translate {
        #[arg(long, default_value = "cityline/enriched_cityline_data.json")]
        input: PathBuf,
        #[arg(long, default_value = "cityline/translated_cityline_data.json")]
        output: PathBuf,
        /// Use only this model instead of the configured rotation
        #[arg(long)]
        model: Option<String>,
    },
    /// Turn raw Klook page text into structured activity details
    Structure {
        #[arg(long, default_value = "cleaned_activity_data.json")]
        input: PathBuf,
        #[arg(long, default_value = "sampleData.json")]
        sample: PathBuf,
        #[arg(long, default_value = "activityDetails.ts")]
        type_definition: PathBuf,
        #[arg(long, default_value = "structured_activity_data.json")]
        output: PathBuf,
    },
    /// Ask for a $..$$$$ price band for bars without one
    Price {
        #[arg(long, default_value = "timeout/timeout_bars.json")]
        input: PathBuf,
        #[arg(long, default_value = "timeout/timeout_bars_enriched.json")]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
enum FieldOp {
    /// Remove every key starting with the prefix
    StripPrefixed { prefix: String },
    Remove { name: String },
    /// Multiply a numeric field
    Scale { field: String, factor: f64 },
    Copy { from: String, to: String },
    /// Replace one value inside a list field
    ReplaceListValue { field: String, from: String, to: String },
    /// Fill enrich_localName and enrich_englishName from source_name
    DefaultNames,
    /// Derive enrich_type and enrich_neighborhood
    TypeNeighbourhood,
}

#[derive(Subcommand)]
enum ScrapeSource {
    /// Collect every link on the given pages
    Links {
        #[arg(required = true)]
        urls: Vec<String>,
        #[arg(long, default_value = "scraped_links_simple.json")]
        output: PathBuf,
    },
    /// Klook activity pages
    Klook {
        #[arg(long, default_value = "filtered_activity_links.json")]
        links: PathBuf,
        #[arg(long, default_value = "scraped_activity_data.json")]
        output: PathBuf,
    },
    /// Eventbrite event pages
    Eventbrite {
        #[arg(long, default_value = "eventbrite/unique_eventbrite_links.txt")]
        links: PathBuf,
        #[arg(long, default_value = "eventbrite/scraped_eventbrite.json")]
        output: PathBuf,
    },
    /// TimeOut best-bars listing plus detail pages
    Timeout {
        #[arg(long)]
        listing_url: Option<String>,
        #[arg(long, default_value = "timeout/timeout_bars.json")]
        output: PathBuf,
    },
    /// Tatler best-restaurants listing plus detail pages
    Tatler {
        #[arg(long)]
        listing_url: Option<String>,
        #[arg(long, default_value = "tatler/tatler_results.json")]
        output: PathBuf,
    },
    /// Refresh TimeOut tips, descriptions and awards in a saved bar file
    TimeoutNotes {
        #[arg(default_value = "timeout/timeout_bars.json")]
        file: PathBuf,
        #[arg(long)]
        listing_url: Option<String>,
    },
    /// Merge Tatler detail pages (tips, must-try dishes) into a saved file
    TatlerNotes {
        #[arg(default_value = "tatler/tatler_results.json")]
        file: PathBuf,
    },
    /// Fill description, rating, signature and tips from Wanderlog place pages
    WanderlogDetails {
        #[arg(default_value = "wanderlog/hong_kong_bars_precise.json")]
        file: PathBuf,
        /// Key of the record list inside the file
        #[arg(long, default_value = "bars")]
        list_key: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum EnrichProvider {
    Cerebras,
    Gemini,
}

fn read_value(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn read_object(path: &Path) -> Result<Record> {
    match read_value(path)? {
        Value::Object(map) => Ok(map),
        _ => bail!("{} must hold a JSON object", path.display()),
    }
}

fn read_records(path: &Path) -> Result<Vec<Record>> {
    load_records(path).with_context(|| format!("loading records from {}", path.display()))
}

fn ids(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

fn print_result(result: &PipelineResult) {
    println!("\n📊 {} results (run {}):", result.task, result.run_id);
    println!("   Total items: {}", result.total);
    println!("   Processed: {}", result.processed);
    println!("   Unchanged: {}", result.unchanged);
    println!("   Skipped: {}", result.skipped);
    println!("   Failed: {}", result.failed);
    println!(
        "   Started: {} ({:.1}s)",
        result.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        result.duration_secs
    );
    println!("   Output file: {}", result.output_file);
    if !result.errors.is_empty() {
        println!("\n⚠️  Errors encountered:");
        for error in &result.errors {
            println!("   - {}", error);
        }
    }
    if result.aborted {
        println!("\n❌ Run stopped early: every model is out of quota");
    }
}

async fn run_pipeline(
    items: Vec<Record>,
    task: &dyn EnrichmentTask,
    provider: &dyn LlmProvider,
    output: &Path,
    store_identity: Option<&[&str]>,
    opts: PipelineOptions,
) -> Result<()> {
    let store_identity = match store_identity {
        Some(fields) => ids(fields),
        None => opts.identity_fields.clone(),
    };
    let mut store = CheckpointStore::open(output, &store_identity);
    let result = Pipeline::run(items, task, provider, &mut store, &opts).await?;
    print_result(&result);
    Ok(())
}

fn repair_file(input: &Path, output: &Path, listing_key: Option<&str>, flatten: bool) -> Result<()> {
    let text = fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let engine = RepairEngine::new().with_flatten(flatten);
    let repaired = match listing_key {
        Some(key) => engine.repair_listing(&text, key),
        None => engine.repair(&text),
    };
    match repaired {
        Ok(repaired) => {
            write_json_pretty(output, &repaired.value)?;
            let report = &repaired.report;
            println!("✅ Repaired with {:?} strategy -> {}", report.strategy, output.display());
            println!(
                "   Flattened: {}, recovered: {}, dropped: {}",
                report.flattened,
                report.recovered,
                report.dropped.len()
            );
            for dropped in &report.dropped {
                warn!("dropped fragment at byte {}: {}", dropped.offset, dropped.reason);
            }
            Ok(())
        }
        Err(e) => {
            let mut partial = output.as_os_str().to_owned();
            partial.push(".partial");
            let partial = PathBuf::from(partial);
            fs::write(&partial, lenient_fixups(&text))?;
            error!("repair failed, best-effort text written to {}", partial.display());
            Err(e.into())
        }
    }
}

fn edit_fields(file: &Path, output: Option<&Path>, op: FieldOp) -> Result<()> {
    let mut items = read_records(file)?;
    let changed = match op {
        FieldOp::StripPrefixed { prefix } => fields::strip_prefixed(&mut items, &prefix),
        FieldOp::Remove { name } => fields::remove_field(&mut items, &name),
        FieldOp::Scale { field, factor } => fields::scale_numeric(&mut items, &field, factor),
        FieldOp::Copy { from, to } => fields::copy_field(&mut items, &from, &to),
        FieldOp::ReplaceListValue { field, from, to } => {
            fields::replace_list_value(&mut items, &field, &from, &to)
        }
        FieldOp::DefaultNames => fields::default_names_from_source(&mut items),
        FieldOp::TypeNeighbourhood => fields::derive_type_and_neighbourhood(&mut items),
    };
    let target = output.unwrap_or(file);
    save_records(target, &items)?;
    println!("✅ Updated {} of {} records -> {}", changed, items.len(), target.display());
    Ok(())
}

/// Links from a plain text file (one per line) or a JSON link document.
fn read_links(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let links = match serde_json::from_str::<Value>(&content) {
        Ok(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        Ok(Value::Object(doc)) => ["filtered_activity_links", "all_links"]
            .iter()
            .find_map(|key| doc.get(*key).and_then(Value::as_array))
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default(),
        _ => content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
    };
    Ok(links)
}

async fn scrape(source: ScrapeSource, config: &Config) -> Result<()> {
    let fetcher = Fetcher::from_config(config)?;
    let delay = Duration::from_millis(config.rate_limits.scrape_delay_ms);

    match source {
        ScrapeSource::Links { urls, output } => {
            let scrape = fetcher.scrape_links(&urls, delay).await;
            write_json_pretty(&output, &scrape)?;
            println!(
                "✅ {} links from {} pages -> {}",
                scrape.total_links_found,
                scrape.total_urls_scraped,
                output.display()
            );
        }
        ScrapeSource::Klook { links, output } => {
            let urls = read_links(&links)?;
            let mut results = if output.exists() {
                match read_value(&output) {
                    Ok(Value::Object(map)) => map,
                    _ => {
                        warn!("could not reuse {}, starting fresh", output.display());
                        Record::new()
                    }
                }
            } else {
                Record::new()
            };
            let scraped = klook_pages::scrape_activity_pages(&fetcher, &urls, &mut results, &output, delay).await?;
            println!("✅ Scraped {} pages ({} total) -> {}", scraped, results.len(), output.display());
        }
        ScrapeSource::Eventbrite { links, output } => {
            let source = EventbriteSource::new(fetcher, read_links(&links)?, delay);
            let mut store = CheckpointStore::open(&output, &ids(&["url"]));
            let scraped = source.scrape_into(&mut store).await?;
            println!("✅ Scraped {} new events ({} total) -> {}", scraped, store.len(), output.display());
        }
        ScrapeSource::Timeout { listing_url, output } => {
            let source = match listing_url {
                Some(url) => TimeoutSource::with_listing_url(fetcher, &url, delay),
                None => TimeoutSource::new(fetcher, delay),
            };
            save_listing(&source, &output).await?;
        }
        ScrapeSource::Tatler { listing_url, output } => {
            let mut source = TatlerSource::new(fetcher, delay);
            if let Some(url) = listing_url {
                source = source.with_listing_url(&url);
            }
            save_listing(&source, &output).await?;
        }
        ScrapeSource::TimeoutNotes { file, listing_url } => {
            let source = match listing_url {
                Some(url) => TimeoutSource::with_listing_url(fetcher, &url, delay),
                None => TimeoutSource::new(fetcher, delay),
            };
            let mut bars = read_records(&file)?;
            let awarded = source.annotate(&mut bars).await?;
            save_records(&file, &bars)?;
            println!("✅ {} bars annotated ({} with awards) -> {}", bars.len(), awarded, file.display());
        }
        ScrapeSource::TatlerNotes { file } => {
            let source = TatlerSource::new(fetcher, delay);
            let mut restaurants = read_records(&file)?;
            let merged = source.annotate(&mut restaurants).await;
            save_records(&file, &restaurants)?;
            println!("✅ {} of {} restaurants updated -> {}", merged, restaurants.len(), file.display());
        }
        ScrapeSource::WanderlogDetails { file, list_key } => {
            let mut doc = read_object(&file)?;
            let items = match doc.remove(&list_key) {
                Some(items @ Value::Array(_)) => items,
                _ => bail!("{} has no '{}' list", file.display(), list_key),
            };
            let mut bars = records_from_value(items)?;
            let fetched = WanderlogDetails::new(fetcher, delay).annotate(&mut bars).await;
            doc.insert(list_key, Value::Array(bars.into_iter().map(Value::Object).collect()));
            write_json_pretty(&file, &doc)?;
            println!("✅ {} place pages merged -> {}", fetched, file.display());
        }
    }
    Ok(())
}

async fn save_listing(source: &dyn VenueSource, output: &Path) -> Result<()> {
    let venues = source.fetch_listing().await?;
    save_records(output, &venues)?;
    info!("saved {} {} records", venues.len(), source.source_name());
    println!("✅ {} {} records -> {}", venues.len(), source.source_name(), output.display());
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_from(&cli.config)?;

    match cli.command {
        Commands::Repair {
            input,
            output,
            listing_key,
            no_flatten,
        } => repair_file(&input, &output, listing_key.as_deref(), !no_flatten)?,
        Commands::Dedup { input, field, output } => {
            let report = records::dedup_by_field(read_records(&input)?, &field);
            let target = output.as_deref().unwrap_or(&input);
            save_records(target, &report.records)?;
            println!(
                "✅ {} -> {} records ({} removed) -> {}",
                report.original_count,
                report.new_count,
                report.removed(),
                target.display()
            );
            if !report.duplicate_ids.is_empty() {
                println!("   Duplicate ids: {}", report.duplicate_ids.join(", "));
            }
        }
        Commands::Similar { input, field, top } => {
            let items = read_records(&input)?;
            for pair in records::top_similar_pairs(&items, &field, top) {
                println!("{:>3}  {}  <->  {}", pair.score, pair.first, pair.second);
            }
        }
        Commands::CleanValues { input, output } => {
            let (cleaned, undecodable) = values::clean_scraped_values(read_object(&input)?);
            write_json_pretty(&output, &cleaned)?;
            println!("✅ Cleaned {} pages -> {}", cleaned.len(), output.display());
            if undecodable > 0 {
                println!("⚠️  {} values kept undecoded escapes", undecodable);
            }
        }
        Commands::CleanLocation { file } => {
            let mut items = read_records(&file)?;
            let changed = location::clean_location(&mut items);
            save_records(&file, &items)?;
            println!("✅ Cleaned {} addresses in {}", changed, file.display());
        }
        Commands::MapKlook { input, output } => {
            let items = match read_value(&input)? {
                Value::Array(items) => items,
                _ => bail!("{} must hold a JSON array", input.display()),
            };
            let (mapped, failures) = klook::map_activities(&items);
            for (index, reason) in &failures {
                warn!("skipped activity {}: {}", index, reason);
            }
            save_records(&output, &mapped)?;
            println!("✅ Mapped {} activities -> {}", mapped.len(), output.display());
        }
        Commands::TransformKlook { input, output } => {
            let transformed: Vec<Record> = read_records(&input)?.iter().map(klook::transform_to_source).collect();
            save_records(&output, &transformed)?;
            println!("✅ Transformed {} activities -> {}", transformed.len(), output.display());
        }
        Commands::FilterLinks { input, output } => {
            let doc = klook::filter_links_document(&read_value(&input)?)?;
            write_json_pretty(&output, &doc)?;
            println!(
                "✅ {} activity links out of {} -> {}",
                doc.total_activity_links,
                doc.original_total_links,
                output.display()
            );
        }
        Commands::EventbriteLinks { inputs, output } => {
            let mut all_links = Vec::new();
            for input in inputs.iter().filter(|p| p.exists()) {
                all_links.extend(read_links(input)?);
            }
            let unique = eventbrite::normalize_links(all_links.iter().map(String::as_str));
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let body: String = unique.iter().map(|l| format!("{}\n", l)).collect();
            fs::write(&output, body)?;
            println!("✅ {} unique event links -> {}", unique.len(), output.display());
        }
        Commands::Fields { file, output, op } => edit_fields(&file, output.as_deref(), op)?,
        Commands::Scrape { source } => scrape(source, &config).await?,
        Commands::Enrich {
            input,
            sample,
            output,
            provider,
            id_fields,
            strict,
        } => {
            let items = read_records(&input)?;
            let mut opts = PipelineOptions::from_config(&config);
            match provider {
                EnrichProvider::Cerebras => {
                    let task = EnrichTask::with_sample(read_object(&sample)?, EnrichmentSchema::new(&[], strict));
                    opts.identity_fields = if id_fields.is_empty() { ids(&["klook_id"]) } else { id_fields };
                    let llm = CerebrasProvider::from_config(&config)?;
                    run_pipeline(items, &task, &llm, &output, None, opts).await?;
                }
                EnrichProvider::Gemini => {
                    let task = EnrichTask::scored(EnrichmentSchema::scored(strict));
                    opts.identity_fields = if id_fields.is_empty() { ids(&["source_name"]) } else { id_fields };
                    opts.keep_original = true;
                    opts.debug_dir = Some(config.paths.debug_dir.clone());
                    let llm = GeminiProvider::from_config(&config)?;
                    run_pipeline(items, &task, &llm, &output, None, opts).await?;
                }
            }
        }
        Commands::EnrichFull { input, sample, output } => {
            let task = FullObjectTask::new(read_object(&sample)?);
            let opts = PipelineOptions::from_config(&config).with_identity(&[FULL_OBJECT_INPUT_KEY]);
            let llm = PerplexityProvider::from_config(&config)?;
            run_pipeline(read_records(&input)?, &task, &llm, &output, Some(&[FULL_OBJECT_TRACKING_KEY][..]), opts).await?;
        }
        Commands::Translate { input, output, model } => {
            let mut config = config;
            if let Some(model) = model {
                config.llm.cerebras_models = vec![model];
            }
            let mut opts = PipelineOptions::from_config(&config).with_identity(&["cityline_name", "source_name"]);
            if let Some(dir) = output.parent() {
                opts.dump = Some(UnparsableDump::new(dir.join("unparsable_translations")));
            }
            let llm = CerebrasProvider::from_config(&config)?;
            run_pipeline(
                read_records(&input)?,
                &TranslateTask,
                &llm,
                &output,
                None,
                opts,
            )
            .await?;
        }
        Commands::Structure {
            input,
            sample,
            type_definition,
            output,
        } => {
            let definition = fs::read_to_string(&type_definition)
                .with_context(|| format!("reading {}", type_definition.display()))?;
            let task = StructureTask::new(definition, read_value(&sample)?);
            let items = StructureTask::items_from_pages(read_object(&input)?);
            let opts = PipelineOptions::from_config(&config).with_identity(&[STRUCTURE_URL_KEY]);
            let llm = CerebrasProvider::from_config(&config)?;
            run_pipeline(items, &task, &llm, &output, Some(&["url"][..]), opts).await?;
        }
        Commands::Price { input, output } => {
            let opts = PipelineOptions::from_config(&config).with_identity(&["source_name"]);
            let llm = PerplexityProvider::from_config(&config)?;
            run_pipeline(read_records(&input)?, &PriceTask, &llm, &output, None, opts).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repair_defaults_to_the_timeout_dump() {
        let cli = Cli::try_parse_from(["roameo_scraper", "repair"]).unwrap();
        match cli.command {
            Commands::Repair { input, output, listing_key, no_flatten } => {
                assert_eq!(input, PathBuf::from("timeout/timeout_bar_final.json"));
                assert_eq!(output, PathBuf::from("timeout/timeout_bar_fixed.json"));
                assert!(listing_key.is_none());
                assert!(!no_flatten);
            }
            _ => panic!("expected the repair command"),
        }
    }

    #[test]
    fn wanderlog_details_default_to_the_bars_list() {
        let cli = Cli::try_parse_from(["roameo_scraper", "scrape", "wanderlog-details"]).unwrap();
        match cli.command {
            Commands::Scrape {
                source: ScrapeSource::WanderlogDetails { file, list_key },
            } => {
                assert_eq!(file, PathBuf::from("wanderlog/hong_kong_bars_precise.json"));
                assert_eq!(list_key, "bars");
            }
            _ => panic!("expected scrape wanderlog-details"),
        }
    }
}
