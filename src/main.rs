// src/main.rs
mod config;
mod dataset;
mod extractors;
mod fetch;
mod storage;
mod utils;

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use config::RunConfig;
use dataset::search::PhraseMask;
use dataset::{aggregate, merge, secondary_targets, CityList, Crawl, CrawlKind, FeatureEngineer};
use extractors::{CardParser, PageParse};
use storage::{PageFile, ParseCache, StorageManager};
use utils::error::ExtractError;
use utils::AppError;

/// Command Line Interface for the job board card extractor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data root holding raw/, processed/ and cache/
    #[arg(short, long, default_value = "./data")]
    root: PathBuf,

    /// Name of the saved search query
    #[arg(short, long)]
    query: String,

    /// Run date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse the query's crawl pages into records and company summaries
    Parse {
        /// Debug mode - save annotated HTML for skipped or drifted cards
        #[arg(short, long)]
        debug: bool,
    },
    /// List companies whose listings need their own crawl
    Targets {
        /// Query-string tail appended to each company URL
        #[arg(long, default_value = "")]
        search_state: String,
    },
    /// Download and save job descriptions not cached yet
    Describe {
        /// Pause before each request, in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Print records matching a phrase
    Search {
        phrase: String,

        /// Treat the phrase as a regular expression
        #[arg(long)]
        regex: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Parse CLI Arguments
    let args = Args::parse();

    // 2. Fix the run layout once; every path derives from it
    check_query(&args.query)?;
    let run_date = args.date.unwrap_or_else(|| chrono::Local::now().date_naive());
    let config = RunConfig::new(&args.root, run_date, &args.query);

    // 3. Setup Logging (reads RUST_LOG env var), mirrored into the run log
    utils::logging::setup_logging(Some(&config.log_file()));
    tracing::info!("Starting processing for args: {:?}", args);

    // 4. Initialize storage
    let storage = StorageManager::new(config)?;

    match args.command {
        Command::Parse { debug } => run_parse(&storage, debug),
        Command::Targets { search_state } => run_targets(&storage, &search_state),
        Command::Describe { delay_ms } => {
            let records = storage.load_records()?;
            let source = match delay_ms {
                Some(ms) => fetch::HttpPageSource::with_delay(Duration::from_millis(ms))?,
                None => fetch::HttpPageSource::new()?,
            };
            tracing::info!("Syncing descriptions for {} records", records.len());
            let report = fetch::sync_descriptions(&source, &storage, &records).await?;
            check_sync(&report)
        }
        Command::Search { phrase, regex } => run_search(&storage, &phrase, regex),
    }
}

fn check_query(query: &str) -> Result<(), AppError> {
    if query.trim().is_empty() || query.contains(['/', '\\']) {
        return Err(AppError::Config(format!("Query name {:?} cannot be used as a directory name", query)));
    }
    Ok(())
}

/// A sync that saved nothing but hit failures is a failed run.
fn check_sync(report: &fetch::SyncReport) -> Result<(), AppError> {
    if report.saved == 0 && report.failed > 0 {
        return Err(AppError::Processing(format!("Failed to fetch any of {} detail pages", report.failed)));
    }
    Ok(())
}

fn run_parse(storage: &StorageManager, debug: bool) -> Result<(), AppError> {
    let config = storage.config();

    let cities = match CityList::from_csv_path(&config.cities_csv()) {
        Ok(cities) => cities,
        Err(e) => {
            tracing::warn!("City list unavailable, no locations will be tagged: {}", e);
            CityList::empty()
        }
    };
    if cities.is_empty() {
        tracing::warn!("City list is empty");
    } else {
        tracing::info!("Loaded {} reference cities", cities.len());
    }
    let engineer = FeatureEngineer::new(cities);

    let mut parser = CardParser::new();
    if debug {
        parser = parser.with_debug_dir(config.debug_dir());
    }
    let cache_file = config.parse_cache_file();
    let mut cache: ParseCache<PageParse> = match ParseCache::load(&cache_file) {
        Ok(cache) => cache,
        Err(e) => {
            tracing::warn!("Ignoring unreadable parse cache {}: {}", cache_file.display(), e);
            ParseCache::new()
        }
    };
    let mut duplicates_removed = 0;

    let primary = storage.primary_page()?;
    let (crawl, removed) = parse_crawl(&parser, &engineer, &mut cache, &primary, CrawlKind::Primary)?;
    duplicates_removed += removed;
    let mut crawls = vec![crawl];

    let targets = storage.load_targets()?;
    for page in storage.company_pages(&targets)? {
        let (crawl, removed) = parse_crawl(&parser, &engineer, &mut cache, &page, CrawlKind::Company)?;
        duplicates_removed += removed;
        crawls.push(crawl);
    }
    tracing::info!("Parsed {} crawl pages ({} unchanged since the last run)", crawls.len(), cache.hits());
    if let Err(e) = cache.save(&cache_file) {
        tracing::warn!("Failed to save parse cache: {}", e);
    }

    let outcome = merge(crawls);
    duplicates_removed += outcome.duplicates_removed;
    let companies = aggregate(&outcome.records);

    storage.save_records(&outcome.records)?;
    storage.save_companies(&companies)?;
    storage.save_identifiers(&outcome.records)?;

    tracing::info!(
        "Processing finished. Rows: {}, companies: {}, duplicates removed: {}",
        outcome.records.len(),
        companies.len(),
        duplicates_removed
    );
    Ok(())
}

fn parse_crawl(
    parser: &CardParser,
    engineer: &FeatureEngineer,
    cache: &mut ParseCache<PageParse>,
    page: &PageFile,
    kind: CrawlKind,
) -> Result<(Crawl, usize), AppError> {
    let parsed = cache.get_or_parse(&page.path, |html| {
        parser.parse_page(html, &page.label).map_err(AppError::from)
    })?;
    tracing::debug!(
        "{}: {:?} layout, {} of {} cards kept",
        page.label,
        parsed.layout,
        parsed.records.len(),
        parsed.cards_seen
    );
    if parsed.cards_skipped > 0 {
        tracing::warn!("{}: {} cards skipped", page.label, parsed.cards_skipped);
    }

    let engineered = engineer.engineer(parsed.records);
    let crawl = Crawl::new(page.label.clone(), kind, page.modified, engineered.records);
    Ok((crawl, engineered.duplicates_removed))
}

fn run_targets(storage: &StorageManager, search_state: &str) -> Result<(), AppError> {
    let records = storage.load_records()?;
    let targets = secondary_targets(&records, search_state);
    if targets.is_empty() {
        tracing::warn!("{}", ExtractError::EmptyCrawl("no companies with multiple listings".to_string()));
    }
    storage.save_targets(&targets)?;
    Ok(())
}

fn run_search(storage: &StorageManager, phrase: &str, regex: bool) -> Result<(), AppError> {
    let records = storage.load_records()?;
    let mask = PhraseMask::new(phrase, regex)?;
    let hits = mask.filter(&records);
    for record in &hits {
        println!("{}", record.file_key());
    }
    tracing::info!("{} of {} records match {:?}", hits.len(), records.len(), phrase);
    Ok(())
}
