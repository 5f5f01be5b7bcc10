// src/storage/mod.rs
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::{RunConfig, VIEW_JOB_BASE};
use crate::dataset::{CompanySummary, CompanyTarget, JobRecord};
use crate::extractors::JobDetail;
use crate::utils::error::StorageError;

/// A crawl page on disk with the time it was last written.
#[derive(Debug, Clone)]
pub struct PageFile {
    pub label: String,
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
}

pub struct StorageManager {
    config: RunConfig,
}

impl StorageManager {
    /// Creates a new StorageManager for one run, creating the run directory
    /// if it doesn't exist.
    pub fn new(config: RunConfig) -> Result<Self, StorageError> {
        let run_dir = config.run_dir();
        if !run_dir.exists() {
            fs::create_dir_all(&run_dir)?;
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The primary crawl page of this run.
    pub fn primary_page(&self) -> Result<PageFile, StorageError> {
        page_file(self.config.query.clone(), self.config.primary_page())
    }

    /// Saved company pages for this query's targets, in target order.
    /// Pages cached for other queries are never picked up; a target not
    /// crawled yet is skipped.
    pub fn company_pages(&self, targets: &[CompanyTarget]) -> Result<Vec<PageFile>, StorageError> {
        let dir = self.config.company_pages_dir();
        let mut pages = Vec::new();
        for target in targets {
            let path = dir.join(format!("{}.html", target.file_stem));
            if !path.exists() {
                tracing::debug!("No saved page for target {}", target.company);
                continue;
            }
            pages.push(page_file(target.file_stem.clone(), path)?);
        }
        Ok(pages)
    }

    pub fn save_records(&self, records: &[JobRecord]) -> Result<PathBuf, StorageError> {
        let path = self.config.records_file();
        write_json(&path, records)?;
        tracing::info!("Saved {} records to {}", records.len(), path.display());
        Ok(path)
    }

    pub fn load_records(&self) -> Result<Vec<JobRecord>, StorageError> {
        read_json(&self.config.records_file())
    }

    pub fn save_companies(&self, companies: &[CompanySummary]) -> Result<PathBuf, StorageError> {
        let path = self.config.companies_file();
        write_json(&path, companies)?;
        tracing::info!("Saved {} company rows to {}", companies.len(), path.display());
        Ok(path)
    }

    /// One `{position}.{identifier}` per line.
    pub fn save_identifiers(&self, records: &[JobRecord]) -> Result<PathBuf, StorageError> {
        let path = self.config.identifiers_file();
        let mut body: String = records.iter().map(|r| r.file_key() + "\n").collect();
        if body.is_empty() {
            body.push('\n');
        }
        fs::write(&path, body)?;
        tracing::info!("Saved {} identifiers to {}", records.len(), path.display());
        Ok(path)
    }

    pub fn save_targets(&self, targets: &[CompanyTarget]) -> Result<PathBuf, StorageError> {
        let path = self.config.targets_file();
        write_json(&path, targets)?;
        tracing::info!("Saved {} company targets to {}", targets.len(), path.display());
        Ok(path)
    }

    /// Targets written by an earlier `targets` run; none if it never ran.
    pub fn load_targets(&self) -> Result<Vec<CompanyTarget>, StorageError> {
        match read_json(&self.config.targets_file()) {
            Err(StorageError::MissingInput(path)) => {
                tracing::info!("No targets file at {}; primary crawl only", path.display());
                Ok(Vec::new())
            }
            other => other,
        }
    }

    pub fn description_path(&self, record: &JobRecord) -> PathBuf {
        self.config.jobs_dir().join(format!("{}.md", record.file_key()))
    }

    pub fn has_description(&self, record: &JobRecord) -> bool {
        self.description_path(record).exists()
    }

    /// Saves the fetched page, its job JSON and the front-matter markdown.
    /// Returns the markdown path, or `None` when the page had no article.
    pub fn save_detail(&self, record: &JobRecord, html: &str, detail: &JobDetail) -> Result<Option<PathBuf>, StorageError> {
        let key = record.file_key();

        let page_path = self.config.pages_dir().join(format!("{}.html", key));
        ensure_parent(&page_path)?;
        fs::write(&page_path, html)?;

        if let Some(job) = &detail.job {
            write_json(&self.config.dicts_dir().join(format!("{}.json", key)), job)?;
        }

        if detail.description.is_empty() {
            tracing::warn!("No description in {}", page_path.display());
            return Ok(None);
        }

        let md_path = self.description_path(record);
        ensure_parent(&md_path)?;
        fs::write(&md_path, format!("{}{}", front_matter(record), detail.description))?;
        tracing::debug!("Saved description to {}", md_path.display());
        Ok(Some(md_path))
    }
}

/// YAML block of the fields worth filtering on, then the job URL.
///
/// Values are written as JSON scalars and flow sequences, which YAML reads
/// as-is.
pub fn front_matter(record: &JobRecord) -> String {
    let fields: [(&str, serde_json::Value); 10] = [
        ("company", record.company.clone().into()),
        ("title", record.title.clone().into()),
        ("hours", record.hours.into()),
        ("onsite", serde_json::to_value(record.onsite_type).unwrap_or_default()),
        ("commitment", record.commitment_type.as_ref().map(|c| c.as_str().to_string()).into()),
        ("lower", record.lower.into()),
        ("median", record.median.into()),
        ("upper", record.upper.into()),
        ("bay", record.bay_area_cities.clone().into()),
        ("skills", record.skills.clone().into()),
    ];

    let mut out = String::from("---\n");
    for (key, value) in fields {
        out.push_str(&format!("{}: {}\n", key, value));
    }
    out.push_str(&format!("---\n{}{}\n\n", VIEW_JOB_BASE, record.identifier));
    out
}

fn page_file(label: String, path: PathBuf) -> Result<PageFile, StorageError> {
    if !path.exists() {
        return Err(StorageError::MissingInput(path));
    }
    let modified = fs::metadata(&path)?.modified()?;
    Ok(PageFile { label, path, modified: DateTime::<Utc>::from(modified) })
}

fn ensure_parent(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    ensure_parent(path)?;
    let body = serde_json::to_string_pretty(value)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    fs::write(path, body)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    if !path.exists() {
        return Err(StorageError::MissingInput(path.to_path_buf()));
    }
    let body = fs::read_to_string(path)?;
    serde_json::from_str(&body).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Parse results keyed by file path and modification time. A file touched
/// since the last parse is read and parsed again.
///
/// The cache is saved next to the run outputs, so re-running a query only
/// parses the pages that changed since the previous run.
pub struct ParseCache<T> {
    entries: HashMap<PathBuf, CacheEntry<T>>,
    hits: usize,
}

#[derive(Serialize, Deserialize)]
struct CacheEntry<T> {
    path: PathBuf,
    modified: SystemTime,
    value: T,
}

impl<T: Clone + Serialize + DeserializeOwned> ParseCache<T> {
    pub fn new() -> Self {
        Self { entries: HashMap::new(), hits: 0 }
    }

    /// Loads a saved cache; a missing file gives an empty one.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let entries: Vec<CacheEntry<T>> = match read_json(path) {
            Ok(entries) => entries,
            Err(StorageError::MissingInput(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        tracing::debug!("Loaded {} parse cache entries from {}", entries.len(), path.display());
        let entries = entries.into_iter().map(|e| (e.path.clone(), e)).collect();
        Ok(Self { entries, hits: 0 })
    }

    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        let mut entries: Vec<&CacheEntry<T>> = self.entries.values().collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        write_json(path, &entries)
    }

    pub fn get_or_parse<F, E>(&mut self, path: &Path, parse: F) -> Result<T, E>
    where
        F: FnOnce(&str) -> Result<T, E>,
        E: From<StorageError>,
    {
        if !path.exists() {
            return Err(StorageError::MissingInput(path.to_path_buf()).into());
        }
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(StorageError::from)?;

        if let Some(entry) = self.entries.get(path) {
            if entry.modified == modified {
                tracing::debug!("Parse cache hit for {}", path.display());
                self.hits += 1;
                return Ok(entry.value.clone());
            }
        }

        let body = fs::read_to_string(path).map_err(StorageError::from)?;
        let value = parse(&body)?;
        let entry = CacheEntry { path: path.to_path_buf(), modified, value: value.clone() };
        self.entries.insert(path.to_path_buf(), entry);
        Ok(value)
    }

    /// Lookups answered without reading the file.
    pub fn hits(&self) -> usize {
        self.hits
    }
}

impl<T: Clone + Serialize + DeserializeOwned> Default for ParseCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::cities::CityList;
    use crate::dataset::features::tests::raw;
    use crate::dataset::FeatureEngineer;
    use chrono::NaiveDate;
    use std::cell::Cell;
    use std::time::Duration;

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("job_extractor_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn storage(name: &str) -> StorageManager {
        let date = NaiveDate::from_ymd_opt(2025, 11, 10).unwrap();
        StorageManager::new(RunConfig::new(temp_root(name), date, "DS")).unwrap()
    }

    fn record() -> JobRecord {
        let mut r = FeatureEngineer::new(CityList::empty()).derive(raw("abc123", "Acme", "Data/ML Engineer"));
        r.bay_area_cities = vec!["San Jose".to_string()];
        r
    }

    #[test]
    fn records_round_trip_and_identifiers_use_position() {
        let storage = storage("records");
        let records = vec![record()];
        storage.save_records(&records).unwrap();
        assert_eq!(storage.load_records().unwrap(), records);

        let path = storage.save_identifiers(&records).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "Acme - Data_ML Engineer.abc123\n");
    }

    #[test]
    fn missing_inputs_are_reported_with_their_path() {
        let storage = storage("missing");
        match storage.primary_page() {
            Err(StorageError::MissingInput(path)) => assert!(path.ends_with("DS.html")),
            other => panic!("expected MissingInput, got {:?}", other),
        }
        assert!(storage.load_targets().unwrap().is_empty());
    }

    fn target(company: &str) -> CompanyTarget {
        CompanyTarget {
            company: company.to_string(),
            file_stem: company.to_string(),
            key: format!("k-{}", company),
            url: String::new(),
        }
    }

    #[test]
    fn company_pages_follow_this_querys_targets_only() {
        let storage = storage("company_pages");
        let dir = storage.config().company_pages_dir();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Acme.html"), "<html></html>").unwrap();
        fs::write(dir.join("Foo.html"), "<html></html>").unwrap();

        let targets = vec![target("Acme"), target("Pending")];
        storage.save_targets(&targets).unwrap();

        let pages = storage.company_pages(&storage.load_targets().unwrap()).unwrap();
        let labels: Vec<_> = pages.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Acme"]);
    }

    #[test]
    fn detail_files_land_under_the_cache() {
        let storage = storage("detail");
        let r = record();
        let detail = JobDetail {
            description: "## Role\n\nBuild things.\n".to_string(),
            job: Some(serde_json::json!({"id": "abc123"})),
        };
        let md = storage.save_detail(&r, "<html></html>", &detail).unwrap().unwrap();
        assert!(storage.has_description(&r));

        let body = fs::read_to_string(md).unwrap();
        assert!(body.starts_with("---\ncompany: \"Acme\"\n"));
        assert!(body.contains("bay: [\"San Jose\"]\n"));
        assert!(body.contains("---\nhttps://hiring.cafe/viewjob/abc123\n\n## Role"));
        let dict = storage.config().dicts_dir().join("Acme - Data_ML Engineer.abc123.json");
        assert!(dict.exists());
    }

    #[test]
    fn empty_description_writes_no_markdown() {
        let storage = storage("empty_detail");
        let r = record();
        let detail = JobDetail { description: String::new(), job: None };
        assert!(storage.save_detail(&r, "<html></html>", &detail).unwrap().is_none());
        assert!(!storage.has_description(&r));
    }

    #[test]
    fn parse_cache_reparses_only_after_modification() {
        let dir = temp_root("cache");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("page.html");
        fs::write(&path, "one").unwrap();

        let calls = Cell::new(0);
        let parse = |body: &str| -> Result<String, StorageError> {
            calls.set(calls.get() + 1);
            Ok(body.to_uppercase())
        };

        let mut cache = ParseCache::new();
        assert_eq!(cache.get_or_parse(&path, parse).unwrap(), "ONE");
        assert_eq!(cache.get_or_parse(&path, parse).unwrap(), "ONE");
        assert_eq!(calls.get(), 1);

        fs::write(&path, "two").unwrap();
        let later = SystemTime::now() + Duration::from_secs(60);
        fs::File::options().write(true).open(&path).unwrap().set_modified(later).unwrap();

        assert_eq!(cache.get_or_parse(&path, parse).unwrap(), "TWO");
        assert_eq!(calls.get(), 2);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn saved_parse_cache_answers_the_next_run() {
        let dir = temp_root("cache_saved");
        fs::create_dir_all(&dir).unwrap();
        let page = dir.join("page.html");
        let cache_file = dir.join("parse_cache.json");
        fs::write(&page, "one").unwrap();

        let mut first: ParseCache<String> = ParseCache::load(&cache_file).unwrap();
        first.get_or_parse(&page, |body| Ok::<_, StorageError>(body.to_uppercase())).unwrap();
        first.save(&cache_file).unwrap();

        let mut second: ParseCache<String> = ParseCache::load(&cache_file).unwrap();
        let value = second
            .get_or_parse(&page, |_| -> Result<String, StorageError> { panic!("page should not be re-read") })
            .unwrap();
        assert_eq!(value, "ONE");
        assert_eq!(second.hits(), 1);
    }
}
