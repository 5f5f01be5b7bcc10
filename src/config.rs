// src/config.rs
use std::path::PathBuf;

use chrono::NaiveDate;

pub const SITE_BASE: &str = "https://hiring.cafe";
pub const VIEW_JOB_BASE: &str = "https://hiring.cafe/viewjob/";

/// File-system layout of one batch run. Every path is a pure function of
/// the data root, the run date and the query name; the date is fixed once
/// at startup and passed down.
///
/// ```text
/// {root}/raw/cities.csv
/// {root}/processed/{date}/{query}/{query}.html      primary crawl page
/// {root}/processed/{date}/{query}/{query}.json      merged records
/// {root}/processed/{date}/{query}/{query}_targets.json  company pages to crawl
/// {root}/cache/company_pages/{company}.html         secondary crawls
/// {root}/cache/jobs/{position}.{identifier}.md      descriptions
/// ```
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub root: PathBuf,
    pub run_date: NaiveDate,
    pub query: String,
}

impl RunConfig {
    pub fn new(root: impl Into<PathBuf>, run_date: NaiveDate, query: impl Into<String>) -> Self {
        Self { root: root.into(), run_date, query: query.into() }
    }

    pub fn cities_csv(&self) -> PathBuf {
        self.root.join("raw").join("cities.csv")
    }

    pub fn run_dir(&self) -> PathBuf {
        self.root
            .join("processed")
            .join(self.run_date.format("%Y-%m-%d").to_string())
            .join(&self.query)
    }

    pub fn primary_page(&self) -> PathBuf {
        self.query_file("html")
    }

    pub fn records_file(&self) -> PathBuf {
        self.query_file("json")
    }

    pub fn companies_file(&self) -> PathBuf {
        self.suffixed_file("companies", "json")
    }

    pub fn identifiers_file(&self) -> PathBuf {
        self.suffixed_file("identifiers", "txt")
    }

    pub fn targets_file(&self) -> PathBuf {
        self.suffixed_file("targets", "json")
    }

    pub fn parse_cache_file(&self) -> PathBuf {
        self.suffixed_file("parse_cache", "json")
    }

    pub fn log_file(&self) -> PathBuf {
        self.query_file("log")
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.run_dir().join("debug")
    }

    pub fn company_pages_dir(&self) -> PathBuf {
        self.cache_dir().join("company_pages")
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.cache_dir().join("jobs")
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.cache_dir().join("pages")
    }

    pub fn dicts_dir(&self) -> PathBuf {
        self.cache_dir().join("dicts")
    }

    fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    fn query_file(&self, ext: &str) -> PathBuf {
        self.run_dir().join(format!("{}.{}", self.query, ext))
    }

    fn suffixed_file(&self, suffix: &str, ext: &str) -> PathBuf {
        self.run_dir().join(format!("{}_{}.{}", self.query, suffix, ext))
    }
}
