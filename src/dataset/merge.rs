// src/dataset/merge.rs
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::features::JobRecord;

/// Which kind of crawl produced a table. At equal timestamps the primary
/// query crawl is applied before the per-company crawls that it triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CrawlKind {
    Primary,
    Company,
}

/// One crawl's engineered records.
#[derive(Debug, Clone)]
pub struct Crawl {
    pub label: String,
    pub kind: CrawlKind,
    pub crawled_at: DateTime<Utc>,
    pub records: Vec<JobRecord>,
}

impl Crawl {
    pub fn new(label: impl Into<String>, kind: CrawlKind, crawled_at: DateTime<Utc>, records: Vec<JobRecord>) -> Self {
        Self { label: label.into(), kind, crawled_at, records }
    }
}

#[derive(Debug)]
pub struct MergeOutcome {
    pub records: Vec<JobRecord>,
    pub duplicates_removed: usize,
}

/// Union of all crawls, one row per identifier.
///
/// Crawls are applied oldest first; a later crawl's row replaces the earlier
/// row for the same identifier but keeps its position, so the freshest data
/// wins while the row order stays that of first appearance. Fields a crawl
/// kind never fills (company pages carry no secondary key) stay `None`.
pub fn merge(mut crawls: Vec<Crawl>) -> MergeOutcome {
    crawls.sort_by(|a, b| a.crawled_at.cmp(&b.crawled_at).then(a.kind.cmp(&b.kind)));

    let mut records: Vec<JobRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut duplicates_removed = 0;

    for crawl in crawls {
        let incoming = crawl.records.len();
        let mut replaced = 0;
        for record in crawl.records {
            match index.get(&record.identifier) {
                Some(&slot) => {
                    records[slot] = record;
                    replaced += 1;
                }
                None => {
                    index.insert(record.identifier.clone(), records.len());
                    records.push(record);
                }
            }
        }
        duplicates_removed += replaced;
        tracing::debug!(
            "Merged crawl {} ({:?}, {}): {} rows, {} already present",
            crawl.label,
            crawl.kind,
            crawl.crawled_at,
            incoming,
            replaced
        );
    }

    MergeOutcome { records, duplicates_removed }
}
