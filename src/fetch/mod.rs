// src/fetch/mod.rs
pub mod client;

use async_trait::async_trait;
use url::Url;

use crate::config::VIEW_JOB_BASE;
use crate::dataset::JobRecord;
use crate::extractors::extract_detail;
use crate::storage::StorageManager;
use crate::utils::error::{AppError, FetchError};

pub use client::HttpPageSource;

/// Anything that can hand back the HTML behind a URL.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

pub fn view_job_url(identifier: &str) -> Result<Url, FetchError> {
    Ok(Url::parse(VIEW_JOB_BASE)?.join(identifier)?)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub saved: usize,
    pub cached: usize,
    pub empty: usize,
    pub failed: usize,
}

/// Fetches and stores the detail page of every record that has no cached
/// description yet. Pages are requested sequentially. A rate-limit response
/// stops the sync; any other per-page failure is logged and counted.
pub async fn sync_descriptions<S>(source: &S, storage: &StorageManager, records: &[JobRecord]) -> Result<SyncReport, AppError>
where
    S: PageSource + ?Sized,
{
    let mut report = SyncReport::default();

    for record in records {
        if storage.has_description(record) {
            report.cached += 1;
            continue;
        }

        let url = view_job_url(&record.identifier)?;
        let html = match source.fetch(url.as_str()).await {
            Ok(html) => html,
            Err(FetchError::RateLimited) => {
                tracing::error!("Rate limited after {} pages; stopping", report.saved);
                return Err(FetchError::RateLimited.into());
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", url, e);
                report.failed += 1;
                continue;
            }
        };

        let detail = match extract_detail(&html) {
            Ok(detail) => detail,
            Err(e) => {
                tracing::warn!("Failed to read detail page for {}: {}", record.file_key(), e);
                report.failed += 1;
                continue;
            }
        };

        match storage.save_detail(record, &html, &detail)? {
            Some(_) => report.saved += 1,
            None => report.empty += 1,
        }
    }

    tracing::info!(
        "Description sync finished. Saved: {}, cached: {}, empty: {}, failed: {}",
        report.saved,
        report.cached,
        report.empty,
        report.failed
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::dataset::cities::CityList;
    use crate::dataset::features::tests::raw;
    use crate::dataset::FeatureEngineer;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StubSource {
        pages: HashMap<String, Result<String, u16>>,
        requested: Mutex<Vec<String>>,
    }

    impl StubSource {
        fn new(pages: &[(&str, Result<&str, u16>)]) -> Self {
            let pages = pages
                .iter()
                .map(|(id, page)| (format!("{}{}", VIEW_JOB_BASE, id), page.map(str::to_string)))
                .collect();
            Self { pages, requested: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl PageSource for StubSource {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.requested.lock().unwrap().push(url.to_string());
            match self.pages.get(url) {
                Some(Ok(html)) => Ok(html.clone()),
                Some(Err(429)) => Err(FetchError::RateLimited),
                _ => Err(FetchError::NotFound(url.to_string())),
            }
        }
    }

    fn storage(name: &str) -> StorageManager {
        let root = std::env::temp_dir().join(format!("job_extractor_fetch_{}_{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        let date = NaiveDate::from_ymd_opt(2025, 11, 10).unwrap();
        StorageManager::new(RunConfig::new(root, date, "DS")).unwrap()
    }

    fn records(ids: &[&str]) -> Vec<JobRecord> {
        let fe = FeatureEngineer::new(CityList::empty());
        ids.iter().map(|id| fe.derive(raw(id, "Acme", &format!("Role {}", id)))).collect()
    }

    const PAGE: &str = "<html><body><article><p>Build anvils.</p></article></body></html>";

    #[test]
    fn view_job_url_appends_identifier() {
        assert_eq!(view_job_url("abc").unwrap().as_str(), "https://hiring.cafe/viewjob/abc");
    }

    #[test]
    fn sync_saves_new_and_skips_cached() {
        let storage = storage("sync");
        let records = records(&["a", "b", "c", "d"]);
        let source = StubSource::new(&[
            ("a", Ok(PAGE)),
            ("b", Ok("<html><body>no article</body></html>")),
            ("c", Err(404)),
        ]);

        let report = tokio_test::block_on(sync_descriptions(&source, &storage, &records)).unwrap();
        assert_eq!(report, SyncReport { saved: 1, cached: 0, empty: 1, failed: 2 });
        assert!(storage.has_description(&records[0]));

        let again = tokio_test::block_on(sync_descriptions(&source, &storage, &records[..1])).unwrap();
        assert_eq!(again.cached, 1);
        assert_eq!(source.requested.lock().unwrap().len(), 4);
    }

    #[test]
    fn rate_limit_stops_the_sync() {
        let storage = storage("rate");
        let records = records(&["a", "b"]);
        let source = StubSource::new(&[("a", Err(429)), ("b", Ok(PAGE))]);

        let result = tokio_test::block_on(sync_descriptions(&source, &storage, &records));
        assert!(matches!(result, Err(AppError::Fetch(FetchError::RateLimited))));
        assert_eq!(source.requested.lock().unwrap().len(), 1);
    }
}
