// src/dataset/targets.rs
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::features::{sanitize_file_stem, JobRecord};
use crate::config::SITE_BASE;

/// A company page to crawl because its card showed more than one listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyTarget {
    pub company: String,
    /// File stem of the saved company page.
    pub file_stem: String,
    pub key: String,
    pub url: String,
}

/// One target per company whose card had several action buttons and a
/// company key, in record order. `search_state` is the query-string tail
/// (without `?`) applied to each company page.
pub fn secondary_targets(records: &[JobRecord], search_state: &str) -> Vec<CompanyTarget> {
    let mut seen = HashSet::new();

    records
        .iter()
        .filter(|r| r.multiple_listings_flag > 1)
        .filter_map(|r| r.secondary_crawl_key.as_ref().map(|key| (r, key)))
        .filter(|(r, _)| seen.insert(r.company.clone()))
        .map(|(r, key)| CompanyTarget {
            company: r.company.clone(),
            file_stem: sanitize_file_stem(&r.company),
            key: key.clone(),
            url: company_url(key, search_state),
        })
        .collect()
}

pub fn company_url(key: &str, search_state: &str) -> String {
    let search_state = search_state.trim_start_matches('?');
    if search_state.is_empty() {
        format!("{}/?company={}", SITE_BASE, key)
    } else {
        format!("{}/?company={}&{}", SITE_BASE, key, search_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::cities::CityList;
    use crate::dataset::features::tests::raw;
    use crate::dataset::features::FeatureEngineer;

    fn record(id: &str, company: &str, buttons: u32, key: Option<&str>) -> JobRecord {
        let mut r = raw(id, company, "Engineer");
        r.multiple_listings_flag = buttons;
        r.secondary_crawl_key = key.map(str::to_string);
        FeatureEngineer::new(CityList::empty()).derive(r)
    }

    #[test]
    fn only_multi_listing_companies_once_each() {
        let records = vec![
            record("a", "Acme/Labs", 2, Some("k1")),
            record("b", "Acme/Labs", 3, Some("k1")),
            record("c", "Solo", 1, Some("k2")),
            record("d", "NoKey", 2, None),
        ];
        let targets = secondary_targets(&records, "?searchState=%7B%7D");
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].file_stem, "Acme_Labs");
        assert_eq!(targets[0].url, "https://hiring.cafe/?company=k1&searchState=%7B%7D");
    }

    #[test]
    fn url_without_search_state() {
        assert_eq!(company_url("k9", ""), "https://hiring.cafe/?company=k9");
    }
}
