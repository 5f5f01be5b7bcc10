// src/dataset/company.rs
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::features::{CommitmentType, JobRecord, OnsiteType};

/// One row per company over the merged job table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanySummary {
    pub company: String,
    pub count: usize,
    pub titles: Vec<String>,
    pub company_summary: Option<String>,
    /// Minimum listing age in whole days.
    pub min_days: Option<u32>,
    pub bay_area_cities: Vec<String>,
    pub locations: Vec<String>,
    pub skills: Vec<String>,
    /// Most remote option offered.
    pub onsite_type: Option<OnsiteType>,
    /// Highest-ranked commitment offered.
    pub commitment_type: Option<CommitmentType>,
    pub lower: Option<f64>,
    pub median: Option<f64>,
    pub upper: Option<f64>,
}

/// Groups records by company, ordered by company name. Titles keep record
/// order; city, location and skill lists are sorted unions.
pub fn aggregate(records: &[JobRecord]) -> Vec<CompanySummary> {
    let mut groups: BTreeMap<&str, Vec<&JobRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.company.as_str()).or_default().push(record);
    }

    groups.into_iter().map(|(company, rows)| summarize(company, &rows)).collect()
}

fn summarize(company: &str, rows: &[&JobRecord]) -> CompanySummary {
    let medians: Vec<f64> = rows.iter().filter_map(|r| r.median).collect();
    let median = if medians.is_empty() {
        None
    } else {
        Some(round2(medians.iter().sum::<f64>() / medians.len() as f64))
    };

    CompanySummary {
        company: company.to_string(),
        count: rows.len(),
        titles: rows.iter().map(|r| r.title.clone()).collect(),
        company_summary: rows.iter().find_map(|r| r.company_summary.clone()),
        min_days: rows.iter().filter_map(|r| r.hours).min().map(|h| h / 24),
        bay_area_cities: sorted_union(rows.iter().map(|r| &r.bay_area_cities)),
        locations: sorted_union(rows.iter().map(|r| &r.locations)),
        skills: sorted_union(rows.iter().map(|r| &r.skills)),
        onsite_type: rows.iter().filter_map(|r| r.onsite_type).min(),
        commitment_type: best_commitment(rows),
        lower: fold_option(rows.iter().filter_map(|r| r.lower), f64::min),
        median,
        upper: fold_option(rows.iter().filter_map(|r| r.upper), f64::max),
    }
}

/// Highest rank in the fixed category order; unranked values are skipped.
fn best_commitment(rows: &[&JobRecord]) -> Option<CommitmentType> {
    rows.iter()
        .filter_map(|r| r.commitment_type.as_ref())
        .filter_map(|c| c.rank().map(|rank| (rank, c)))
        .max_by_key(|(rank, _)| *rank)
        .map(|(_, c)| c.clone())
}

fn sorted_union<'a, I>(lists: I) -> Vec<String>
where
    I: Iterator<Item = &'a Vec<String>>,
{
    lists.flatten().cloned().collect::<BTreeSet<_>>().into_iter().collect()
}

fn fold_option<I, F>(mut values: I, f: F) -> Option<f64>
where
    I: Iterator<Item = f64>,
    F: Fn(f64, f64) -> f64,
{
    let first = values.next()?;
    Some(values.fold(first, f))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
