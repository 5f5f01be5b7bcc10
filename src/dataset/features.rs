// src/dataset/features.rs
//! Derived columns for one crawl's records, plus the within-crawl dedup.
//!
//! Every numeric parse here degrades to `None` on bad input; a single odd
//! salary string never costs the row.

use std::cmp::Ordering;
use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::cities::CityList;
use crate::extractors::card::RawRecord;

/// Hourly rate → annual figure in thousands. The site shows yearly and
/// monthly pay as `$120k`, read as 120, so `$60/hr` lands at 124.8 on the
/// same scale.
pub const HOURLY_MULTIPLIER: f64 = 2.080;
pub const MONTHLY_MULTIPLIER: f64 = 12.0;
pub const YEARLY_MULTIPLIER: f64 = 1.0;

/// Commitment categories, rarest / most flexible last. Ranking follows this
/// order, not the alphabet.
pub const COMMITMENT_RANKING: [&str; 7] = [
    "Contract, Part Time",
    "Contract",
    "Full Time",
    "Contract, Temporary",
    "Contract, Full Time",
    "Full Time, Temporary",
    "Multiple Commitments Available",
];

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)\s*(mo|y|w|d|h)").expect("Failed to compile DURATION_RE")
});

static LEADING_COUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*\+").expect("Failed to compile LEADING_COUNT_RE")
});

static PATH_HOSTILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[/|:\\*?]"#).expect("Failed to compile PATH_HOSTILE_RE")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OnsiteType {
    Remote,
    Hybrid,
    Onsite,
}

impl OnsiteType {
    pub fn parse(raw: &str) -> Option<Self> {
        let key: String = raw.chars().filter(|c| c.is_alphanumeric()).collect::<String>().to_lowercase();
        match key.as_str() {
            "remote" => Some(OnsiteType::Remote),
            "hybrid" => Some(OnsiteType::Hybrid),
            "onsite" | "inoffice" => Some(OnsiteType::Onsite),
            _ => None,
        }
    }
}

/// Comma-joined commitment set, normalized by sorting its parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitmentType(pub String);

impl CommitmentType {
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts: Vec<&str> = raw
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty() && *p != "-")
            .collect();
        if parts.is_empty() {
            return None;
        }
        parts.sort_unstable();
        parts.dedup();
        Some(CommitmentType(parts.join(", ")))
    }

    /// Position in [`COMMITMENT_RANKING`]; unknown categories are unranked.
    pub fn rank(&self) -> Option<usize> {
        COMMITMENT_RANKING.iter().position(|c| *c == self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SalaryRange {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub median: Option<f64>,
}

/// One canonical row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub identifier: String,
    pub company: String,
    pub title: String,
    pub position: String,
    #[serde(rename = "_position_normalized")]
    pub position_normalized: String,
    pub duration_raw: String,
    pub hours: Option<u32>,
    pub location_raw: String,
    pub location: String,
    pub locations: Vec<String>,
    pub bay_area_cities: Vec<String>,
    pub salary_raw: String,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub median: Option<f64>,
    pub years_experience: Option<f64>,
    pub management_experience: Option<f64>,
    pub onsite_type: Option<OnsiteType>,
    pub commitment_type: Option<CommitmentType>,
    pub skills: Vec<String>,
    pub job_summary: String,
    pub company_summary: Option<String>,
    #[serde(default)]
    pub multiple_listings_flag: u32,
    #[serde(default)]
    pub secondary_crawl_key: Option<String>,
}

impl JobRecord {
    /// `{position}.{identifier}`: file stem for this job's cached files.
    pub fn file_key(&self) -> String {
        format!("{}.{}", self.position, self.identifier)
    }
}

/// Output of one feature-engineering pass.
#[derive(Debug)]
pub struct Engineered {
    pub records: Vec<JobRecord>,
    pub duplicates_removed: usize,
}

pub struct FeatureEngineer {
    cities: CityList,
}

impl FeatureEngineer {
    pub fn new(cities: CityList) -> Self {
        Self { cities }
    }

    /// Derives every column, then keeps the first row per normalized
    /// position after sorting by `(position, hours, company_summary)`.
    pub fn engineer(&self, raw: Vec<RawRecord>) -> Engineered {
        let derived: Vec<JobRecord> = raw.into_iter().map(|r| self.derive(r)).collect();
        let before = derived.len();
        let records = dedup_by_position(derived);
        let duplicates_removed = before - records.len();

        tracing::debug!("Feature engineering kept {} of {} rows", records.len(), before);
        Engineered { records, duplicates_removed }
    }

    pub fn derive(&self, raw: RawRecord) -> JobRecord {
        let position = sanitize_position(&raw.company, &raw.title);
        let position_normalized = normalize_position(&position);
        let location = clean_location(&raw.location_raw);
        let salary = parse_salary(&raw.salary_raw);

        JobRecord {
            hours: parse_hours(&raw.duration_raw),
            locations: split_locations(&location),
            bay_area_cities: self.cities.tag(&location),
            lower: salary.lower,
            upper: salary.upper,
            median: salary.median,
            years_experience: parse_leading_count(&raw.yoe_raw),
            management_experience: parse_leading_count(&raw.mgmt_raw),
            onsite_type: OnsiteType::parse(&raw.onsite_raw),
            commitment_type: CommitmentType::parse(&raw.commitment_raw),
            skills: split_skills(&raw.skills_raw),
            identifier: raw.identifier,
            company: raw.company,
            title: raw.title,
            position,
            position_normalized,
            duration_raw: raw.duration_raw,
            location_raw: raw.location_raw,
            location,
            salary_raw: raw.salary_raw,
            job_summary: raw.job_summary,
            company_summary: raw.company_summary,
            multiple_listings_flag: raw.multiple_listings_flag,
            secondary_crawl_key: raw.secondary_crawl_key,
        }
    }
}

/// Stable sort by `(position, hours, company_summary)`, nulls last, then
/// first row per `position_normalized` wins.
pub fn dedup_by_position(mut records: Vec<JobRecord>) -> Vec<JobRecord> {
    records.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| nulls_last(&a.hours, &b.hours))
            .then_with(|| nulls_last(&a.company_summary, &b.company_summary))
    });

    let mut seen = HashSet::new();
    records.retain(|r| seen.insert(r.position_normalized.clone()));
    records
}

fn nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// `3d` → 72, `2mo` → 1460, `1y` → 8760, `5h` → 5. Minutes (`45m`) and
/// other unmapped units give `None`.
pub fn parse_hours(raw: &str) -> Option<u32> {
    let caps = DURATION_RE.captures(raw.trim())?;
    let magnitude: u32 = caps[1].parse().ok()?;
    let per_unit = match &caps[2] {
        "h" => 1,
        "d" => 24,
        "w" => 24 * 7,
        "mo" => 730,
        "y" => 24 * 365,
        _ => return None,
    };
    magnitude.checked_mul(per_unit)
}

/// `"{company} - {title}"` with path-hostile characters replaced.
pub fn sanitize_position(company: &str, title: &str) -> String {
    sanitize_file_stem(&format!("{} - {}", company, title))
}

/// Replaces `/ | : \ * ?` with `_` and normalizes quote characters.
pub fn sanitize_file_stem(text: &str) -> String {
    PATH_HOSTILE_RE
        .replace_all(text, "_")
        .replace('"', "'")
        .replace('\u{2019}', "'")
}

/// Dedup key: two crawls may disagree on casing and spacing of a title.
pub fn normalize_position(position: &str) -> String {
    position.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

pub fn clean_location(raw: &str) -> String {
    raw.replace(", California", "").replace(", United States", "").trim().to_string()
}

/// Multi-location listings read `A or B or United States`; the bare
/// country entry carries no information and is dropped.
pub fn split_locations(location: &str) -> Vec<String> {
    location
        .split(" or ")
        .map(str::trim)
        .filter(|l| !l.is_empty() && *l != "-" && *l != "United States")
        .map(str::to_string)
        .collect()
}

/// Parses `$120k-$150k/yr`, `$10k/mo`, `$60/hr`. The `k` suffix is
/// dropped, not multiplied out: `$120k/yr`, `$10k/mo` and `$57.7/hr` all
/// come out near 120. A single value is both bounds. Unknown pay periods,
/// blanks and placeholders give an empty range.
pub fn parse_salary(raw: &str) -> SalaryRange {
    let raw = raw.trim();
    let Some((range, unit)) = raw.split_once('/') else {
        return SalaryRange::default();
    };

    let multiplier = match unit.trim().to_lowercase().as_str() {
        "yr" => YEARLY_MULTIPLIER,
        "mo" => MONTHLY_MULTIPLIER,
        "hr" => HOURLY_MULTIPLIER,
        other => {
            tracing::trace!("Unsupported salary period {:?} in {:?}", other, raw);
            return SalaryRange::default();
        }
    };

    let bounds: Vec<Option<f64>> = range
        .split(['-', '\u{2013}'])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(parse_amount)
        .collect();

    let (lower, upper) = match bounds.as_slice() {
        [] => (None, None),
        [single] => (*single, *single),
        [first, .., last] => (*first, *last),
    };
    let lower = lower.map(|v| v * multiplier);
    let upper = upper.map(|v| v * multiplier);
    let median = match (lower, upper) {
        (Some(l), Some(u)) => Some((l + u) / 2.0),
        _ => None,
    };

    SalaryRange { lower, upper, median }
}

fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| !matches!(c, '$' | ',' | ' ')).collect();
    let number = cleaned.strip_suffix(['k', 'K']).unwrap_or(&cleaned);
    number.parse::<f64>().ok()
}

/// Leading number before a `+`: `5+ YOE` → 5.0, anything else → `None`.
pub fn parse_leading_count(raw: &str) -> Option<f64> {
    LEADING_COUNT_RE.captures(raw).and_then(|c| c[1].parse().ok())
}

pub fn split_skills(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "-")
        .map(str::to_string)
        .collect()
}
