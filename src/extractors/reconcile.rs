// src/extractors/reconcile.rs
//! Aligns a ragged card token row onto the fixed field schema.
//!
//! Optional fields are simply missing from the markup when a listing has no
//! value for them, so every later token sits one slot too early. The scan
//! walks the schema left to right; at each optional slot it asks that slot's
//! anchor whether the next raw token belongs there, and if not, emits the
//! slot's sentinel without consuming anything. Later anchors always look at
//! a row whose earlier slots are already corrected.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use super::tokenizer::normalize_ws;

/// Number of values a reconciled row carries, whatever the page layout.
pub const SCHEMA_WIDTH: usize = 14;

/// Literal every card carries in the marker slot.
pub const MARKER_TEXT: &str = "Job Posting";

/// Placeholder for an absent text field.
pub const EMPTY_SENTINEL: &str = "-";

/// Placeholder for an absent duration.
pub const DURATION_SENTINEL: &str = "0h";

// Any short age token; units the feature pass cannot convert (`45m`) still
// belong in the duration slot.
static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{1,2}[a-z]+\b").expect("Failed to compile DURATION_RE")
});

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("head > title").expect("Failed to compile TITLE_SELECTOR")
});

/// Columns of a reconciled row; the discriminant is the column index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Duration = 0,
    Title,
    Location,
    Salary,
    Onsite,
    Commitment,
    Company,
    CompanySummary,
    YearsExperience,
    ManagementExperience,
    JobSummary,
    Skills,
    Marker,
    Views,
}

impl Field {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Shape test deciding whether a token belongs to an optional slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// `3d`, `12h`, `2mo`, `1y`, `45m`.
    Duration,
    /// Salary text ends with its pay period: `yr`, `mo`, `wk`, `hr`.
    SalaryUnit,
    /// Token ends with a fixed label, e.g. `5+ YOE`.
    Suffix(&'static str),
    /// Skills are absent exactly when the marker shows up in their place.
    NotMarker,
}

impl Anchor {
    pub fn accepts(self, token: &str) -> bool {
        match self {
            Anchor::Duration => DURATION_RE.is_match(token),
            Anchor::SalaryUnit => {
                token == EMPTY_SENTINEL || ["yr", "mo", "wk", "hr"].iter().any(|unit| token.ends_with(unit))
            }
            Anchor::Suffix(label) => token == EMPTY_SENTINEL || token.ends_with(label),
            Anchor::NotMarker => !token.contains("Posting"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSlot {
    Required(Field),
    Optional { field: Field, anchor: Anchor, sentinel: &'static str },
    /// Value comes from the page, not from the card.
    Injected(Field),
    /// Leading token the layout repeats on every card; dropped.
    Discard,
}

const fn optional(field: Field, anchor: Anchor, sentinel: &'static str) -> FieldSlot {
    FieldSlot::Optional { field, anchor, sentinel }
}

const SEARCH_SLOTS: [FieldSlot; 14] = [
    optional(Field::Duration, Anchor::Duration, DURATION_SENTINEL),
    FieldSlot::Required(Field::Title),
    FieldSlot::Required(Field::Location),
    optional(Field::Salary, Anchor::SalaryUnit, EMPTY_SENTINEL),
    FieldSlot::Required(Field::Onsite),
    FieldSlot::Required(Field::Commitment),
    FieldSlot::Required(Field::Company),
    FieldSlot::Required(Field::CompanySummary),
    optional(Field::YearsExperience, Anchor::Suffix("YOE"), EMPTY_SENTINEL),
    optional(Field::ManagementExperience, Anchor::Suffix("Mgmt"), EMPTY_SENTINEL),
    FieldSlot::Required(Field::JobSummary),
    optional(Field::Skills, Anchor::NotMarker, EMPTY_SENTINEL),
    FieldSlot::Required(Field::Marker),
    FieldSlot::Required(Field::Views),
];

const COMPANY_SLOTS: [FieldSlot; 15] = [
    FieldSlot::Discard,
    optional(Field::Duration, Anchor::Duration, DURATION_SENTINEL),
    FieldSlot::Required(Field::Title),
    FieldSlot::Required(Field::Location),
    optional(Field::Salary, Anchor::SalaryUnit, EMPTY_SENTINEL),
    FieldSlot::Required(Field::Onsite),
    FieldSlot::Required(Field::Commitment),
    FieldSlot::Injected(Field::Company),
    FieldSlot::Injected(Field::CompanySummary),
    optional(Field::YearsExperience, Anchor::Suffix("YOE"), EMPTY_SENTINEL),
    optional(Field::ManagementExperience, Anchor::Suffix("Mgmt"), EMPTY_SENTINEL),
    FieldSlot::Required(Field::JobSummary),
    optional(Field::Skills, Anchor::NotMarker, EMPTY_SENTINEL),
    FieldSlot::Required(Field::Marker),
    FieldSlot::Required(Field::Views),
];

/// How the cards on one page are laid out. Detected once per page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageLayout {
    /// Multi-company results of a search query; company name is on each card.
    Search,
    /// All listings of one company; the name only appears in the page title.
    Company { name: String },
}

impl PageLayout {
    /// Rendered query pages are titled like `DS (N=312)`; company pages carry
    /// the bare company name. Fragments without a title are search results.
    pub fn detect(document: &Html) -> Self {
        let title = document
            .select(&TITLE_SELECTOR)
            .next()
            .map(|el| normalize_ws(&el.text().collect::<String>()))
            .unwrap_or_default();

        if title.is_empty() || title.contains("(N=") {
            PageLayout::Search
        } else {
            PageLayout::Company { name: title }
        }
    }

    pub fn slots(&self) -> &'static [FieldSlot] {
        match self {
            PageLayout::Search => &SEARCH_SLOTS,
            PageLayout::Company { .. } => &COMPANY_SLOTS,
        }
    }

    fn injected(&self, field: Field) -> String {
        match (self, field) {
            (PageLayout::Company { name }, Field::Company) => name.clone(),
            _ => String::new(),
        }
    }
}

/// What the scan did at one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Next raw token taken as the field value.
    Take,
    /// Field absent: sentinel emitted, raw token left for the next slot.
    Insert(&'static str),
    /// Value supplied by the page.
    Inject,
    /// Raw token dropped.
    Skip,
    /// Row ran out of tokens.
    Pad,
}

/// Decides the transition for one slot given the next unconsumed token.
pub fn step(slot: FieldSlot, next: Option<&str>) -> Step {
    match (slot, next) {
        (FieldSlot::Injected(_), _) => Step::Inject,
        (FieldSlot::Discard, Some(_)) => Step::Skip,
        (FieldSlot::Discard, None) => Step::Pad,
        (FieldSlot::Required(_), Some(_)) => Step::Take,
        (FieldSlot::Required(_), None) => Step::Pad,
        (FieldSlot::Optional { anchor, sentinel, .. }, Some(token)) => {
            if anchor.accepts(token) {
                Step::Take
            } else {
                Step::Insert(sentinel)
            }
        }
        (FieldSlot::Optional { sentinel, .. }, None) => Step::Insert(sentinel),
    }
}

/// Produces a row of exactly [`SCHEMA_WIDTH`] values. Trailing telemetry
/// tokens (saves, applications) beyond the schema are dropped.
pub fn reconcile(raw: &[String], layout: &PageLayout) -> Vec<String> {
    let mut out = Vec::with_capacity(SCHEMA_WIDTH);
    let mut cursor = 0;

    for &slot in layout.slots() {
        let next = raw.get(cursor).map(String::as_str);
        match step(slot, next) {
            Step::Take => {
                out.push(raw[cursor].clone());
                cursor += 1;
            }
            Step::Insert(sentinel) => out.push(sentinel.to_string()),
            Step::Inject => {
                if let FieldSlot::Injected(field) = slot {
                    out.push(layout.injected(field));
                }
            }
            Step::Skip => cursor += 1,
            Step::Pad => {
                if !matches!(slot, FieldSlot::Discard) {
                    out.push(EMPTY_SENTINEL.to_string());
                }
            }
        }
    }

    if cursor < raw.len() {
        tracing::trace!("Dropped {} trailing tokens: {:?}", raw.len() - cursor, &raw[cursor..]);
    }
    debug_assert_eq!(out.len(), SCHEMA_WIDTH);
    out
}
