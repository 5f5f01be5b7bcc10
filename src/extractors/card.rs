// src/extractors/card.rs

use std::path::PathBuf;

use scraper::Html;
use serde::{Deserialize, Serialize};
use url::Url;

use super::reconcile::{self, Field, PageLayout, MARKER_TEXT};
use super::tokenizer::{self, CardLinks};
use crate::config::SITE_BASE;
use crate::utils::error::ExtractError;
use crate::utils::html_debug::{self, CardDump};

/// One card's fields before feature engineering, still as display text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub identifier: String,
    pub permalink: String,
    pub duration_raw: String,
    pub title: String,
    pub location_raw: String,
    pub salary_raw: String,
    pub onsite_raw: String,
    pub commitment_raw: String,
    pub company: String,
    pub company_summary: Option<String>,
    pub yoe_raw: String,
    pub mgmt_raw: String,
    pub job_summary: String,
    pub skills_raw: String,
    pub views_raw: String,
    pub secondary_crawl_key: Option<String>,
    pub multiple_listings_flag: u32,
}

/// Result of parsing one crawl page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageParse {
    pub layout: PageLayout,
    pub records: Vec<RawRecord>,
    pub cards_seen: usize,
    pub cards_skipped: usize,
}

/// Builds a record from a reconciled row. The marker slot must hold the
/// literal "Job Posting"; anything else means the layout moved under us.
pub fn build_record(tokens: &[String], links: &CardLinks, buttons: u32) -> Result<RawRecord, ExtractError> {
    let get = |field: Field| tokens.get(field.index()).cloned().unwrap_or_default();

    let marker = get(Field::Marker);
    if marker != MARKER_TEXT {
        return Err(ExtractError::SchemaDrift { found: marker, tokens: tokens.to_vec() });
    }

    let identifier = identifier_from_permalink(&links.permalink).ok_or_else(|| ExtractError::MissingAnchor {
        anchor: "permalink",
        tokens: tokens.to_vec(),
    })?;
    let secondary_crawl_key = links.company_link.as_deref().and_then(company_key_from_link);
    let company_summary = Some(get(Field::CompanySummary)).filter(|s| !s.is_empty());

    Ok(RawRecord {
        identifier,
        permalink: links.permalink.clone(),
        duration_raw: get(Field::Duration),
        title: get(Field::Title),
        location_raw: get(Field::Location),
        salary_raw: get(Field::Salary),
        onsite_raw: get(Field::Onsite),
        commitment_raw: get(Field::Commitment),
        company: clean_company(&get(Field::Company)),
        company_summary,
        yoe_raw: get(Field::YearsExperience),
        mgmt_raw: get(Field::ManagementExperience),
        job_summary: get(Field::JobSummary),
        skills_raw: get(Field::Skills),
        views_raw: get(Field::Views),
        secondary_crawl_key,
        multiple_listings_flag: buttons,
    })
}

/// Last non-empty path segment of the permalink: `/viewjob/abc123` → `abc123`.
pub fn identifier_from_permalink(permalink: &str) -> Option<String> {
    let url = Url::parse(SITE_BASE).ok()?.join(permalink).ok()?;
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?.to_string();
    Some(segment)
}

/// The `company` query parameter of a "more from this company" link.
pub fn company_key_from_link(link: &str) -> Option<String> {
    let url = Url::parse(SITE_BASE).ok()?.join(link).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "company")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// Card company labels end with a colon ("Acme:"); quotes are normalized so
/// the name is safe to reuse in file names.
fn clean_company(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(':')
        .trim_end()
        .replace('"', "'")
        .replace('\u{2019}', "'")
}

pub struct CardParser {
    debug_dir: Option<PathBuf>,
}

impl CardParser {
    pub fn new() -> Self {
        Self { debug_dir: None }
    }

    /// Dump skipped or drifted cards as annotated HTML into `dir`.
    pub fn with_debug_dir(mut self, dir: PathBuf) -> Self {
        self.debug_dir = Some(dir);
        self
    }

    /// Parses every card of one crawl page.
    ///
    /// The layout is detected once and applied to all cards. A page without
    /// cards is logged and gives an empty result. Cards without a permalink
    /// are logged and skipped; schema drift aborts the page. Token
    /// row, links and button count are read from the same card in the same
    /// iteration, so they cannot fall out of step.
    pub fn parse_page(&self, html: &str, label: &str) -> Result<PageParse, ExtractError> {
        let document = Html::parse_document(html);
        let layout = PageLayout::detect(&document);
        tracing::debug!("Detected {:?} layout for {}", layout, label);

        let cards = tokenizer::find_cards(&document);
        if cards.is_empty() {
            tracing::warn!("{}", ExtractError::EmptyCrawl(label.to_string()));
            return Ok(PageParse { layout, records: Vec::new(), cards_seen: 0, cards_skipped: 0 });
        }

        let mut records = Vec::with_capacity(cards.len());
        let mut cards_skipped = 0;

        for (index, card) in cards.iter().enumerate() {
            let raw_tokens = tokenizer::tokenize(*card);
            let reconciled = reconcile::reconcile(&raw_tokens, &layout);

            let result = tokenizer::extract_links(*card, &raw_tokens)
                .and_then(|links| build_record(&reconciled, &links, tokenizer::count_buttons(*card)));

            match result {
                Ok(record) => records.push(record),
                Err(e) => {
                    self.dump_card(index, &e, &card.html(), &raw_tokens, &reconciled);
                    if e.is_fatal() {
                        tracing::error!("Card {} of {}: {}", index, label, e);
                        return Err(e);
                    }
                    tracing::warn!("Skipping card {} of {}: {}", index, label, e);
                    cards_skipped += 1;
                }
            }
        }

        tracing::info!(
            "Parsed {} records from {} cards in {} ({} skipped)",
            records.len(),
            cards.len(),
            label,
            cards_skipped
        );

        Ok(PageParse { layout, records, cards_seen: cards.len(), cards_skipped })
    }

    fn dump_card(&self, index: usize, error: &ExtractError, card_html: &str, raw: &[String], reconciled: &[String]) {
        let Some(dir) = &self.debug_dir else { return };
        let reason = error.to_string();
        let dump = CardDump { index, reason: &reason, card_html, raw_tokens: raw, reconciled: Some(reconciled) };
        if let Err(e) = html_debug::save_card_dump(dir, &dump) {
            tracing::warn!("Failed to write card dump: {}", e);
        }
    }
}

impl Default for CardParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::tokenizer::tests::card_html;

    const FULL: [&str; 14] = [
        "3d",
        "Data Scientist",
        "Palo Alto, California",
        "$120k-$150k/yr",
        "Hybrid",
        "Full Time",
        "Acme \u{2019}Labs:",
        "Rockets",
        "3+ YOE",
        "1+ Mgmt",
        "Build models",
        "Python, SQL",
        "Job Posting",
        "42",
    ];

    fn page(cards: &[String], title: Option<&str>) -> String {
        let head = title.map(|t| format!("<title>{}</title>", t)).unwrap_or_default();
        format!("<html><head>{}</head><body><div class=\"my-masonry-grid\">{}</div></body></html>", head, cards.concat())
    }

    fn links(permalink: &str) -> CardLinks {
        CardLinks { permalink: permalink.to_string(), company_link: Some("/?company=k9x&searchState=%7B%7D".to_string()) }
    }

    fn tokens(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn builds_record_from_reconciled_row() {
        let record = build_record(&tokens(&FULL), &links("/viewjob/abc123"), 2).unwrap();
        assert_eq!(record.identifier, "abc123");
        assert_eq!(record.company, "Acme 'Labs");
        assert_eq!(record.company_summary.as_deref(), Some("Rockets"));
        assert_eq!(record.secondary_crawl_key.as_deref(), Some("k9x"));
        assert_eq!(record.multiple_listings_flag, 2);
        assert_eq!(record.views_raw, "42");
    }

    #[test]
    fn identifier_depends_only_on_permalink_path() {
        let mut other = tokens(&FULL);
        other[Field::Title.index()] = "Different Title".to_string();
        other[Field::JobSummary.index()] = "Different summary".to_string();

        let a = build_record(&tokens(&FULL), &links("/viewjob/abc123"), 1).unwrap();
        let b = build_record(&other, &links("https://hiring.cafe/viewjob/abc123"), 1).unwrap();
        assert_eq!(a.identifier, b.identifier);
    }

    #[test]
    fn wrong_marker_is_schema_drift() {
        let mut drifted = tokens(&FULL);
        drifted[Field::Marker.index()] = "Sponsored".to_string();
        match build_record(&drifted, &links("/viewjob/x"), 1) {
            Err(ExtractError::SchemaDrift { found, .. }) => assert_eq!(found, "Sponsored"),
            other => panic!("expected SchemaDrift, got {:?}", other),
        }
    }

    #[test]
    fn page_without_marker_aborts() {
        let mut spans = FULL.to_vec();
        spans[12] = "Promoted";
        let html = page(&[card_html(&spans, Some("/viewjob/a"), None, 1)], Some("DS (N=1)"));
        let err = CardParser::new().parse_page(&html, "test").unwrap_err();
        assert!(matches!(err, ExtractError::SchemaDrift { .. }));
    }

    #[test]
    fn page_skips_cards_without_permalink_and_keeps_button_order() {
        let cards = vec![
            card_html(&FULL, Some("/viewjob/first"), Some("/?company=c1"), 1),
            card_html(&FULL, None, None, 5),
            card_html(&FULL, Some("/viewjob/third"), Some("/?company=c3"), 3),
        ];
        let parsed = CardParser::new().parse_page(&page(&cards, Some("DS (N=3)")), "test").unwrap();

        assert_eq!(parsed.layout, PageLayout::Search);
        assert_eq!(parsed.cards_seen, 3);
        assert_eq!(parsed.cards_skipped, 1);
        let ids: Vec<_> = parsed.records.iter().map(|r| (r.identifier.as_str(), r.multiple_listings_flag)).collect();
        assert_eq!(ids, vec![("first", 1), ("third", 3)]);
    }

    #[test]
    fn company_page_takes_name_from_title() {
        let spans = [
            "Acme", "2w", "Engineer", "Remote", "Remote", "Contract", "Ships", "Job Posting", "9",
        ];
        let html = page(&[card_html(&spans, Some("/viewjob/zz9"), None, 1)], Some("Acme"));
        let parsed = CardParser::new().parse_page(&html, "Acme").unwrap();

        let record = &parsed.records[0];
        assert_eq!(record.company, "Acme");
        assert_eq!(record.company_summary, None);
        assert_eq!(record.secondary_crawl_key, None);
        assert_eq!(record.duration_raw, "2w");
        assert_eq!(record.salary_raw, "-");
    }

    #[test]
    fn empty_page_gives_empty_result() {
        let parsed = CardParser::new().parse_page("<html><body></body></html>", "empty").unwrap();
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.cards_seen, 0);
        assert_eq!(parsed.cards_skipped, 0);
    }

    #[test]
    fn minutes_old_card_parses_without_drift() {
        let mut spans = FULL.to_vec();
        spans[0] = "45m";
        let html = page(&[card_html(&spans, Some("/viewjob/fresh"), None, 1)], Some("DS (N=1)"));
        let parsed = CardParser::new().parse_page(&html, "test").unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].duration_raw, "45m");
        assert_eq!(parsed.records[0].title, "Data Scientist");
    }
}
