// src/dataset/search.rs
use regex::{Regex, RegexBuilder};

use super::features::JobRecord;
use crate::utils::error::ExtractError;

/// Phrase filter over a record's searchable text.
///
/// An all-lowercase phrase matches case-insensitively; any capital makes it
/// case-sensitive. Plain phrases must start at a word boundary
/// (`sql` does not hit `nosql`); `regex` mode uses the phrase verbatim.
pub struct PhraseMask {
    re: Regex,
}

impl PhraseMask {
    pub fn new(phrase: &str, regex: bool) -> Result<Self, ExtractError> {
        let pattern = if regex { phrase.to_string() } else { format!(r"\b{}", regex::escape(phrase)) };
        let re = RegexBuilder::new(&pattern)
            .case_insensitive(phrase == phrase.to_lowercase())
            .build()
            .map_err(|e| ExtractError::Regex(e.to_string()))?;
        Ok(Self { re })
    }

    pub fn matches(&self, record: &JobRecord) -> bool {
        self.re.is_match(&searchable_text(record))
    }

    pub fn filter<'a>(&self, records: &'a [JobRecord]) -> Vec<&'a JobRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

fn searchable_text(record: &JobRecord) -> String {
    [
        record.position.as_str(),
        record.company.as_str(),
        record.job_summary.as_str(),
        record.company_summary.as_deref().unwrap_or(""),
        &record.skills.join(", "),
    ]
    .join("\n")
}
