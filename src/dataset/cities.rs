// src/dataset/cities.rs
use std::fs::File;
use std::io::Read;
use std::path::Path;

use regex::{Regex, RegexBuilder};

use crate::utils::error::StorageError;

/// Column of the reference CSV holding the curated Bay Area city names.
pub const CITY_COLUMN: &str = "Silicon Valley";

// Compiled-size ceiling for the city alternation.
const PATTERN_SIZE_LIMIT: usize = 32 * (1 << 20);

/// Curated city names, matched against free-text locations.
#[derive(Debug, Clone)]
pub struct CityList {
    names: Vec<String>,
    pattern: Option<Regex>,
}

impl CityList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names
            .into_iter()
            .map(Into::into)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty() && !n.starts_with('#'))
            .collect();

        let pattern = match build_pattern(&names, PATTERN_SIZE_LIMIT) {
            Ok(pattern) => pattern,
            Err(e) => {
                tracing::error!("City pattern over {} names failed to build, tagging disabled: {}", names.len(), e);
                None
            }
        };

        Self { names, pattern }
    }

    pub fn empty() -> Self {
        Self::new(Vec::<String>::new())
    }

    pub fn from_csv_path(path: &Path) -> Result<Self, StorageError> {
        if !path.exists() {
            return Err(StorageError::MissingInput(path.to_path_buf()));
        }
        let list = Self::from_reader(File::open(path)?)?;
        tracing::debug!("Loaded {} reference cities from {}", list.len(), path.display());
        Ok(list)
    }

    /// Reads the `Silicon Valley` column; rows starting with `#` are comments.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, StorageError> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let column = rdr
            .headers()?
            .iter()
            .position(|h| h.trim() == CITY_COLUMN)
            .ok_or_else(|| StorageError::MissingColumn(CITY_COLUMN.to_string()))?;

        let mut names = Vec::new();
        for row in rdr.records() {
            let row = row?;
            if let Some(name) = row.get(column) {
                names.push(name.to_string());
            }
        }
        Ok(Self::new(names))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Every reference city found in `location`, in match order. Never
    /// null: no match is an empty list.
    pub fn tag(&self, location: &str) -> Vec<String> {
        match &self.pattern {
            Some(re) => re.find_iter(location).map(|m| m.as_str().to_string()).collect(),
            None => Vec::new(),
        }
    }
}

/// One alternation, tried left to right like the list order.
fn build_pattern(names: &[String], size_limit: usize) -> Result<Option<Regex>, regex::Error> {
    if names.is_empty() {
        return Ok(None);
    }
    let alternation = names.iter().map(|n| regex::escape(n)).collect::<Vec<_>>().join("|");
    RegexBuilder::new(&format!("(?:{})", alternation))
        .size_limit(size_limit)
        .build()
        .map(Some)
}
