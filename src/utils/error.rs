// src/utils/error.rs
use std::path::PathBuf;
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error), // Automatically convert reqwest errors

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode),

    #[error("Rate limit likely exceeded")]
    RateLimited,

    #[error("Page not found: {0}")]
    NotFound(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    /// The marker slot did not hold the literal "Job Posting". The page
    /// markup changed shape; the batch must stop.
    #[error("Schema drift: expected marker \"Job Posting\", found {found:?} in tokens {tokens:?}")]
    SchemaDrift { found: String, tokens: Vec<String> },

    #[error("Missing {anchor} anchor on card with tokens {tokens:?}")]
    MissingAnchor { anchor: &'static str, tokens: Vec<String> },

    #[error("Regular expression error: {0}")]
    Regex(String),

    #[error("HTML parsing error: {0}")]
    HtmlParse(String),

    #[error("No job cards found: {0}")]
    EmptyCrawl(String),
}

impl ExtractError {
    /// Fatal errors abort the whole page instead of skipping one card.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ExtractError::MissingAnchor { .. })
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Input file missing: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("Column not found: {0}")]
    MissingColumn(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fetching failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
