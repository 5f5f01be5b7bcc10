// src/extractors/mod.rs
pub mod card;
pub mod description;
pub mod reconcile;
pub mod tokenizer;

// Re-export key extraction types for convenience
pub use card::{CardParser, PageParse};
pub use description::{extract_detail, JobDetail};
