// src/dataset/mod.rs
pub mod cities;
pub mod company;
pub mod features;
pub mod merge;
pub mod search;
pub mod targets;

pub use cities::CityList;
pub use company::{aggregate, CompanySummary};
pub use features::{FeatureEngineer, JobRecord};
pub use merge::{merge, Crawl, CrawlKind};
pub use targets::{secondary_targets, CompanyTarget};
