//! gaapx - US-GAAP XBRL taxonomy resolver
//!
//! Licensed under AGPL-3.0

pub mod catalog;
pub mod classify;
pub mod config;
pub mod export;
pub mod fetch;
pub mod hierarchy;
pub mod linkbase;
pub mod model;
pub mod schema;
pub mod taxonomy;

mod xml;

pub use catalog::{ElementCatalog, FactEnrichment};
pub use config::{DocumentKind, DocumentLayout, TaxonomyConfig};
pub use export::{ElementRow, Exporter, HierarchyRow, TrimmedRow};
pub use fetch::{DirectorySource, DocumentBytes, DocumentSource, HttpSource, MemorySource};
pub use hierarchy::{Depths, Relationships};
pub use model::{Element, FinancialStatement, LabelKind, Reference};
pub use taxonomy::{BuildReport, Taxonomy, TaxonomyBuilder, TaxonomyStats};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
