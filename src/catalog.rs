//! Element lookup for enriching reported facts.
//!
//! Fact feeds tag values with either a bare concept name (`Assets`) or a
//! prefixed one (`us-gaap:Assets`). Both resolve to the same entry.

use crate::export::TrimmedRow;
use crate::model::FinancialStatement;
use crate::taxonomy::Taxonomy;
use crate::Result;
use ahash::AHashMap;
use compact_str::CompactString;
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Values copied onto a stored fact. All `None` for an unmatched tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FactEnrichment {
    pub standard_label: Option<String>,
    pub documentation: Option<String>,
    pub financial_statement: Option<FinancialStatement>,
}

impl FactEnrichment {
    pub fn is_empty(&self) -> bool {
        self.standard_label.is_none()
            && self.documentation.is_none()
            && self.financial_statement.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ElementCatalog {
    entries: AHashMap<CompactString, FactEnrichment>,
}

impl ElementCatalog {
    pub fn from_taxonomy(taxonomy: &Taxonomy) -> Self {
        let entries = taxonomy
            .elements()
            .map(|element| {
                (
                    element.name.clone(),
                    FactEnrichment {
                        standard_label: element.standard_label().map(str::to_string),
                        documentation: element.documentation().map(str::to_string),
                        financial_statement: Some(element.financial_statement),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Read an element table or trimmed table written by the exporter.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let mut entries = AHashMap::new();

        for row in reader.deserialize::<TrimmedRow>() {
            let row = row?;
            let financial_statement = match non_empty(row.financial_statement) {
                Some(raw) => match raw.parse::<FinancialStatement>() {
                    Ok(statement) => Some(statement),
                    Err(e) => {
                        debug!(element = %row.element_name, error = %e, "ignoring statement column");
                        None
                    }
                },
                None => None,
            };
            entries
                .entry(CompactString::from(row.element_name.trim()))
                .or_insert(FactEnrichment {
                    standard_label: non_empty(row.standard_label),
                    documentation: non_empty(row.documentation),
                    financial_statement,
                });
        }

        Ok(Self { entries })
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_csv_reader(std::io::BufReader::new(file))
    }

    pub fn get(&self, tag: &str) -> Option<&FactEnrichment> {
        self.entries.get(local_name(tag))
    }

    pub fn lookup(&self, tag: &str) -> FactEnrichment {
        self.get(tag).cloned().unwrap_or_default()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.get(tag).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn local_name(tag: &str) -> &str {
    let tag = tag.trim();
    tag.rsplit_once(':').map_or(tag, |(_, local)| local)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
