// Taxonomy context and the build pipeline that fills it
use crate::classify;
use crate::config::{DocumentKind, TaxonomyConfig};
use crate::fetch::{fetch_first, DocumentSource, HttpSource};
use crate::hierarchy::{Depths, Relationships};
use crate::linkbase::LinkbaseDocument;
use crate::model::{CalculationChild, Element, FinancialStatement, PresentationChild};
use crate::schema::{self, SchemaDocument};
use crate::Result;
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};

/// Every element of a taxonomy plus the relationships between them.
///
/// Elements are only ever added or enriched; nothing is removed.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    elements: Vec<Element>,
    by_name: AHashMap<CompactString, usize>,
    by_id: AHashMap<CompactString, usize>,
    presentation: Relationships<PresentationChild>,
}

impl Taxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an element. The first declaration of a name wins.
    pub fn insert(&mut self, element: Element) -> bool {
        if self.by_name.contains_key(&element.name) {
            return false;
        }
        let idx = self.elements.len();
        self.by_name.insert(element.name.clone(), idx);
        if let Some(id) = &element.id {
            self.by_id.entry(id.clone()).or_insert(idx);
        }
        self.elements.push(element);
        true
    }

    pub fn register_schema(&mut self, schema: SchemaDocument) -> usize {
        schema
            .elements
            .into_iter()
            .map(|element| self.insert(element))
            .filter(|inserted| *inserted)
            .count()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Element> {
        self.index_of(name).map(|idx| &self.elements[idx])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn element_at(&self, idx: usize) -> &Element {
        &self.elements[idx]
    }

    pub(crate) fn element_mut(&mut self, idx: usize) -> &mut Element {
        &mut self.elements[idx]
    }

    /// Resolve an href fragment to an element, by name first and then by id.
    pub fn resolve_fragment(&self, fragment: &str) -> Option<usize> {
        self.index_of(fragment)
            .or_else(|| self.by_id.get(fragment).copied())
    }

    /// Record a presentation edge and keep parent/child sets symmetric.
    pub(crate) fn link_presentation(
        &mut self,
        parent: usize,
        child: usize,
        order: f64,
        preferred_label: Option<CompactString>,
    ) {
        let parent_name = self.elements[parent].name.clone();
        let child_name = self.elements[child].name.clone();
        self.presentation.push(
            &parent_name,
            PresentationChild {
                element: child_name.clone(),
                order,
                preferred_label,
            },
        );
        self.elements[parent].add_child(&child_name);
        self.elements[child].add_parent(&parent_name);
    }

    pub(crate) fn link_calculation(&mut self, parent: usize, child: usize, weight: f64, order: f64) {
        let child_name = self.elements[child].name.clone();
        self.elements[parent].calculation_children.push(CalculationChild {
            element: child_name,
            weight,
            order,
        });
    }

    pub fn presentation(&self) -> &Relationships<PresentationChild> {
        &self.presentation
    }

    pub fn presentation_children(&self, parent: &str) -> &[PresentationChild] {
        self.presentation.get(parent)
    }

    pub(crate) fn parent_indices(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.elements[idx]
            .parent_elements
            .iter()
            .filter_map(|parent| self.index_of(parent))
    }

    pub fn depths(&self) -> Depths<'_> {
        Depths::new(self)
    }

    pub fn depth_of(&self, name: &str) -> usize {
        self.depths().depth_of(name)
    }

    /// Tag every element with its financial statement; returns how many
    /// landed on one of the four known statements.
    pub fn classify_all(&mut self) -> usize {
        classify::classify_all(self)
    }

    pub(crate) fn set_statements(&mut self, statements: Vec<FinancialStatement>) {
        for (element, statement) in self.elements.iter_mut().zip(statements) {
            element.financial_statement = statement;
        }
    }

    pub fn stats(&self) -> TaxonomyStats {
        let mut statements: BTreeMap<String, usize> = FinancialStatement::ALL
            .iter()
            .map(|s| (s.to_string(), 0))
            .collect();
        for element in &self.elements {
            *statements
                .entry(element.financial_statement.to_string())
                .or_default() += 1;
        }

        TaxonomyStats {
            total_elements: self.elements.len(),
            root_elements: self.elements.iter().filter(|e| e.is_root()).count(),
            leaf_elements: self.elements.iter().filter(|e| !e.has_children()).count(),
            abstract_elements: self.elements.iter().filter(|e| e.is_abstract()).count(),
            hierarchy_relationships: self.presentation.edge_count(),
            calculation_relationships: self
                .elements
                .iter()
                .map(|e| e.calculation_children.len())
                .sum(),
            labelled_elements: self.elements.iter().filter(|e| !e.labels.is_empty()).count(),
            referenced_elements: self.elements.iter().filter(|e| !e.references.is_empty()).count(),
            statements,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxonomyStats {
    pub total_elements: usize,
    pub root_elements: usize,
    pub leaf_elements: usize,
    pub abstract_elements: usize,
    pub hierarchy_relationships: usize,
    pub calculation_relationships: usize,
    pub labelled_elements: usize,
    pub referenced_elements: usize,
    pub statements: BTreeMap<String, usize>,
}

// ============================================================================
// Build report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Parsed,
    Missing,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    pub kind: DocumentKind,
    pub candidates: Vec<String>,
    pub location: Option<String>,
    pub status: DocumentStatus,
    /// Elements registered (schema) or attachments made (linkbases).
    pub contributions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub year: u16,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub documents: Vec<DocumentOutcome>,
    pub classified_elements: usize,
}

impl BuildReport {
    fn new(year: u16) -> Self {
        let now = Utc::now();
        Self {
            year,
            started_at: now,
            finished_at: now,
            duration_ms: 0,
            documents: Vec::new(),
            classified_elements: 0,
        }
    }

    pub fn outcomes(&self, kind: DocumentKind) -> impl Iterator<Item = &DocumentOutcome> {
        self.documents.iter().filter(move |d| d.kind == kind)
    }

    pub fn parsed(&self, kind: DocumentKind) -> usize {
        self.outcomes(kind)
            .filter(|d| d.status == DocumentStatus::Parsed)
            .count()
    }

    pub fn contributions(&self, kind: DocumentKind) -> usize {
        self.outcomes(kind).map(|d| d.contributions).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DocumentOutcome> {
        self.documents
            .iter()
            .filter(|d| matches!(d.status, DocumentStatus::Failed(_)))
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Drives fetch → schema → linkbases → classification over one source.
pub struct TaxonomyBuilder<S> {
    config: TaxonomyConfig,
    source: S,
}

impl TaxonomyBuilder<HttpSource> {
    /// Builder fetching over HTTP from the configured base URL.
    pub fn from_config(config: TaxonomyConfig) -> Result<Self> {
        config.validate()?;
        let source = HttpSource::new(&config)?;
        Ok(Self { config, source })
    }
}

impl<S: DocumentSource> TaxonomyBuilder<S> {
    pub fn new(config: TaxonomyConfig, source: S) -> Self {
        Self { config, source }
    }

    pub fn config(&self) -> &TaxonomyConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Build the taxonomy. Missing or broken documents are logged and
    /// recorded in the report; they never abort the build.
    pub fn build(&self) -> (Taxonomy, BuildReport) {
        let timer = Instant::now();
        let mut report = BuildReport::new(self.config.year);
        let mut taxonomy = Taxonomy::new();

        info!(year = self.config.year, "resolving taxonomy");

        for candidates in self.config.candidates(DocumentKind::Schema) {
            let outcome = self.load(DocumentKind::Schema, candidates, |bytes| {
                let schema = schema::extract_elements(bytes)?;
                Ok(taxonomy.register_schema(schema))
            });
            report.documents.push(outcome);
        }
        info!(elements = taxonomy.len(), "parsed schema");

        for kind in DocumentKind::LINKBASES {
            for candidates in self.config.candidates(kind) {
                let outcome = self.load(kind, candidates, |bytes| {
                    let linkbase = LinkbaseDocument::parse(bytes)?;
                    Ok(linkbase.apply(kind, &mut taxonomy))
                });
                report.documents.push(outcome);
            }
            info!(
                %kind,
                documents = report.parsed(kind),
                attached = report.contributions(kind),
                "resolved linkbases"
            );
        }

        report.classified_elements = taxonomy.classify_all();
        info!(
            elements = taxonomy.len(),
            classified = report.classified_elements,
            "classified elements by financial statement"
        );

        report.finished_at = Utc::now();
        report.duration_ms = timer.elapsed().as_millis() as u64;
        (taxonomy, report)
    }

    fn load<F>(&self, kind: DocumentKind, candidates: Vec<String>, apply: F) -> DocumentOutcome
    where
        F: FnOnce(&[u8]) -> Result<usize>,
    {
        let Some(document) = fetch_first(&self.source, &candidates) else {
            return DocumentOutcome {
                kind,
                candidates,
                location: None,
                status: DocumentStatus::Missing,
                contributions: 0,
            };
        };

        let (status, contributions) = match apply(&document.bytes[..]) {
            Ok(contributions) => (DocumentStatus::Parsed, contributions),
            Err(e) => {
                warn!(%kind, location = %document.location, error = %e, "skipping document");
                (DocumentStatus::Failed(e.to_string()), 0)
            }
        };

        DocumentOutcome {
            kind,
            candidates,
            location: Some(document.location),
            status,
            contributions,
        }
    }
}
