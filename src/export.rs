//! Tabular projections of a resolved taxonomy.
//!
//! Two views are produced: one row per element and one row per
//! presentation edge. Both are plain serde records written with `csv`
//! or `serde_json`.

use crate::model::{BalanceType, CalculationChild, Element, FinancialStatement, LabelKind, PeriodType};
use crate::taxonomy::{BuildReport, Taxonomy, TaxonomyStats};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementRow {
    pub element_name: String,
    pub id: Option<String>,
    pub namespace: Option<String>,
    pub data_type: Option<String>,
    pub xbrl_type: Option<String>,
    pub substitution_group: Option<String>,
    #[serde(rename = "abstract")]
    pub is_abstract: bool,
    pub nillable: bool,
    pub period_type: Option<PeriodType>,
    pub balance: Option<BalanceType>,
    pub standard_label: Option<String>,
    pub terse_label: Option<String>,
    pub verbose_label: Option<String>,
    pub documentation: Option<String>,
    pub total_label: Option<String>,
    pub parent_elements: String,
    pub child_elements: String,
    pub has_children: bool,
    pub is_root: bool,
    pub financial_statement: FinancialStatement,
    pub calculation_formula: String,
    pub calculation_children_count: usize,
    pub authoritative_references: String,
    pub reference_count: usize,
}

impl ElementRow {
    pub fn from_element(element: &Element) -> Self {
        let label = |kind| element.label(kind).map(str::to_string);
        Self {
            element_name: element.name.to_string(),
            id: element.id.as_ref().map(|s| s.to_string()),
            namespace: element.namespace.clone(),
            data_type: element.data_type.as_ref().map(|s| s.to_string()),
            xbrl_type: element.xbrl_type.as_ref().map(|s| s.to_string()),
            substitution_group: element.substitution_group.as_ref().map(|s| s.to_string()),
            is_abstract: element.is_abstract(),
            nillable: element.is_nillable(),
            period_type: element.period_type,
            balance: element.balance,
            standard_label: label(LabelKind::Standard),
            terse_label: label(LabelKind::Terse),
            verbose_label: label(LabelKind::Verbose),
            documentation: label(LabelKind::Documentation),
            total_label: label(LabelKind::Total),
            parent_elements: element.parent_elements.join("; "),
            child_elements: element.child_elements.join("; "),
            has_children: element.has_children(),
            is_root: element.is_root(),
            financial_statement: element.financial_statement,
            calculation_formula: calculation_formula(&element.calculation_children),
            calculation_children_count: element.calculation_children.len(),
            authoritative_references: render_references(element),
            reference_count: element.references.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyRow {
    pub parent_element: String,
    pub child_element: String,
    pub order: f64,
    pub preferred_label: Option<String>,
    pub parent_label: Option<String>,
    pub child_label: Option<String>,
    pub level: usize,
}

/// The columns the fact-ingestion side reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimmedRow {
    pub element_name: String,
    #[serde(default)]
    pub standard_label: Option<String>,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub financial_statement: Option<String>,
}

impl TrimmedRow {
    pub fn from_element(element: &Element) -> Self {
        Self {
            element_name: element.name.to_string(),
            standard_label: element.standard_label().map(str::to_string),
            documentation: element.documentation().map(str::to_string),
            financial_statement: Some(element.financial_statement.to_string()),
        }
    }
}

/// Signed child names, e.g. `+ Revenues - CostOfRevenue`.
pub fn calculation_formula(children: &[CalculationChild]) -> String {
    children
        .iter()
        .map(|child| {
            let sign = if child.weight >= 0.0 { '+' } else { '-' };
            format!("{} {}", sign, child.element)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_references(element: &Element) -> String {
    element
        .references
        .iter()
        .map(|reference| reference.to_string())
        .collect::<Vec<_>>()
        .join(" | ")
}

pub fn element_rows(taxonomy: &Taxonomy) -> Vec<ElementRow> {
    taxonomy.elements().map(ElementRow::from_element).collect()
}

pub fn trimmed_rows(taxonomy: &Taxonomy) -> Vec<TrimmedRow> {
    taxonomy.elements().map(TrimmedRow::from_element).collect()
}

pub fn hierarchy_rows(taxonomy: &Taxonomy) -> Vec<HierarchyRow> {
    let mut depths = taxonomy.depths();
    let mut rows = Vec::with_capacity(taxonomy.presentation().edge_count());
    let label_of = |name: &str| {
        taxonomy
            .get(name)
            .and_then(Element::standard_label)
            .map(str::to_string)
    };

    for (parent, children) in taxonomy.presentation().iter() {
        for child in children {
            rows.push(HierarchyRow {
                parent_element: parent.to_string(),
                child_element: child.element.to_string(),
                order: child.order,
                preferred_label: child.preferred_label.as_ref().map(|s| s.to_string()),
                parent_label: label_of(parent),
                child_label: label_of(child.element.as_str()),
                level: depths.depth_of(&child.element),
            });
        }
    }
    rows
}

pub fn write_csv<T, W>(writer: W, rows: &[T]) -> Result<()>
where
    T: Serialize,
    W: Write,
{
    let mut writer = csv::Writer::from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json<T, W>(writer: W, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
    W: Write,
{
    let mut writer = writer;
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct Summary<'a> {
    stats: TaxonomyStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    build: Option<&'a BuildReport>,
}

/// Writes the element, hierarchy and trimmed tables for one taxonomy year.
#[derive(Debug, Clone)]
pub struct Exporter {
    out_dir: PathBuf,
    year: u16,
    json: bool,
}

impl Exporter {
    pub fn new<P: AsRef<Path>>(out_dir: P, year: u16) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
            year,
            json: false,
        }
    }

    /// Also write JSON twins of the tables and a summary document.
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn path_for(&self, suffix: &str, extension: &str) -> PathBuf {
        self.out_dir
            .join(format!("us_gaap_{}{}.{}", self.year, suffix, extension))
    }

    /// Write every output file, returning the paths written.
    pub fn export(&self, taxonomy: &Taxonomy, report: Option<&BuildReport>) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.out_dir)?;

        let elements = element_rows(taxonomy);
        let hierarchy = hierarchy_rows(taxonomy);
        let trimmed = trimmed_rows(taxonomy);
        let mut written = Vec::new();

        let path = self.path_for("", "csv");
        write_csv(BufWriter::new(File::create(&path)?), &elements)?;
        written.push(path);

        let path = self.path_for("_hierarchy", "csv");
        write_csv(BufWriter::new(File::create(&path)?), &hierarchy)?;
        written.push(path);

        let path = self.path_for("_trimmed", "csv");
        write_csv(BufWriter::new(File::create(&path)?), &trimmed)?;
        written.push(path);

        if self.json {
            let path = self.path_for("", "json");
            write_json(BufWriter::new(File::create(&path)?), &elements)?;
            written.push(path);

            let path = self.path_for("_hierarchy", "json");
            write_json(BufWriter::new(File::create(&path)?), &hierarchy)?;
            written.push(path);

            let path = self.path_for("_summary", "json");
            let summary = Summary {
                stats: taxonomy.stats(),
                build: report,
            };
            write_json(BufWriter::new(File::create(&path)?), &summary)?;
            written.push(path);
        }

        info!(
            elements = elements.len(),
            edges = hierarchy.len(),
            files = written.len(),
            dir = %self.out_dir.display(),
            "exported taxonomy"
        );
        Ok(written)
    }
}
