use bitflags::bitflags;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Taxonomy Element Structures
// ============================================================================

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ElementFlags: u8 {
        const ABSTRACT = 0b0000_0001;
        const NILLABLE = 0b0000_0010;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Instant,
    Duration,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Instant => "instant",
            PeriodType::Duration => "duration",
        }
    }
}

impl FromStr for PeriodType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim() {
            "instant" => Ok(PeriodType::Instant),
            "duration" => Ok(PeriodType::Duration),
            other => Err(crate::Error::Parse(format!("unknown period type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceType {
    Debit,
    Credit,
}

impl BalanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceType::Debit => "debit",
            BalanceType::Credit => "credit",
        }
    }
}

impl FromStr for BalanceType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim() {
            "debit" => Ok(BalanceType::Debit),
            "credit" => Ok(BalanceType::Credit),
            other => Err(crate::Error::Parse(format!("unknown balance type '{}'", other))),
        }
    }
}

/// Label role classes. Declaration order is the order labels are scanned
/// during classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelKind {
    Standard,
    Terse,
    Verbose,
    Total,
    Negated,
    Documentation,
}

impl LabelKind {
    /// Classify a label role URI by substring.
    pub fn from_role(role: &str) -> Self {
        if role.contains("terseLabel") {
            LabelKind::Terse
        } else if role.contains("verboseLabel") {
            LabelKind::Verbose
        } else if role.contains("documentation") {
            LabelKind::Documentation
        } else if role.contains("totalLabel") {
            LabelKind::Total
        } else if role.contains("negatedLabel") {
            LabelKind::Negated
        } else {
            LabelKind::Standard
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FinancialStatement {
    #[serde(rename = "Statement of Financial Position")]
    FinancialPosition,
    #[serde(rename = "Statement of Income")]
    Income,
    #[serde(rename = "Statement of Cash Flows")]
    CashFlows,
    #[serde(rename = "Statement of Stockholders Equity")]
    StockholdersEquity,
    #[default]
    Unknown,
}

impl FinancialStatement {
    pub const ALL: [FinancialStatement; 5] = [
        FinancialStatement::FinancialPosition,
        FinancialStatement::Income,
        FinancialStatement::CashFlows,
        FinancialStatement::StockholdersEquity,
        FinancialStatement::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FinancialStatement::FinancialPosition => "Statement of Financial Position",
            FinancialStatement::Income => "Statement of Income",
            FinancialStatement::CashFlows => "Statement of Cash Flows",
            FinancialStatement::StockholdersEquity => "Statement of Stockholders Equity",
            FinancialStatement::Unknown => "Unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != FinancialStatement::Unknown
    }
}

impl fmt::Display for FinancialStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FinancialStatement {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        FinancialStatement::ALL
            .into_iter()
            .find(|statement| statement.as_str() == s.trim())
            .ok_or_else(|| crate::Error::Parse(format!("unknown financial statement '{}'", s)))
    }
}

/// One authoritative citation, fields kept in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub parts: Vec<(CompactString, String)>,
}

impl Reference {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.parts
            .iter()
            .find(|(name, _)| name.as_str() == field)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationChild {
    pub element: CompactString,
    pub weight: f64,
    pub order: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationChild {
    pub element: CompactString,
    pub order: f64,
    pub preferred_label: Option<CompactString>,
}

// One GAAP concept, enriched in place by each resolver
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Element {
    pub name: CompactString,
    pub id: Option<CompactString>,
    pub namespace: Option<String>,
    pub data_type: Option<CompactString>,
    pub xbrl_type: Option<CompactString>,
    pub substitution_group: Option<CompactString>,
    pub period_type: Option<PeriodType>,
    pub balance: Option<BalanceType>,
    pub flags: ElementFlags,
    pub labels: BTreeMap<LabelKind, String>,
    pub references: Vec<Reference>,
    pub parent_elements: Vec<CompactString>,
    pub child_elements: Vec<CompactString>,
    pub calculation_children: Vec<CalculationChild>,
    pub financial_statement: FinancialStatement,
}

impl Element {
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn label(&self, kind: LabelKind) -> Option<&str> {
        self.labels.get(&kind).map(String::as_str)
    }

    pub fn standard_label(&self) -> Option<&str> {
        self.label(LabelKind::Standard)
    }

    pub fn documentation(&self) -> Option<&str> {
        self.label(LabelKind::Documentation)
    }

    pub fn is_abstract(&self) -> bool {
        self.flags.contains(ElementFlags::ABSTRACT)
    }

    pub fn is_nillable(&self) -> bool {
        self.flags.contains(ElementFlags::NILLABLE)
    }

    pub fn is_root(&self) -> bool {
        self.parent_elements.is_empty()
    }

    pub fn has_children(&self) -> bool {
        !self.child_elements.is_empty()
    }

    pub(crate) fn add_parent(&mut self, parent: &CompactString) {
        if !self.parent_elements.contains(parent) {
            self.parent_elements.push(parent.clone());
        }
    }

    pub(crate) fn add_child(&mut self, child: &CompactString) {
        if !self.child_elements.contains(child) {
            self.child_elements.push(child.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_kind_from_role() {
        let base = "http://www.xbrl.org/2003/role/";
        assert_eq!(LabelKind::from_role(&format!("{base}label")), LabelKind::Standard);
        assert_eq!(LabelKind::from_role(&format!("{base}terseLabel")), LabelKind::Terse);
        assert_eq!(LabelKind::from_role(&format!("{base}verboseLabel")), LabelKind::Verbose);
        assert_eq!(
            LabelKind::from_role(&format!("{base}documentation")),
            LabelKind::Documentation
        );
        assert_eq!(LabelKind::from_role(&format!("{base}totalLabel")), LabelKind::Total);
        assert_eq!(LabelKind::from_role(&format!("{base}negatedLabel")), LabelKind::Negated);
        assert_eq!(LabelKind::from_role(""), LabelKind::Standard);
    }

    #[test]
    fn test_statement_names_round_trip_through_from_str() {
        for statement in FinancialStatement::ALL {
            assert_eq!(statement.as_str().parse::<FinancialStatement>().unwrap(), statement);
        }
        assert!("Statement of Nothing".parse::<FinancialStatement>().is_err());
    }

    #[test]
    fn test_parent_and_child_sets_ignore_duplicates() {
        let mut element = Element::new("Assets");
        let parent = CompactString::new("AssetsAbstract");
        element.add_parent(&parent);
        element.add_parent(&parent);
        assert_eq!(element.parent_elements, vec![parent]);
        assert!(!element.is_root());
        assert!(!element.has_children());
    }

    #[test]
    fn test_reference_display() {
        let reference = Reference {
            parts: vec![
                (CompactString::new("Publisher"), "FASB".to_string()),
                (CompactString::new("Topic"), "210".to_string()),
            ],
        };
        assert_eq!(reference.to_string(), "Publisher: FASB; Topic: 210");
        assert_eq!(reference.get("Topic"), Some("210"));
        assert_eq!(reference.get("Section"), None);
    }
}
