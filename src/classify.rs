// Financial statement classification
use crate::model::{Element, FinancialStatement};
use crate::taxonomy::Taxonomy;
use ahash::AHashSet;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

// Element name keywords, lowercase, checked in this order
const NAME_KEYWORDS: [(FinancialStatement, &[&str]); 4] = [
    (
        FinancialStatement::FinancialPosition,
        &[
            "statementoffinancialposition",
            "balancesheet",
            "assets",
            "liabilities",
            "stockholdersequity",
            "equity",
            "liabilitiesandequity",
            "atcarryingvalue",
        ],
    ),
    (
        FinancialStatement::Income,
        &[
            "statementofincome",
            "incomestatement",
            "revenues",
            "costsandexpenses",
            "operatingincome",
            "netincome",
            "earningspershare",
            "comprehensiveincome",
        ],
    ),
    (
        FinancialStatement::CashFlows,
        &[
            "statementofcashflows",
            "cashflow",
            "netcashprovidedbyusedin",
            "operatingactivities",
            "investingactivities",
            "financingactivities",
        ],
    ),
    (
        FinancialStatement::StockholdersEquity,
        &[
            "statementofstockholdersequity",
            "statementofchangesinequity",
            "stockholdersequitychanges",
            "equityattributable",
        ],
    ),
];

const LABEL_KEYWORDS: [(FinancialStatement, &[&str]); 4] = [
    (
        FinancialStatement::CashFlows,
        &[
            "cash flow",
            "operating activities",
            "investing activities",
            "financing activities",
        ],
    ),
    (
        FinancialStatement::Income,
        &["income", "revenue", "expense", "earnings", "profit", "loss"],
    ),
    (
        FinancialStatement::FinancialPosition,
        &["balance sheet", "financial position", "assets", "liabilities", "equity"],
    ),
    (
        FinancialStatement::StockholdersEquity,
        &["stockholders equity", "changes in equity"],
    ),
];

fn first_match(
    text: &str,
    table: &[(FinancialStatement, &[&str])],
) -> Option<FinancialStatement> {
    let text = text.to_lowercase();
    table
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(statement, _)| *statement)
}

pub fn match_name(name: &str) -> Option<FinancialStatement> {
    first_match(name, &NAME_KEYWORDS)
}

/// First label, in label kind order, containing a statement keyword.
pub fn match_labels(element: &Element) -> Option<FinancialStatement> {
    element
        .labels
        .values()
        .find_map(|text| first_match(text, &LABEL_KEYWORDS))
}

/// Classification from the element itself, without looking at parents.
pub fn direct_match(element: &Element) -> Option<FinancialStatement> {
    match_name(&element.name).or_else(|| match_labels(element))
}

/// Classifies elements of one taxonomy, falling back to their
/// presentation ancestors when the element itself gives no answer.
pub struct Classifier<'a> {
    taxonomy: &'a Taxonomy,
    direct: Vec<Option<FinancialStatement>>,
}

impl<'a> Classifier<'a> {
    pub fn new(taxonomy: &'a Taxonomy) -> Self {
        Self {
            taxonomy,
            direct: taxonomy.elements().map(direct_match).collect(),
        }
    }

    /// Elements outside the taxonomy are `Unknown`.
    pub fn classify_name(&self, name: &str) -> FinancialStatement {
        self.taxonomy
            .index_of(name)
            .map_or(FinancialStatement::Unknown, |idx| self.classify(idx))
    }

    /// Depth-first over parents in declaration order; the first element
    /// reached that matches on its own decides. Each element is visited at
    /// most once, so cycles end in `Unknown`.
    pub fn classify(&self, start: usize) -> FinancialStatement {
        let mut visited: AHashSet<usize> = AHashSet::new();
        let mut stack = vec![start];

        while let Some(idx) = stack.pop() {
            if !visited.insert(idx) {
                continue;
            }
            if let Some(statement) = self.direct[idx] {
                return statement;
            }
            let parents: Vec<usize> = self.taxonomy.parent_indices(idx).collect();
            stack.extend(parents.into_iter().rev().filter(|p| !visited.contains(p)));
        }

        FinancialStatement::Unknown
    }

    #[cfg(not(feature = "parallel"))]
    pub fn classify_every(&self) -> Vec<FinancialStatement> {
        (0..self.taxonomy.len()).map(|idx| self.classify(idx)).collect()
    }

    #[cfg(feature = "parallel")]
    pub fn classify_every(&self) -> Vec<FinancialStatement> {
        (0..self.taxonomy.len())
            .into_par_iter()
            .map(|idx| self.classify(idx))
            .collect()
    }
}

/// Classify every element and store the result on it. Results are computed
/// against the unmodified taxonomy first, so running this twice is a no-op.
pub fn classify_all(taxonomy: &mut Taxonomy) -> usize {
    let statements = Classifier::new(taxonomy).classify_every();
    let known = statements.iter().filter(|s| s.is_known()).count();
    taxonomy.set_statements(statements);
    known
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LabelKind;

    fn element(name: &str, labels: &[(LabelKind, &str)]) -> Element {
        let mut element = Element::new(name);
        for (kind, text) in labels {
            element.labels.insert(*kind, text.to_string());
        }
        element
    }

    fn taxonomy(elements: Vec<Element>, edges: &[(&str, &str)]) -> Taxonomy {
        let mut taxonomy = Taxonomy::new();
        for element in elements {
            taxonomy.insert(element);
        }
        for (parent, child) in edges {
            let parent = taxonomy.index_of(parent).unwrap();
            let child = taxonomy.index_of(child).unwrap();
            taxonomy.link_presentation(parent, child, 1.0, None);
        }
        taxonomy
    }

    #[test]
    fn test_name_keywords() {
        assert_eq!(
            match_name("CashAndCashEquivalentsAtCarryingValue"),
            Some(FinancialStatement::FinancialPosition)
        );
        assert_eq!(match_name("Revenues"), Some(FinancialStatement::Income));
        assert_eq!(
            match_name("NetCashProvidedByUsedInOperatingActivities"),
            Some(FinancialStatement::CashFlows)
        );
        assert_eq!(match_name("ASSETS"), Some(FinancialStatement::FinancialPosition));
        assert_eq!(match_name("DividendsDeclaredPerShare"), None);
    }

    #[test]
    fn test_carrying_value_without_labels() {
        let taxonomy = taxonomy(
            vec![element("CashAndCashEquivalentsAtCarryingValue", &[])],
            &[],
        );
        let classifier = Classifier::new(&taxonomy);
        assert_eq!(
            classifier.classify_name("CashAndCashEquivalentsAtCarryingValue"),
            FinancialStatement::FinancialPosition
        );
    }

    #[test]
    fn test_label_fallback_in_kind_order() {
        let taxonomy = taxonomy(
            vec![
                element(
                    "PaymentsForWidgets",
                    &[
                        (LabelKind::Documentation, "Amount of total revenue."),
                        (LabelKind::Standard, "Payments for widgets, investing activities"),
                    ],
                ),
                element("WidgetCount", &[(LabelKind::Terse, "Widgets sold at a loss")]),
            ],
            &[],
        );
        let classifier = Classifier::new(&taxonomy);
        assert_eq!(
            classifier.classify_name("PaymentsForWidgets"),
            FinancialStatement::CashFlows
        );
        assert_eq!(classifier.classify_name("WidgetCount"), FinancialStatement::Income);
    }

    #[test]
    fn test_parent_fallback_takes_first_parent_result() {
        let taxonomy = taxonomy(
            vec![
                element("Widget", &[]),
                element("WidgetGroup", &[]),
                element("Revenues", &[]),
                element("OtherAssets", &[]),
            ],
            &[
                ("Revenues", "WidgetGroup"),
                ("WidgetGroup", "Widget"),
                ("OtherAssets", "Widget"),
            ],
        );
        let classifier = Classifier::new(&taxonomy);
        // WidgetGroup is Widget's first parent, and Revenues is its parent
        assert_eq!(classifier.classify_name("Widget"), FinancialStatement::Income);
        assert_eq!(classifier.classify_name("WidgetGroup"), FinancialStatement::Income);
    }

    #[test]
    fn test_cycle_without_match_is_unknown() {
        let taxonomy = taxonomy(
            vec![element("Alpha", &[]), element("Beta", &[])],
            &[("Alpha", "Beta"), ("Beta", "Alpha")],
        );
        let classifier = Classifier::new(&taxonomy);
        assert_eq!(classifier.classify_name("Alpha"), FinancialStatement::Unknown);
        assert_eq!(classifier.classify_name("Beta"), FinancialStatement::Unknown);
    }

    #[test]
    fn test_unregistered_name_is_unknown() {
        let taxonomy = taxonomy(vec![element("Assets", &[])], &[]);
        let classifier = Classifier::new(&taxonomy);
        assert_eq!(
            classifier.classify_name("Assets"),
            FinancialStatement::FinancialPosition
        );
        assert_eq!(classifier.classify_name("Revenues"), FinancialStatement::Unknown);
    }

    #[test]
    fn test_classify_all_is_idempotent() {
        let mut taxonomy = taxonomy(
            vec![
                element("Assets", &[]),
                element("Widget", &[]),
                element("Orphan", &[]),
            ],
            &[("Assets", "Widget")],
        );

        assert_eq!(classify_all(&mut taxonomy), 2);
        let first: Vec<FinancialStatement> =
            taxonomy.elements().map(|e| e.financial_statement).collect();
        assert_eq!(classify_all(&mut taxonomy), 2);
        let second: Vec<FinancialStatement> =
            taxonomy.elements().map(|e| e.financial_statement).collect();

        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![
                FinancialStatement::FinancialPosition,
                FinancialStatement::FinancialPosition,
                FinancialStatement::Unknown,
            ]
        );
    }
}
