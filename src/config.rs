//! Taxonomy location and document layout configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://xbrl.fasb.org/us-gaap/{year}/";
pub const DEFAULT_YEAR: u16 = 2025;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = "gaapx/0.1 (taxonomy resolver)";

const YEAR_PLACEHOLDER: &str = "{year}";

/// The five document kinds of a taxonomy, in the order they are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Schema,
    Labels,
    References,
    Presentation,
    Calculation,
}

impl DocumentKind {
    pub const LINKBASES: [DocumentKind; 4] = [
        DocumentKind::Labels,
        DocumentKind::References,
        DocumentKind::Presentation,
        DocumentKind::Calculation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Schema => "schema",
            DocumentKind::Labels => "labels",
            DocumentKind::References => "references",
            DocumentKind::Presentation => "presentation",
            DocumentKind::Calculation => "calculation",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alternative filenames for one document; the first one found is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateGroup(pub Vec<String>);

impl CandidateGroup {
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(candidates.into_iter().map(Into::into).collect())
    }

    /// Candidate paths with the `{year}` placeholder filled in.
    pub fn resolve(&self, year: u16) -> Vec<String> {
        self.0.iter().map(|c| expand_year(c, year)).collect()
    }
}

/// Candidate groups per document kind. Groups of one kind are unioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentLayout {
    pub schema: Vec<CandidateGroup>,
    pub labels: Vec<CandidateGroup>,
    pub references: Vec<CandidateGroup>,
    pub presentation: Vec<CandidateGroup>,
    pub calculation: Vec<CandidateGroup>,
}

impl DocumentLayout {
    pub fn groups(&self, kind: DocumentKind) -> &[CandidateGroup] {
        match kind {
            DocumentKind::Schema => &self.schema,
            DocumentKind::Labels => &self.labels,
            DocumentKind::References => &self.references,
            DocumentKind::Presentation => &self.presentation,
            DocumentKind::Calculation => &self.calculation,
        }
    }
}

fn elts_variants(kind: &str) -> CandidateGroup {
    CandidateGroup::new([
        format!("elts/us-gaap-{kind}-{{year}}.xml"),
        format!("elts/us-gaap-{kind}-def-{{year}}.xml"),
        format!("elts/us-gaap-{{year}}-{kind}.xml"),
        format!("elts/us-gaap-{{year}}-{kind}-def.xml"),
    ])
}

impl Default for DocumentLayout {
    fn default() -> Self {
        Self {
            schema: vec![CandidateGroup::new(["elts/us-gaap-{year}.xsd"])],
            labels: vec![elts_variants("lab")],
            references: vec![elts_variants("ref")],
            presentation: vec![
                elts_variants("pre"),
                CandidateGroup::new(["stm/us-gaap-stm-pre-{year}.xml"]),
                CandidateGroup::new(["dis/us-gaap-dis-pre-{year}.xml"]),
            ],
            calculation: vec![
                elts_variants("cal"),
                CandidateGroup::new(["stm/us-gaap-stm-cal-{year}.xml"]),
                CandidateGroup::new(["dis/us-gaap-dis-cal-{year}.xml"]),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomyConfig {
    /// Root URL of the taxonomy; may contain `{year}`.
    pub base_url: String,
    pub year: u16,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub documents: DocumentLayout,
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            year: DEFAULT_YEAR,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            documents: DocumentLayout::default(),
        }
    }
}

impl TaxonomyConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_year(mut self, year: u16) -> Self {
        self.year = year;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Base URL with the year filled in and a trailing slash.
    pub fn resolved_base_url(&self) -> String {
        let mut url = expand_year(self.base_url.trim(), self.year);
        if !url.ends_with('/') {
            url.push('/');
        }
        url
    }

    /// Candidate paths for `kind`, one inner list per group.
    pub fn candidates(&self, kind: DocumentKind) -> Vec<Vec<String>> {
        self.documents
            .groups(kind)
            .iter()
            .map(|group| group.resolve(self.year))
            .filter(|group| !group.is_empty())
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("base_url must not be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be greater than zero".to_string()));
        }
        if self.candidates(DocumentKind::Schema).is_empty() {
            return Err(Error::Config("no schema candidates configured".to_string()));
        }
        Ok(())
    }
}

fn expand_year(template: &str, year: u16) -> String {
    template.replace(YEAR_PLACEHOLDER, &year.to_string())
}
