// Linkbase processing for XBRL
//
// Every linkbase shares the same indirection: `loc` entries map a local
// label to an href fragment, resources (labels, references) carry a local
// label of their own, and arcs connect a `from` label to a `to` label.
use crate::config::DocumentKind;
use crate::model::{LabelKind, Reference};
use crate::taxonomy::Taxonomy;
use crate::xml::{self, Attrs};
use crate::Result;
use ahash::AHashMap;
use compact_str::CompactString;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

const DEFAULT_LANG: &str = "en-US";
const DEFAULT_ORDER: f64 = 0.0;
const DEFAULT_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArcKind {
    Label,
    Reference,
    Presentation,
    Calculation,
}

impl ArcKind {
    fn from_local(local: &[u8]) -> Option<Self> {
        match local {
            b"labelArc" => Some(ArcKind::Label),
            b"referenceArc" => Some(ArcKind::Reference),
            b"presentationArc" => Some(ArcKind::Presentation),
            b"calculationArc" => Some(ArcKind::Calculation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelResource {
    pub text: String,
    pub kind: LabelKind,
    pub lang: CompactString,
    pub role: CompactString,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arc {
    pub kind: ArcKind,
    pub from: CompactString,
    pub to: CompactString,
    pub order: f64,
    pub weight: f64,
    pub preferred_label: Option<CompactString>,
}

/// Locators, resources and arcs collected from one linkbase document.
#[derive(Debug, Default)]
pub struct LinkbaseDocument {
    locators: AHashMap<CompactString, CompactString>,
    labels: AHashMap<CompactString, Vec<LabelResource>>,
    references: AHashMap<CompactString, Vec<Reference>>,
    arcs: Vec<Arc>,
}

struct PendingLabel {
    id: Option<CompactString>,
    role: CompactString,
    lang: CompactString,
    text: String,
}

struct PendingReference {
    id: Option<CompactString>,
    parts: Vec<(CompactString, String)>,
    part: Option<(CompactString, String)>,
}

impl LinkbaseDocument {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = xml::reader(data);
        let mut doc = Self::default();
        let mut label: Option<PendingLabel> = None;
        let mut reference: Option<PendingReference> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let name = e.name();
                    let local = xml::local(name.as_ref());
                    if let Some(pending) = reference.as_mut() {
                        if pending.part.is_none() {
                            pending.part = Some((lossy(local), String::new()));
                        }
                        continue;
                    }
                    match local {
                        b"label" => {
                            let attrs = Attrs::from_start(&e)?;
                            label = Some(PendingLabel {
                                id: attrs.get_non_empty("label").map(CompactString::from),
                                role: CompactString::from(attrs.get("role").unwrap_or_default()),
                                lang: CompactString::from(attrs.get_non_empty("lang").unwrap_or(DEFAULT_LANG)),
                                text: String::new(),
                            });
                        }
                        b"reference" => {
                            let attrs = Attrs::from_start(&e)?;
                            reference = Some(PendingReference {
                                id: attrs.get_non_empty("label").map(CompactString::from),
                                parts: Vec::new(),
                                part: None,
                            });
                        }
                        _ => doc.read_link_entry(&e, local)?,
                    }
                }
                Event::Empty(e) => {
                    // Empty labels, references and citation parts carry no text
                    if reference.is_none() {
                        let name = e.name();
                        doc.read_link_entry(&e, xml::local(name.as_ref()))?;
                    }
                }
                Event::Text(t) => {
                    if let Some(buf) = text_target(&mut label, &mut reference) {
                        buf.push_str(&xml::decode_text(&t)?);
                    }
                }
                Event::CData(c) => {
                    if let Some(buf) = text_target(&mut label, &mut reference) {
                        buf.push_str(&String::from_utf8_lossy(&c.into_inner()));
                    }
                }
                Event::End(e) => {
                    let name = e.name();
                    let local = xml::local(name.as_ref());
                    if let Some(pending) = reference.as_mut() {
                        if let Some((part, text)) = pending.part.take() {
                            if part.as_bytes() == local {
                                let text = text.trim();
                                if !text.is_empty() {
                                    pending.parts.push((part, text.to_string()));
                                }
                            } else {
                                pending.part = Some((part, text));
                            }
                            continue;
                        }
                        if local == b"reference" {
                            if let Some(done) = reference.take() {
                                doc.finish_reference(done);
                            }
                        }
                        continue;
                    }
                    if local == b"label" {
                        if let Some(done) = label.take() {
                            doc.finish_label(done);
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(doc)
    }

    fn read_link_entry(&mut self, e: &BytesStart<'_>, local: &[u8]) -> Result<()> {
        if local == b"loc" {
            let attrs = Attrs::from_start(e)?;
            if let (Some(label), Some(href)) = (attrs.get_non_empty("label"), attrs.get_non_empty("href")) {
                if let Some((_, fragment)) = href.split_once('#') {
                    self.locators
                        .insert(CompactString::from(label), CompactString::from(fragment));
                }
            }
        } else if let Some(kind) = ArcKind::from_local(local) {
            let attrs = Attrs::from_start(e)?;
            let (Some(from), Some(to)) = (attrs.get_non_empty("from"), attrs.get_non_empty("to")) else {
                return Ok(());
            };
            self.arcs.push(Arc {
                kind,
                from: CompactString::from(from),
                to: CompactString::from(to),
                order: parse_number(attrs.get_non_empty("order"), DEFAULT_ORDER),
                weight: parse_number(attrs.get_non_empty("weight"), DEFAULT_WEIGHT),
                preferred_label: attrs.get_non_empty("preferredLabel").map(CompactString::from),
            });
        }
        Ok(())
    }

    fn finish_label(&mut self, pending: PendingLabel) {
        let text = pending.text.trim();
        let Some(id) = pending.id else { return };
        if text.is_empty() {
            return;
        }
        self.labels.entry(id).or_default().push(LabelResource {
            text: text.to_string(),
            kind: LabelKind::from_role(&pending.role),
            lang: pending.lang,
            role: pending.role,
        });
    }

    fn finish_reference(&mut self, pending: PendingReference) {
        let Some(id) = pending.id else { return };
        self.references
            .entry(id)
            .or_default()
            .push(Reference { parts: pending.parts });
    }

    /// Href fragment a locator label points at.
    pub fn locator(&self, label: &str) -> Option<&str> {
        self.locators.get(label).map(CompactString::as_str)
    }

    pub fn labels(&self, label: &str) -> &[LabelResource] {
        self.labels.get(label).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn references(&self, label: &str) -> &[Reference] {
        self.references.get(label).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn arcs(&self, kind: ArcKind) -> impl Iterator<Item = &Arc> {
        self.arcs.iter().filter(move |arc| arc.kind == kind)
    }

    pub fn locator_count(&self) -> usize {
        self.locators.len()
    }

    pub fn arc_count(&self) -> usize {
        self.arcs.len()
    }

    /// Element index an arc endpoint resolves to, if it is a known element.
    fn resolve(&self, taxonomy: &Taxonomy, locator: &str) -> Option<usize> {
        self.locator(locator)
            .and_then(|fragment| taxonomy.resolve_fragment(fragment))
    }

    /// Attach the relationships of `kind` to the taxonomy, returning how
    /// many attachments were made.
    pub fn apply(&self, kind: DocumentKind, taxonomy: &mut Taxonomy) -> usize {
        match kind {
            DocumentKind::Labels => self.attach_labels(taxonomy),
            DocumentKind::References => self.attach_references(taxonomy),
            DocumentKind::Presentation => self.build_presentation(taxonomy),
            DocumentKind::Calculation => self.build_calculation(taxonomy),
            DocumentKind::Schema => 0,
        }
    }

    pub fn attach_labels(&self, taxonomy: &mut Taxonomy) -> usize {
        let mut attached = 0;
        for arc in self.arcs(ArcKind::Label) {
            let resources = self.labels(&arc.to);
            if resources.is_empty() {
                continue;
            }
            let Some(idx) = self.resolve(taxonomy, &arc.from) else {
                continue;
            };
            let element = taxonomy.element_mut(idx);
            for resource in resources {
                element.labels.insert(resource.kind, resource.text.clone());
                attached += 1;
            }
        }
        attached
    }

    pub fn attach_references(&self, taxonomy: &mut Taxonomy) -> usize {
        let mut attached = 0;
        for arc in self.arcs(ArcKind::Reference) {
            let references = self.references(&arc.to);
            if references.is_empty() {
                continue;
            }
            let Some(idx) = self.resolve(taxonomy, &arc.from) else {
                continue;
            };
            let element = taxonomy.element_mut(idx);
            element.references.extend(references.iter().cloned());
            attached += references.len();
        }
        attached
    }

    pub fn build_presentation(&self, taxonomy: &mut Taxonomy) -> usize {
        let mut edges = 0;
        for arc in self.arcs(ArcKind::Presentation) {
            let (Some(parent), Some(child)) =
                (self.resolve(taxonomy, &arc.from), self.resolve(taxonomy, &arc.to))
            else {
                continue;
            };
            taxonomy.link_presentation(parent, child, arc.order, arc.preferred_label.clone());
            edges += 1;
        }
        edges
    }

    pub fn build_calculation(&self, taxonomy: &mut Taxonomy) -> usize {
        let mut edges = 0;
        for arc in self.arcs(ArcKind::Calculation) {
            let (Some(parent), Some(child)) =
                (self.resolve(taxonomy, &arc.from), self.resolve(taxonomy, &arc.to))
            else {
                continue;
            };
            taxonomy.link_calculation(parent, child, arc.weight, arc.order);
            edges += 1;
        }
        edges
    }
}

fn text_target<'a>(
    label: &'a mut Option<PendingLabel>,
    reference: &'a mut Option<PendingReference>,
) -> Option<&'a mut String> {
    if let Some(pending) = label.as_mut() {
        return Some(&mut pending.text);
    }
    reference
        .as_mut()
        .and_then(|pending| pending.part.as_mut())
        .map(|(_, text)| text)
}

fn parse_number(value: Option<&str>, default: f64) -> f64 {
    match value {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            debug!(value = raw, default, "unparsable arc attribute");
            default
        }),
        None => default,
    }
}

fn lossy(bytes: &[u8]) -> CompactString {
    CompactString::from(String::from_utf8_lossy(bytes).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Element;
    use compact_str::CompactString;

    const LABELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<link:linkbase xmlns:link="http://www.xbrl.org/2003/linkbase"
               xmlns:xlink="http://www.w3.org/1999/xlink"
               xmlns:xml="http://www.w3.org/XML/1998/namespace">
  <link:labelLink xlink:type="extended" xlink:role="http://www.xbrl.org/2003/role/link">
    <link:loc xlink:type="locator" xlink:href="us-gaap-2025.xsd#us-gaap_Assets" xlink:label="loc_Assets"/>
    <link:label xlink:type="resource" xlink:label="lab_Assets" xlink:role="http://www.xbrl.org/2003/role/label" xml:lang="en-US">Assets</link:label>
    <link:label xlink:type="resource" xlink:label="lab_Assets" xlink:role="http://www.xbrl.org/2003/role/documentation" xml:lang="en-US">
      Sum of the carrying amounts &amp; other assets.
    </link:label>
    <link:label xlink:type="resource" xlink:label="lab_Empty" xlink:role="http://www.xbrl.org/2003/role/terseLabel">   </link:label>
    <link:labelArc xlink:type="arc" xlink:arcrole="http://www.xbrl.org/2003/arcrole/concept-label" xlink:from="loc_Assets" xlink:to="lab_Assets"/>
    <link:labelArc xlink:type="arc" xlink:from="loc_Missing" xlink:to="lab_Assets"/>
    <link:labelArc xlink:type="arc" xlink:from="loc_Assets" xlink:to="lab_Empty"/>
  </link:labelLink>
</link:linkbase>"#;

    const REFERENCES: &str = r#"<link:linkbase xmlns:link="http://www.xbrl.org/2003/linkbase"
               xmlns:xlink="http://www.w3.org/1999/xlink"
               xmlns:ref="http://www.xbrl.org/2006/ref">
  <link:referenceLink xlink:type="extended">
    <link:loc xlink:type="locator" xlink:href="us-gaap-2025.xsd#us-gaap_Assets" xlink:label="loc_Assets"/>
    <link:reference xlink:type="resource" xlink:label="ref_1">
      <ref:Publisher>FASB</ref:Publisher>
      <ref:Name>Accounting Standards Codification</ref:Name>
      <ref:Topic>210</ref:Topic>
      <ref:Paragraph/>
    </link:reference>
    <link:reference xlink:type="resource" xlink:label="ref_2">
      <ref:Publisher>SEC</ref:Publisher>
      <ref:Section>02</ref:Section>
    </link:reference>
    <link:referenceArc xlink:type="arc" xlink:from="loc_Assets" xlink:to="ref_1"/>
    <link:referenceArc xlink:type="arc" xlink:from="loc_Assets" xlink:to="ref_2"/>
  </link:referenceLink>
</link:linkbase>"#;

    fn taxonomy(names: &[(&str, &str)]) -> Taxonomy {
        let mut taxonomy = Taxonomy::default();
        for (name, id) in names {
            let mut element = Element::new(*name);
            element.id = Some(CompactString::from(*id));
            taxonomy.insert(element);
        }
        taxonomy
    }

    #[test]
    fn test_parse_collects_locators_labels_and_arcs() {
        let doc = LinkbaseDocument::parse(LABELS.as_bytes()).unwrap();
        assert_eq!(doc.locator("loc_Assets"), Some("us-gaap_Assets"));
        assert_eq!(doc.locator_count(), 1);
        assert_eq!(doc.arc_count(), 3);

        let labels = doc.labels("lab_Assets");
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].kind, LabelKind::Standard);
        assert_eq!(labels[0].lang, "en-US");
        assert_eq!(labels[1].kind, LabelKind::Documentation);
        assert_eq!(labels[1].text, "Sum of the carrying amounts & other assets.");
        assert!(doc.labels("lab_Empty").is_empty());
    }

    #[test]
    fn test_attach_labels_by_element_id() {
        let doc = LinkbaseDocument::parse(LABELS.as_bytes()).unwrap();
        let mut taxonomy = taxonomy(&[("Assets", "us-gaap_Assets")]);

        assert_eq!(doc.attach_labels(&mut taxonomy), 2);
        let assets = taxonomy.get("Assets").unwrap();
        assert_eq!(assets.standard_label(), Some("Assets"));
        assert_eq!(
            assets.documentation(),
            Some("Sum of the carrying amounts & other assets.")
        );
        assert_eq!(assets.label(LabelKind::Terse), None);
    }

    #[test]
    fn test_label_arc_to_missing_locator_is_skipped() {
        let xml = r#"<link:linkbase xmlns:link="http://www.xbrl.org/2003/linkbase" xmlns:xlink="http://www.w3.org/1999/xlink">
  <link:labelLink>
    <link:label xlink:label="lab_Assets" xlink:role="http://www.xbrl.org/2003/role/label">Assets</link:label>
    <link:labelArc xlink:from="loc_Nowhere" xlink:to="lab_Assets"/>
  </link:labelLink>
</link:linkbase>"#;
        let doc = LinkbaseDocument::parse(xml.as_bytes()).unwrap();
        let mut taxonomy = taxonomy(&[("Assets", "us-gaap_Assets")]);

        assert_eq!(doc.attach_labels(&mut taxonomy), 0);
        assert!(taxonomy.get("Assets").unwrap().labels.is_empty());
    }

    #[test]
    fn test_references_accumulate() {
        let doc = LinkbaseDocument::parse(REFERENCES.as_bytes()).unwrap();
        let mut taxonomy = taxonomy(&[("Assets", "us-gaap_Assets")]);

        assert_eq!(doc.attach_references(&mut taxonomy), 2);
        assert_eq!(doc.attach_references(&mut taxonomy), 2);

        let references = &taxonomy.get("Assets").unwrap().references;
        assert_eq!(references.len(), 4);
        assert_eq!(references[0].get("Publisher"), Some("FASB"));
        assert_eq!(references[0].get("Topic"), Some("210"));
        assert_eq!(references[0].get("Paragraph"), None);
        assert_eq!(references[1].get("Section"), Some("02"));
    }

    #[test]
    fn test_presentation_arcs_build_symmetric_hierarchy() {
        let xml = r#"<link:linkbase xmlns:link="http://www.xbrl.org/2003/linkbase" xmlns:xlink="http://www.w3.org/1999/xlink">
  <link:presentationLink xlink:role="http://fasb.org/us-gaap/role/statement/StatementOfFinancialPositionClassified">
    <link:loc xlink:href="us-gaap-2025.xsd#A" xlink:label="loc_A"/>
    <link:loc xlink:href="us-gaap-2025.xsd#B" xlink:label="loc_B"/>
    <link:loc xlink:href="us-gaap-2025.xsd#C" xlink:label="loc_C"/>
    <link:loc xlink:href="other.xsd#Outside" xlink:label="loc_Outside"/>
    <link:presentationArc xlink:from="loc_A" xlink:to="loc_B" order="1"/>
    <link:presentationArc xlink:from="loc_A" xlink:to="loc_C" order="2" preferredLabel="http://www.xbrl.org/2003/role/totalLabel"/>
    <link:presentationArc xlink:from="loc_A" xlink:to="loc_Outside" order="3"/>
  </link:presentationLink>
</link:linkbase>"#;
        let doc = LinkbaseDocument::parse(xml.as_bytes()).unwrap();
        let mut taxonomy = taxonomy(&[("A", "id_A"), ("B", "id_B"), ("C", "id_C")]);

        assert_eq!(doc.build_presentation(&mut taxonomy), 2);
        assert_eq!(taxonomy.get("A").unwrap().child_elements, vec!["B", "C"]);
        assert_eq!(taxonomy.get("B").unwrap().parent_elements, vec!["A"]);
        assert_eq!(taxonomy.get("C").unwrap().parent_elements, vec!["A"]);

        let edges = taxonomy.presentation_children("A");
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].order, 1.0);
        assert_eq!(
            edges[1].preferred_label.as_deref(),
            Some("http://www.xbrl.org/2003/role/totalLabel")
        );
    }

    #[test]
    fn test_calculation_weights_and_defaults() {
        let xml = r#"<link:linkbase xmlns:link="http://www.xbrl.org/2003/linkbase" xmlns:xlink="http://www.w3.org/1999/xlink">
  <link:calculationLink>
    <link:loc xlink:href="s.xsd#GrossProfit" xlink:label="loc_GP"/>
    <link:loc xlink:href="s.xsd#Revenues" xlink:label="loc_Rev"/>
    <link:loc xlink:href="s.xsd#CostOfRevenue" xlink:label="loc_Cost"/>
    <link:calculationArc xlink:from="loc_GP" xlink:to="loc_Rev" order="1.0"/>
    <link:calculationArc xlink:from="loc_GP" xlink:to="loc_Cost" weight="-1.0" order="bogus"/>
  </link:calculationLink>
</link:linkbase>"#;
        let doc = LinkbaseDocument::parse(xml.as_bytes()).unwrap();
        let mut taxonomy = taxonomy(&[
            ("GrossProfit", "g"),
            ("Revenues", "r"),
            ("CostOfRevenue", "c"),
        ]);

        assert_eq!(doc.build_calculation(&mut taxonomy), 2);
        let children = &taxonomy.get("GrossProfit").unwrap().calculation_children;
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].element, "Revenues");
        assert_eq!(children[0].weight, 1.0);
        assert_eq!(children[0].order, 1.0);
        assert_eq!(children[1].element, "CostOfRevenue");
        assert_eq!(children[1].weight, -1.0);
        assert_eq!(children[1].order, 0.0);
        // Calculation arcs do not touch the presentation hierarchy
        assert!(taxonomy.get("Revenues").unwrap().parent_elements.is_empty());
    }

    #[test]
    fn test_apply_only_uses_matching_arcs() {
        let doc = LinkbaseDocument::parse(LABELS.as_bytes()).unwrap();
        let mut taxonomy = taxonomy(&[("Assets", "us-gaap_Assets")]);
        assert_eq!(doc.apply(DocumentKind::Presentation, &mut taxonomy), 0);
        assert_eq!(doc.apply(DocumentKind::Labels, &mut taxonomy), 2);
    }

    #[test]
    fn test_unhandled_arc_kinds_are_skipped() {
        let xml = r#"<link:linkbase xmlns:link="http://www.xbrl.org/2003/linkbase"
               xmlns:xlink="http://www.w3.org/1999/xlink">
  <link:definitionLink xlink:type="extended">
    <link:loc xlink:type="locator" xlink:href="us-gaap-2025.xsd#us-gaap_Assets" xlink:label="loc_Assets"/>
    <link:loc xlink:type="locator" xlink:href="us-gaap-2025.xsd#us-gaap_Cash" xlink:label="loc_Cash"/>
    <link:definitionArc xlink:type="arc" xlink:from="loc_Assets" xlink:to="loc_Cash"/>
  </link:definitionLink>
  <link:presentationLink xlink:type="extended">
    <link:presentationArc xlink:type="arc" xlink:from="loc_Assets" xlink:to="loc_Cash"/>
  </link:presentationLink>
</link:linkbase>"#;
        let doc = LinkbaseDocument::parse(xml.as_bytes()).unwrap();
        assert_eq!(doc.locator_count(), 2);
        assert_eq!(doc.arc_count(), 1);
    }

    #[test]
    fn test_malformed_linkbase_is_an_error() {
        let xml = r#"<link:linkbase xmlns:link="http://www.xbrl.org/2003/linkbase"><link:labelLink></link:linkbase>"#;
        assert!(LinkbaseDocument::parse(xml.as_bytes()).is_err());
    }
}
