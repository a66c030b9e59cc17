// Schema element extraction for XBRL taxonomies
use crate::model::{BalanceType, Element, ElementFlags, PeriodType};
use crate::xml::{self, Attrs};
use crate::Result;
use ahash::AHashMap;
use compact_str::CompactString;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

/// Element declarations read from one XSD document, in document order.
#[derive(Debug, Default)]
pub struct SchemaDocument {
    pub elements: Vec<Element>,
}

enum Frame {
    Element(Option<usize>),
    Annotation,
    Appinfo,
    AppinfoEntry { name: CompactString, text: String },
    Other,
}

/// Walk every element declaration of a schema document.
///
/// Nothing is returned for a document that fails to parse part way, so a
/// malformed schema can never leave half its elements behind.
pub fn extract_elements(data: &[u8]) -> Result<SchemaDocument> {
    let mut reader = xml::reader(data);
    let mut doc = SchemaDocument::default();
    let mut namespaces: AHashMap<CompactString, String> = AHashMap::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut seen_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if !seen_root {
                    read_root(&e, &mut namespaces)?;
                    seen_root = true;
                }
                let frame = open_frame(&e, stack.last(), &mut doc)?;
                stack.push(frame);
            }
            Event::Empty(e) => {
                if !seen_root {
                    read_root(&e, &mut namespaces)?;
                    seen_root = true;
                }
                // Empty appinfo entries carry no value
                open_frame(&e, stack.last(), &mut doc)?;
            }
            Event::Text(t) => {
                if let Some(Frame::AppinfoEntry { text, .. }) = stack.last_mut() {
                    text.push_str(&xml::decode_text(&t)?);
                }
            }
            Event::CData(c) => {
                if let Some(Frame::AppinfoEntry { text, .. }) = stack.last_mut() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                if let Some(Frame::AppinfoEntry { name, text }) = stack.pop() {
                    let owner = stack.iter().rev().find_map(|frame| match frame {
                        Frame::Element(Some(idx)) => Some(*idx),
                        _ => None,
                    });
                    if let Some(idx) = owner {
                        apply_appinfo(&mut doc.elements[idx], &name, text.trim());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    for element in &mut doc.elements {
        element.namespace = resolve_namespace(element.data_type.as_deref(), &namespaces);
    }

    Ok(doc)
}

fn read_root(start: &BytesStart<'_>, namespaces: &mut AHashMap<CompactString, String>) -> Result<()> {
    let attrs = Attrs::from_start(start)?;
    for (prefix, uri) in attrs.namespace_declarations() {
        namespaces.insert(CompactString::from(prefix), uri.to_string());
    }
    Ok(())
}

fn open_frame(start: &BytesStart<'_>, parent: Option<&Frame>, doc: &mut SchemaDocument) -> Result<Frame> {
    let name = start.name();
    let local = xml::local(name.as_ref());

    if matches!(parent, Some(Frame::Appinfo)) {
        return Ok(Frame::AppinfoEntry {
            name: CompactString::from(String::from_utf8_lossy(local).as_ref()),
            text: String::new(),
        });
    }

    let frame = match local {
        b"element" => {
            let attrs = Attrs::from_start(start)?;
            match read_element(&attrs) {
                Some(element) => {
                    doc.elements.push(element);
                    Frame::Element(Some(doc.elements.len() - 1))
                }
                None => Frame::Element(None),
            }
        }
        b"annotation" => Frame::Annotation,
        b"appinfo" if matches!(parent, Some(Frame::Annotation)) => Frame::Appinfo,
        _ => Frame::Other,
    };
    Ok(frame)
}

fn read_element(attrs: &Attrs) -> Option<Element> {
    let name = attrs.get_non_empty("name")?;
    let mut element = Element::new(name);

    element.id = attrs.get_non_empty("id").map(CompactString::from);
    element.data_type = attrs.get_non_empty("type").map(CompactString::from);
    element.substitution_group = attrs.get_non_empty("substitutionGroup").map(CompactString::from);

    if attrs.get("abstract").is_some_and(is_true) {
        element.flags |= ElementFlags::ABSTRACT;
    }
    if attrs.get("nillable").is_some_and(is_true) {
        element.flags |= ElementFlags::NILLABLE;
    }

    // xbrli:periodType / xbrli:balance, whatever prefix the schema binds
    if let Some(value) = attrs.get_non_empty("periodType") {
        element.period_type = parse_or_skip(&element.name, value);
    }
    if let Some(value) = attrs.get_non_empty("balance") {
        element.balance = parse_or_skip(&element.name, value);
    }

    Some(element)
}

fn apply_appinfo(element: &mut Element, tag: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    match tag {
        "periodType" => {
            if let Some(period_type) = parse_or_skip::<PeriodType>(&element.name, value) {
                element.period_type = Some(period_type);
            }
        }
        "balance" => {
            if let Some(balance) = parse_or_skip::<BalanceType>(&element.name, value) {
                element.balance = Some(balance);
            }
        }
        tag if tag.contains("Type") => {
            element.xbrl_type = Some(CompactString::from(value));
        }
        _ => {}
    }
}

fn parse_or_skip<T>(element: &str, value: &str) -> Option<T>
where
    T: std::str::FromStr<Err = crate::Error>,
{
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!(element, error = %e, "ignoring schema attribute");
            None
        }
    }
}

fn resolve_namespace(data_type: Option<&str>, namespaces: &AHashMap<CompactString, String>) -> Option<String> {
    let (prefix, _) = data_type?.split_once(':')?;
    namespaces.get(prefix).cloned()
}

fn is_true(value: &str) -> bool {
    matches!(value.trim(), "true" | "1")
}
