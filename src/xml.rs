// Shared quick-xml helpers for schema and linkbase documents
use crate::Result;
use compact_str::CompactString;
use quick_xml::events::{BytesStart, BytesText};
use quick_xml::Reader;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

pub(crate) fn reader(data: &[u8]) -> Reader<&[u8]> {
    // Skip BOM if present
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    Reader::from_reader(data)
}

/// Local (prefix-stripped) name of a qualified name.
pub(crate) fn local(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

pub(crate) fn decode_text(text: &BytesText<'_>) -> Result<String> {
    Ok(text.unescape()?.into_owned())
}

/// Attributes of one start tag, keyed by their qualified names.
#[derive(Debug, Default)]
pub(crate) struct Attrs {
    entries: Vec<(CompactString, String)>,
}

impl Attrs {
    pub(crate) fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let mut entries = Vec::new();
        for attr in start.attributes().flatten() {
            let key = String::from_utf8_lossy(attr.key.as_ref());
            let value = attr.unescape_value()?;
            entries.push((CompactString::from(key.as_ref()), value.into_owned()));
        }
        Ok(Self { entries })
    }

    /// Look up an attribute by local name, whatever its prefix.
    pub(crate) fn get(&self, local_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| local(key.as_bytes()) == local_name.as_bytes() && !is_xmlns(key))
            .map(|(_, value)| value.as_str())
    }

    /// Look up an attribute by local name, ignoring empty values.
    pub(crate) fn get_non_empty(&self, local_name: &str) -> Option<&str> {
        self.get(local_name).map(str::trim).filter(|v| !v.is_empty())
    }

    /// `xmlns:prefix` declarations as (prefix, uri) pairs.
    pub(crate) fn namespace_declarations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(key, value)| {
            key.strip_prefix("xmlns:")
                .map(|prefix| (prefix, value.as_str()))
        })
    }
}

fn is_xmlns(key: &str) -> bool {
    key == "xmlns" || key.starts_with("xmlns:")
}
