//! Small helpers over quick-xml's pull parser shared by the extractors.

use quick_xml::encoding::Decoder;
use quick_xml::events::BytesStart;

/// Element name without its namespace prefix (`dc:title` → `title`).
pub(super) fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

/// Trimmed, unescaped value of the attribute whose local name is `name`.
///
/// Malformed attributes are skipped rather than failing the whole element.
pub(super) fn attribute(element: &BytesStart<'_>, name: &str, decoder: Decoder) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name.as_bytes())
        .and_then(|a| a.decode_and_unescape_value(decoder).ok())
        .map(|v| v.trim().to_string())
}

/// Accumulates the text content of one element, including text nested in
/// child elements.
#[derive(Debug)]
pub(super) struct TextCapture {
    depth: usize,
    text: String,
}

impl TextCapture {
    /// Start capturing for an element opened at stack `depth`.
    pub(super) fn at(depth: usize) -> Self {
        Self {
            depth,
            text: String::new(),
        }
    }

    pub(super) fn push(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// True when closing an element at `depth` ends this capture.
    pub(super) fn ends_at(&self, depth: usize) -> bool {
        self.depth == depth
    }

    /// Trimmed text, `None` when blank.
    pub(super) fn finish(self) -> Option<String> {
        let trimmed = self.text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}
