use scraper::{ElementRef, Html, Node};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Highlighted portion of the best autocomplete candidate plus its full text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionResult {
    pub highlight: String,
    pub suggestion: String,
}

impl SuggestionResult {
    pub fn is_empty(&self) -> bool {
        self.highlight.is_empty()
    }
}

/// One provider entry. Element 0 carries the HTML-bearing suggestion text.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry(pub Vec<Value>);

impl RawEntry {
    pub fn from_html(html: &str) -> Self {
        Self(vec![Value::String(html.to_string())])
    }

    pub fn html(&self) -> Option<&str> {
        self.0.first().and_then(Value::as_str)
    }
}

const EMPHASIS_TAG: &str = "b";

const DEFAULT_ALLOWED_TAGS: &[&str] = &[
    "b", "strong", "i", "em", "u", "span", "small", "sub", "sup", "mark", "br", "p", "div",
];

/// Subtrees whose text must never reach a label, whatever the allow-list says.
const DROPPED_TAGS: &[&str] = &[
    "script", "style", "template", "iframe", "object", "embed", "noscript", "textarea",
    "title", "svg", "math",
];

/// Reduces untrusted provider markup to text-bearing inline elements.
///
/// Elements outside the allow-list are unwrapped (their text is kept), while
/// elements in [`DROPPED_TAGS`] are removed together with their content.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    allowed_tags: Vec<String>,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::with_allowed_tags(DEFAULT_ALLOWED_TAGS.iter().copied())
    }
}

impl Sanitizer {
    pub fn with_allowed_tags<'a>(tags: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            allowed_tags: tags
                .into_iter()
                .map(|tag| tag.to_ascii_lowercase())
                .collect(),
        }
    }

    fn allows(&self, tag: &str) -> bool {
        self.allowed_tags.iter().any(|allowed| allowed == tag)
    }

    pub fn sanitize(&self, html: &str) -> SanitizedFragment {
        let fragment = Html::parse_fragment(html);
        let mut out = SanitizedFragment::default();
        self.walk(fragment.root_element(), &mut Vec::new(), &mut out);
        out
    }

    /// `open` holds the indices of the emphasis spans enclosing `element`.
    fn walk(&self, element: ElementRef<'_>, open: &mut Vec<usize>, out: &mut SanitizedFragment) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    out.text.push_str(text);
                    for &index in open.iter() {
                        out.emphasis[index].push_str(text);
                    }
                }
                Node::Element(el) => {
                    let tag = el.name().to_ascii_lowercase();
                    if DROPPED_TAGS.contains(&tag.as_str()) {
                        continue;
                    }
                    let Some(child_el) = ElementRef::wrap(child) else {
                        continue;
                    };
                    // Every emphasis element is its own span, nested ones included.
                    let opens_emphasis = tag == EMPHASIS_TAG && self.allows(EMPHASIS_TAG);
                    if opens_emphasis {
                        open.push(out.emphasis.len());
                        out.emphasis.push(String::new());
                    }
                    self.walk(child_el, open, out);
                    if opens_emphasis {
                        open.pop();
                    }
                }
                _ => {}
            }
        }
    }
}

/// Text view of a sanitized fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizedFragment {
    pub text: String,
    /// Text content of each emphasis element, in document order.
    pub emphasis: Vec<String>,
}

impl SanitizedFragment {
    pub fn has_emphasis(&self) -> bool {
        !self.emphasis.is_empty()
    }
}

/// Pick the first entry containing emphasis and split it into highlight and full text.
pub fn extract<I>(sanitizer: &Sanitizer, raw: I) -> SuggestionResult
where
    I: IntoIterator<Item = RawEntry>,
{
    for entry in raw {
        let Some(html) = entry.html() else {
            continue;
        };
        let fragment = sanitizer.sanitize(html);
        if fragment.has_emphasis() {
            return SuggestionResult {
                highlight: fragment.emphasis.join(" ").trim().to_string(),
                suggestion: fragment.text,
            };
        }
    }
    SuggestionResult::default()
}

/// Read the raw suggestion list from the provider payload (element 1).
///
/// Any shape mismatch yields an empty list.
pub fn decode_provider_payload(payload: &Value) -> Vec<RawEntry> {
    let Some(entries) = payload.get(1).and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .map(|entry| match entry {
            Value::Array(items) => RawEntry(items.clone()),
            other => RawEntry(vec![other.clone()]),
        })
        .collect()
}

/// Strip a JSONP envelope (`callback(...)`), passing plain JSON through.
pub fn strip_jsonp<'a>(body: &'a str, callback: &str) -> &'a str {
    let trimmed = body.trim();
    let trimmed = trimmed.strip_prefix("/**/").unwrap_or(trimmed).trim_start();
    let Some(rest) = trimmed.strip_prefix(callback) else {
        return trimmed;
    };
    let Some(rest) = rest.trim_start().strip_prefix('(') else {
        return trimmed;
    };
    let rest = rest.trim();
    let rest = rest.strip_suffix(';').unwrap_or(rest).trim_end();
    rest.strip_suffix(')').unwrap_or(rest).trim()
}

/// Decode a provider response body into a suggestion result.
pub fn suggestion_from_body(sanitizer: &Sanitizer, body: &str, callback: &str) -> SuggestionResult {
    let entries = serde_json::from_str::<Value>(strip_jsonp(body, callback))
        .map(|payload| decode_provider_payload(&payload))
        .unwrap_or_default();
    extract(sanitizer, entries)
}
