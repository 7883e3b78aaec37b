use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

pub const DEFAULT_SEARCH_BASE_URL: &str = "https://www.google.com/";

// Characters left intact by JavaScript's encodeURIComponent.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_uri_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

/// Web search link for a clicked label, `None` when there is nothing to search.
pub fn search_url(base: &str, suggestion: &str) -> Option<String> {
    let suggestion = suggestion.trim();
    if suggestion.is_empty() {
        return None;
    }
    Some(format!("{base}?q={}", encode_uri_component(suggestion)))
}

/// Relative link that restores a search when the page is opened.
pub fn share_path(param: &str, query: &str) -> String {
    format!("/?{param}={}", encode_uri_component(query))
}
