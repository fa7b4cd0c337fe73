//! Small text and URL helpers shared by config and the HTTP submitter.

const PREVIEW_CHARS: usize = 180;

/// Trim optional text, treating blank values as absent.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Append percent-encoded path segments to a base URL.
///
/// Each segment stays a single path component: `/`, `?` and `#` inside it
/// are escaped. Empty segments are skipped.
pub fn join_url(base: &str, segments: &[&str]) -> String {
    let mut url = base.trim_end_matches('/').to_string();
    for segment in segments.iter().filter(|segment| !segment.is_empty()) {
        url.push('/');
        url.push_str(&urlencoding::encode(segment));
    }
    url
}

/// Single-line preview of a response body for log output.
///
/// Whitespace runs collapse to one space and long text is cut with `...`.
pub fn compact_text(value: &str) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= PREVIEW_CHARS {
        return collapsed;
    }
    let mut preview: String = collapsed.chars().take(PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}
