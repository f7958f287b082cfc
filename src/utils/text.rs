use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static URLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:https?://|www\.)\S+").unwrap());

/// Collapse whitespace runs into single spaces and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Lowercase, drop URLs and collapse whitespace.
pub fn clean_review_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = URLS.replace_all(&lowered, "");
    normalize_whitespace(&stripped)
}
