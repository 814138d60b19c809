//! Cleanup of raw scraped and RSS text before chunking.
//!
//! [`normalize`] is a pure function: markup and entities are stripped,
//! characters outside word/space/basic punctuation are dropped, known
//! boilerplate phrases are removed, and whitespace collapses to single
//! spaces. Applying it twice yields the same string as applying it once.

use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&[a-zA-Z#0-9]+;").expect("valid entity regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static SYMBOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[^\w\s.,!?;:'"()-]"#).expect("valid symbol regex"));

/// Player notices and caption markers that news pages embed in body text.
const BOILERPLATE_PHRASES: &[&str] = &[
    "To play this video you need to enable JavaScript in your browser.",
    "This video can not be played",
    "Media caption",
];

/// Cleans raw scraped or RSS text. Always returns a string, possibly empty.
pub fn normalize(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let text = TAG_RE.replace_all(raw, " ");
    let text = ENTITY_RE.replace_all(&text, " ");
    let text = WHITESPACE_RE.replace_all(&text, " ");
    let mut text = SYMBOL_RE.replace_all(&text, "").into_owned();
    for phrase in BOILERPLATE_PHRASES {
        text = text.replace(phrase, " ");
    }
    let text = WHITESPACE_RE.replace_all(&text, " ");
    text.trim().to_string()
}
