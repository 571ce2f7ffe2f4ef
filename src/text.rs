//! Plain-text clean-up for incident descriptions.
//!
//! Feed entries arrive with markup from the upstream sites; the portal stores and
//! searches plain text.

use std::sync::LazyLock;

use regex::Regex;

const ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&#8217;", "'"),
    ("&#8220;", "\""),
    ("&#8221;", "\""),
    ("&hellip;", "..."),
    // Must stay last so `&amp;lt;` decodes to `&lt;`, not `<`.
    ("&amp;", "&"),
];

/// Tags that separate words when rendered, replaced by a space.
static BLOCK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:br|p|div|li|ul|ol|h[1-6]|tr|td|blockquote)\b[^>]*>")
        .expect("valid regex")
});

/// Any remaining tag, removed outright.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Strip tags, decode common entities and collapse runs of whitespace.
pub fn sanitize_description(input: &str) -> String {
    let spaced = BLOCK_TAG_RE.replace_all(input, " ");
    let mut decoded = TAG_RE.replace_all(&spaced, "").into_owned();

    for (entity, replacement) in ENTITIES {
        if decoded.contains(entity) {
            decoded = decoded.replace(entity, replacement);
        }
    }

    WHITESPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

/// Shorten `text` to at most `max_chars` characters on a word boundary, adding `...`.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut: String = text.chars().take(max_chars).collect();
    let trimmed = match cut.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => &cut[..idx],
        _ => cut.as_str(),
    };
    format!("{}...", trimmed.trim_end())
}
