//! Hygiene for text bound for rendering.

use std::sync::LazyLock;

use regex::Regex;

pub const DEFAULT_MAX_RENDER_CHARS: usize = 2000;

static CONTROL: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").ok());
static MD_LINK: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\[([^\]\n]{1,80})\]\(([^)\s]+)\)").ok());

/// Strips control characters, rewrites `[text](url)` as `text (url)`,
/// escapes HTML, trims, and truncates to `max_chars` characters.
pub fn sanitize(text: &str, max_chars: usize) -> String {
    let mut s = text.to_string();
    if let Some(re) = CONTROL.as_ref() {
        s = re.replace_all(&s, "").into_owned();
    }
    if let Some(re) = MD_LINK.as_ref() {
        s = re.replace_all(&s, "$1 ($2)").into_owned();
    }
    escape_html(s.trim()).chars().take(max_chars).collect()
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
