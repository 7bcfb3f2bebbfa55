use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

/// Element id the legacy server puts on a module's display title.
pub const TITLE_MARKER: &str = "cnx_content_title";

static TITLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"cnx_content_title"[^>]*>\s*(\w[^<]*?)\s*</"#).expect("title pattern is valid")
});

/// Pull the module title out of a detail page.
///
/// Returns `None` when the marker is missing or the marked element is empty.
pub fn extract_title(html: &str) -> Option<String> {
    let captures = TITLE_PATTERN.captures(html)?;
    let title = unescape_entities(captures.get(1)?.as_str().trim());
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// Decode named and numeric character references.
fn unescape_entities(raw: &str) -> String {
    Html::parse_fragment(raw)
        .root_element()
        .text()
        .collect::<String>()
        .trim()
        .to_string()
}
