//! Text cleanup shared by the page parsers.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static INLINE_SPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t\r\f\x0B]+").expect("valid inline space regex"));

/// Replace every tag with a space.
pub fn strip_tags(html: &str) -> String {
    TAG_RE.replace_all(html, " ").into_owned()
}

/// Decode HTML character references (`&amp;`, `&#x27;`, `&eacute;` ...).
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let fragment = Html::parse_fragment(text);
    fragment.root_element().text().collect()
}

/// Strip tags, collapse whitespace, trim, and decode entities.
pub fn clean_text(html: &str) -> String {
    let stripped = strip_tags(html);
    let collapsed = WHITESPACE_RE.replace_all(stripped.trim(), " ");
    decode_entities(&collapsed).trim().to_string()
}

/// Like [`clean_text`] but keeps line breaks: every non-empty line is
/// collapsed and trimmed on its own, empty lines are dropped.
pub fn clean_multiline(html: &str) -> String {
    let stripped = strip_tags(html);
    let lines: Vec<String> = stripped
        .lines()
        .map(|line| INLINE_SPACE_RE.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    decode_entities(&lines.join("\n")).trim().to_string()
}

/// `None` for blank text.
pub fn non_blank(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Cut `text` to `max_chars` characters and append `"..."` when it was longer.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Human-readable title from a URL slug: `don-giovanni` becomes `Don Giovanni`.
pub fn title_from_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_strips_and_decodes() {
        assert_eq!(clean_text("  Don <em>Giovanni</em> "), "Don Giovanni");
        assert_eq!(clean_text("L&#x27;italiana in Algeri"), "L'italiana in Algeri");
        assert_eq!(
            clean_text("Eiffel Art Studios &#8212; Hevesi S&#225;ndor Stage"),
            "Eiffel Art Studios — Hevesi Sándor Stage"
        );
        assert_eq!(clean_text("Tom &amp; Jerry"), "Tom & Jerry");
    }

    #[test]
    fn test_clean_multiline_keeps_lines() {
        let text = clean_multiline("<p>First   line</p>\n\n<p> Second\tline </p>\n");
        assert_eq!(text, "First line\nSecond line");
    }

    #[test]
    fn test_truncate_appends_marker() {
        let long = "x".repeat(3000);
        let truncated = truncate(&long, 2000);
        assert_eq!(truncated.chars().count(), 2003);
        assert!(truncated.ends_with("..."));

        assert_eq!(truncate("short", 2000), "short");
        let exact = "y".repeat(2000);
        assert_eq!(truncate(&exact, 2000), exact);
    }

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        let accented = "á".repeat(10);
        assert_eq!(truncate(&accented, 4), "áááá...");
    }

    #[test]
    fn test_title_from_slug() {
        assert_eq!(title_from_slug("don-giovanni"), "Don Giovanni");
        assert_eq!(title_from_slug("la-TRAVIATA"), "La Traviata");
        assert_eq!(title_from_slug("aida"), "Aida");
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank("   ".to_string()), None);
        assert_eq!(non_blank("x".to_string()), Some("x".to_string()));
    }
}
