//! Production detail page of opera.hu (`/en/programme/SEASON/SLUG/`).
//!
//! Sections (tab panels):
//!   `#in-brief` page description and tag list,
//!   `#synopsis` rich text with `h3` act headings,
//!   `#guide`    `details` blocks,
//!   `#media`    gallery anchors,
//!   header      `h1` title, `p.page-subtitle`, `og:image`.
//!
//! Every extractor is independent; a missing section only empties its own field.

use crate::constants::{DESCRIPTION_MAX_CHARS, GUIDE_MAX_CHARS, SYNOPSIS_MAX_CHARS};
use crate::parser::programme::{is_rehearsal_tag, TAG_RE};
use crate::parser::text::{clean_multiline, clean_text, non_blank, truncate};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<h1[^>]*>(.*?)</h1>").expect("valid title regex"));
static SUBTITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<p[^>]*class="page-subtitle"[^>]*>(.*?)</p>"#).expect("valid subtitle regex")
});
static OG_IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"og:image"\s+content="([^"]+)""#).expect("valid og:image regex"));
static IN_BRIEF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<section[^>]*id="in-brief"[^>]*>(.*?)</section>"#).expect("valid in-brief regex")
});
static DESCRIPTION_TEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<(?:p|div)[^>]*class="page-description"[^>]*>(.*?)</(?:p|div)>"#)
        .expect("valid description regex")
});
static SYNOPSIS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<section[^>]*id="synopsis"[^>]*>(.*?)</section>"#).expect("valid synopsis regex")
});
static RICH_TEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<div[^>]*class="rich-text"[^>]*>(.*)</div>"#).expect("valid rich text regex")
});
static H3_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<h3[^>]*>(.*?)</h3>").expect("valid h3 regex"));
static BLOCK_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</p>|<br\s*/?>").expect("valid block break regex"));
static GUIDE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<section[^>]*id="guide"[^>]*>(.*?)</section>"#).expect("valid guide regex")
});
static DETAILS_CONTENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<div[^>]*class="details-content[^"]*"[^>]*>(.*?)</div>\s*</details>"#)
        .expect("valid details regex")
});
static GALLERY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<a[^>]*data-es-gallery-image[^>]*href="([^"]+)""#).expect("valid gallery regex")
});
static RUNNING_TIME_ELEMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<[a-zA-Z]+[^>]*class="[^"]*\brunning-time\b[^"]*"[^>]*>"#)
        .expect("valid running time regex")
});
static DATA_MINUTES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-minutes="\s*(\d+)\s*""#).expect("valid data-minutes regex"));
static CATEGORY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<(span|p|div)[^>]*class="page-category"[^>]*>(.*?)</(?:span|p|div)>"#)
        .expect("valid category regex")
});
static ANY_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)\b[^>]*?(/?)>").expect("valid any-tag regex")
});
static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Inline tags kept by [`SynopsisFormat::Rich`].
const RICH_TAG_WHITELIST: &[&str] = &["p", "em", "strong", "b", "i", "br", "h3"];

/// How the synopsis keeps its structure once markup is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SynopsisFormat {
    /// Plain text; `<h3>` headings become `### Heading` lines.
    #[default]
    Plain,
    /// Markup reduced to a small whitelist of attribute-free inline tags.
    Rich,
}

/// Everything a detail page can contribute to a production.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductionDetail {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub synopsis: Option<String>,
    pub guide: Option<String>,
    pub gallery_urls: Vec<String>,
    pub running_time_minutes: Option<u32>,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

pub fn parse_detail(html: &str, format: SynopsisFormat) -> ProductionDetail {
    ProductionDetail {
        title: parse_title(html),
        subtitle: parse_subtitle(html),
        image_url: parse_image_url(html),
        description: parse_description(html),
        synopsis: parse_synopsis(html, format),
        guide: parse_guide(html),
        gallery_urls: parse_gallery_urls(html),
        running_time_minutes: parse_running_time(html),
        category: parse_category(html),
        tags: parse_tags(html),
    }
}

pub fn parse_title(html: &str) -> Option<String> {
    first_clean(&TITLE_RE, html)
}

pub fn parse_subtitle(html: &str) -> Option<String> {
    first_clean(&SUBTITLE_RE, html)
}

pub fn parse_image_url(html: &str) -> Option<String> {
    OG_IMAGE_RE
        .captures(html)
        .and_then(|caps| non_blank(caps[1].trim().to_string()))
}

/// "In brief" text, at most 2000 characters.
pub fn parse_description(html: &str) -> Option<String> {
    let section = IN_BRIEF_RE.captures(html)?;
    let text = DESCRIPTION_TEXT_RE.captures(&section[1])?;
    non_blank(clean_text(&text[1])).map(|t| truncate(&t, DESCRIPTION_MAX_CHARS))
}

/// Synopsis section, at most 5000 characters.
pub fn parse_synopsis(html: &str, format: SynopsisFormat) -> Option<String> {
    let section = SYNOPSIS_RE.captures(html)?;
    let content = RICH_TEXT_RE
        .captures(&section[1])
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| section[1].to_string());

    match format {
        SynopsisFormat::Plain => {
            let marked = H3_RE.replace_all(&content, |caps: &Captures| {
                format!("\n### {}\n", clean_text(&caps[1]))
            });
            let broken = BLOCK_BREAK_RE.replace_all(&marked, "\n");
            non_blank(clean_multiline(&broken)).map(|t| truncate(&t, SYNOPSIS_MAX_CHARS))
        }
        SynopsisFormat::Rich => non_blank(keep_whitelisted_tags(&content))
            .map(|t| truncate_markup(&t, SYNOPSIS_MAX_CHARS)),
    }
}

/// Guide blocks joined by blank lines, at most 10000 characters.
pub fn parse_guide(html: &str) -> Option<String> {
    let section = GUIDE_RE.captures(html)?;
    let parts: Vec<String> = DETAILS_CONTENT_RE
        .captures_iter(&section[1])
        .map(|caps| clean_text(&caps[1]))
        .filter(|text| !text.is_empty())
        .collect();
    non_blank(parts.join("\n\n")).map(|t| truncate(&t, GUIDE_MAX_CHARS))
}

/// Gallery image URLs in page order.
pub fn parse_gallery_urls(html: &str) -> Vec<String> {
    GALLERY_RE
        .captures_iter(html)
        .map(|caps| caps[1].trim().to_string())
        .filter(|url| !url.is_empty())
        .collect()
}

pub fn parse_running_time(html: &str) -> Option<u32> {
    let element = RUNNING_TIME_ELEMENT_RE.find(html)?;
    DATA_MINUTES_RE
        .captures(element.as_str())
        .and_then(|caps| caps[1].parse().ok())
}

pub fn parse_category(html: &str) -> Option<String> {
    CATEGORY_RE
        .captures(html)
        .and_then(|caps| non_blank(clean_text(&caps[2])))
}

/// Tag labels, without the rehearsal marker.
pub fn parse_tags(html: &str) -> Vec<String> {
    TAG_RE
        .captures_iter(html)
        .map(|caps| clean_text(&caps[1]))
        .filter(|tag| !tag.is_empty() && !is_rehearsal_tag(tag))
        .collect()
}

fn first_clean(re: &Regex, html: &str) -> Option<String> {
    re.captures(html).and_then(|caps| non_blank(clean_text(&caps[1])))
}

/// Drop attributes from whitelisted tags and replace all other tags with a
/// space. Entities are left encoded; the output is still HTML.
fn keep_whitelisted_tags(html: &str) -> String {
    let reduced = ANY_TAG_RE.replace_all(html, |caps: &Captures| {
        let closing = !caps[1].is_empty();
        let name = caps[2].to_lowercase();
        if !RICH_TAG_WHITELIST.contains(&name.as_str()) {
            return " ".to_string();
        }
        match (name.as_str(), closing) {
            ("br", _) => "<br>".to_string(),
            (_, true) => format!("</{name}>"),
            (_, false) => format!("<{name}>"),
        }
    });
    WHITESPACE_RE.replace_all(&reduced, " ").trim().to_string()
}

/// Like [`truncate`], but only text counts towards `max_chars`. Tags are
/// never split, and tags still open at the cut are closed after the `"..."`.
fn truncate_markup(markup: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(markup.len().min(max_chars * 2));
    let mut open: Vec<String> = Vec::new();
    let mut remaining = max_chars;
    let mut last = 0;

    for caps in ANY_TAG_RE.captures_iter(markup) {
        let Some(tag) = caps.get(0) else { continue };
        if !take_text(&markup[last..tag.start()], &mut remaining, &mut out) {
            return close_truncated(out, &open);
        }
        last = tag.end();

        let name = caps[2].to_lowercase();
        if !caps[1].is_empty() {
            if let Some(pos) = open.iter().rposition(|n| *n == name) {
                open.truncate(pos);
            }
        } else if name != "br" {
            open.push(name);
        }
        out.push_str(tag.as_str());
    }

    if take_text(&markup[last..], &mut remaining, &mut out) {
        markup.to_string()
    } else {
        close_truncated(out, &open)
    }
}

/// Copy as much of `text` as `remaining` allows. False when some was left out.
fn take_text(text: &str, remaining: &mut usize, out: &mut String) -> bool {
    match text.char_indices().nth(*remaining) {
        Some((byte_idx, _)) => {
            out.push_str(&text[..byte_idx]);
            *remaining = 0;
            false
        }
        None => {
            out.push_str(text);
            *remaining -= text.chars().count();
            true
        }
    }
}

fn close_truncated(mut out: String, open: &[String]) -> String {
    out.push_str("...");
    for name in open.iter().rev() {
        out.push_str(&format!("</{}>", name));
    }
    out
}
