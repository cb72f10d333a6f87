//! Wiener Staatsoper calendar month pages and event detail pages.

use super::json_ld::{self, EVENT_TYPES};
use super::text::{clean_text, non_blank, title_from_slug};
use crate::error::{Result, ScraperError};
use crate::types::ScrapedProduction;
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

const DETAIL_PATH: &str = "/en/calendar/detail/";

static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid link selector"));
static H1_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("valid h1 selector"));
static OG_DESCRIPTION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:description"]"#).expect("valid og:description selector")
});
static OG_IMAGE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:image"]"#).expect("valid og:image selector"));

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/detail/([^/]+)/").expect("valid slug regex"));
static URL_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d{4}-\d{2}-\d{2})/?$").expect("valid url date regex"));

/// Distinct absolute event-detail URLs on a calendar month page, in page order.
pub fn extract_event_urls(html: &str, base_url: &str) -> Vec<String> {
    let base = base_url.trim_end_matches('/');
    let document = Html::parse_document(html);
    let mut urls: Vec<String> = Vec::new();
    for link in document.select(&LINK_SELECTOR) {
        let Some(href) = link.value().attr("href").map(str::trim) else {
            continue;
        };
        let url = if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else if href.starts_with('/') {
            format!("{}{}", base, href)
        } else {
            continue;
        };
        if url.contains(DETAIL_PATH) && !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

/// Production slug of `.../detail/{slug}/{date}/`.
pub fn extract_slug(url: &str) -> Option<String> {
    SLUG_RE
        .captures(url)
        .map(|caps| caps[1].to_string())
        .filter(|slug| !slug.is_empty())
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .filter_map(|meta| meta.value().attr("content"))
        .map(|content| content.trim().to_string())
        .find(|content| !content.is_empty())
}

/// Production fields from an event detail page. Missing heading falls back
/// to a title built from the slug.
pub fn parse_production_details(html: &str, slug: &str, source_url: &str) -> ScrapedProduction {
    let document = Html::parse_document(html);
    let title = document
        .select(&H1_SELECTOR)
        .next()
        .map(|h1| clean_text(&h1.text().collect::<String>()))
        .and_then(non_blank)
        .unwrap_or_else(|| title_from_slug(slug));

    let mut production = ScrapedProduction::new(title, slug);
    production.source_url = Some(source_url.to_string());
    production.description = meta_content(&document, &OG_DESCRIPTION_SELECTOR);
    production.image_url = meta_content(&document, &OG_IMAGE_SELECTOR);
    production
}

/// Start time of the performance on an event detail page.
///
/// Structured data wins; otherwise the trailing date segment of the URL is
/// used at midnight. `Ok(None)` when neither is present, `Err` when the URL
/// carries a date segment that is not a real date.
pub fn parse_show_date(html: &str, url: &str) -> Result<Option<DateTime<Utc>>> {
    let structured = json_ld::extract_structured_events(html, EVENT_TYPES)
        .iter()
        .filter_map(|event| event.get("startDate").and_then(Value::as_str))
        .find_map(json_ld::parse_start_date);
    if structured.is_some() {
        return Ok(structured);
    }

    let Some(caps) = URL_DATE_RE.captures(url) else {
        return Ok(None);
    };
    let date = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d")
        .map_err(|e| ScraperError::Parse(format!("invalid date segment in {}: {}", url, e)))?;
    Ok(date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc()))
}
