//! Monthly programme listing of opera.hu.
//!
//! ```text
//! <li id="nap_20260207" class="day">
//!   <wt-event ...><template><article>
//!     <div class="post-time">10:00</div>
//!     <h2 class="post-title">
//!       <a href="/en/programme/SEASON/SLUG/VENUE-DATE-TIME/" class="post-title-link">Title</a>
//!     </h2>
//!     <span class="post-location-name">Venue</span>
//!   </article></template></wt-event>
//! </li>
//! ```

use crate::constants::{OPERA_HU_DEFAULT_VENUE, REHEARSAL_TAG};
use crate::parser::text::{clean_text, title_from_slug};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

static DAY_ANCHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<li\s+id="nap_(\d{4})(\d{2})(\d{2})"[^>]*>"#).expect("valid day anchor regex")
});
static EVENT_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<wt-event[^>]*>(.*?)</wt-event>").expect("valid event block regex")
});
static POST_TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<div[^>]*class="post-time"[^>]*>\s*(?:<[^>]*>\s*)*(\d{1,2}):(\d{2})"#)
        .expect("valid post time regex")
});
static TITLE_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)<a[^>]*href="(/en/programme/([\w-]+)/([\w-]+)/[^"]*)"[^>]*class="post-title-link"[^>]*>(.*?)</a>"#,
    )
    .expect("valid title link regex")
});
static TITLE_LINK_ALT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)<a[^>]*class="post-title-link"[^>]*href="(/en/programme/([\w-]+)/([\w-]+)/[^"]*)"[^>]*>(.*?)</a>"#,
    )
    .expect("valid alternate title link regex")
});
static LOCATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<span[^>]*class="post-location-name"[^>]*>(.*?)</span>"#)
        .expect("valid location regex")
});
pub(crate) static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<span[^>]*class="tag[^"]*"[^>]*>(.*?)</span>"#).expect("valid tag regex")
});

/// One calendar entry as it appears on a programme page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub season: String,
    pub slug: String,
    pub title: String,
    pub venue_name: String,
    /// Local wall-clock time as printed on the page
    pub date: NaiveDateTime,
    /// Link to the single performance; stable per event
    pub relative_url: String,
    pub is_rehearsal: bool,
}

/// Whether a cleaned tag label is the reserved rehearsal marker.
pub fn is_rehearsal_tag(label: &str) -> bool {
    label.to_lowercase().contains(REHEARSAL_TAG)
}

/// Parse every event of a monthly programme page.
///
/// Day blocks with impossible dates and event blocks without a title link are
/// skipped; everything else yields exactly one [`RawEvent`].
pub fn parse_programme(html: &str) -> Vec<RawEvent> {
    let mut events = Vec::new();
    for (date, day_html) in day_blocks(html) {
        for block in EVENT_BLOCK_RE.captures_iter(day_html) {
            if let Some(event) = parse_event_block(&block[1], date) {
                events.push(event);
            }
        }
    }
    events
}

/// Split the page into `(date, block)` pairs. A block runs from its anchor to
/// the next anchor, cut short at the first closing list tag.
fn day_blocks(html: &str) -> Vec<(NaiveDate, &str)> {
    let anchors: Vec<Captures> = DAY_ANCHOR_RE.captures_iter(html).collect();
    let mut blocks = Vec::with_capacity(anchors.len());

    for (i, caps) in anchors.iter().enumerate() {
        let Some(whole) = caps.get(0) else { continue };
        let start = whole.end();
        let end = anchors
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(html.len());
        let mut block = &html[start..end];
        if let Some(list_end) = block.find("</ul>") {
            block = &block[..list_end];
        }

        let date = (|| {
            let year: i32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let day: u32 = caps[3].parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        })();
        match date {
            Some(date) => blocks.push((date, block)),
            None => tracing::debug!("Skipping day block with invalid date anchor {}", &caps[0]),
        }
    }
    blocks
}

fn parse_event_block(event_html: &str, date: NaiveDate) -> Option<RawEvent> {
    let link = TITLE_LINK_RE
        .captures(event_html)
        .or_else(|| TITLE_LINK_ALT_RE.captures(event_html))?;

    let relative_url = link[1].to_string();
    let season = link[2].to_string();
    let slug = link[3].to_string();
    let mut title = clean_text(&link[4]);
    if title.is_empty() {
        title = title_from_slug(&slug);
    }

    let time = POST_TIME_RE
        .captures(event_html)
        .and_then(|caps| {
            let hour: u32 = caps[1].parse().ok()?;
            let minute: u32 = caps[2].parse().ok()?;
            NaiveTime::from_hms_opt(hour, minute, 0)
        })
        .unwrap_or(NaiveTime::MIN);

    let venue_name = LOCATION_RE
        .captures(event_html)
        .map(|caps| clean_text(&caps[1]))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| OPERA_HU_DEFAULT_VENUE.to_string());

    let is_rehearsal = TAG_RE
        .captures_iter(event_html)
        .any(|caps| is_rehearsal_tag(&clean_text(&caps[1])));

    Some(RawEvent {
        season,
        slug,
        title,
        venue_name,
        date: date.and_time(time),
        relative_url,
        is_rehearsal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap_in_page(days: &str) -> String {
        format!(
            r#"<html><body><main><ul class="programme-list">{days}</ul><footer>x</footer></main></body></html>"#
        )
    }

    fn event(time: &str, season: &str, slug: &str, title: &str, venue: Option<&str>) -> String {
        let venue = venue
            .map(|v| format!(r#"<span class="post-location-name">{v}</span>"#))
            .unwrap_or_default();
        format!(
            r#"<wt-event class="block-list-post">
                <template>
                    <article class="post">
                        <div class="post-time">{time}</div>
                        <h2 class="post-title">
                            <a href="/en/programme/{season}/{slug}/venue-{time}/"
                               class="post-title-link">{title}</a>
                        </h2>
                        {venue}
                    </article>
                </template>
            </wt-event>"#
        )
    }

    fn day(anchor: &str, events: &[String]) -> String {
        format!(
            r#"<li id="nap_{anchor}" class="day"><div class="day-list">{}</div></li>"#,
            events.join("\n")
        )
    }

    #[test]
    fn test_single_event_with_entities() {
        let html = wrap_in_page(&day(
            "20260207",
            &[event(
                "10:00",
                "2025-2026",
                "magyar-nemzeti-balettintezet-nyilt-nap",
                "\n   Open day at the Hungarian National Balett Institute\n  ",
                Some("Eiffel Art Studios &#8212; Hevesi S&#225;ndor Stage"),
            )],
        ));

        let events = parse_programme(&html);
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.season, "2025-2026");
        assert_eq!(e.slug, "magyar-nemzeti-balettintezet-nyilt-nap");
        assert_eq!(e.title, "Open day at the Hungarian National Balett Institute");
        assert_eq!(e.venue_name, "Eiffel Art Studios — Hevesi Sándor Stage");
        assert_eq!(
            e.date,
            NaiveDate::from_ymd_opt(2026, 2, 7).unwrap().and_hms_opt(10, 0, 0).unwrap()
        );
        assert_eq!(
            e.relative_url,
            "/en/programme/2025-2026/magyar-nemzeti-balettintezet-nyilt-nap/venue-10:00/"
        );
        assert!(!e.is_rehearsal);
    }

    #[test]
    fn test_counts_every_event_of_every_day() {
        let html = wrap_in_page(&[
            day(
                "20260301",
                &[
                    event("19:00", "2025-2026", "onegin", "Onegin", Some("Opera")),
                    event("11:00", "2025-2026", "aida", "Aida", Some("Opera")),
                ],
            ),
            day("20260302", &[event("18:00", "2025-2026", "tosca", "Tosca", None)]),
            day(
                "20260303",
                &[
                    event("10:30", "2025-2026", "morning-jam", "Morning Jam", Some("Eiffel")),
                    event("15:00", "2025-2026", "aida", "Aida", Some("Opera")),
                    event("19:30", "2025-2026", "la-traviata", "La traviata", Some("Opera")),
                ],
            ),
        ]
        .join("\n"));

        let events = parse_programme(&html);
        assert_eq!(events.len(), 6);
        assert!(events.iter().all(|e| !e.slug.is_empty()));
        assert_eq!(events[2].slug, "tosca");
        assert_eq!(events[2].date.to_string(), "2026-03-02 18:00:00");
        assert_eq!(events[5].title, "La traviata");
    }

    #[test]
    fn test_defaults_venue_when_missing() {
        let html = wrap_in_page(&day(
            "20260301",
            &[event("19:00", "2025-2026", "onegin", "Onegin", None)],
        ));
        assert_eq!(parse_programme(&html)[0].venue_name, "Hungarian State Opera");
    }

    #[test]
    fn test_falls_back_to_slug_for_blank_title() {
        let html = wrap_in_page(&day(
            "20260301",
            &[event("19:00", "2025-2026", "don-giovanni", "   ", Some("Opera"))],
        ));
        assert_eq!(parse_programme(&html)[0].title, "Don Giovanni");
    }

    #[test]
    fn test_defaults_to_midnight_without_time() {
        let html = wrap_in_page(&day(
            "20260301",
            &[r#"<wt-event><a href="/en/programme/2025-2026/gala/x/" class="post-title-link">Gala</a></wt-event>"#
                .to_string()],
        ));
        let events = parse_programme(&html);
        assert_eq!(events[0].date.to_string(), "2026-03-01 00:00:00");
    }

    #[test]
    fn test_accepts_class_before_href() {
        let html = wrap_in_page(&day(
            "20260301",
            &[r#"<wt-event><div class="post-time">20:15</div><a class="post-title-link" href="/en/programme/2025-2026/nabucco/opera-2026-03-01-2015/">Nabucco</a></wt-event>"#
                .to_string()],
        ));
        let events = parse_programme(&html);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].slug, "nabucco");
        assert_eq!(events[0].date.to_string(), "2026-03-01 20:15:00");
    }

    #[test]
    fn test_skips_blocks_without_title_link() {
        let html = wrap_in_page(&day(
            "20260301",
            &[
                r#"<wt-event><div class="post-time">19:00</div><h2>No link here</h2></wt-event>"#
                    .to_string(),
                event("19:00", "2025-2026", "onegin", "Onegin", Some("Opera")),
            ],
        ));
        let events = parse_programme(&html);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].slug, "onegin");
    }

    #[test]
    fn test_skips_invalid_day_anchor() {
        let html = wrap_in_page(&[
            day("20260231", &[event("19:00", "2025-2026", "ghost", "Ghost", None)]),
            day("20260228", &[event("19:00", "2025-2026", "real", "Real", None)]),
        ]
        .join("\n"));
        let events = parse_programme(&html);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].slug, "real");
    }

    #[test]
    fn test_day_block_stops_at_list_end() {
        let html = format!(
            "{}<div class=\"promo\">{}</div>",
            wrap_in_page(&day("20260301", &[event("19:00", "2025-2026", "onegin", "Onegin", None)])),
            event("20:00", "2025-2026", "promo", "Promo", None)
        );
        let events = parse_programme(&html);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_rehearsal_tag_sets_flag() {
        let html = wrap_in_page(&day(
            "20260301",
            &[r#"<wt-event><a href="/en/programme/2025-2026/aida/x/" class="post-title-link">Aida</a><span class="tag tag--highlight">Dress Rehearsal</span></wt-event>"#
                .to_string()],
        ));
        assert!(parse_programme(&html)[0].is_rehearsal);
    }

    #[test]
    fn test_malformed_input_yields_nothing() {
        assert!(parse_programme("").is_empty());
        assert!(parse_programme("<li id=\"nap_2026").is_empty());
        assert!(parse_programme("{\"not\": \"html\"}").is_empty());
    }
}
