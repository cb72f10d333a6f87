//! Embedded schema.org data (`<script type="application/ld+json">`).

use crate::types::ScrapedShow;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;

static SCRIPT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script[type]").expect("valid script selector"));

/// `@type` labels treated as performances.
pub const EVENT_TYPES: &[&str] = &["Event", "MusicEvent"];

/// Media type of a `type` attribute, parameters such as `charset` ignored.
fn is_ld_json(type_attr: &str) -> bool {
    type_attr
        .split(';')
        .next()
        .is_some_and(|media| media.trim().eq_ignore_ascii_case("application/ld+json"))
}

/// Every object typed as one of `types` found in any ld+json block of the
/// page. Blocks that are not valid JSON are skipped.
pub fn extract_structured_events(html: &str, types: &[&str]) -> Vec<Value> {
    let document = Html::parse_document(html);
    let mut events = Vec::new();
    for script in document.select(&SCRIPT_SELECTOR) {
        if !script.value().attr("type").is_some_and(is_ld_json) {
            continue;
        }
        let body: String = script.text().collect();
        match serde_json::from_str::<Value>(body.trim()) {
            Ok(value) => collect_typed(&value, types, &mut events),
            Err(e) => tracing::debug!("Skipping invalid ld+json block: {}", e),
        }
    }
    events
}

/// Walk arrays and `@graph` wrappers collecting typed objects. A matching
/// object is taken whole; its children are not searched.
fn collect_typed(value: &Value, types: &[&str], out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_typed(item, types, out);
            }
        }
        Value::Object(map) => {
            if map.get("@type").is_some_and(|t| type_matches(t, types)) {
                out.push(value.clone());
                return;
            }
            if let Some(graph) = map.get("@graph") {
                collect_typed(graph, types, out);
            }
        }
        _ => {}
    }
}

fn type_matches(type_value: &Value, types: &[&str]) -> bool {
    let matches = |s: &str| types.iter().any(|t| t.eq_ignore_ascii_case(s));
    match type_value {
        Value::String(s) => matches(s),
        Value::Array(items) => items.iter().filter_map(Value::as_str).any(matches),
        _ => false,
    }
}

/// Text of a property that is either a string or an object with a `name`.
pub fn string_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map.get("name")?.as_str()?.to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// schema.org date or date-time as UTC. Offsets are honoured, naive values
/// are taken as UTC, a bare date is midnight.
pub fn parse_start_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Venue display name: location name, locality and country joined by commas.
pub fn venue_display(event: &Value) -> Option<String> {
    let location = event.get("location")?;
    let location = match location {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let address = location.get("address");
    let parts: Vec<String> = [
        location.get("name"),
        address.and_then(|a| a.get("addressLocality")),
        address.and_then(|a| a.get("addressCountry")),
    ]
    .into_iter()
    .flatten()
    .filter_map(string_value)
    .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

/// First offer URL; `offers` may be an object or an array.
pub fn offer_url(event: &Value) -> Option<String> {
    let offers = event.get("offers")?;
    let offer = match offers {
        Value::Array(items) => items.first()?,
        other => other,
    };
    offer.get("url").and_then(Value::as_str).map(str::to_string)
}

/// Normalize one structured event into a show. Events without a usable
/// `startDate` yield `None`.
pub fn structured_event_to_show(event: &Value, default_title: &str) -> Option<ScrapedShow> {
    let date = event
        .get("startDate")
        .and_then(Value::as_str)
        .and_then(parse_start_date)?;
    let title = event
        .get("name")
        .and_then(string_value)
        .unwrap_or_else(|| default_title.to_string());

    Some(ScrapedShow {
        title,
        date,
        venue_name: venue_display(event),
        url: offer_url(event),
        is_rehearsal: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn script(body: &str) -> String {
        format!(r#"<script type="application/ld+json">{body}</script>"#)
    }

    #[test]
    fn test_finds_events_in_arrays_and_graphs() {
        let html = format!(
            "<html><head>{}{}{}</head></html>",
            script(r#"{"@context":"https://schema.org","@type":"MusicEvent","name":"A"}"#),
            script(r#"[{"@type":"Organization","name":"org"},{"@type":"Event","name":"B"}]"#),
            script(
                r#"{"@graph":[{"@type":"WebPage"},{"@graph":[{"@type":["Thing","MusicEvent"],"name":"C"}]}]}"#
            ),
        );
        let events = extract_structured_events(&html, EVENT_TYPES);
        let names: Vec<&str> = events.iter().filter_map(|e| e["name"].as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_invalid_block_does_not_stop_others() {
        let html = format!(
            "{}{}",
            script("{ this is not json"),
            script(r#"{"@type":"musicevent","name":"ok"}"#)
        );
        let events = extract_structured_events(&html, EVENT_TYPES);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["name"], "ok");
    }

    #[test]
    fn test_ignores_other_script_types() {
        let html = r#"<script type="application/json">{"@type":"Event"}</script>"#;
        assert!(extract_structured_events(html, EVENT_TYPES).is_empty());
    }

    #[test]
    fn test_type_attribute_variants() {
        let event = r#"{"@type":"MusicEvent","name":"A","startDate":"2026-05-01"}"#;
        let html = format!(
            r#"<script type=application/ld+json>{event}</script>
               <script type="Application/LD+JSON; charset=utf-8">{event}</script>
               <script type='application/ld+json'>{event}</script>"#
        );
        assert_eq!(extract_structured_events(&html, EVENT_TYPES).len(), 3);
    }

    #[test]
    fn test_parse_start_date_variants() {
        assert_eq!(
            parse_start_date("2026-03-14T20:00:00+01:00").unwrap().to_rfc3339(),
            "2026-03-14T19:00:00+00:00"
        );
        assert_eq!(
            parse_start_date("2026-03-14T20:00").unwrap().to_rfc3339(),
            "2026-03-14T20:00:00+00:00"
        );
        assert_eq!(
            parse_start_date("2026-03-14").unwrap().to_rfc3339(),
            "2026-03-14T00:00:00+00:00"
        );
        assert!(parse_start_date("soon").is_none());
    }

    #[test]
    fn test_event_to_show() {
        let event = json!({
            "@type": "MusicEvent",
            "name": "Zaz - Paris",
            "startDate": "2026-05-02T20:30:00",
            "location": {
                "@type": "Place",
                "name": "Accor Arena",
                "address": {"addressLocality": "Paris", "addressCountry": {"@type": "Country", "name": "FR"}}
            },
            "offers": [{"url": "https://tickets.example/zaz-paris"}]
        });
        let show = structured_event_to_show(&event, "Zaz").unwrap();
        assert_eq!(show.title, "Zaz - Paris");
        assert_eq!(show.date.to_rfc3339(), "2026-05-02T20:30:00+00:00");
        assert_eq!(show.venue_name.as_deref(), Some("Accor Arena, Paris, FR"));
        assert_eq!(show.url.as_deref(), Some("https://tickets.example/zaz-paris"));
    }

    #[test]
    fn test_event_to_show_defaults() {
        let event = json!({"@type": "Event", "startDate": "2026-05-02", "offers": {"url": "https://t"}});
        let show = structured_event_to_show(&event, "Zaz").unwrap();
        assert_eq!(show.title, "Zaz");
        assert_eq!(show.venue_name, None);
        assert_eq!(show.url.as_deref(), Some("https://t"));

        let undated = json!({"@type": "Event", "name": "x"});
        assert!(structured_event_to_show(&undated, "Zaz").is_none());
    }
}
