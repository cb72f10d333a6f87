use crate::constants::{ZAZ_TOUR_SOURCE, ZAZ_TOUR_URL};
use crate::error::Result;
use crate::fetch::{fetch_page, FetchClient};
use crate::parser::json_ld::{extract_structured_events, structured_event_to_show, EVENT_TYPES};
use crate::scrapers::settle;
use crate::types::{ScrapeResult, ScrapedProduction};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

const ARTIST_NAME: &str = "Zaz";
const PRODUCTION_TITLE: &str = "Zaz - Tour";
const PRODUCTION_SLUG: &str = "zaz-tour";

/// Zaz's tour page publishes every date as schema.org `MusicEvent` data.
pub struct ZazTourScraper {
    client: Arc<dyn FetchClient>,
}

impl ZazTourScraper {
    pub fn new(client: Arc<dyn FetchClient>) -> Self {
        Self { client }
    }

    #[instrument(skip(self, cancel), fields(source = ZAZ_TOUR_SOURCE))]
    pub async fn scrape(&self, cancel: &CancellationToken) -> Result<ScrapeResult> {
        let mut result = ScrapeResult::default();
        let outcome = self.collect(&mut result, cancel).await;
        settle(ZAZ_TOUR_SOURCE, result, outcome)
    }

    async fn collect(&self, result: &mut ScrapeResult, cancel: &CancellationToken) -> Result<()> {
        let html = match fetch_page(self.client.as_ref(), ZAZ_TOUR_URL, cancel).await? {
            Some(html) if !html.trim().is_empty() => html,
            _ => {
                result.errors.push("Failed to fetch Zaz tour page".to_string());
                return Ok(());
            }
        };

        let mut production = ScrapedProduction::new(PRODUCTION_TITLE, PRODUCTION_SLUG);
        production.source_url = Some(ZAZ_TOUR_URL.to_string());
        production.description = Some("Zaz World Tour".to_string());
        production.artist_name = Some(ARTIST_NAME.to_string());

        let mut seen = HashSet::new();
        for event in extract_structured_events(&html, EVENT_TYPES) {
            let Some(show) = structured_event_to_show(&event, ARTIST_NAME) else {
                continue;
            };
            if seen.insert((show.url.clone(), show.date)) {
                production.shows.push(show);
            }
        }
        info!("Zaz scraper found {} shows", production.shows.len());

        if !production.shows.is_empty() {
            result.productions.push(production);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::StaticFetchClient;
    use serde_json::json;

    fn page(events: serde_json::Value) -> String {
        format!(
            r#"<html><head><script type="application/ld+json">{}</script></head></html>"#,
            events
        )
    }

    #[tokio::test]
    async fn test_one_production_with_deduped_shows() {
        let event = json!({
            "@type": "MusicEvent",
            "name": "Zaz à Lyon",
            "startDate": "2026-04-11T20:00:00+02:00",
            "location": {"name": "Halle Tony Garnier", "address": {"addressLocality": "Lyon", "addressCountry": "FR"}},
            "offers": {"url": "https://tickets.example/lyon"}
        });
        let undated = json!({"@type": "MusicEvent", "name": "TBA"});
        let body = page(json!([event.clone(), event, undated]));
        let client = StaticFetchClient::new().with_page(ZAZ_TOUR_URL, body);
        let scraper = ZazTourScraper::new(Arc::new(client));

        let result = scraper.scrape(&CancellationToken::new()).await.unwrap();
        assert!(result.errors.is_empty());
        assert_eq!(result.productions.len(), 1);
        let production = &result.productions[0];
        assert_eq!(production.slug, "zaz-tour");
        assert_eq!(production.artist_name.as_deref(), Some("Zaz"));
        assert_eq!(production.shows.len(), 1);
        assert_eq!(
            production.shows[0].venue_name.as_deref(),
            Some("Halle Tony Garnier, Lyon, FR")
        );
        assert_eq!(production.shows[0].date.to_rfc3339(), "2026-04-11T18:00:00+00:00");
    }

    #[tokio::test]
    async fn test_unreachable_page_is_one_error() {
        let scraper = ZazTourScraper::new(Arc::new(StaticFetchClient::new()));
        let result = scraper.scrape(&CancellationToken::new()).await.unwrap();
        assert!(result.productions.is_empty());
        assert_eq!(result.errors, vec!["Failed to fetch Zaz tour page".to_string()]);
    }

    #[tokio::test]
    async fn test_page_without_events_adds_nothing() {
        let client = StaticFetchClient::new().with_page(ZAZ_TOUR_URL, "<html><body>Soon</body></html>");
        let scraper = ZazTourScraper::new(Arc::new(client));
        let result = scraper.scrape(&CancellationToken::new()).await.unwrap();
        assert!(result.productions.is_empty());
        assert!(result.errors.is_empty());
    }
}
