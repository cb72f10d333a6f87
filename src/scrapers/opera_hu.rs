use crate::config::OperaHuConfig;
use crate::constants::{OPERA_HU_BASE_URL, OPERA_HU_SOURCE};
use crate::error::{Result, ScraperError};
use crate::fetch::{fetch_page, polite_delay, FetchClient};
use crate::parser::{parse_active_months, parse_detail, parse_programme, RawEvent, SynopsisFormat};
use crate::scrapers::{group_by_slug, record_group_error, settle};
use crate::types::{ScrapeResult, ScrapedProduction, ScrapedShow};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

const ALL_DATES_PATH: &str = "/en/ajax/event/alldates/";

/// Hungarian State Opera. The `alldates` feed says which months have
/// performances; each month's programme page lists them; each production
/// has a detail page.
pub struct OperaHuScraper {
    client: Arc<dyn FetchClient>,
    config: OperaHuConfig,
}

impl OperaHuScraper {
    pub fn new(client: Arc<dyn FetchClient>, config: OperaHuConfig) -> Self {
        Self { client, config }
    }

    pub fn all_dates_url() -> String {
        format!("{}{}", OPERA_HU_BASE_URL, ALL_DATES_PATH)
    }

    pub fn programme_url(year: i32, month: u32) -> String {
        format!(
            "{}/en/programme/?y={}&m={}&datum=&helyszin=&mufaj=",
            OPERA_HU_BASE_URL, year, month
        )
    }

    pub fn production_url(season: &str, slug: &str) -> String {
        format!("{}/en/programme/{}/{}/", OPERA_HU_BASE_URL, season, slug)
    }

    fn synopsis_format(&self) -> SynopsisFormat {
        if self.config.rich_synopsis {
            SynopsisFormat::Rich
        } else {
            SynopsisFormat::Plain
        }
    }

    #[instrument(skip(self, cancel), fields(source = OPERA_HU_SOURCE))]
    pub async fn scrape(&self, cancel: &CancellationToken) -> Result<ScrapeResult> {
        let mut result = ScrapeResult::default();
        let outcome = self.collect(&mut result, cancel).await;
        let result = settle(OPERA_HU_SOURCE, result, outcome)?;
        info!(
            "Scrape completed: {} productions, {} total shows, {} errors",
            result.productions.len(),
            result.show_count(),
            result.errors.len()
        );
        Ok(result)
    }

    async fn collect(&self, result: &mut ScrapeResult, cancel: &CancellationToken) -> Result<()> {
        let events = self.crawl_programme(cancel).await?;
        info!("Discovered {} events across all months", events.len());

        let groups = group_by_slug(events, |e| e.slug.as_str());
        info!("Found {} unique productions", groups.len());

        for (slug, events) in groups {
            if cancel.is_cancelled() {
                return Err(ScraperError::Cancelled);
            }
            match self.build_production(&slug, events, cancel).await {
                Ok(production) => result.productions.push(production),
                Err(e) => record_group_error(result, &slug, e)?,
            }
        }
        Ok(())
    }

    /// Programme pages for the active months plus configured seed pages,
    /// deduplicated by event link.
    async fn crawl_programme(&self, cancel: &CancellationToken) -> Result<Vec<RawEvent>> {
        let months = self.active_months(cancel).await?;
        info!("alldates feed returned {} active months", months.len());

        let mut urls: Vec<String> = months
            .iter()
            .map(|&(year, month)| Self::programme_url(year, month))
            .collect();
        for seed in &self.config.seed_urls {
            if !urls.contains(seed) {
                urls.push(seed.clone());
            }
        }

        let mut seen = HashSet::new();
        let mut events = Vec::new();
        for url in urls {
            if cancel.is_cancelled() {
                return Err(ScraperError::Cancelled);
            }
            let Some(html) = fetch_page(self.client.as_ref(), &url, cancel).await? else {
                continue;
            };
            let page_events = parse_programme(&html);
            debug!("{}: found {} events", url, page_events.len());
            for event in page_events {
                if seen.insert(event.relative_url.clone()) {
                    events.push(event);
                }
            }
            polite_delay(self.config.delay_ms, cancel).await?;
        }
        Ok(events)
    }

    async fn active_months(&self, cancel: &CancellationToken) -> Result<Vec<(i32, u32)>> {
        let body = fetch_page(self.client.as_ref(), &Self::all_dates_url(), cancel).await?;
        Ok(body.map(|json| parse_active_months(&json)).unwrap_or_default())
    }

    async fn build_production(
        &self,
        slug: &str,
        events: Vec<RawEvent>,
        cancel: &CancellationToken,
    ) -> Result<ScrapedProduction> {
        let first = events
            .first()
            .ok_or_else(|| ScraperError::MissingField(format!("events for {}", slug)))?;
        let production_url = Self::production_url(&first.season, slug);

        let mut production = ScrapedProduction::new(first.title.clone(), slug);
        production.season = Some(first.season.clone());
        production.source_url = Some(production_url.clone());

        if let Some(html) = fetch_page(self.client.as_ref(), &production_url, cancel).await? {
            let detail = parse_detail(&html, self.synopsis_format());
            if let Some(title) = detail.title {
                production.title = title;
            }
            production.subtitle = detail.subtitle;
            production.image_url = detail.image_url;
            production.description = detail.description;
            production.synopsis = detail.synopsis;
            production.guide = detail.guide;
            production.gallery_urls = detail.gallery_urls;
            production.running_time_minutes = detail.running_time_minutes;
            production.category = detail.category;
            production.tags = detail.tags;
        }
        polite_delay(self.config.delay_ms, cancel).await?;

        production.shows = events
            .into_iter()
            .map(|event| ScrapedShow {
                title: production.title.clone(),
                // Budapest wall-clock time, stored as-is
                date: event.date.and_utc(),
                venue_name: Some(event.venue_name),
                url: Some(format!("{}{}", OPERA_HU_BASE_URL, event.relative_url)),
                is_rehearsal: event.is_rehearsal,
            })
            .collect();
        Ok(production)
    }
}
