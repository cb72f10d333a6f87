use crate::config::WienerStaatsoperConfig;
use crate::constants::{WIENER_STAATSOPER_BASE_URL, WIENER_STAATSOPER_SOURCE, WIENER_STAATSOPER_VENUE};
use crate::error::{Result, ScraperError};
use crate::fetch::{fetch_page, polite_delay, FetchClient};
use crate::parser::calendar::{extract_event_urls, extract_slug, parse_production_details, parse_show_date};
use crate::scrapers::{group_by_slug, record_group_error, settle};
use crate::types::{ScrapeResult, ScrapedProduction, ScrapedShow};
use chrono::{Datelike, NaiveDate, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Vienna State Opera. Calendar month pages link one detail page per
/// performance: `/en/calendar/detail/{slug}/{yyyy-mm-dd}/`.
pub struct WienerStaatsoperScraper {
    client: Arc<dyn FetchClient>,
    config: WienerStaatsoperConfig,
    /// First calendar month; the current month when unset
    start_month: Option<(i32, u32)>,
}

impl WienerStaatsoperScraper {
    pub fn new(client: Arc<dyn FetchClient>, config: WienerStaatsoperConfig) -> Self {
        Self {
            client,
            config,
            start_month: None,
        }
    }

    pub fn starting_at(mut self, year: i32, month: u32) -> Self {
        self.start_month = Some((year, month));
        self
    }

    /// `/en/calendar/2026/february/`
    pub fn calendar_url(year: i32, month: u32) -> Option<String> {
        let name = NaiveDate::from_ymd_opt(year, month, 1)?
            .format("%B")
            .to_string()
            .to_lowercase();
        Some(format!("{}/en/calendar/{}/{}/", WIENER_STAATSOPER_BASE_URL, year, name))
    }

    /// The configured number of months starting at the start month.
    pub fn months(&self) -> Vec<(i32, u32)> {
        let (year, month) = self.start_month.unwrap_or_else(|| {
            let today = Utc::now().date_naive();
            (today.year(), today.month())
        });
        let first = year * 12 + (month as i32 - 1);
        (0..self.config.months_ahead as i32)
            .map(|offset| {
                let index = first + offset;
                (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
            })
            .collect()
    }

    #[instrument(skip(self, cancel), fields(source = WIENER_STAATSOPER_SOURCE))]
    pub async fn scrape(&self, cancel: &CancellationToken) -> Result<ScrapeResult> {
        let mut result = ScrapeResult::default();
        let outcome = self.collect(&mut result, cancel).await;
        let result = settle(WIENER_STAATSOPER_SOURCE, result, outcome)?;
        info!(
            "Scrape completed: {} productions, {} total shows, {} errors",
            result.productions.len(),
            result.show_count(),
            result.errors.len()
        );
        Ok(result)
    }

    async fn collect(&self, result: &mut ScrapeResult, cancel: &CancellationToken) -> Result<()> {
        let mut event_urls: Vec<String> = Vec::new();
        for (year, month) in self.months() {
            if cancel.is_cancelled() {
                return Err(ScraperError::Cancelled);
            }
            let Some(url) = Self::calendar_url(year, month) else { continue };
            info!("Scraping calendar: {}", url);
            if let Some(html) = fetch_page(self.client.as_ref(), &url, cancel).await? {
                let urls = extract_event_urls(&html, WIENER_STAATSOPER_BASE_URL);
                debug!("Found {} events in {}-{:02}", urls.len(), year, month);
                for url in urls {
                    if !event_urls.contains(&url) {
                        event_urls.push(url);
                    }
                }
            }
            polite_delay(self.config.delay_ms, cancel).await?;
        }

        let slugged: Vec<(String, String)> = event_urls
            .into_iter()
            .filter_map(|url| extract_slug(&url).map(|slug| (slug, url)))
            .collect();
        let groups = group_by_slug(slugged, |(slug, _)| slug.as_str());
        info!("Found {} unique productions", groups.len());

        for (slug, entries) in groups {
            if cancel.is_cancelled() {
                return Err(ScraperError::Cancelled);
            }
            let urls: Vec<String> = entries.into_iter().map(|(_, url)| url).collect();
            match self.build_production(&slug, &urls, cancel).await {
                Ok(Some(production)) => result.productions.push(production),
                Ok(None) => debug!("No detail page reachable for {}", slug),
                Err(e) => record_group_error(result, &slug, e)?,
            }
        }
        Ok(())
    }

    /// Production fields come from the first reachable detail page; every
    /// page contributes its show.
    async fn build_production(
        &self,
        slug: &str,
        urls: &[String],
        cancel: &CancellationToken,
    ) -> Result<Option<ScrapedProduction>> {
        let mut production: Option<ScrapedProduction> = None;
        for url in urls {
            let Some(html) = fetch_page(self.client.as_ref(), url, cancel).await? else {
                continue;
            };
            let current = production.get_or_insert_with(|| parse_production_details(&html, slug, url));
            if let Some(date) = parse_show_date(&html, url)? {
                current.shows.push(ScrapedShow {
                    title: current.title.clone(),
                    date,
                    venue_name: Some(WIENER_STAATSOPER_VENUE.to_string()),
                    url: Some(url.clone()),
                    is_rehearsal: false,
                });
            }
            polite_delay(self.config.delay_ms, cancel).await?;
        }
        Ok(production)
    }
}
