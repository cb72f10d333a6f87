use crate::constants::{COEUR_DE_PIRATE_SOURCE, COEUR_DE_PIRATE_TOUR_URL};
use crate::error::Result;
use crate::fetch::{fetch_page, FetchClient};
use crate::parser::text::non_blank;
use crate::parser::tour_dates::{infer_year, parse_tour_rows};
use crate::scrapers::settle;
use crate::types::{ScrapeResult, ScrapedProduction, ScrapedShow};
use chrono::{NaiveDate, NaiveTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

const ARTIST_NAME: &str = "Cœur de Pirate";
const PRODUCTION_TITLE: &str = "Cœur de Pirate - Cavale Tour";
const PRODUCTION_SLUG: &str = "coeur-de-pirate-cavale-tour";
/// Rows list no start time.
const DEFAULT_SHOW_HOUR: u32 = 20;

pub struct CoeurDePirateScraper {
    client: Arc<dyn FetchClient>,
    /// Date the year-less rows are placed against; today when unset
    reference_date: Option<NaiveDate>,
}

impl CoeurDePirateScraper {
    pub fn new(client: Arc<dyn FetchClient>) -> Self {
        Self {
            client,
            reference_date: None,
        }
    }

    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    #[instrument(skip(self, cancel), fields(source = COEUR_DE_PIRATE_SOURCE))]
    pub async fn scrape(&self, cancel: &CancellationToken) -> Result<ScrapeResult> {
        let mut result = ScrapeResult::default();
        let outcome = self.collect(&mut result, cancel).await;
        settle(COEUR_DE_PIRATE_SOURCE, result, outcome)
    }

    async fn collect(&self, result: &mut ScrapeResult, cancel: &CancellationToken) -> Result<()> {
        let html = match fetch_page(self.client.as_ref(), COEUR_DE_PIRATE_TOUR_URL, cancel).await? {
            Some(html) if !html.trim().is_empty() => html,
            _ => {
                result.errors.push("Failed to fetch tour page".to_string());
                return Ok(());
            }
        };

        let reference = self
            .reference_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let show_time = NaiveTime::from_hms_opt(DEFAULT_SHOW_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);

        let mut production = ScrapedProduction::new(PRODUCTION_TITLE, PRODUCTION_SLUG);
        production.source_url = Some(COEUR_DE_PIRATE_TOUR_URL.to_string());
        production.description = Some("Cœur de Pirate Cavale Tour".to_string());
        production.artist_name = Some(ARTIST_NAME.to_string());

        let mut seen = HashSet::new();
        for row in parse_tour_rows(&html) {
            let Some(date) = infer_year(row.month, row.day, reference) else {
                debug!("Skipping impossible tour date {}/{}", row.day, row.month);
                continue;
            };
            let date = date.and_time(show_time).and_utc();
            if !seen.insert((row.ticket_url.clone(), date)) {
                continue;
            }
            production.shows.push(ScrapedShow {
                title: PRODUCTION_TITLE.to_string(),
                date,
                venue_name: non_blank(row.venue),
                url: row.ticket_url,
                is_rehearsal: false,
            });
        }
        info!("Cœur de Pirate scraper found {} shows", production.shows.len());

        if !production.shows.is_empty() {
            result.productions.push(production);
        }
        Ok(())
    }
}
