use crate::constants::{source_alias_to_name, UNKNOWN_VENUE};
use crate::error::{Result, ScraperError};
use crate::metrics::PipelineMetrics;
use crate::models::{Production, Show, Venue};
use crate::scrapers::Scraper;
use crate::storage::Storage;
use crate::types::{ScrapeResult, ScrapedProduction, ScrapedShow};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// What one scraper run produced and stored
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub source: String,
    pub productions: usize,
    pub shows: usize,
    pub new: usize,
    pub updated: usize,
    pub errors: Vec<String>,
}

impl RunSummary {
    fn from_result(source: &str, result: &ScrapeResult) -> Self {
        Self {
            source: source.to_string(),
            productions: result.productions.len(),
            shows: result.show_count(),
            new: result.new_count,
            updated: result.updated_count,
            errors: result.errors.clone(),
        }
    }
}

/// Runs scrapers one after another and upserts what they return.
pub struct Orchestrator {
    storage: Arc<dyn Storage>,
    scrapers: Vec<Scraper>,
}

impl Orchestrator {
    pub fn new(storage: Arc<dyn Storage>, scrapers: Vec<Scraper>) -> Self {
        Self { storage, scrapers }
    }

    pub fn storage(&self) -> Arc<dyn Storage> {
        self.storage.clone()
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.scrapers.iter().map(Scraper::source_name).collect()
    }

    /// Run every configured scraper in order. One source failing does not
    /// stop the others; cancellation stops everything.
    #[instrument(skip(self, cancel))]
    pub async fn run_all(&self, cancel: &CancellationToken) -> Result<Vec<RunSummary>> {
        let mut summaries = Vec::with_capacity(self.scrapers.len());
        for scraper in &self.scrapers {
            if cancel.is_cancelled() {
                return Err(ScraperError::Cancelled);
            }
            summaries.push(self.run_scraper(scraper, cancel).await?);
        }
        Ok(summaries)
    }

    /// Run the scraper for one source, by name or CLI alias.
    #[instrument(skip(self, cancel))]
    pub async fn run_named(&self, source: &str, cancel: &CancellationToken) -> Result<RunSummary> {
        let name = source_alias_to_name(source);
        let scraper = self
            .scrapers
            .iter()
            .find(|s| s.source_name() == name)
            .ok_or(ScraperError::UnknownSource(name))?;
        self.run_scraper(scraper, cancel).await
    }

    async fn run_scraper(&self, scraper: &Scraper, cancel: &CancellationToken) -> Result<RunSummary> {
        let source = scraper.source_name();
        let started = Instant::now();
        info!(source = %source, "Starting scraper");

        let mut result = match scraper.scrape(cancel).await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                error!(source = %source, "Scraper {} failed: {}", source, e);
                ScrapeResult {
                    errors: vec![format!("Scraper failed: {}", e)],
                    ..Default::default()
                }
            }
        };

        self.persist_result(source, &mut result, cancel).await?;

        let summary = RunSummary::from_result(source, &result);
        PipelineMetrics::record_run(source, started.elapsed().as_secs_f64());
        if !summary.errors.is_empty() {
            PipelineMetrics::record_scrape_errors(source, summary.errors.len());
            for err in &summary.errors {
                warn!(source = %source, "{}", err);
            }
        }
        info!(
            source = %source,
            "Scraper finished: {} productions ({} new, {} updated), {} shows, {} errors",
            summary.productions,
            summary.new,
            summary.updated,
            summary.shows,
            summary.errors.len()
        );
        Ok(summary)
    }

    /// Upsert every production of `result`, filling in its counters. A
    /// production that fails to persist becomes an entry in `result.errors`.
    pub async fn persist_result(
        &self,
        source: &str,
        result: &mut ScrapeResult,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut failures = Vec::new();
        for scraped in &result.productions {
            if cancel.is_cancelled() {
                return Err(ScraperError::Cancelled);
            }
            match self.persist_production(source, scraped).await {
                Ok(true) => {
                    result.new_count += 1;
                    PipelineMetrics::record_production_new(source);
                }
                Ok(false) => {
                    result.updated_count += 1;
                    PipelineMetrics::record_production_updated(source);
                }
                Err(e) => {
                    warn!(source = %source, "Failed to persist production {}: {}", scraped.slug, e);
                    PipelineMetrics::record_persist_error(source);
                    failures.push(format!("Failed to persist {}: {}", scraped.slug, e));
                }
            }
        }
        result.errors.extend(failures);
        Ok(())
    }

    /// Returns whether the production row was created.
    async fn persist_production(&self, source: &str, scraped: &ScrapedProduction) -> Result<bool> {
        let now = Utc::now();
        let (production_id, created) = self.upsert_production(source, scraped, now).await?;
        for show in &scraped.shows {
            self.upsert_show(source, production_id, show, now).await?;
        }
        PipelineMetrics::record_shows(source, scraped.shows.len());
        Ok(created)
    }

    async fn upsert_production(
        &self,
        source: &str,
        scraped: &ScrapedProduction,
        now: DateTime<Utc>,
    ) -> Result<(i64, bool)> {
        if let Some(mut existing) = self.storage.get_production(source, &scraped.slug).await? {
            let id = existing
                .id
                .ok_or_else(|| ScraperError::MissingField("production id".to_string()))?;
            existing.merge_scraped(scraped, now);
            self.storage.update_production(&existing).await?;
            debug!("Updated production {} ({})", scraped.slug, id);
            return Ok((id, false));
        }

        let mut production = Production::from_scraped(source, scraped, now);
        self.storage.create_production(&mut production).await?;
        let id = production
            .id
            .ok_or_else(|| ScraperError::MissingField("production id".to_string()))?;
        info!("Created new production: {} ({})", production.title, id);
        Ok((id, true))
    }

    /// Exact-name lookup; a show without a venue goes to the "Unknown" venue.
    async fn get_or_create_venue(&self, name: Option<&str>) -> Result<i64> {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_VENUE);
        if let Some(venue) = self.storage.get_venue_by_name(name).await? {
            return venue
                .id
                .ok_or_else(|| ScraperError::MissingField("venue id".to_string()));
        }

        let mut venue = Venue::new(name);
        self.storage.create_venue(&mut venue).await?;
        let id = venue
            .id
            .ok_or_else(|| ScraperError::MissingField("venue id".to_string()))?;
        info!("Created new venue: {} ({})", venue.name, id);
        Ok(id)
    }

    async fn upsert_show(
        &self,
        source: &str,
        production_id: i64,
        scraped: &ScrapedShow,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let venue_id = self.get_or_create_venue(scraped.venue_name.as_deref()).await?;

        if let Some(mut existing) = self
            .storage
            .get_show(production_id, venue_id, scraped.date)
            .await?
        {
            existing.title = scraped.title.clone();
            existing.url = scraped.url.clone();
            existing.is_rehearsal = scraped.is_rehearsal;
            existing.updated_at = now;
            return self.storage.update_show(&existing).await;
        }

        let mut show = Show::from_scraped(source, production_id, venue_id, scraped, now);
        self.storage.create_show(&mut show).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use chrono::TimeZone;

    fn production(slug: &str, venue: Option<&str>) -> ScrapedProduction {
        let mut p = ScrapedProduction::new(format!("Title {}", slug), slug);
        p.shows.push(ScrapedShow {
            title: format!("Title {}", slug),
            date: Utc.with_ymd_and_hms(2026, 3, 1, 19, 0, 0).unwrap(),
            venue_name: venue.map(str::to_string),
            url: None,
            is_rehearsal: false,
        });
        p
    }

    #[tokio::test]
    async fn test_persist_counts_new_then_updated() {
        let storage = Arc::new(InMemoryStorage::new());
        let orchestrator = Orchestrator::new(storage.clone(), Vec::new());
        let cancel = CancellationToken::new();

        let mut first = ScrapeResult {
            productions: vec![production("aida", Some("Opera House")), production("tosca", None)],
            ..Default::default()
        };
        orchestrator.persist_result("opera.hu", &mut first, &cancel).await.unwrap();
        assert_eq!((first.new_count, first.updated_count), (2, 0));

        let mut second = ScrapeResult {
            productions: vec![production("aida", Some("Opera House")), production("tosca", None)],
            ..Default::default()
        };
        orchestrator.persist_result("opera.hu", &mut second, &cancel).await.unwrap();
        assert_eq!((second.new_count, second.updated_count), (0, 2));

        let counts = storage.counts().await.unwrap();
        assert_eq!((counts.productions, counts.venues, counts.shows), (2, 2, 2));
        assert!(storage.get_venue_by_name(UNKNOWN_VENUE).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sparse_update_keeps_existing_fields() {
        let storage = Arc::new(InMemoryStorage::new());
        let orchestrator = Orchestrator::new(storage.clone(), Vec::new());
        let cancel = CancellationToken::new();

        let mut rich = production("aida", None);
        rich.description = Some("Verdi".into());
        rich.tags = vec!["opera".into()];
        let mut result = ScrapeResult {
            productions: vec![rich],
            ..Default::default()
        };
        orchestrator.persist_result("opera.hu", &mut result, &cancel).await.unwrap();

        let mut sparse = production("aida", None);
        sparse.title = "Aida (revival)".into();
        let mut result = ScrapeResult {
            productions: vec![sparse],
            ..Default::default()
        };
        orchestrator.persist_result("opera.hu", &mut result, &cancel).await.unwrap();

        let stored = storage.get_production("opera.hu", "aida").await.unwrap().unwrap();
        assert_eq!(stored.title, "Aida (revival)");
        assert_eq!(stored.description.as_deref(), Some("Verdi"));
        assert_eq!(stored.tags, vec!["opera".to_string()]);
    }

    #[tokio::test]
    async fn test_show_fields_follow_latest_sighting() {
        let storage = Arc::new(InMemoryStorage::new());
        let orchestrator = Orchestrator::new(storage.clone(), Vec::new());
        let cancel = CancellationToken::new();

        let mut result = ScrapeResult {
            productions: vec![production("aida", Some("Opera House"))],
            ..Default::default()
        };
        orchestrator.persist_result("opera.hu", &mut result, &cancel).await.unwrap();

        let mut changed = production("aida", Some("Opera House"));
        changed.shows[0].url = Some("https://tickets/aida".into());
        changed.shows[0].is_rehearsal = true;
        let mut result = ScrapeResult {
            productions: vec![changed],
            ..Default::default()
        };
        orchestrator.persist_result("opera.hu", &mut result, &cancel).await.unwrap();

        let pid = storage.get_production("opera.hu", "aida").await.unwrap().unwrap().id.unwrap();
        let shows = storage.list_shows(pid).await.unwrap();
        assert_eq!(shows.len(), 1);
        assert_eq!(shows[0].url.as_deref(), Some("https://tickets/aida"));
        assert!(shows[0].is_rehearsal);
        assert_eq!(shows[0].source, "opera.hu");
    }

    #[tokio::test]
    async fn test_run_named_unknown_source() {
        let orchestrator = Orchestrator::new(Arc::new(InMemoryStorage::new()), Vec::new());
        let err = orchestrator
            .run_named("nowhere", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::UnknownSource(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_persisting() {
        let orchestrator = Orchestrator::new(Arc::new(InMemoryStorage::new()), Vec::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut result = ScrapeResult {
            productions: vec![production("aida", None)],
            ..Default::default()
        };
        let err = orchestrator
            .persist_result("opera.hu", &mut result, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
