pub mod coeur_de_pirate;
pub mod opera_hu;
pub mod wiener_staatsoper;
pub mod zaz_tour;

pub use coeur_de_pirate::CoeurDePirateScraper;
pub use opera_hu::OperaHuScraper;
pub use wiener_staatsoper::WienerStaatsoperScraper;
pub use zaz_tour::ZazTourScraper;

use crate::config::Config;
use crate::constants::{
    COEUR_DE_PIRATE_SOURCE, OPERA_HU_SOURCE, WIENER_STAATSOPER_SOURCE, ZAZ_TOUR_SOURCE,
};
use crate::error::{Result, ScraperError};
use crate::fetch::FetchClient;
use crate::types::ScrapeResult;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Every supported source. `scrape` only fails on cancellation; everything
/// else ends up in [`ScrapeResult::errors`].
pub enum Scraper {
    OperaHu(OperaHuScraper),
    WienerStaatsoper(WienerStaatsoperScraper),
    ZazTour(ZazTourScraper),
    CoeurDePirate(CoeurDePirateScraper),
}

impl Scraper {
    pub fn source_name(&self) -> &'static str {
        match self {
            Scraper::OperaHu(_) => OPERA_HU_SOURCE,
            Scraper::WienerStaatsoper(_) => WIENER_STAATSOPER_SOURCE,
            Scraper::ZazTour(_) => ZAZ_TOUR_SOURCE,
            Scraper::CoeurDePirate(_) => COEUR_DE_PIRATE_SOURCE,
        }
    }

    pub async fn scrape(&self, cancel: &CancellationToken) -> Result<ScrapeResult> {
        match self {
            Scraper::OperaHu(s) => s.scrape(cancel).await,
            Scraper::WienerStaatsoper(s) => s.scrape(cancel).await,
            Scraper::ZazTour(s) => s.scrape(cancel).await,
            Scraper::CoeurDePirate(s) => s.scrape(cancel).await,
        }
    }

    /// Build the scraper for one source name, enabled or not.
    pub fn from_config(
        source: &str,
        config: &Config,
        client: Arc<dyn FetchClient>,
    ) -> Result<Self> {
        let sources = &config.sources;
        let scraper = match source {
            OPERA_HU_SOURCE => Scraper::OperaHu(OperaHuScraper::new(client, sources.opera_hu.clone())),
            WIENER_STAATSOPER_SOURCE => Scraper::WienerStaatsoper(WienerStaatsoperScraper::new(
                client,
                sources.wiener_staatsoper.clone(),
            )),
            ZAZ_TOUR_SOURCE => Scraper::ZazTour(ZazTourScraper::new(client)),
            COEUR_DE_PIRATE_SOURCE => Scraper::CoeurDePirate(CoeurDePirateScraper::new(client)),
            other => return Err(ScraperError::UnknownSource(other.to_string())),
        };
        Ok(scraper)
    }

    /// Scrapers for every source enabled in `config`, in run order.
    pub fn all_from_config(config: &Config, client: Arc<dyn FetchClient>) -> Vec<Self> {
        let sources = &config.sources;
        let mut scrapers = Vec::new();
        if sources.opera_hu.enabled {
            scrapers.push(Scraper::OperaHu(OperaHuScraper::new(
                client.clone(),
                sources.opera_hu.clone(),
            )));
        }
        if sources.wiener_staatsoper.enabled {
            scrapers.push(Scraper::WienerStaatsoper(WienerStaatsoperScraper::new(
                client.clone(),
                sources.wiener_staatsoper.clone(),
            )));
        }
        if sources.zaz_tour.enabled {
            scrapers.push(Scraper::ZazTour(ZazTourScraper::new(client.clone())));
        }
        if sources.coeur_de_pirate.enabled {
            scrapers.push(Scraper::CoeurDePirate(CoeurDePirateScraper::new(client)));
        }
        scrapers
    }
}

/// Group `items` by slug keeping the order in which each slug first appears,
/// and the order of items inside each group.
pub(crate) fn group_by_slug<T>(items: Vec<T>, slug: impl Fn(&T) -> &str) -> Vec<(String, Vec<T>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<T>)> = Vec::new();
    for item in items {
        let key = slug(&item).to_string();
        match index.get(&key) {
            Some(&i) => groups[i].1.push(item),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![item]));
            }
        }
    }
    groups
}

/// Turn a source-wide failure into the single `Scraper failed` entry.
/// Cancellation is passed through untouched.
pub(crate) fn settle(
    source: &str,
    mut result: ScrapeResult,
    outcome: Result<()>,
) -> Result<ScrapeResult> {
    match outcome {
        Ok(()) => Ok(result),
        Err(e) if e.is_cancelled() => Err(e),
        Err(e) => {
            error!(source = %source, "Scraper failed: {}", e);
            result.errors.push(format!("Scraper failed: {}", e));
            Ok(result)
        }
    }
}

/// Record a per-production failure, or pass cancellation through.
pub(crate) fn record_group_error(result: &mut ScrapeResult, slug: &str, err: ScraperError) -> Result<()> {
    if err.is_cancelled() {
        return Err(err);
    }
    tracing::warn!("Failed to process production {}: {}", slug, err);
    result.errors.push(format!("Failed to process {}: {}", slug, err));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::StaticFetchClient;

    #[test]
    fn test_group_by_slug_keeps_first_seen_order() {
        let items = vec![("tosca", 1), ("aida", 2), ("tosca", 3), ("carmen", 4), ("aida", 5)];
        let groups = group_by_slug(items, |(slug, _)| *slug);
        let summary: Vec<(String, Vec<i32>)> = groups
            .into_iter()
            .map(|(slug, items)| (slug, items.into_iter().map(|(_, n)| n).collect()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("tosca".to_string(), vec![1, 3]),
                ("aida".to_string(), vec![2, 5]),
                ("carmen".to_string(), vec![4]),
            ]
        );
    }

    #[test]
    fn test_settle_records_failure_once() {
        let result = settle("x", ScrapeResult::default(), Err(ScraperError::Parse("boom".into()))).unwrap();
        assert_eq!(result.errors, vec!["Scraper failed: Parse error: boom".to_string()]);
        assert!(settle("x", ScrapeResult::default(), Err(ScraperError::Cancelled))
            .unwrap_err()
            .is_cancelled());
    }

    #[test]
    fn test_all_from_config_honours_enabled() {
        let mut config = Config::default();
        config.sources.wiener_staatsoper.enabled = false;
        let client: Arc<dyn FetchClient> = Arc::new(StaticFetchClient::new());
        let names: Vec<&str> = Scraper::all_from_config(&config, client)
            .iter()
            .map(Scraper::source_name)
            .collect();
        assert_eq!(names, vec![OPERA_HU_SOURCE, ZAZ_TOUR_SOURCE, COEUR_DE_PIRATE_SOURCE]);
    }

    #[test]
    fn test_unknown_source() {
        let client: Arc<dyn FetchClient> = Arc::new(StaticFetchClient::new());
        let err = Scraper::from_config("nowhere.example", &Config::default(), client).err();
        assert!(matches!(err, Some(ScraperError::UnknownSource(_))));
    }
}
