use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One performance as normalized by a source scraper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedShow {
    pub title: String,
    pub date: DateTime<Utc>,
    pub venue_name: Option<String>,
    /// Ticket or event page on the source site
    pub url: Option<String>,
    pub is_rehearsal: bool,
}

/// A production and its shows as normalized by a source scraper.
///
/// Identity for persistence is `(source, slug)`; `season` is descriptive only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapedProduction {
    pub title: String,
    pub slug: String,
    pub season: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub synopsis: Option<String>,
    pub guide: Option<String>,
    pub image_url: Option<String>,
    pub gallery_urls: Vec<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub running_time_minutes: Option<u32>,
    pub source_url: Option<String>,
    pub artist_name: Option<String>,
    pub shows: Vec<ScrapedShow>,
}

impl ScrapedProduction {
    pub fn new(title: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            slug: slug.into(),
            ..Default::default()
        }
    }
}

/// Outcome of one scrape of one source
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScrapeResult {
    pub productions: Vec<ScrapedProduction>,
    pub new_count: usize,
    pub updated_count: usize,
    pub errors: Vec<String>,
}

impl ScrapeResult {
    pub fn show_count(&self) -> usize {
        self.productions.iter().map(|p| p.shows.len()).sum()
    }
}
