use crate::types::{ScrapedProduction, ScrapedShow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A staged work (opera, ballet, tour). Identity is `(source, slug)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Production {
    pub id: Option<i64>,
    pub source: String,
    pub slug: String,
    pub title: String,
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
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Production {
    pub fn from_scraped(source: &str, scraped: &ScrapedProduction, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            source: source.to_string(),
            slug: scraped.slug.clone(),
            title: scraped.title.clone(),
            season: scraped.season.clone(),
            subtitle: scraped.subtitle.clone(),
            description: scraped.description.clone(),
            synopsis: scraped.synopsis.clone(),
            guide: scraped.guide.clone(),
            image_url: scraped.image_url.clone(),
            gallery_urls: scraped.gallery_urls.clone(),
            category: scraped.category.clone(),
            tags: scraped.tags.clone(),
            running_time_minutes: scraped.running_time_minutes,
            source_url: scraped.source_url.clone(),
            artist_name: scraped.artist_name.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold a fresh sighting into the stored row. The title always follows
    /// the source; optional fields only change when the sighting has a value,
    /// lists only when the sighting's list is non-empty.
    pub fn merge_scraped(&mut self, scraped: &ScrapedProduction, now: DateTime<Utc>) {
        fn take(target: &mut Option<String>, incoming: &Option<String>) {
            if incoming.is_some() {
                target.clone_from(incoming);
            }
        }

        self.title = scraped.title.clone();
        take(&mut self.season, &scraped.season);
        take(&mut self.subtitle, &scraped.subtitle);
        take(&mut self.description, &scraped.description);
        take(&mut self.synopsis, &scraped.synopsis);
        take(&mut self.guide, &scraped.guide);
        take(&mut self.image_url, &scraped.image_url);
        take(&mut self.category, &scraped.category);
        take(&mut self.source_url, &scraped.source_url);
        take(&mut self.artist_name, &scraped.artist_name);
        if scraped.running_time_minutes.is_some() {
            self.running_time_minutes = scraped.running_time_minutes;
        }
        if !scraped.gallery_urls.is_empty() {
            self.gallery_urls = scraped.gallery_urls.clone();
        }
        if !scraped.tags.is_empty() {
            self.tags = scraped.tags.clone();
        }
        self.updated_at = now;
    }
}

/// Identity is the exact display name. Location columns are filled by
/// enrichment outside the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub id: Option<i64>,
    pub name: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Venue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            city: None,
            country: None,
            latitude: None,
            longitude: None,
        }
    }
}

/// One performance. Natural key is `(production_id, venue_id, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    pub id: Option<i64>,
    pub production_id: i64,
    pub venue_id: i64,
    pub title: String,
    pub date: DateTime<Utc>,
    pub url: Option<String>,
    pub is_rehearsal: bool,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Show {
    pub fn from_scraped(
        source: &str,
        production_id: i64,
        venue_id: i64,
        scraped: &ScrapedShow,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            production_id,
            venue_id,
            title: scraped.title.clone(),
            date: scraped.date,
            url: scraped.url.clone(),
            is_rehearsal: scraped.is_rehearsal,
            source: source.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}
