use crate::error::{Result, ScraperError};
use crate::models::{Production, Show, Venue};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Row counts, for run reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub productions: usize,
    pub venues: usize,
    pub shows: usize,
}

/// Storage trait for persisting productions, venues and shows.
///
/// Every lookup is by natural key. `create_*` assigns the id on the passed
/// entity and fails with [`ScraperError::Constraint`] when the key is taken.
#[async_trait]
pub trait Storage: Send + Sync {
    // Production operations
    async fn get_production(&self, source: &str, slug: &str) -> Result<Option<Production>>;
    async fn create_production(&self, production: &mut Production) -> Result<()>;
    async fn update_production(&self, production: &Production) -> Result<()>;
    async fn list_productions(&self) -> Result<Vec<Production>>;

    // Venue operations
    async fn get_venue_by_name(&self, name: &str) -> Result<Option<Venue>>;
    async fn create_venue(&self, venue: &mut Venue) -> Result<()>;

    // Show operations
    async fn get_show(
        &self,
        production_id: i64,
        venue_id: i64,
        date: DateTime<Utc>,
    ) -> Result<Option<Show>>;
    async fn create_show(&self, show: &mut Show) -> Result<()>;
    async fn update_show(&self, show: &Show) -> Result<()>;
    async fn list_shows(&self, production_id: i64) -> Result<Vec<Show>>;

    async fn counts(&self) -> Result<StoreCounts>;
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    productions: BTreeMap<i64, Production>,
    venues: BTreeMap<i64, Venue>,
    shows: BTreeMap<i64, Show>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory storage for dry runs and tests. Ids are assigned from one
/// counter shared by all tables.
#[derive(Default)]
pub struct InMemoryStorage {
    tables: Mutex<Tables>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|e| ScraperError::Storage {
            message: format!("storage lock poisoned: {}", e),
        })
    }
}

fn missing_id(entity: &str) -> ScraperError {
    ScraperError::Storage {
        message: format!("Cannot update {} without ID", entity),
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get_production(&self, source: &str, slug: &str) -> Result<Option<Production>> {
        let tables = self.lock()?;
        Ok(tables
            .productions
            .values()
            .find(|p| p.source == source && p.slug == slug)
            .cloned())
    }

    async fn create_production(&self, production: &mut Production) -> Result<()> {
        let mut tables = self.lock()?;
        if tables
            .productions
            .values()
            .any(|p| p.source == production.source && p.slug == production.slug)
        {
            return Err(ScraperError::Constraint(format!(
                "production ({}, {}) already exists",
                production.source, production.slug
            )));
        }
        let id = tables.allocate_id();
        production.id = Some(id);
        tables.productions.insert(id, production.clone());
        debug!("Created production: {} with id {}", production.slug, id);
        Ok(())
    }

    async fn update_production(&self, production: &Production) -> Result<()> {
        let id = production.id.ok_or_else(|| missing_id("production"))?;
        let mut tables = self.lock()?;
        if tables
            .productions
            .values()
            .any(|p| p.id != Some(id) && p.source == production.source && p.slug == production.slug)
        {
            return Err(ScraperError::Constraint(format!(
                "production ({}, {}) already exists",
                production.source, production.slug
            )));
        }
        tables.productions.insert(id, production.clone());
        debug!("Updated production: {} with id {}", production.slug, id);
        Ok(())
    }

    async fn list_productions(&self) -> Result<Vec<Production>> {
        Ok(self.lock()?.productions.values().cloned().collect())
    }

    async fn get_venue_by_name(&self, name: &str) -> Result<Option<Venue>> {
        let tables = self.lock()?;
        Ok(tables.venues.values().find(|v| v.name == name).cloned())
    }

    async fn create_venue(&self, venue: &mut Venue) -> Result<()> {
        let mut tables = self.lock()?;
        if tables.venues.values().any(|v| v.name == venue.name) {
            return Err(ScraperError::Constraint(format!(
                "venue {:?} already exists",
                venue.name
            )));
        }
        let id = tables.allocate_id();
        venue.id = Some(id);
        tables.venues.insert(id, venue.clone());
        debug!("Created venue: {} with id {}", venue.name, id);
        Ok(())
    }

    async fn get_show(
        &self,
        production_id: i64,
        venue_id: i64,
        date: DateTime<Utc>,
    ) -> Result<Option<Show>> {
        let tables = self.lock()?;
        Ok(tables
            .shows
            .values()
            .find(|s| s.production_id == production_id && s.venue_id == venue_id && s.date == date)
            .cloned())
    }

    async fn create_show(&self, show: &mut Show) -> Result<()> {
        let mut tables = self.lock()?;
        if !tables.productions.contains_key(&show.production_id) {
            return Err(ScraperError::Constraint(format!(
                "show references unknown production {}",
                show.production_id
            )));
        }
        if !tables.venues.contains_key(&show.venue_id) {
            return Err(ScraperError::Constraint(format!(
                "show references unknown venue {}",
                show.venue_id
            )));
        }
        if tables.shows.values().any(|s| {
            s.production_id == show.production_id && s.venue_id == show.venue_id && s.date == show.date
        }) {
            return Err(ScraperError::Constraint(format!(
                "show ({}, {}, {}) already exists",
                show.production_id, show.venue_id, show.date
            )));
        }
        let id = tables.allocate_id();
        show.id = Some(id);
        tables.shows.insert(id, show.clone());
        debug!("Created show: {} with id {}", show.title, id);
        Ok(())
    }

    async fn update_show(&self, show: &Show) -> Result<()> {
        let id = show.id.ok_or_else(|| missing_id("show"))?;
        let mut tables = self.lock()?;
        tables.shows.insert(id, show.clone());
        debug!("Updated show: {} with id {}", show.title, id);
        Ok(())
    }

    async fn list_shows(&self, production_id: i64) -> Result<Vec<Show>> {
        let tables = self.lock()?;
        let mut shows: Vec<Show> = tables
            .shows
            .values()
            .filter(|s| s.production_id == production_id)
            .cloned()
            .collect();
        shows.sort_by_key(|s| s.date);
        Ok(shows)
    }

    async fn counts(&self) -> Result<StoreCounts> {
        let tables = self.lock()?;
        Ok(StoreCounts {
            productions: tables.productions.len(),
            venues: tables.venues.len(),
            shows: tables.shows.len(),
        })
    }
}
