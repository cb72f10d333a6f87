use crate::error::{Result, ScraperError};
use crate::models::{Production, Show, Venue};
use crate::reconcile::{reconcile_production_keys, ReconcileReport};
use crate::storage::{Storage, StoreCounts};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS productions (
        id                   INTEGER PRIMARY KEY AUTOINCREMENT,
        source               TEXT NOT NULL,
        slug                 TEXT NOT NULL,
        title                TEXT NOT NULL,
        season               TEXT,
        subtitle             TEXT,
        description          TEXT,
        synopsis             TEXT,
        guide                TEXT,
        image_url            TEXT,
        gallery_urls         TEXT NOT NULL DEFAULT '[]',
        category             TEXT,
        tags                 TEXT NOT NULL DEFAULT '[]',
        running_time_minutes INTEGER,
        source_url           TEXT,
        artist_name          TEXT,
        created_at           TEXT NOT NULL,
        updated_at           TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS venues (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        name      TEXT NOT NULL UNIQUE,
        city      TEXT,
        country   TEXT,
        latitude  REAL,
        longitude REAL
    );
    CREATE TABLE IF NOT EXISTS shows (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        production_id INTEGER NOT NULL REFERENCES productions (id),
        venue_id      INTEGER NOT NULL REFERENCES venues (id),
        title         TEXT NOT NULL,
        date          TEXT NOT NULL,
        url           TEXT,
        is_rehearsal  INTEGER NOT NULL DEFAULT 0,
        source        TEXT NOT NULL DEFAULT '',
        created_at    TEXT NOT NULL,
        updated_at    TEXT NOT NULL,
        UNIQUE (production_id, venue_id, date)
    );
    CREATE TABLE IF NOT EXISTS user_activities (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id       TEXT NOT NULL,
        production_id INTEGER NOT NULL REFERENCES productions (id),
        show_id       INTEGER REFERENCES shows (id),
        status        TEXT NOT NULL,
        created_at    TEXT NOT NULL,
        UNIQUE (user_id, production_id)
    );
"#;

const PRODUCTION_COLUMNS: &str = "id, source, slug, title, season, subtitle, description, synopsis, guide, \
     image_url, gallery_urls, category, tags, running_time_minutes, source_url, artist_name, \
     created_at, updated_at";

const SHOW_COLUMNS: &str =
    "id, production_id, venue_id, title, date, url, is_rehearsal, source, created_at, updated_at";

/// SQLite-backed store. Opening a database creates missing tables and runs
/// the production key reconciliation.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    opened_with: ReconcileReport,
}

impl SqliteStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        info!("Opened SQLite store at {}", path.display());
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        let opened_with = reconcile_production_keys(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            opened_with,
        })
    }

    /// What the reconciliation run while opening changed
    pub fn opened_with(&self) -> &ReconcileReport {
        &self.opened_with
    }

    /// Run the key reconciliation again; a no-op on a reconciled database.
    pub fn reconcile(&self) -> Result<ReconcileReport> {
        let mut conn = self.lock()?;
        reconcile_production_keys(&mut conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| ScraperError::Storage {
            message: format!("connection lock poisoned: {}", e),
        })
    }
}

fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn ts_at(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn list_at(row: &Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(raw) if !raw.trim().is_empty() => {
            serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
        }
        _ => Ok(Vec::new()),
    }
}

fn list_json(items: &[String]) -> Result<String> {
    Ok(serde_json::to_string(items)?)
}

/// `season` is written as an empty string when absent: older databases
/// declare the column `NOT NULL`.
fn production_from_row(row: &Row) -> rusqlite::Result<Production> {
    Ok(Production {
        id: Some(row.get(0)?),
        source: row.get(1)?,
        slug: row.get(2)?,
        title: row.get(3)?,
        season: row.get::<_, Option<String>>(4)?.filter(|s| !s.is_empty()),
        subtitle: row.get(5)?,
        description: row.get(6)?,
        synopsis: row.get(7)?,
        guide: row.get(8)?,
        image_url: row.get(9)?,
        gallery_urls: list_at(row, 10)?,
        category: row.get(11)?,
        tags: list_at(row, 12)?,
        running_time_minutes: row.get(13)?,
        source_url: row.get(14)?,
        artist_name: row.get(15)?,
        created_at: ts_at(row, 16)?,
        updated_at: ts_at(row, 17)?,
    })
}

fn venue_from_row(row: &Row) -> rusqlite::Result<Venue> {
    Ok(Venue {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        city: row.get(2)?,
        country: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
    })
}

fn show_from_row(row: &Row) -> rusqlite::Result<Show> {
    Ok(Show {
        id: Some(row.get(0)?),
        production_id: row.get(1)?,
        venue_id: row.get(2)?,
        title: row.get(3)?,
        date: ts_at(row, 4)?,
        url: row.get(5)?,
        is_rehearsal: row.get(6)?,
        source: row.get(7)?,
        created_at: ts_at(row, 8)?,
        updated_at: ts_at(row, 9)?,
    })
}

/// Unique and foreign-key failures become [`ScraperError::Constraint`].
fn storage_error(err: rusqlite::Error) -> ScraperError {
    if let rusqlite::Error::SqliteFailure(code, message) = &err {
        if code.code == ErrorCode::ConstraintViolation {
            return ScraperError::Constraint(message.clone().unwrap_or_else(|| code.to_string()));
        }
    }
    ScraperError::Sqlite(err)
}

fn missing_id(entity: &str) -> ScraperError {
    ScraperError::Storage {
        message: format!("Cannot update {} without ID", entity),
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn get_production(&self, source: &str, slug: &str) -> Result<Option<Production>> {
        let conn = self.lock()?;
        let production = conn
            .query_row(
                &format!(
                    "SELECT {} FROM productions WHERE source = ?1 AND slug = ?2",
                    PRODUCTION_COLUMNS
                ),
                params![source, slug],
                production_from_row,
            )
            .optional()?;
        Ok(production)
    }

    async fn create_production(&self, production: &mut Production) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO productions (source, slug, title, season, subtitle, description, synopsis, guide,
                 image_url, gallery_urls, category, tags, running_time_minutes, source_url, artist_name,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                production.source,
                production.slug,
                production.title,
                production.season.as_deref().unwrap_or(""),
                production.subtitle,
                production.description,
                production.synopsis,
                production.guide,
                production.image_url,
                list_json(&production.gallery_urls)?,
                production.category,
                list_json(&production.tags)?,
                production.running_time_minutes,
                production.source_url,
                production.artist_name,
                fmt_ts(&production.created_at),
                fmt_ts(&production.updated_at),
            ],
        )
        .map_err(storage_error)?;
        let id = conn.last_insert_rowid();
        production.id = Some(id);
        debug!("Created production: {} with id {}", production.slug, id);
        Ok(())
    }

    async fn update_production(&self, production: &Production) -> Result<()> {
        let id = production.id.ok_or_else(|| missing_id("production"))?;
        let conn = self.lock()?;
        conn.execute(
            "UPDATE productions SET source = ?2, slug = ?3, title = ?4, season = ?5, subtitle = ?6,
                 description = ?7, synopsis = ?8, guide = ?9, image_url = ?10, gallery_urls = ?11,
                 category = ?12, tags = ?13, running_time_minutes = ?14, source_url = ?15,
                 artist_name = ?16, updated_at = ?17
             WHERE id = ?1",
            params![
                id,
                production.source,
                production.slug,
                production.title,
                production.season.as_deref().unwrap_or(""),
                production.subtitle,
                production.description,
                production.synopsis,
                production.guide,
                production.image_url,
                list_json(&production.gallery_urls)?,
                production.category,
                list_json(&production.tags)?,
                production.running_time_minutes,
                production.source_url,
                production.artist_name,
                fmt_ts(&production.updated_at),
            ],
        )
        .map_err(storage_error)?;
        debug!("Updated production: {} with id {}", production.slug, id);
        Ok(())
    }

    async fn list_productions(&self) -> Result<Vec<Production>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM productions ORDER BY id",
            PRODUCTION_COLUMNS
        ))?;
        let rows = stmt.query_map([], production_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn get_venue_by_name(&self, name: &str) -> Result<Option<Venue>> {
        let conn = self.lock()?;
        let venue = conn
            .query_row(
                "SELECT id, name, city, country, latitude, longitude FROM venues WHERE name = ?1",
                params![name],
                venue_from_row,
            )
            .optional()?;
        Ok(venue)
    }

    async fn create_venue(&self, venue: &mut Venue) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO venues (name, city, country, latitude, longitude) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![venue.name, venue.city, venue.country, venue.latitude, venue.longitude],
        )
        .map_err(storage_error)?;
        let id = conn.last_insert_rowid();
        venue.id = Some(id);
        debug!("Created venue: {} with id {}", venue.name, id);
        Ok(())
    }

    async fn get_show(
        &self,
        production_id: i64,
        venue_id: i64,
        date: DateTime<Utc>,
    ) -> Result<Option<Show>> {
        let conn = self.lock()?;
        let show = conn
            .query_row(
                &format!(
                    "SELECT {} FROM shows WHERE production_id = ?1 AND venue_id = ?2 AND date = ?3",
                    SHOW_COLUMNS
                ),
                params![production_id, venue_id, fmt_ts(&date)],
                show_from_row,
            )
            .optional()?;
        Ok(show)
    }

    async fn create_show(&self, show: &mut Show) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO shows (production_id, venue_id, title, date, url, is_rehearsal, source, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                show.production_id,
                show.venue_id,
                show.title,
                fmt_ts(&show.date),
                show.url,
                show.is_rehearsal,
                show.source,
                fmt_ts(&show.created_at),
                fmt_ts(&show.updated_at),
            ],
        )
        .map_err(storage_error)?;
        let id = conn.last_insert_rowid();
        show.id = Some(id);
        debug!("Created show: {} with id {}", show.title, id);
        Ok(())
    }

    async fn update_show(&self, show: &Show) -> Result<()> {
        let id = show.id.ok_or_else(|| missing_id("show"))?;
        let conn = self.lock()?;
        conn.execute(
            "UPDATE shows SET title = ?2, url = ?3, is_rehearsal = ?4, updated_at = ?5 WHERE id = ?1",
            params![id, show.title, show.url, show.is_rehearsal, fmt_ts(&show.updated_at)],
        )
        .map_err(storage_error)?;
        debug!("Updated show: {} with id {}", show.title, id);
        Ok(())
    }

    async fn list_shows(&self, production_id: i64) -> Result<Vec<Show>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM shows WHERE production_id = ?1 ORDER BY date, id",
            SHOW_COLUMNS
        ))?;
        let rows = stmt.query_map(params![production_id], show_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn counts(&self) -> Result<StoreCounts> {
        let conn = self.lock()?;
        let count = |table: &str| -> Result<usize> {
            let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(StoreCounts {
            productions: count("productions")?,
            venues: count("venues")?,
            shows: count("shows")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ScrapedProduction, ScrapedShow};
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_production_round_trip_keeps_lists_and_times() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 12, 30, 0).unwrap();
        let mut scraped = ScrapedProduction::new("Aida", "aida");
        scraped.tags = vec!["opera".into(), "Verdi".into()];
        scraped.gallery_urls = vec!["https://img/1.jpg".into()];
        scraped.running_time_minutes = Some(195);
        let mut production = Production::from_scraped("opera.hu", &scraped, now);
        storage.create_production(&mut production).await.unwrap();

        let stored = storage.get_production("opera.hu", "aida").await.unwrap().unwrap();
        assert_eq!(stored, production);
        assert!(storage.get_production("opera.hu", "tosca").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_keys_are_constraint_errors() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let now = Utc::now();
        let scraped = ScrapedProduction::new("Aida", "aida");
        let mut first = Production::from_scraped("opera.hu", &scraped, now);
        storage.create_production(&mut first).await.unwrap();
        let mut second = Production::from_scraped("opera.hu", &scraped, now);
        assert!(matches!(
            storage.create_production(&mut second).await,
            Err(ScraperError::Constraint(_))
        ));

        let mut venue = Venue::new("Opera House");
        storage.create_venue(&mut venue).await.unwrap();
        let mut again = Venue::new("Opera House");
        assert!(matches!(
            storage.create_venue(&mut again).await,
            Err(ScraperError::Constraint(_))
        ));
    }

    #[tokio::test]
    async fn test_show_lookup_by_natural_key() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let now = Utc::now();
        let mut production = Production::from_scraped("opera.hu", &ScrapedProduction::new("Aida", "aida"), now);
        storage.create_production(&mut production).await.unwrap();
        let mut venue = Venue::new("Opera House");
        storage.create_venue(&mut venue).await.unwrap();

        let date = Utc.with_ymd_and_hms(2026, 3, 1, 19, 0, 0).unwrap();
        let scraped = ScrapedShow {
            title: "Aida".into(),
            date,
            venue_name: Some("Opera House".into()),
            url: Some("https://www.opera.hu/x".into()),
            is_rehearsal: true,
        };
        let (pid, vid) = (production.id.unwrap(), venue.id.unwrap());
        let mut show = Show::from_scraped("opera.hu", pid, vid, &scraped, now);
        storage.create_show(&mut show).await.unwrap();

        let found = storage.get_show(pid, vid, date).await.unwrap().unwrap();
        assert_eq!(found.id, show.id);
        assert!(found.is_rehearsal);
        assert_eq!(found.source, "opera.hu");
        assert!(storage.get_show(pid, vid, date + chrono::Duration::hours(1)).await.unwrap().is_none());

        let counts = storage.counts().await.unwrap();
        assert_eq!(counts, StoreCounts { productions: 1, venues: 1, shows: 1 });
    }

    #[test]
    fn test_reopen_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("allet.db");
        SqliteStorage::open(&path).unwrap();
        let storage = SqliteStorage::open(&path).unwrap();
        assert!(storage.opened_with().is_noop());
        assert!(storage.reconcile().unwrap().is_noop());
    }
}
