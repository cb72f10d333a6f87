//! One-time merge of productions that were keyed by `(source, slug, season)`
//! onto the `(source, slug)` key. Safe to run on every open: a database that
//! is already reconciled comes out unchanged.

use crate::error::Result;
use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::info;

/// Columns added after the first schema, with the declaration used to add
/// them to an older database.
const LATE_COLUMNS: &[(&str, &str, &str)] = &[
    ("productions", "season", "TEXT"),
    ("productions", "synopsis", "TEXT"),
    ("productions", "guide", "TEXT"),
    ("productions", "gallery_urls", "TEXT NOT NULL DEFAULT '[]'"),
    ("productions", "category", "TEXT"),
    ("productions", "tags", "TEXT NOT NULL DEFAULT '[]'"),
    ("productions", "running_time_minutes", "INTEGER"),
    ("productions", "artist_name", "TEXT"),
    ("shows", "is_rehearsal", "INTEGER NOT NULL DEFAULT 0"),
    ("shows", "source", "TEXT NOT NULL DEFAULT ''"),
    ("shows", "updated_at", "TEXT NOT NULL DEFAULT '1970-01-01T00:00:00Z'"),
];

const LEGACY_PRODUCTION_INDEX: &str = "ix_productions_source_slug_season";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub columns_added: Vec<String>,
    /// Duplicate production rows folded into their survivor and deleted
    pub productions_merged: usize,
    pub shows_reassigned: usize,
    /// Shows of a duplicate that collided with a show the survivor already had
    pub shows_dropped: usize,
    pub activities_reassigned: usize,
    pub activities_dropped: usize,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self == &Self::default()
    }
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Add every late column the database is missing.
pub fn ensure_columns(conn: &Connection) -> Result<Vec<String>> {
    let mut added = Vec::new();
    for (table, column, decl) in LATE_COLUMNS {
        if !column_exists(conn, table, column)? {
            conn.execute_batch(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, decl))?;
            added.push(format!("{}.{}", table, column));
        }
    }
    Ok(added)
}

/// Merge duplicate `(source, slug)` productions into the row with the lowest
/// id, then enforce the key with a unique index.
///
/// Shows and user activities of a duplicate move to the survivor. Where the
/// survivor already holds the same show (same venue and date) or the same
/// user's activity, the duplicate's row is dropped. Everything runs in one
/// transaction.
pub fn reconcile_production_keys(conn: &mut Connection) -> Result<ReconcileReport> {
    let mut report = ReconcileReport {
        columns_added: ensure_columns(conn)?,
        ..Default::default()
    };

    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
        DROP TABLE IF EXISTS temp.production_survivors;
        CREATE TEMP TABLE production_survivors AS
            SELECT p.id AS dup_id, k.kept_id AS kept_id
            FROM productions p
            JOIN (SELECT source, slug, MIN(id) AS kept_id
                  FROM productions GROUP BY source, slug) k
              ON p.source = k.source AND p.slug = k.slug
            WHERE p.id <> k.kept_id;
        "#,
    )?;

    let duplicates: i64 =
        tx.query_row("SELECT COUNT(*) FROM temp.production_survivors", [], |row| row.get(0))?;

    if duplicates > 0 {
        report.shows_reassigned = tx.execute(
            "UPDATE OR IGNORE shows
             SET production_id = (SELECT kept_id FROM temp.production_survivors WHERE dup_id = shows.production_id)
             WHERE production_id IN (SELECT dup_id FROM temp.production_survivors)",
            params![],
        )?;
        // Shows still on a duplicate collided with the survivor's own show
        tx.execute(
            "UPDATE user_activities SET show_id = NULL
             WHERE show_id IN (SELECT id FROM shows
                               WHERE production_id IN (SELECT dup_id FROM temp.production_survivors))",
            params![],
        )?;
        report.shows_dropped = tx.execute(
            "DELETE FROM shows WHERE production_id IN (SELECT dup_id FROM temp.production_survivors)",
            params![],
        )?;

        report.activities_reassigned = tx.execute(
            "UPDATE OR IGNORE user_activities
             SET production_id = (SELECT kept_id FROM temp.production_survivors WHERE dup_id = user_activities.production_id)
             WHERE production_id IN (SELECT dup_id FROM temp.production_survivors)",
            params![],
        )?;
        report.activities_dropped = tx.execute(
            "DELETE FROM user_activities WHERE production_id IN (SELECT dup_id FROM temp.production_survivors)",
            params![],
        )?;

        report.productions_merged = tx.execute(
            "DELETE FROM productions WHERE id IN (SELECT dup_id FROM temp.production_survivors)",
            params![],
        )?;
    }

    tx.execute_batch(&format!(
        r#"
        DROP TABLE temp.production_survivors;
        DROP INDEX IF EXISTS {};
        CREATE UNIQUE INDEX IF NOT EXISTS ix_productions_source_slug ON productions (source, slug);
        "#,
        LEGACY_PRODUCTION_INDEX
    ))?;
    tx.commit()?;

    if !report.is_noop() {
        info!(
            "Reconciled production keys: {} merged, {} shows moved, {} shows dropped, {} activities moved, {} activities dropped, columns added: {:?}",
            report.productions_merged,
            report.shows_reassigned,
            report.shows_dropped,
            report.activities_reassigned,
            report.activities_dropped,
            report.columns_added
        );
    }
    Ok(report)
}
