//! SQL schema and migrations for the repnet SQLite store.
//!
//! Applied at connection startup. Each migration runs in its own transaction
//! and bumps `PRAGMA user_version`, so a database at any earlier version is
//! brought forward one step at a time.

use repnet_core::entity::Entity;
use rusqlite::{Connection, Transaction, params};
use tracing::{info, warn};

/// Connection-level settings, run on every open.
pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

/// Version written by the last migration in [`MIGRATIONS`].
pub const SCHEMA_VERSION: u32 = 3;

type RowFixup = fn(&Transaction<'_>) -> rusqlite::Result<()>;

pub struct Migration {
  pub version:  u32,
  /// Row-level cleanup the new schema depends on. Runs before `sql`.
  pub prepare:  Option<RowFixup>,
  pub sql:      &'static str,
  /// Row-level fixups that cannot be expressed in SQL. Runs after `sql`.
  pub backfill: Option<RowFixup>,
}

pub const MIGRATIONS: &[Migration] = &[
  Migration { version: 1, prepare: None, sql: V1, backfill: None },
  Migration { version: 2, prepare: None, sql: V2, backfill: Some(backfill_bounds) },
  Migration { version: 3, prepare: Some(drop_collapsed_duplicates), sql: V3, backfill: None },
];

/// Initial layout: up to four entity slots per statement.
const V1: &str = "
CREATE TABLE IF NOT EXISTS statement (
    id        INTEGER PRIMARY KEY,
    name      TEXT NOT NULL,
    entity_1  TEXT NOT NULL,
    entity_2  TEXT,
    entity_3  TEXT,
    entity_4  TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS statement_unique_v1 ON statement(
    name, entity_1,
    coalesce(entity_2, ''), coalesce(entity_3, ''), coalesce(entity_4, '')
);
CREATE INDEX IF NOT EXISTS statement_entity_1_idx ON statement(entity_1);
CREATE INDEX IF NOT EXISTS statement_entity_2_idx ON statement(entity_2);

-- Opinions are append-only; retractions are new rows.
CREATE TABLE IF NOT EXISTS opinion (
    id            INTEGER PRIMARY KEY,
    statement_id  INTEGER NOT NULL REFERENCES statement(id),
    signer_id     INTEGER NOT NULL,
    date          INTEGER NOT NULL,   -- unix seconds
    valid         INTEGER NOT NULL,   -- 0 | 1
    serial        INTEGER NOT NULL,
    certainty     INTEGER NOT NULL,
    signature     BLOB    NOT NULL,
    comment       TEXT,
    UNIQUE (statement_id, signer_id, date, serial)
);

CREATE INDEX IF NOT EXISTS opinion_statement_idx ON opinion(statement_id);
";

/// Address ranges as fixed-width sortable hex bounds.
const V2: &str = "
ALTER TABLE statement ADD COLUMN cidr_min TEXT;
ALTER TABLE statement ADD COLUMN cidr_max TEXT;

CREATE INDEX IF NOT EXISTS statement_cidr_idx ON statement(cidr_min, cidr_max);
";

/// Two entity slots; uniqueness now covers the range. Advisory hints get
/// their own table.
const V3: &str = "
DROP INDEX IF EXISTS statement_unique_v1;
ALTER TABLE statement DROP COLUMN entity_3;
ALTER TABLE statement DROP COLUMN entity_4;

CREATE UNIQUE INDEX IF NOT EXISTS statement_unique ON statement(
    name, entity_1,
    coalesce(entity_2, ''), coalesce(cidr_min, ''), coalesce(cidr_max, '')
);

CREATE TABLE IF NOT EXISTS statement_hint (
    statement_id  INTEGER PRIMARY KEY REFERENCES statement(id) ON DELETE CASCADE,
    last_used     INTEGER,            -- unix seconds
    last_weight   REAL
);
";

/// Statements that differed only in `entity_3`/`entity_4` collide once those
/// slots are gone. The lowest id survives; the others are deleted with their
/// opinions, which were signed over the deleted id and cannot be moved.
fn drop_collapsed_duplicates(tx: &Transaction<'_>) -> rusqlite::Result<()> {
  let slotted: i64 = tx.query_row(
    "SELECT count(*) FROM statement WHERE entity_3 IS NOT NULL OR entity_4 IS NOT NULL",
    [],
    |row| row.get(0),
  )?;
  if slotted > 0 {
    warn!(statements = slotted, "dropping third and fourth entity slots");
  }

  let duplicates: Vec<i64> = {
    let mut stmt = tx.prepare(
      "SELECT s.id FROM statement s
       WHERE EXISTS (
         SELECT 1 FROM statement k
         WHERE k.id < s.id
           AND k.name = s.name
           AND k.entity_1 = s.entity_1
           AND coalesce(k.entity_2, '') = coalesce(s.entity_2, '')
           AND coalesce(k.cidr_min, '') = coalesce(s.cidr_min, '')
           AND coalesce(k.cidr_max, '') = coalesce(s.cidr_max, '')
       )",
    )?;
    stmt
      .query_map([], |row| row.get(0))?
      .collect::<rusqlite::Result<_>>()?
  };
  let mut opinions = 0;
  for id in &duplicates {
    opinions += tx.execute("DELETE FROM opinion WHERE statement_id = ?1", params![id])?;
    tx.execute("DELETE FROM statement WHERE id = ?1", params![id])?;
  }
  if !duplicates.is_empty() {
    warn!(
      statements = duplicates.len(),
      opinions,
      "deleted statements that duplicate an older one without entity_3/entity_4"
    );
  }
  Ok(())
}

/// Derive `cidr_min`/`cidr_max` for statements written before v2.
fn backfill_bounds(tx: &Transaction<'_>) -> rusqlite::Result<()> {
  let rows: Vec<(i64, String)> = {
    let mut stmt = tx.prepare("SELECT id, entity_1 FROM statement WHERE cidr_min IS NULL")?;
    stmt
      .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
      .collect::<rusqlite::Result<_>>()?
  };
  for (id, label) in rows {
    let Some(range) = label.parse::<Entity>().ok().and_then(|e| e.range()) else {
      continue;
    };
    tx.execute(
      "UPDATE statement SET cidr_min = ?1, cidr_max = ?2 WHERE id = ?3",
      params![range.min().to_sortable(), range.max().to_sortable(), id],
    )?;
  }
  Ok(())
}

pub fn user_version(conn: &Connection) -> rusqlite::Result<u32> {
  conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

/// Bring `conn` up to [`SCHEMA_VERSION`]. Returns the version found before
/// migrating; a database newer than this build is left untouched.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
  conn.execute_batch(PRAGMAS)?;
  let found = user_version(conn)?;
  if found > SCHEMA_VERSION {
    return Ok(found);
  }

  for migration in MIGRATIONS.iter().filter(|m| m.version > found) {
    let tx = conn.transaction()?;
    if let Some(prepare) = migration.prepare {
      prepare(&tx)?;
    }
    tx.execute_batch(migration.sql)?;
    if let Some(backfill) = migration.backfill {
      backfill(&tx)?;
    }
    tx.pragma_update(None, "user_version", migration.version)?;
    tx.commit()?;
    info!(version = migration.version, "applied schema migration");
  }
  Ok(found)
}
