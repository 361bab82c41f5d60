//! [`SqliteStore`]: the SQLite implementation of [`RecordStore`],
//! [`StatementWriter`], [`HintStore`], and [`KeyStore`].

use std::{collections::BTreeMap, path::Path};

use chrono::{DateTime, Utc};
use repnet_core::{
  id::{OpinionId, SignerId, StatementId},
  record::{
    NewStatement, Opinion, SIGNER_STATEMENT, SignedOpinion, Statement, StatementHints,
    StatementRecord,
  },
  signing::PublicKey,
  store::{HintStore, KeyStore, RecordStore, StatementWriter},
};
use rusqlite::{ErrorCode, OptionalExtension as _, ffi, params};
use tracing::{debug, warn};

use crate::{
  Error, Result,
  encode::{
    OPINION_COLUMNS, RawOpinion, RawStatement, STATEMENT_COLUMNS, decode_dt, encode_bound,
    encode_dt,
  },
  schema::{self, SCHEMA_VERSION},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A repnet record store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

enum OpinionInsert {
  Inserted(i64),
  Duplicate,
  MissingStatement,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and bring its schema up to date.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let found = self
      .conn
      .call(|conn| Ok(schema::migrate(conn)?))
      .await?;
    if found > SCHEMA_VERSION {
      return Err(Error::SchemaTooNew { found, supported: SCHEMA_VERSION });
    }
    Ok(())
  }

  pub async fn schema_version(&self) -> Result<u32> {
    Ok(self.conn.call(|conn| Ok(schema::user_version(conn)?)).await?)
  }

  /// Run raw SQL against the underlying connection.
  #[cfg(test)]
  pub(crate) async fn execute_batch(&self, sql: &'static str) -> Result<()> {
    self.conn.call(move |conn| Ok(conn.execute_batch(sql)?)).await?;
    Ok(())
  }

  // ── Admin ─────────────────────────────────────────────────────────────────

  /// Remove a statement together with its opinions and hints. Returns
  /// whether the statement existed.
  pub async fn purge_statement(&self, id: StatementId) -> Result<bool> {
    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM statement_hint WHERE statement_id = ?1", params![id.0])?;
        let opinions = tx.execute("DELETE FROM opinion WHERE statement_id = ?1", params![id.0])?;
        let statements = tx.execute("DELETE FROM statement WHERE id = ?1", params![id.0])?;
        tx.commit()?;
        Ok((statements == 1, opinions))
      })
      .await?;
    if removed.0 {
      debug!(statement = %id, opinions = removed.1, "purged statement");
    }
    Ok(removed.0)
  }

  // ── Hints ─────────────────────────────────────────────────────────────────

  pub async fn get_hints(&self, id: StatementId) -> Result<StatementHints> {
    let row: Option<(Option<i64>, Option<f64>)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT last_used, last_weight FROM statement_hint WHERE statement_id = ?1",
              params![id.0],
              |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;
    let Some((last_used, last_weight)) = row else {
      return Ok(StatementHints::default());
    };
    Ok(StatementHints { last_used: last_used.map(decode_dt).transpose()?, last_weight })
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn statements_where(
    &self,
    clause: &'static str,
    args: Vec<Option<String>>,
  ) -> Result<Vec<StatementRecord>> {
    let raws: Vec<RawStatement> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!("SELECT {STATEMENT_COLUMNS} FROM statement {clause}"))?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(args.iter()), RawStatement::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(decode_statements(raws))
  }
}

/// Decode rows, leaving out any whose columns cannot be decoded.
fn decode_statements(raws: Vec<RawStatement>) -> Vec<StatementRecord> {
  raws
    .into_iter()
    .filter_map(|raw| {
      let id = raw.id;
      raw
        .into_record()
        .inspect_err(|e| warn!(statement = id, error = %e, "skipping undecodable statement row"))
        .ok()
    })
    .collect()
}

// ─── StatementWriter impl ────────────────────────────────────────────────────

impl StatementWriter for SqliteStore {
  type Error = Error;

  async fn insert_statement(&self, input: NewStatement) -> Result<Statement> {
    let range    = input.range();
    let name     = input.name;
    let entity_1 = input.entity_1.to_string();
    let entity_2 = input.entity_2.as_ref().map(ToString::to_string);
    let cidr_min = encode_bound(range.map(|r| r.min()));
    let cidr_max = encode_bound(range.map(|r| r.max()));

    let raw: RawStatement = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT OR IGNORE INTO statement (name, entity_1, entity_2, cidr_min, cidr_max)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          params![name, entity_1, entity_2, cidr_min, cidr_max],
        )?;
        let row = if inserted == 1 {
          let id = conn.last_insert_rowid();
          conn.query_row(
            &format!("SELECT {STATEMENT_COLUMNS} FROM statement WHERE id = ?1"),
            params![id],
            RawStatement::from_row,
          )?
        } else {
          conn.query_row(
            &format!(
              "SELECT {STATEMENT_COLUMNS} FROM statement
               WHERE name = ?1 AND entity_1 = ?2 AND entity_2 IS ?3
                 AND cidr_min IS ?4 AND cidr_max IS ?5"
            ),
            params![name, entity_1, entity_2, cidr_min, cidr_max],
            RawStatement::from_row,
          )?
        };
        Ok(row)
      })
      .await?;

    let statement = Statement::try_from(raw.into_record()?)?;
    debug!(statement = %statement.id, name = %statement.name, "stored statement");
    Ok(statement)
  }

  async fn insert_opinion(&self, input: SignedOpinion) -> Result<Opinion> {
    let SignedOpinion { mut body, signature } = input;
    // Only whole seconds are signed and stored.
    body.date = decode_dt(encode_dt(body.date))?;

    let statement_id = body.statement_id.0;
    let signer_id    = body.signer_id.0;
    let date         = encode_dt(body.date);
    let valid        = body.valid;
    let serial       = body.serial;
    let certainty    = body.certainty;
    let comment      = body.comment.clone();
    let sig_bytes    = signature.clone();

    let outcome = self
      .conn
      .call(move |conn| {
        let result = conn.execute(
          "INSERT INTO opinion (
             statement_id, signer_id, date, valid, serial, certainty, signature, comment
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          params![statement_id, signer_id, date, valid, serial, certainty, sig_bytes, comment],
        );
        match result {
          Ok(_) => Ok(OpinionInsert::Inserted(conn.last_insert_rowid())),
          Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            if e.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
              Ok(OpinionInsert::MissingStatement)
            } else {
              Ok(OpinionInsert::Duplicate)
            }
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    match outcome {
      OpinionInsert::Inserted(id) => Ok(Opinion { id: OpinionId(id), body, signature }),
      OpinionInsert::Duplicate => Err(Error::DuplicateOpinion {
        statement: body.statement_id,
        signer:    body.signer_id,
        serial:    body.serial,
      }),
      OpinionInsert::MissingStatement => Err(Error::StatementNotFound(body.statement_id)),
    }
  }
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  type Error = Error;

  async fn get_statement(&self, id: StatementId) -> Result<Option<StatementRecord>> {
    let raw: Option<RawStatement> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {STATEMENT_COLUMNS} FROM statement WHERE id = ?1"),
              params![id.0],
              RawStatement::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawStatement::into_record).transpose()
  }

  async fn find_statements_by_exact(
    &self,
    name: &str,
    entity_1: &str,
    entity_2: Option<&str>,
  ) -> Result<Vec<StatementRecord>> {
    self
      .statements_where(
        "WHERE name = ?1 AND entity_1 = ?2 AND entity_2 IS ?3 ORDER BY id",
        vec![Some(name.to_owned()), Some(entity_1.to_owned()), entity_2.map(str::to_owned)],
      )
      .await
  }

  async fn scan_statements_by_cidr_bounds(&self) -> Result<Vec<StatementRecord>> {
    self
      .statements_where("ORDER BY cidr_min IS NOT NULL, cidr_min, cidr_max, id", Vec::new())
      .await
  }

  async fn get_opinions(&self, statement_id: StatementId) -> Result<Vec<Opinion>> {
    let raws: Vec<RawOpinion> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {OPINION_COLUMNS} FROM opinion WHERE statement_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt
          .query_map(params![statement_id.0], RawOpinion::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      raws
        .into_iter()
        .filter_map(|raw| {
          let id = raw.id;
          raw
            .into_opinion()
            .inspect_err(|e| warn!(opinion = id, error = %e, "skipping undecodable opinion row"))
            .ok()
        })
        .collect(),
    )
  }
}

// ─── HintStore impl ──────────────────────────────────────────────────────────

impl HintStore for SqliteStore {
  type Error = Error;

  async fn record_hints(
    &self,
    weights: BTreeMap<StatementId, f64>,
    used_at: DateTime<Utc>,
  ) -> Result<()> {
    if weights.is_empty() {
      return Ok(());
    }
    let used_at = encode_dt(used_at);
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO statement_hint (statement_id, last_used, last_weight)
             SELECT id, ?2, ?3 FROM statement WHERE id = ?1
             ON CONFLICT (statement_id) DO UPDATE
               SET last_used = excluded.last_used, last_weight = excluded.last_weight",
          )?;
          for (id, weight) in &weights {
            stmt.execute(params![id.0, used_at, weight])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── KeyStore impl ───────────────────────────────────────────────────────────

impl KeyStore for SqliteStore {
  type Error = Error;

  /// A signer's key is the entity of its `signer(ed25519:…)` statement,
  /// whose id is the signer id.
  async fn public_key_for(&self, signer: SignerId) -> Result<Option<PublicKey>> {
    let id = signer.statement_id();
    let entity: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT entity_1 FROM statement WHERE id = ?1 AND name = ?2",
              params![id.0, SIGNER_STATEMENT],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    let Some(entity) = entity else {
      return Ok(None);
    };
    match entity.parse::<PublicKey>() {
      Ok(key) => Ok(Some(key)),
      Err(e) => {
        warn!(%signer, error = %e, "signer statement does not hold a usable key");
        Ok(None)
      }
    }
  }
}
