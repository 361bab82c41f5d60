//! Encoding and decoding helpers between repnet record types and SQLite
//! columns.
//!
//! Dates are unix seconds. Bounds are fixed-width sortable hex text; reads
//! also accept narrower hex and plain integers left behind by older writers.

use chrono::{DateTime, Utc};
use repnet_core::{
  Error as CoreError,
  bound::Bound,
  id::{OpinionId, SignerId, StatementId},
  record::{Opinion, OpinionBody, StatementRecord},
};
use rusqlite::{Row, types::Value};

use crate::Result;

// ─── Dates ───────────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> i64 { dt.timestamp() }

pub fn decode_dt(secs: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp(secs, 0)
    .ok_or_else(|| CoreError::InvalidRecord(format!("timestamp out of range: {secs}")).into())
}

// ─── Bounds ──────────────────────────────────────────────────────────────────

pub fn encode_bound(bound: Option<Bound>) -> Option<String> { bound.map(Bound::to_sortable) }

pub fn decode_bound(value: Value) -> Result<Option<Bound>> {
  match value {
    Value::Null => Ok(None),
    Value::Text(s) => Ok(Some(Bound::parse_sortable(&s)?)),
    Value::Integer(n) => Ok(Some(Bound::from_integer(n)?)),
    other => Err(
      CoreError::InvalidRecord(format!("unsupported bound column type: {:?}", other.data_type()))
        .into(),
    ),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const STATEMENT_COLUMNS: &str = "id, name, entity_1, entity_2, cidr_min, cidr_max";

pub const OPINION_COLUMNS: &str =
  "id, statement_id, signer_id, date, valid, serial, certainty, signature, comment";

/// Raw values read directly from a `statement` row.
pub struct RawStatement {
  pub id:       i64,
  pub name:     String,
  pub entity_1: String,
  pub entity_2: Option<String>,
  pub cidr_min: Value,
  pub cidr_max: Value,
}

impl RawStatement {
  /// Read a row selected with [`STATEMENT_COLUMNS`].
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:       row.get(0)?,
      name:     row.get(1)?,
      entity_1: row.get(2)?,
      entity_2: row.get(3)?,
      cidr_min: row.get(4)?,
      cidr_max: row.get(5)?,
    })
  }

  pub fn into_record(self) -> Result<StatementRecord> {
    Ok(StatementRecord {
      id:       StatementId(self.id),
      name:     self.name,
      entity_1: self.entity_1,
      entity_2: self.entity_2,
      cidr_min: decode_bound(self.cidr_min)?,
      cidr_max: decode_bound(self.cidr_max)?,
    })
  }
}

/// Raw values read directly from an `opinion` row.
pub struct RawOpinion {
  pub id:           i64,
  pub statement_id: i64,
  pub signer_id:    i64,
  pub date:         i64,
  pub valid:        bool,
  pub serial:       i64,
  pub certainty:    i64,
  pub signature:    Vec<u8>,
  pub comment:      Option<String>,
}

impl RawOpinion {
  /// Read a row selected with [`OPINION_COLUMNS`].
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      statement_id: row.get(1)?,
      signer_id:    row.get(2)?,
      date:         row.get(3)?,
      valid:        row.get(4)?,
      serial:       row.get(5)?,
      certainty:    row.get(6)?,
      signature:    row.get(7)?,
      comment:      row.get(8)?,
    })
  }

  pub fn into_opinion(self) -> Result<Opinion> {
    let out_of_range =
      |field: &str, v: i64| CoreError::InvalidRecord(format!("opinion {}: {field} out of range: {v}", self.id));
    let serial = u32::try_from(self.serial).map_err(|_| out_of_range("serial", self.serial))?;
    let certainty =
      i32::try_from(self.certainty).map_err(|_| out_of_range("certainty", self.certainty))?;
    Ok(Opinion {
      id:        OpinionId(self.id),
      body:      OpinionBody {
        statement_id: StatementId(self.statement_id),
        signer_id:    SignerId(self.signer_id),
        date:         decode_dt(self.date)?,
        valid:        self.valid,
        serial,
        certainty,
        comment:      self.comment,
      },
      signature: self.signature,
    })
  }
}
