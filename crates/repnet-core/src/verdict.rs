//! The resolved reputation answer for one query.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{SignerId, StatementId};

/// One opinion that took part in a verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
  pub statement_id: StatementId,
  pub signer_id:    SignerId,
  pub certainty:    i32,
  /// Trust weight applied; zero-weight entries are kept for auditing.
  pub weight:       f64,
}

/// Weighted score over all contributing opinions plus the audit trail.
///
/// `contributing` is ordered by statement id, then signer id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
  /// The queried entity label.
  pub entity:       String,
  pub as_of:        DateTime<Utc>,
  pub score:        f64,
  /// Set when no trusted, valid opinion was found; `score` is then 0.
  pub no_data:      bool,
  pub contributing: Vec<Contribution>,
}

impl Verdict {
  pub fn no_data(entity: impl Into<String>, as_of: DateTime<Utc>) -> Self {
    Self {
      entity: entity.into(),
      as_of,
      score: 0.0,
      no_data: true,
      contributing: Vec::new(),
    }
  }

  /// Total trust weight that each statement contributed.
  pub fn statement_weights(&self) -> BTreeMap<StatementId, f64> {
    let mut out = BTreeMap::new();
    for c in &self.contributing {
      *out.entry(c.statement_id).or_insert(0.0) += c.weight;
    }
    out
  }
}
