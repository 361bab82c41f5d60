//! Statement and opinion records.
//!
//! Statements are immutable claims about one or two entities, optionally
//! scoped to an address range. Opinions are a signer's append-only, signed
//! positions on a statement; a later opinion with a higher serial and
//! `valid = false` retracts an earlier one.

use std::ops::Deref;

use chrono::{DateTime, Utc};
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  bound::{Bound, CidrRange},
  entity::Entity,
  id::{OpinionId, SignerId, StatementId},
  signing,
};

/// Claim name of the statement describing a signer's key.
pub const SIGNER_STATEMENT: &str = "signer";

// ─── Statements ──────────────────────────────────────────────────────────────

/// A statement row exactly as a store delivers it. Nothing about it has been
/// checked yet; see [`Statement::try_from`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementRecord {
  pub id:       StatementId,
  pub name:     String,
  pub entity_1: String,
  pub entity_2: Option<String>,
  pub cidr_min: Option<Bound>,
  pub cidr_max: Option<Bound>,
}

/// A validated statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
  pub id:       StatementId,
  /// Claim type, e.g. `"spammer"` or `"abuse_contact"`.
  pub name:     String,
  pub entity_1: String,
  pub entity_2: Option<String>,
  pub range:    Option<CidrRange>,
}

impl Statement {
  /// The entity labels of this statement, primary first.
  pub fn entities(&self) -> impl Iterator<Item = &str> {
    std::iter::once(self.entity_1.as_str()).chain(self.entity_2.as_deref())
  }
}

impl TryFrom<StatementRecord> for Statement {
  type Error = Error;

  fn try_from(record: StatementRecord) -> Result<Self> {
    let invalid = |why: &str| Error::InvalidRecord(format!("statement {}: {why}", record.id));
    if record.name.is_empty() {
      return Err(invalid("empty name"));
    }
    if record.entity_1.is_empty() {
      return Err(invalid("empty entity_1"));
    }
    if record.entity_2.as_deref() == Some("") {
      return Err(invalid("empty entity_2"));
    }
    let range = CidrRange::from_columns(record.cidr_min, record.cidr_max)
      .map_err(|e| match e {
        Error::InvalidRecord(why) => invalid(&why),
        other => other,
      })?;
    Ok(Self {
      id: record.id,
      name: record.name,
      entity_1: record.entity_1,
      entity_2: record.entity_2,
      range,
    })
  }
}

impl From<&Statement> for StatementRecord {
  fn from(s: &Statement) -> Self {
    Self {
      id:       s.id,
      name:     s.name.clone(),
      entity_1: s.entity_1.clone(),
      entity_2: s.entity_2.clone(),
      cidr_min: s.range.map(|r| r.min()),
      cidr_max: s.range.map(|r| r.max()),
    }
  }
}

/// Input to a store's statement write path. The id is assigned by the store;
/// the range is derived from `entity_1`.
#[derive(Debug, Clone)]
pub struct NewStatement {
  pub name:     String,
  pub entity_1: Entity,
  pub entity_2: Option<Entity>,
}

impl NewStatement {
  pub fn new(name: impl Into<String>, entity_1: Entity) -> Self {
    Self { name: name.into(), entity_1, entity_2: None }
  }

  pub fn with_second(mut self, entity_2: Entity) -> Self {
    self.entity_2 = Some(entity_2);
    self
  }

  /// The `signer(ed25519:…)` statement describing a key.
  pub fn signer(key: signing::PublicKey) -> Self {
    Self::new(SIGNER_STATEMENT, Entity::Signer(key))
  }

  pub fn range(&self) -> Option<CidrRange> { self.entity_1.range() }

  /// Replace e-mail entities by their hashes, so the address itself is
  /// never stored or published.
  pub fn hashing_emails(self) -> Self {
    let hash = |entity: Entity| match entity {
      Entity::EMail(address) => Entity::hashed_email_for(&address),
      other => other,
    };
    Self {
      name:     self.name,
      entity_1: hash(self.entity_1),
      entity_2: self.entity_2.map(hash),
    }
  }
}

/// Advisory evaluation hints cached alongside a statement.
///
/// Kept out of [`Statement`] so they never take part in identity, equality,
/// or uniqueness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementHints {
  pub last_used:   Option<DateTime<Utc>>,
  pub last_weight: Option<f64>,
}

// ─── Opinions ────────────────────────────────────────────────────────────────

/// The signed fields of an opinion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpinionBody {
  pub statement_id: StatementId,
  pub signer_id:    SignerId,
  /// Issuance time; second precision is what gets signed.
  pub date:         DateTime<Utc>,
  /// `false` marks a retraction.
  pub valid:        bool,
  /// Monotonically increasing per signer and statement.
  pub serial:       u32,
  /// Agreement (positive) or disagreement (negative) magnitude.
  pub certainty:    i32,
  pub comment:      Option<String>,
}

impl OpinionBody {
  pub fn sign(self, key: &SigningKey) -> SignedOpinion {
    let signature = signing::sign(&self, key);
    SignedOpinion { body: self, signature }
  }
}

/// An opinion as published by a signer, before a store assigns it an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedOpinion {
  pub body:      OpinionBody,
  pub signature: Vec<u8>,
}

/// A stored opinion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opinion {
  pub id:        OpinionId,
  pub body:      OpinionBody,
  pub signature: Vec<u8>,
}

impl Deref for Opinion {
  type Target = OpinionBody;

  fn deref(&self) -> &OpinionBody { &self.body }
}
