//! Typed record identifiers.
//!
//! A signer is itself described by a statement, so a [`SignerId`] carries
//! the same number as a [`StatementId`]. The two are kept apart at the type
//! level; converting between them is always explicit.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a stored statement.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StatementId(pub i64);

/// Identifier of a signer: the id of the statement describing its key.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SignerId(pub i64);

/// Identifier of a stored opinion.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OpinionId(pub i64);

impl SignerId {
  /// The statement describing this signer.
  pub fn statement_id(self) -> StatementId { StatementId(self.0) }
}

impl StatementId {
  /// Interpret this statement as the description of a signer.
  pub fn as_signer(self) -> SignerId { SignerId(self.0) }
}

impl fmt::Display for StatementId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl fmt::Display for SignerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl fmt::Display for OpinionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}
