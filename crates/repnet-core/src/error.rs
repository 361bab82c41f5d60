//! Error types for `repnet-core`.

use thiserror::Error;

use crate::id::{OpinionId, SignerId};

#[derive(Debug, Error)]
pub enum Error {
  /// Nothing is known about the requested entity or statement. Resolution
  /// turns this into a no-data verdict rather than returning it.
  #[error("not found: {0}")]
  NotFound(String),

  /// The record store failed or did not answer in time.
  #[error("record store unavailable: {0}")]
  StoreUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// A stored statement or opinion violates a data-model invariant.
  #[error("invalid record: {0}")]
  InvalidRecord(String),

  #[error("signature invalid for opinion {0}")]
  SignatureInvalid(OpinionId),

  #[error("no public key known for signer {0}")]
  KeyUnavailable(SignerId),

  #[error("invalid entity: {0:?}")]
  InvalidEntity(String),

  #[error("resolution cancelled")]
  Cancelled,
}

impl Error {
  /// Wrap any store-side failure.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::StoreUnavailable(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
