//! Error type for `repnet-store-sqlite`.

use repnet_core::id::{SignerId, StatementId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] repnet_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// An opinion with the same statement, signer, date, and serial exists.
  #[error("duplicate opinion by signer {signer} on statement {statement} (serial {serial})")]
  DuplicateOpinion {
    statement: StatementId,
    signer:    SignerId,
    serial:    u32,
  },

  #[error("statement not found: {0}")]
  StatementNotFound(StatementId),

  /// The database was written by a newer schema than this build knows.
  #[error("schema version {found} is newer than supported version {supported}")]
  SchemaTooNew { found: u32, supported: u32 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
