//! The collaborator traits the engine reads through.
//!
//! [`RecordStore`], [`StatementWriter`], and [`HintStore`] are implemented by
//! storage backends (e.g. `repnet-store-sqlite`). [`KeyStore`] and [`TrustProvider`] are supplied by
//! the embedding node; simple map-backed versions live here.
//!
//! All async methods return `Send` futures so the traits can be used from a
//! multi-threaded tokio runtime.

use std::{
  collections::{BTreeMap, HashMap},
  convert::Infallible,
  future::Future,
};

use chrono::{DateTime, Utc};

use crate::{
  id::{SignerId, StatementId},
  record::{NewStatement, Opinion, SignedOpinion, Statement, StatementRecord},
  signing::PublicKey,
};

// ─── Record store ────────────────────────────────────────────────────────────

/// Durable storage of statements and opinions.
///
/// Implementations enforce the uniqueness constraints on both record kinds at
/// write time; the engine only reads.
pub trait RecordStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Retrieve a statement by id. Returns `None` if it does not exist (for
  /// example after an administrative purge).
  fn get_statement(
    &self,
    id: StatementId,
  ) -> impl Future<Output = Result<Option<StatementRecord>, Self::Error>> + Send + '_;

  /// Statements with exactly this claim shape.
  fn find_statements_by_exact<'a>(
    &'a self,
    name: &'a str,
    entity_1: &'a str,
    entity_2: Option<&'a str>,
  ) -> impl Future<Output = Result<Vec<StatementRecord>, Self::Error>> + Send + 'a;

  /// Every statement, unranged first, ranged ones ordered by `cidr_min`.
  /// Used to build and refresh the range index.
  fn scan_statements_by_cidr_bounds(
    &self,
  ) -> impl Future<Output = Result<Vec<StatementRecord>, Self::Error>> + Send + '_;

  /// All opinions about a statement, in no particular order.
  fn get_opinions(
    &self,
    statement_id: StatementId,
  ) -> impl Future<Output = Result<Vec<Opinion>, Self::Error>> + Send + '_;
}

/// Write side for statements and opinions.
pub trait StatementWriter: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Store a statement. If an identical statement (same name, entities, and
  /// range) already exists, that one is returned instead.
  fn insert_statement(
    &self,
    statement: NewStatement,
  ) -> impl Future<Output = Result<Statement, Self::Error>> + Send + '_;

  /// Append a signed opinion. Signatures are checked when opinions are read
  /// for resolution, not here.
  fn insert_opinion(
    &self,
    opinion: SignedOpinion,
  ) -> impl Future<Output = Result<Opinion, Self::Error>> + Send + '_;
}

/// Write side for advisory [`StatementHints`](crate::record::StatementHints).
///
/// Hints never influence resolution; a failed write is safe to ignore.
pub trait HintStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Mark statements as used at `used_at` with the total trust weight each
  /// contributed. Unknown statement ids are ignored.
  fn record_hints(
    &self,
    weights: BTreeMap<StatementId, f64>,
    used_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Key store ───────────────────────────────────────────────────────────────

/// Source of signers' currently-known public keys.
pub trait KeyStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn public_key_for(
    &self,
    signer: SignerId,
  ) -> impl Future<Output = Result<Option<PublicKey>, Self::Error>> + Send + '_;
}

/// A fixed map of signer keys.
#[derive(Debug, Clone, Default)]
pub struct StaticKeyStore {
  keys: HashMap<SignerId, PublicKey>,
}

impl StaticKeyStore {
  pub fn new() -> Self { Self::default() }

  pub fn insert(&mut self, signer: SignerId, key: PublicKey) -> &mut Self {
    self.keys.insert(signer, key);
    self
  }
}

impl FromIterator<(SignerId, PublicKey)> for StaticKeyStore {
  fn from_iter<I: IntoIterator<Item = (SignerId, PublicKey)>>(iter: I) -> Self {
    Self { keys: iter.into_iter().collect() }
  }
}

impl KeyStore for StaticKeyStore {
  type Error = Infallible;

  async fn public_key_for(&self, signer: SignerId) -> Result<Option<PublicKey>, Infallible> {
    Ok(self.keys.get(&signer).copied())
  }
}

// ─── Trust ───────────────────────────────────────────────────────────────────

/// Externally computed signer weights. Unknown signers should weigh 0.
pub trait TrustProvider: Send + Sync {
  fn weight_for(&self, signer: SignerId) -> f64;
}

impl<F> TrustProvider for F
where
  F: Fn(SignerId) -> f64 + Send + Sync,
{
  fn weight_for(&self, signer: SignerId) -> f64 { self(signer) }
}

/// A fixed weight table with a fallback for signers not listed.
#[derive(Debug, Clone, Default)]
pub struct TrustTable {
  weights: HashMap<SignerId, f64>,
  default: f64,
}

impl TrustTable {
  pub fn new(default: f64) -> Self { Self { weights: HashMap::new(), default } }

  pub fn set(&mut self, signer: SignerId, weight: f64) -> &mut Self {
    self.weights.insert(signer, weight);
    self
  }

  pub fn len(&self) -> usize { self.weights.len() }

  pub fn is_empty(&self) -> bool { self.weights.is_empty() }
}

impl FromIterator<(SignerId, f64)> for TrustTable {
  fn from_iter<I: IntoIterator<Item = (SignerId, f64)>>(iter: I) -> Self {
    Self { weights: iter.into_iter().collect(), default: 0.0 }
  }
}

impl TrustProvider for TrustTable {
  fn weight_for(&self, signer: SignerId) -> f64 {
    self.weights.get(&signer).copied().unwrap_or(self.default)
  }
}
