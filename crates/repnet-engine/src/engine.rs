//! The query facade.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, SubsecRound as _, Utc};
use repnet_core::{
  Error, Result,
  entity::EntityDescriptor,
  id::StatementId,
  record::{NewStatement, Opinion, OpinionBody, Statement},
  signing::OwnKey,
  store::{KeyStore, RecordStore, StatementWriter, TrustProvider},
  verdict::Verdict,
};
use tracing::{debug, info, warn};

use crate::{
  aggregate::aggregate,
  bounded::bounded,
  cancel::CancelToken,
  collector::Collector,
  index::IndexHandle,
};

/// Tunables for an [`Engine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Deadline for each individual record-store or key-store call.
  pub store_timeout: Duration,
}

impl Default for EngineConfig {
  fn default() -> Self { Self { store_timeout: Duration::from_secs(2) } }
}

/// The unsigned part of the opinion a node attaches to a statement it
/// submits.
#[derive(Debug, Clone)]
pub struct OpinionDraft {
  pub certainty: i32,
  pub comment:   Option<String>,
}

impl Default for OpinionDraft {
  fn default() -> Self { Self { certainty: 3, comment: None } }
}

/// Resolves entity queries into verdicts.
///
/// Cloning is cheap; all clones share the store, key store, trust provider,
/// and index.
pub struct Engine<S, K, T> {
  store:  Arc<S>,
  keys:   Arc<K>,
  trust:  Arc<T>,
  index:  IndexHandle,
  config: EngineConfig,
}

impl<S, K, T> Clone for Engine<S, K, T> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      keys:   Arc::clone(&self.keys),
      trust:  Arc::clone(&self.trust),
      index:  self.index.clone(),
      config: self.config.clone(),
    }
  }
}

impl<S, K, T> Engine<S, K, T>
where
  S: RecordStore,
  K: KeyStore,
  T: TrustProvider,
{
  /// An engine with an empty index. Call [`Engine::refresh_index`] (or use
  /// [`Engine::open`]) before resolving.
  pub fn new(store: Arc<S>, keys: Arc<K>, trust: Arc<T>, config: EngineConfig) -> Self {
    Self { store, keys, trust, index: IndexHandle::default(), config }
  }

  /// Build an engine and index everything currently in the store.
  pub async fn open(store: Arc<S>, keys: Arc<K>, trust: Arc<T>, config: EngineConfig) -> Result<Self> {
    let engine = Self::new(store, keys, trust, config);
    engine.refresh_index().await?;
    Ok(engine)
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn index(&self) -> &IndexHandle { &self.index }

  pub fn config(&self) -> &EngineConfig { &self.config }

  // ── Queries ───────────────────────────────────────────────────────────────

  /// Resolve `descriptor` as of `as_of`.
  pub async fn resolve(&self, descriptor: &EntityDescriptor, as_of: DateTime<Utc>) -> Result<Verdict> {
    self.resolve_with(descriptor, as_of, &CancelToken::new()).await
  }

  /// Resolve `descriptor`, checking `cancel` before each candidate statement.
  ///
  /// Candidates are the union of exact label matches and, for addresses and
  /// networks, every ranged statement covering them. Purged or invalid
  /// candidates are skipped; store failures and cancellation abort the whole
  /// resolution.
  pub async fn resolve_with(
    &self,
    descriptor: &EntityDescriptor,
    as_of: DateTime<Utc>,
    cancel: &CancelToken,
  ) -> Result<Verdict> {
    let index = self.index.snapshot();
    let label = descriptor.label();
    let mut candidates = index.query_exact(&label);
    if let Some(range) = descriptor.range() {
      candidates.extend(index.query_covering(range));
    }
    debug!(entity = %label, candidates = candidates.len(), "resolving");

    let mut collector = self.collector();
    let mut collected: Vec<(StatementId, Vec<Opinion>)> = Vec::with_capacity(candidates.len());
    for id in candidates {
      cancel.check()?;
      let Some(statement) = self.candidate(id).await? else {
        continue;
      };
      let opinions = collector.collect(statement.id, as_of).await?;
      collected.push((statement.id, opinions));
    }
    cancel.check()?;

    Ok(aggregate(label, as_of, collected, &*self.trust))
  }

  /// Verdict over the opinions on a single statement.
  ///
  /// A statement that does not exist yields a no-data verdict; one that fails
  /// validation is an [`Error::InvalidRecord`].
  pub async fn resolve_statement(&self, id: StatementId, as_of: DateTime<Utc>) -> Result<Verdict> {
    let statement = match self.fetch_statement(id).await {
      Ok(statement) => statement,
      Err(Error::NotFound(_)) => return Ok(Verdict::no_data(id.to_string(), as_of)),
      Err(e) => return Err(e),
    };
    let opinions = self.collector().collect(statement.id, as_of).await?;
    Ok(aggregate(statement.entity_1, as_of, [(statement.id, opinions)], &*self.trust))
  }

  /// Statements with exactly this claim shape, read straight from the store.
  pub async fn find_statements(
    &self,
    name: &str,
    entity_1: &str,
    entity_2: Option<&str>,
  ) -> Result<Vec<Statement>> {
    let records = bounded(
      self.config.store_timeout,
      self.store.find_statements_by_exact(name, entity_1, entity_2),
    )
    .await?;
    records.into_iter().map(Statement::try_from).collect()
  }

  // ── Index maintenance ─────────────────────────────────────────────────────

  /// Rebuild the index from a full store scan. Returns the number of
  /// statements indexed.
  pub async fn refresh_index(&self) -> Result<usize> {
    let records = bounded(self.config.store_timeout, self.store.scan_statements_by_cidr_bounds()).await?;
    Ok(self.index.rebuild(records))
  }

  /// Make a newly stored statement visible to queries.
  pub fn statement_added(&self, statement: &Statement) {
    self.index.update(|index| index.insert(statement));
  }

  /// Forget a purged statement. Returns whether it was indexed.
  pub fn statement_removed(&self, id: StatementId) -> bool {
    self.index.update(|index| index.remove(id))
  }

  // ── internals ─────────────────────────────────────────────────────────────

  fn collector(&self) -> Collector<'_, S, K> {
    Collector::new(&*self.store, &*self.keys, self.config.store_timeout)
  }

  /// A stored, validated statement. Missing statements are
  /// [`Error::NotFound`].
  async fn fetch_statement(&self, id: StatementId) -> Result<Statement> {
    bounded(self.config.store_timeout, self.store.get_statement(id))
      .await?
      .ok_or_else(|| Error::NotFound(format!("statement {id}")))
      .and_then(Statement::try_from)
  }

  /// Like [`Engine::fetch_statement`], but purged and invalid statements
  /// are skipped rather than failing the whole resolution.
  async fn candidate(&self, id: StatementId) -> Result<Option<Statement>> {
    match self.fetch_statement(id).await {
      Ok(statement) => Ok(Some(statement)),
      Err(Error::NotFound(_)) => {
        debug!(statement = %id, "indexed statement no longer stored");
        Ok(None)
      }
      Err(e @ Error::InvalidRecord(_)) => {
        warn!(statement = %id, error = %e, "skipping invalid statement");
        Ok(None)
      }
      Err(e) => Err(e),
    }
  }
}

impl<S, K, T> Engine<S, K, T>
where
  S: RecordStore + StatementWriter,
  K: KeyStore,
  T: TrustProvider,
{
  /// Store `statement` with its e-mail entities hashed, sign an opinion on
  /// it as `own`, and make it visible to queries.
  ///
  /// The opinion's serial follows the highest one `own` has already given
  /// on the statement, so resubmitting an existing statement restates the
  /// node's position rather than colliding with it.
  pub async fn submit(
    &self,
    statement: NewStatement,
    draft: OpinionDraft,
    own: &OwnKey,
  ) -> Result<(Statement, Opinion)> {
    let limit = self.config.store_timeout;
    let statement = bounded(limit, self.store.insert_statement(statement.hashing_emails())).await?;

    let previous = bounded(limit, self.store.get_opinions(statement.id)).await?;
    let serial = previous
      .iter()
      .filter(|o| o.signer_id == own.signer())
      .map(|o| o.serial)
      .max()
      .map_or(1, |last| last.saturating_add(1));

    let body = OpinionBody {
      statement_id: statement.id,
      signer_id:    own.signer(),
      date:         Utc::now().trunc_subsecs(0),
      valid:        true,
      serial,
      certainty:    draft.certainty,
      comment:      draft.comment,
    };
    let opinion = bounded(limit, self.store.insert_opinion(own.sign(body))).await?;

    self.statement_added(&statement);
    info!(statement = %statement.id, signer = %own.signer(), serial, "submitted statement");
    Ok((statement, opinion))
  }
}
