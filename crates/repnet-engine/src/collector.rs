//! Opinion collection: fetch, verify, filter by time, and pick each signer's
//! effective opinion on a statement.

use std::{
  collections::{BTreeMap, HashMap},
  time::Duration,
};

use chrono::{DateTime, Utc};
use repnet_core::{
  Error, Result,
  id::{SignerId, StatementId},
  record::Opinion,
  signing::{self, PublicKey},
  store::{KeyStore, RecordStore},
};
use tracing::{debug, warn};

use crate::bounded::bounded;

/// Collects opinions for one resolution.
///
/// Key lookups are memoised for the lifetime of the collector, so a signer
/// that appears on several candidate statements is looked up once.
pub struct Collector<'a, S, K> {
  store:   &'a S,
  keys:    &'a K,
  timeout: Duration,
  cache:   HashMap<SignerId, Option<PublicKey>>,
}

impl<'a, S, K> Collector<'a, S, K>
where
  S: RecordStore,
  K: KeyStore,
{
  pub fn new(store: &'a S, keys: &'a K, timeout: Duration) -> Self {
    Self { store, keys, timeout, cache: HashMap::new() }
  }

  /// The effective opinions on `statement_id` as of `as_of`, one per signer,
  /// ordered by signer id.
  ///
  /// Opinions with a mismatched statement id, an unknown signer key, a bad
  /// signature, or a date after `as_of` are dropped. Among a signer's
  /// remaining opinions the greatest serial wins, ties going to the
  /// lexicographically smallest signature. A winning retraction
  /// (`valid = false`) removes the signer entirely.
  pub async fn collect(
    &mut self,
    statement_id: StatementId,
    as_of: DateTime<Utc>,
  ) -> Result<Vec<Opinion>> {
    let fetched = bounded(self.timeout, self.store.get_opinions(statement_id)).await?;
    let fetched_count = fetched.len();

    let mut latest: BTreeMap<SignerId, Opinion> = BTreeMap::new();
    for opinion in fetched {
      if opinion.statement_id != statement_id {
        warn!(
          opinion = %opinion.id,
          expected = %statement_id,
          found = %opinion.statement_id,
          "skipping opinion filed under the wrong statement"
        );
        continue;
      }
      match self.authenticate(&opinion).await {
        Ok(()) => {}
        Err(reason @ (Error::KeyUnavailable(_) | Error::SignatureInvalid(_))) => {
          debug!(opinion = %opinion.id, signer = %opinion.signer_id, %reason, "dropping opinion");
          continue;
        }
        Err(e) => return Err(e),
      }
      if opinion.date > as_of {
        continue;
      }
      match latest.get(&opinion.signer_id) {
        Some(current) if !supersedes(&opinion, current) => {}
        _ => {
          latest.insert(opinion.signer_id, opinion);
        }
      }
    }

    let effective: Vec<Opinion> = latest.into_values().filter(|o| o.valid).collect();
    debug!(
      statement = %statement_id,
      fetched = fetched_count,
      effective = effective.len(),
      "collected opinions"
    );
    Ok(effective)
  }

  /// Store failures propagate; an unknown key or a bad signature comes back
  /// as the reason to drop the opinion.
  async fn authenticate(&mut self, opinion: &Opinion) -> Result<()> {
    let key = self
      .key_for(opinion.signer_id)
      .await?
      .ok_or(Error::KeyUnavailable(opinion.signer_id))?;
    if !signing::verify(opinion, &key) {
      return Err(Error::SignatureInvalid(opinion.id));
    }
    Ok(())
  }

  async fn key_for(&mut self, signer: SignerId) -> Result<Option<PublicKey>> {
    if let Some(cached) = self.cache.get(&signer) {
      return Ok(*cached);
    }
    let key = bounded(self.timeout, self.keys.public_key_for(signer)).await?;
    self.cache.insert(signer, key);
    Ok(key)
  }
}

/// Whether `candidate` replaces `current` as a signer's effective opinion.
fn supersedes(candidate: &Opinion, current: &Opinion) -> bool {
  candidate.serial > current.serial
    || (candidate.serial == current.serial && candidate.signature < current.signature)
}
