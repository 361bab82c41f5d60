//! Trust-weighted aggregation of effective opinions into a verdict.

use chrono::{DateTime, Utc};
use repnet_core::{
  id::{SignerId, StatementId},
  record::Opinion,
  store::TrustProvider,
  verdict::{Contribution, Verdict},
};
use tracing::warn;

/// Fold the effective opinions of every candidate statement into one verdict.
///
/// `score = Σ(certainty × weight) / Σ(weight)`, summed in `(statement_id,
/// signer_id)` order. Zero-weight opinions stay in `contributing`; when the
/// total weight is zero the verdict is marked `no_data` with a score of 0.
pub fn aggregate<T>(
  entity: impl Into<String>,
  as_of: DateTime<Utc>,
  collected: impl IntoIterator<Item = (StatementId, Vec<Opinion>)>,
  trust: &T,
) -> Verdict
where
  T: TrustProvider + ?Sized,
{
  let mut contributing: Vec<Contribution> = collected
    .into_iter()
    .flat_map(|(statement_id, opinions)| {
      opinions.into_iter().map(move |o| Contribution {
        statement_id,
        signer_id: o.signer_id,
        certainty: o.certainty,
        weight: weight_of(trust, o.signer_id),
      })
    })
    .collect();
  contributing.sort_by_key(|c| (c.statement_id, c.signer_id));

  let (weighted, total) = contributing.iter().fold((0.0_f64, 0.0_f64), |(sum, total), c| {
    (sum + f64::from(c.certainty) * c.weight, total + c.weight)
  });

  let entity = entity.into();
  if total == 0.0 {
    return Verdict { contributing, ..Verdict::no_data(entity, as_of) };
  }
  Verdict { entity, as_of, score: weighted / total, no_data: false, contributing }
}

fn weight_of<T: TrustProvider + ?Sized>(trust: &T, signer: SignerId) -> f64 {
  let weight = trust.weight_for(signer);
  if weight.is_finite() && weight >= 0.0 {
    weight
  } else {
    warn!(%signer, weight, "unusable trust weight, treating as 0");
    0.0
  }
}
