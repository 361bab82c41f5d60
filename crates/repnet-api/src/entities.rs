//! Handler for `/entity/{entity}`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/entity/{entity}` | Optional `?as_of=<rfc3339>`; addresses and `addr/prefix` networks also match covering ranges |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use repnet_core::{
  entity::EntityDescriptor,
  store::{HintStore, KeyStore, RecordStore, TrustProvider},
  verdict::Verdict,
};
use tracing::warn;

use crate::{AppState, AsOf, error::ApiError};

/// `GET /entity/{entity}[?as_of=<rfc3339>]`
pub async fn resolve<S, K, T>(
  State(state): State<Arc<AppState<S, K, T>>>,
  Path(entity): Path<String>,
  Query(params): Query<AsOf>,
) -> Result<Json<Verdict>, ApiError>
where
  S: RecordStore + HintStore,
  K: KeyStore,
  T: TrustProvider,
{
  let engine = &state.engine;
  let descriptor = EntityDescriptor::parse(&entity)?;
  let verdict = engine.resolve(&descriptor, params.or_now()).await?;

  // Advisory: a failed or slow write is logged, not returned.
  let weights = verdict.statement_weights();
  let write = engine.store().record_hints(weights, chrono::Utc::now());
  match tokio::time::timeout(engine.config().store_timeout, write).await {
    Ok(Ok(())) => {}
    Ok(Err(e)) => warn!(error = %e, "failed to record statement hints"),
    Err(_) => warn!("timed out recording statement hints"),
  }
  Ok(Json(verdict))
}
