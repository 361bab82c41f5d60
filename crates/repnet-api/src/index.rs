//! `POST /index/refresh`: rebuild the statement index from the store.

use std::sync::Arc;

use axum::{Json, extract::State};
use repnet_core::store::{KeyStore, RecordStore, TrustProvider};
use serde::Serialize;

use crate::{AppState, error::ApiError};

#[derive(Debug, Serialize)]
pub struct Refreshed {
  pub statements: usize,
}

pub async fn refresh<S, K, T>(
  State(state): State<Arc<AppState<S, K, T>>>,
) -> Result<Json<Refreshed>, ApiError>
where
  S: RecordStore,
  K: KeyStore,
  T: TrustProvider,
{
  let statements = state.engine.refresh_index().await?;
  Ok(Json(Refreshed { statements }))
}
