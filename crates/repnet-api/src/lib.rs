//! JSON lookup API for a repnet node.
//!
//! Exposes an axum [`Router`] over a shared [`AppState`]. Transport, TLS,
//! and access control are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", repnet_api::api_router(Arc::new(AppState::new(engine))))
//! ```

pub mod entities;
pub mod error;
pub mod index;
pub mod statements;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use chrono::{DateTime, Utc};
use repnet_core::{
  signing::OwnKey,
  store::{HintStore, KeyStore, RecordStore, StatementWriter, TrustProvider},
};
use repnet_engine::Engine;
use serde::Deserialize;

pub use error::ApiError;

/// Shared state for every handler.
pub struct AppState<S, K, T> {
  pub engine:  Engine<S, K, T>,
  /// Signs the node's opinion on submitted statements. Without it,
  /// `POST /statements` is refused.
  pub own_key: Option<OwnKey>,
}

impl<S, K, T> AppState<S, K, T> {
  /// A read-only node.
  pub fn new(engine: Engine<S, K, T>) -> Self { Self { engine, own_key: None } }

  pub fn with_own_key(mut self, own_key: OwnKey) -> Self {
    self.own_key = Some(own_key);
    self
  }
}

/// Build the API router over `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, K, T>(state: Arc<AppState<S, K, T>>) -> Router<()>
where
  S: RecordStore + StatementWriter + HintStore + 'static,
  K: KeyStore + 'static,
  T: TrustProvider + 'static,
{
  Router::new()
    .route("/entity/{entity}", get(entities::resolve::<S, K, T>))
    .route(
      "/statements",
      get(statements::find::<S, K, T>).post(statements::submit::<S, K, T>),
    )
    .route("/statements/{id}", get(statements::resolve_one::<S, K, T>))
    .route("/index/refresh", post(index::refresh::<S, K, T>))
    .with_state(state)
}

/// `?as_of=<rfc3339>`; defaults to now.
#[derive(Debug, Default, Deserialize)]
pub struct AsOf {
  pub as_of: Option<DateTime<Utc>>,
}

impl AsOf {
  pub fn or_now(&self) -> DateTime<Utc> { self.as_of.unwrap_or_else(Utc::now) }
}
