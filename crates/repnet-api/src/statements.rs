//! Handlers for `/statements` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/statements` | `?name=&entity_1=[&entity_2=]`, exact claim shape |
//! | `POST` | `/statements` | JSON [`Submission`]; e-mails are hashed, the node signs an opinion |
//! | `GET`  | `/statements/{id}` | Verdict over one statement; optional `?as_of=` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use repnet_core::{
  entity::Entity,
  id::{OpinionId, StatementId},
  record::{NewStatement, Statement},
  store::{KeyStore, RecordStore, StatementWriter, TrustProvider},
  verdict::Verdict,
};
use repnet_engine::OpinionDraft;
use serde::{Deserialize, Serialize};

use crate::{AppState, AsOf, error::ApiError};

// ─── Find ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FindParams {
  pub name:     String,
  pub entity_1: String,
  pub entity_2: Option<String>,
}

/// `GET /statements?name=<name>&entity_1=<label>[&entity_2=<label>]`
pub async fn find<S, K, T>(
  State(state): State<Arc<AppState<S, K, T>>>,
  Query(params): Query<FindParams>,
) -> Result<Json<Vec<Statement>>, ApiError>
where
  S: RecordStore,
  K: KeyStore,
  T: TrustProvider,
{
  let found = state
    .engine
    .find_statements(&params.name, &params.entity_1, params.entity_2.as_deref())
    .await?;
  Ok(Json(found))
}

// ─── Resolve one ─────────────────────────────────────────────────────────────

/// `GET /statements/{id}[?as_of=<rfc3339>]`
pub async fn resolve_one<S, K, T>(
  State(state): State<Arc<AppState<S, K, T>>>,
  Path(id): Path<i64>,
  Query(params): Query<AsOf>,
) -> Result<Json<Verdict>, ApiError>
where
  S: RecordStore,
  K: KeyStore,
  T: TrustProvider,
{
  let verdict = state.engine.resolve_statement(StatementId(id), params.or_now()).await?;
  Ok(Json(verdict))
}

// ─── Submit ──────────────────────────────────────────────────────────────────

fn default_certainty() -> i32 { OpinionDraft::default().certainty }

/// Body of `POST /statements`.
#[derive(Debug, Deserialize)]
pub struct Submission {
  pub name:      String,
  pub entity_1:  String,
  pub entity_2:  Option<String>,
  #[serde(default = "default_certainty")]
  pub certainty: i32,
  pub comment:   Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Submitted {
  pub statement: Statement,
  pub opinion:   OpinionId,
  pub serial:    u32,
}

/// `POST /statements`
pub async fn submit<S, K, T>(
  State(state): State<Arc<AppState<S, K, T>>>,
  Json(submission): Json<Submission>,
) -> Result<(StatusCode, Json<Submitted>), ApiError>
where
  S: RecordStore + StatementWriter,
  K: KeyStore,
  T: TrustProvider,
{
  let Some(own_key) = &state.own_key else {
    return Err(ApiError::Forbidden("this node has no signing key configured".into()));
  };
  let name = submission.name.trim();
  if name.is_empty() {
    return Err(ApiError::BadRequest("statement name must not be empty".into()));
  }

  let mut statement = NewStatement::new(name, submission.entity_1.parse::<Entity>()?);
  if let Some(entity_2) = submission.entity_2 {
    statement = statement.with_second(entity_2.parse::<Entity>()?);
  }
  let draft = OpinionDraft { certainty: submission.certainty, comment: submission.comment };

  let (statement, opinion) = state.engine.submit(statement, draft, own_key).await?;
  Ok((
    StatusCode::CREATED,
    Json(Submitted { statement, opinion: opinion.id, serial: opinion.serial }),
  ))
}
