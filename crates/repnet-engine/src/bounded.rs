//! Deadline wrapper for collaborator calls.

use std::{future::Future, time::Duration};

use repnet_core::{Error, Result};

/// Await `fut` for at most `limit`. Collaborator errors and elapsed deadlines
/// surface as [`Error::StoreUnavailable`]; nothing is retried.
///
/// A collaborator error caused by a record the store could not decode is an
/// [`Error::InvalidRecord`] instead: retrying will not fix stored data.
pub(crate) async fn bounded<F, T, E>(limit: Duration, fut: F) -> Result<T>
where
  F: Future<Output = Result<T, E>>,
  E: std::error::Error + Send + Sync + 'static,
{
  match tokio::time::timeout(limit, fut).await {
    Ok(Ok(value)) => Ok(value),
    Ok(Err(err)) => Err(classify(err)),
    Err(elapsed) => Err(Error::store(elapsed)),
  }
}

fn classify<E>(err: E) -> Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  let mut cause: Option<&(dyn std::error::Error + 'static)> = Some(&err);
  while let Some(e) = cause {
    if let Some(Error::InvalidRecord(why)) = e.downcast_ref::<Error>() {
      return Error::InvalidRecord(why.clone());
    }
    cause = e.source();
  }
  Error::store(err)
}
