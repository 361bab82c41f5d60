//! Cooperative cancellation for in-flight resolutions.

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use repnet_core::{Error, Result};

/// A cloneable flag shared between a caller and a running resolution.
///
/// The resolver checks it before each candidate statement; once set, the
/// resolution stops with [`Error::Cancelled`] and returns no partial verdict.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  pub fn new() -> Self { Self::default() }

  pub fn cancel(&self) { self.0.store(true, Ordering::Release); }

  pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Acquire) }

  pub fn check(&self) -> Result<()> {
    if self.is_cancelled() { Err(Error::Cancelled) } else { Ok(()) }
  }
}
