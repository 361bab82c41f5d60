//! Statement matching and opinion aggregation.
//!
//! Given a query about an entity, the [`Engine`] finds every statement that
//! applies to it (by exact label and by address-range containment), collects
//! and verifies the signed opinions on those statements, and folds them into
//! one trust-weighted [`Verdict`](repnet_core::verdict::Verdict).
//!
//! Resolution only reads. The one write path, [`Engine::submit`], stores a
//! node's own statement and signed opinion. Storage, key distribution, and
//! trust computation are supplied through the traits in
//! [`repnet_core::store`].

pub mod aggregate;
pub mod cancel;
pub mod collector;
pub mod engine;
pub mod index;

mod bounded;

pub use cancel::CancelToken;
pub use engine::{Engine, EngineConfig, OpinionDraft};
pub use index::{CidrIndex, IndexHandle};

#[cfg(test)]
mod tests;
