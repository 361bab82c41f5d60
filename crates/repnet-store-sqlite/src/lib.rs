//! SQLite backend for the repnet record store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Implements both
//! [`RecordStore`](repnet_core::store::RecordStore) and
//! [`KeyStore`](repnet_core::store::KeyStore), and owns the write path and
//! schema migrations.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use schema::SCHEMA_VERSION;
pub use store::SqliteStore;
