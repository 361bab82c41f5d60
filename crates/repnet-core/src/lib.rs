//! Core types and trait definitions for the repnet reputation engine.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! defines the record shapes a store hands to the engine, the typed ids, the
//! canonical opinion encoding and its signature check, and the traits behind
//! which the record store, key store, and trust provider live.

pub mod bound;
pub mod entity;
pub mod error;
pub mod id;
pub mod record;
pub mod signing;
pub mod store;
pub mod verdict;

pub use error::{Error, Result};
