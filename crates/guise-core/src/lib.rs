//! Core types and trait definitions for Guise name disclosure.
//!
//! No HTTP, database or runtime dependencies live here. The engine, the
//! store backends and the API all build on it.

// Store implementations use native `async fn` against `Send` trait futures.
#![allow(async_fn_in_trait)]

pub mod audit;
pub mod error;
pub mod identity;
pub mod resolution;
pub mod store;

pub use error::{Error, Result};

/// The name disclosed when no stored variant can be resolved.
pub const ANONYMOUS_NAME: &str = "Anonymous User";
