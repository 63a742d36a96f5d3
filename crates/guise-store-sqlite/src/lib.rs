//! SQLite backend for Guise identity data.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Implements both
//! [`IdentityStore`](guise_core::store::IdentityStore) and
//! [`AuditTrail`](guise_core::store::AuditTrail), plus the write operations
//! needed to seed names, contexts, and consents.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
