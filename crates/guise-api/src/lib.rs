//! JSON REST API for Guise.
//!
//! Exposes an axum [`Router`] backed by any store implementing
//! [`IdentityStore`] and [`AuditTrail`]. Every resolution goes through a
//! [`ResolutionEngine`], so each request is audited exactly like a direct
//! engine call. Auth, TLS, and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", guise_api::api_router(store.clone()))
//! ```

pub mod audit;
pub mod claims;
pub mod error;
pub mod resolve;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use guise_core::store::{AuditTrail, IdentityStore};
use guise_engine::ResolutionEngine;

pub use error::ApiError;

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub engine: ResolutionEngine<S>,
  pub store:  Arc<S>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self { engine: self.engine.clone(), store: Arc::clone(&self.store) }
  }
}

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: IdentityStore + AuditTrail + 'static,
{
  let state = ApiState {
    engine: ResolutionEngine::new(Arc::clone(&store)),
    store,
  };

  Router::new()
    .route("/resolve", get(resolve::one::<S>))
    .route("/resolve/batch", post(resolve::batch::<S>))
    .route("/claims", get(claims::handler::<S>))
    .route("/audit/{user_id}", get(audit::list::<S>))
    .with_state(state)
}
