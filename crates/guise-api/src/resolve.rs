//! Handlers for `/resolve` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/resolve` | `?target_user_id` required; optional `requester_user_id`, `context_name` |
//! | `POST` | `/resolve/batch` | Body: array of [`ResolveRequest`]; results keep input order |

use axum::{
  Json,
  extract::{Query, State},
};
use guise_core::{
  resolution::{NameResolution, ResolveRequest},
  store::IdentityStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

/// Largest batch accepted by `POST /resolve/batch`.
pub const MAX_BATCH: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ResolveParams {
  pub target_user_id:    Uuid,
  pub requester_user_id: Option<Uuid>,
  pub context_name:      Option<String>,
}

impl From<ResolveParams> for ResolveRequest {
  fn from(params: ResolveParams) -> Self {
    Self {
      target_user_id:    params.target_user_id,
      requester_user_id: params.requester_user_id,
      context_name:      params.context_name,
    }
  }
}

/// `GET /resolve?target_user_id=<id>[&requester_user_id=<id>][&context_name=...]`
pub async fn one<S>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ResolveParams>,
) -> Json<NameResolution>
where
  S: IdentityStore + 'static,
{
  let request = ResolveRequest::from(params);
  Json(state.engine.resolve_name(&request).await)
}

/// `POST /resolve/batch` with body `[{"target_user_id": "..."}, ...]`
pub async fn batch<S>(
  State(state): State<ApiState<S>>,
  Json(requests): Json<Vec<ResolveRequest>>,
) -> Result<Json<Vec<NameResolution>>, ApiError>
where
  S: IdentityStore + 'static,
{
  if requests.len() > MAX_BATCH {
    return Err(ApiError::BadRequest(format!(
      "batch of {} exceeds the limit of {MAX_BATCH}",
      requests.len()
    )));
  }
  Ok(Json(state.engine.resolve_names_async(requests).await))
}
