//! Handler for `GET /audit/{user_id}`: recent disclosures of a user's name.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use guise_core::{audit::AuditRecord, store::AuditTrail};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub limit: Option<usize>,
}

/// `GET /audit/{user_id}[?limit=...]`, newest first.
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  Path(user_id): Path<Uuid>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<AuditRecord>>, ApiError>
where
  S: AuditTrail + 'static,
{
  let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
  let records = state
    .store
    .recent_disclosures(user_id, limit)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(records))
}
