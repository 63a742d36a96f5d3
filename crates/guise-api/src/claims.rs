//! Handler for `GET /claims`: a resolution projected onto OIDC-shaped
//! claims.

use axum::{
  Json,
  extract::{Query, State},
};
use guise_core::{
  resolution::{NameResolution, ResolutionSource, ResolveRequest},
  store::IdentityStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ApiState;

#[derive(Debug, Deserialize)]
pub struct ClaimsParams {
  /// The subject whose name is being disclosed.
  pub sub:       Uuid,
  /// The relying party asking for the name.
  pub requester: Option<Uuid>,
  /// The audience context the relying party asked for.
  pub context:   Option<String>,
}

/// Identity claims as a relying party sees them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameClaims {
  pub sub:          Uuid,
  pub name:         String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub context_name: Option<String>,
  pub name_source:  ResolutionSource,
}

impl NameClaims {
  pub fn project(sub: Uuid, resolution: NameResolution) -> Self {
    Self {
      sub,
      name: resolution.name,
      context_name: resolution.metadata.context_name,
      name_source: resolution.source,
    }
  }
}

/// `GET /claims?sub=<id>[&requester=<id>][&context=...]`
pub async fn handler<S>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ClaimsParams>,
) -> Json<NameClaims>
where
  S: IdentityStore + 'static,
{
  let request = ResolveRequest {
    target_user_id:    params.sub,
    requester_user_id: params.requester,
    context_name:      params.context,
  };
  let resolution = state.engine.resolve_name(&request).await;
  Json(NameClaims::project(params.sub, resolution))
}
