//! Disclosure audit events.
//!
//! Every resolution produces exactly one [`AuditEvent`], written after the
//! result is computed. Persisted events are read back as [`AuditRecord`]s for
//! compliance review.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error,
  resolution::{Metadata, NameResolution, ResolutionSource, ResolveRequest},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
  NameDisclosed,
}

impl AuditAction {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::NameDisclosed => "NAME_DISCLOSED",
    }
  }
}

impl fmt::Display for AuditAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for AuditAction {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "NAME_DISCLOSED" => Ok(Self::NameDisclosed),
      other => Err(Error::UnknownAuditAction(other.to_owned())),
    }
  }
}

/// An immutable record of one disclosure decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
  pub target_user_id:    Uuid,
  pub requester_user_id: Option<Uuid>,
  pub action:            AuditAction,
  pub source:            ResolutionSource,
  pub resolved_name:     String,
  pub name_id:           Option<Uuid>,
  pub metadata:          Metadata,
}

impl AuditEvent {
  /// The `NAME_DISCLOSED` event for `resolution`, produced for `request`.
  pub fn disclosure(
    request: &ResolveRequest,
    resolution: &NameResolution,
  ) -> Self {
    Self {
      target_user_id:    request.target_user_id,
      requester_user_id: request.requester_user_id,
      action:            AuditAction::NameDisclosed,
      source:            resolution.source,
      resolved_name:     resolution.name.clone(),
      name_id:           resolution.metadata.name_id,
      metadata:          resolution.metadata.clone(),
    }
  }
}

/// A persisted [`AuditEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
  pub audit_id:    Uuid,
  /// Store-assigned write time; distinct from the resolution timestamp.
  pub recorded_at: DateTime<Utc>,
  pub event:       AuditEvent,
}
