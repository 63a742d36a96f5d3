//! Resolution request and result types.
//!
//! A [`NameResolution`] is a request-scoped value: it is produced once per
//! call, never mutated, and carries enough provenance in its [`Metadata`] to
//! explain which path produced the disclosed name.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

// ─── Request ─────────────────────────────────────────────────────────────────

/// Whose name to disclose, to whom, and for which audience.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRequest {
  pub target_user_id:    Uuid,
  /// Enables the consent path when present.
  #[serde(default)]
  pub requester_user_id: Option<Uuid>,
  /// Enables the context path when present and non-blank.
  #[serde(default)]
  pub context_name:      Option<String>,
}

impl ResolveRequest {
  pub fn new(target_user_id: Uuid) -> Self {
    Self { target_user_id, requester_user_id: None, context_name: None }
  }

  pub fn with_requester(mut self, requester_user_id: Uuid) -> Self {
    self.requester_user_id = Some(requester_user_id);
    self
  }

  pub fn with_context(mut self, context_name: impl Into<String>) -> Self {
    self.context_name = Some(context_name.into());
    self
  }

  /// The requested context, trimmed. `None` when absent or blank.
  pub fn requested_context(&self) -> Option<&str> {
    self
      .context_name
      .as_deref()
      .map(str::trim)
      .filter(|name| !name.is_empty())
  }

  pub fn has_requester(&self) -> bool { self.requester_user_id.is_some() }
}

// ─── Source ──────────────────────────────────────────────────────────────────

/// Which step of the priority chain produced a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
  ConsentBased,
  ContextSpecific,
  PreferredFallback,
  ErrorFallback,
}

impl ResolutionSource {
  /// Must match the `rename_all = "snake_case"` serde tags above.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::ConsentBased => "consent_based",
      Self::ContextSpecific => "context_specific",
      Self::PreferredFallback => "preferred_fallback",
      Self::ErrorFallback => "error_fallback",
    }
  }
}

impl fmt::Display for ResolutionSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ResolutionSource {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "consent_based" => Ok(Self::ConsentBased),
      "context_specific" => Ok(Self::ContextSpecific),
      "preferred_fallback" => Ok(Self::PreferredFallback),
      "error_fallback" => Ok(Self::ErrorFallback),
      other => Err(Error::UnknownSource(other.to_owned())),
    }
  }
}

// ─── Fallback reasons ────────────────────────────────────────────────────────

/// Why resolution reached the preferred-name fallback.
///
/// Derived from the shape of the request alone, never from lookup outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
  NoConsentAndNoContextAssignment,
  NoActiveConsent,
  ContextNotFoundOrNoAssignment,
  NoSpecificRequest,
}

impl FallbackReason {
  pub fn from_request_shape(has_requester: bool, has_context: bool) -> Self {
    match (has_requester, has_context) {
      (true, true) => Self::NoConsentAndNoContextAssignment,
      (true, false) => Self::NoActiveConsent,
      (false, true) => Self::ContextNotFoundOrNoAssignment,
      (false, false) => Self::NoSpecificRequest,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::NoConsentAndNoContextAssignment => {
        "no_consent_and_no_context_assignment"
      }
      Self::NoActiveConsent => "no_active_consent",
      Self::ContextNotFoundOrNoAssignment => {
        "context_not_found_or_no_assignment"
      }
      Self::NoSpecificRequest => "no_specific_request",
    }
  }

  /// The code reported when the fallback lookup itself succeeded (or
  /// returned nothing).
  pub fn code(self) -> FallbackCode {
    FallbackCode { reason: self, database_error: false }
  }

  /// The code reported when the fallback lookup failed.
  pub fn with_database_error(self) -> FallbackCode {
    FallbackCode { reason: self, database_error: true }
  }
}

const DATABASE_ERROR_SUFFIX: &str = "_with_database_error";

/// A [`FallbackReason`] plus whether the fallback lookup failed.
///
/// Serialised as a single string, e.g. `no_active_consent` or
/// `no_active_consent_with_database_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct FallbackCode {
  pub reason:         FallbackReason,
  pub database_error: bool,
}

impl fmt::Display for FallbackCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.reason.as_str())?;
    if self.database_error {
      f.write_str(DATABASE_ERROR_SUFFIX)?;
    }
    Ok(())
  }
}

impl FromStr for FallbackCode {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (base, database_error) = match s.strip_suffix(DATABASE_ERROR_SUFFIX) {
      Some(base) => (base, true),
      None => (s, false),
    };
    let reason = match base {
      "no_consent_and_no_context_assignment" => {
        FallbackReason::NoConsentAndNoContextAssignment
      }
      "no_active_consent" => FallbackReason::NoActiveConsent,
      "context_not_found_or_no_assignment" => {
        FallbackReason::ContextNotFoundOrNoAssignment
      }
      "no_specific_request" => FallbackReason::NoSpecificRequest,
      _ => return Err(Error::UnknownFallbackReason(s.to_owned())),
    };
    Ok(Self { reason, database_error })
  }
}

impl From<FallbackCode> for String {
  fn from(code: FallbackCode) -> Self { code.to_string() }
}

impl TryFrom<String> for FallbackCode {
  type Error = Error;

  fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

// ─── Result ──────────────────────────────────────────────────────────────────

/// Provenance attached to every [`NameResolution`]. Which optional fields
/// are populated depends on the [`ResolutionSource`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
  pub resolution_timestamp: DateTime<Utc>,
  /// Wall time spent resolving, in milliseconds.
  pub performance_ms:       f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub context_id:           Option<Uuid>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub context_name:         Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name_id:              Option<Uuid>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub consent_id:           Option<Uuid>,
  /// Set if and only if the source is [`ResolutionSource::PreferredFallback`].
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fallback_reason:      Option<FallbackCode>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub requested_context:    Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub had_requester:        Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error:                Option<String>,
}

impl Metadata {
  /// Metadata stamped now with the given elapsed time and no provenance.
  pub fn new(performance_ms: f64) -> Self {
    Self {
      resolution_timestamp: Utc::now(),
      performance_ms: performance_ms.max(0.0),
      context_id: None,
      context_name: None,
      name_id: None,
      consent_id: None,
      fallback_reason: None,
      requested_context: None,
      had_requester: None,
      error: None,
    }
  }
}

/// The name disclosed for one request, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameResolution {
  pub name:     String,
  pub source:   ResolutionSource,
  pub metadata: Metadata,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fallback_reason_follows_request_shape() {
    assert_eq!(
      FallbackReason::from_request_shape(true, true),
      FallbackReason::NoConsentAndNoContextAssignment
    );
    assert_eq!(
      FallbackReason::from_request_shape(true, false),
      FallbackReason::NoActiveConsent
    );
    assert_eq!(
      FallbackReason::from_request_shape(false, true),
      FallbackReason::ContextNotFoundOrNoAssignment
    );
    assert_eq!(
      FallbackReason::from_request_shape(false, false),
      FallbackReason::NoSpecificRequest
    );
  }

  #[test]
  fn fallback_code_appends_database_error_suffix() {
    let code = FallbackReason::NoActiveConsent.with_database_error();
    assert_eq!(code.to_string(), "no_active_consent_with_database_error");

    let parsed: FallbackCode =
      "no_active_consent_with_database_error".parse().unwrap();
    assert_eq!(parsed, code);
  }

  #[test]
  fn fallback_code_rejects_unknown_reason() {
    let err = "no_reason_at_all".parse::<FallbackCode>().unwrap_err();
    assert!(matches!(err, Error::UnknownFallbackReason(_)));
  }

  #[test]
  fn blank_context_is_not_a_request() {
    let target = Uuid::new_v4();
    assert_eq!(ResolveRequest::new(target).requested_context(), None);
    assert_eq!(
      ResolveRequest::new(target).with_context("   ").requested_context(),
      None
    );
    assert_eq!(
      ResolveRequest::new(target)
        .with_context("  Work ")
        .requested_context(),
      Some("Work")
    );
  }

  #[test]
  fn metadata_omits_unset_fields() {
    let mut metadata = Metadata::new(1.5);
    metadata.fallback_reason = Some(FallbackReason::NoSpecificRequest.code());

    let json = serde_json::to_value(&metadata).unwrap();
    assert_eq!(json["fallback_reason"], "no_specific_request");
    assert!(json.get("consent_id").is_none());
    assert!(json.get("error").is_none());
  }

  #[test]
  fn negative_elapsed_time_is_clamped() {
    assert_eq!(Metadata::new(-3.0).performance_ms, 0.0);
  }
}
