//! Identity data owned by the relational store.
//!
//! A user registers several name variants, groups audiences into contexts,
//! binds one variant to each context, and grants consents that let a
//! specific requester see the variant bound to a context. The engine only
//! ever reads these records; the lookup shapes below are exactly what it
//! consumes.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

// ─── Name variants ───────────────────────────────────────────────────────────

/// What kind of name a variant is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameType {
  Legal,
  Preferred,
  Nickname,
  Alias,
  Professional,
}

impl NameType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Legal => "legal",
      Self::Preferred => "preferred",
      Self::Nickname => "nickname",
      Self::Alias => "alias",
      Self::Professional => "professional",
    }
  }
}

impl fmt::Display for NameType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for NameType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "legal" => Ok(Self::Legal),
      "preferred" => Ok(Self::Preferred),
      "nickname" => Ok(Self::Nickname),
      "alias" => Ok(Self::Alias),
      "professional" => Ok(Self::Professional),
      other => Err(Error::UnknownNameType(other.to_owned())),
    }
  }
}

/// A stored name variant belonging to one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameVariant {
  pub name_id:      Uuid,
  pub user_id:      Uuid,
  pub name_text:    String,
  pub name_type:    NameType,
  /// At most one variant per user carries this flag.
  pub is_preferred: bool,
  pub created_at:   DateTime<Utc>,
}

// ─── Contexts ────────────────────────────────────────────────────────────────

/// A user-defined audience label, e.g. "Work Colleagues".
/// Context names are unique per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
  pub context_id:   Uuid,
  pub user_id:      Uuid,
  pub context_name: String,
  pub description:  Option<String>,
  pub created_at:   DateTime<Utc>,
}

// ─── Consents ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentStatus {
  Granted,
  Revoked,
}

impl ConsentStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Granted => "granted",
      Self::Revoked => "revoked",
    }
  }
}

impl FromStr for ConsentStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "granted" => Ok(Self::Granted),
      "revoked" => Ok(Self::Revoked),
      other => Err(Error::UnknownConsentStatus(other.to_owned())),
    }
  }
}

/// A time-bounded grant letting `requester_user_id` see the name that
/// `granter_user_id` bound to `context_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consent {
  pub consent_id:        Uuid,
  pub granter_user_id:   Uuid,
  pub requester_user_id: Uuid,
  pub context_id:        Uuid,
  pub status:            ConsentStatus,
  pub granted_at:        DateTime<Utc>,
  /// `None` means the grant never expires.
  pub expires_at:        Option<DateTime<Utc>>,
  pub revoked_at:        Option<DateTime<Utc>>,
}

/// Input to a store's consent-granting operation.
/// `granted_at` is always set by the store.
#[derive(Debug, Clone)]
pub struct NewConsent {
  pub granter_user_id:   Uuid,
  pub requester_user_id: Uuid,
  pub context_id:        Uuid,
  pub expires_at:        Option<DateTime<Utc>>,
}

// ─── Lookup records ──────────────────────────────────────────────────────────

/// An active, non-expired consent as returned by
/// [`IdentityStore::get_active_consent`](crate::store::IdentityStore::get_active_consent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentGrant {
  pub consent_id:   Uuid,
  pub context_id:   Uuid,
  pub context_name: String,
  pub granted_at:   DateTime<Utc>,
  pub expires_at:   Option<DateTime<Utc>>,
}

/// The name bound to a (user, context) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextAssignment {
  pub name_id:      Uuid,
  pub name_text:    String,
  pub context_id:   Uuid,
  pub context_name: String,
  pub name_type:    NameType,
}

/// A user's designated default name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferredName {
  pub name_id:      Uuid,
  pub name_text:    String,
  pub name_type:    NameType,
  pub is_preferred: bool,
}
