//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings (microsecond
//! precision, `Z` suffix) so that SQL string comparison orders them
//! chronologically. Resolution metadata is stored as compact JSON. UUIDs are
//! stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use guise_core::{
  audit::{AuditEvent, AuditRecord},
  identity::{
    Consent, ConsentGrant, Context, ContextAssignment, NameType, NameVariant,
    PreferredName,
  },
  resolution::Metadata,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Metadata ────────────────────────────────────────────────────────────────

pub fn encode_metadata(metadata: &Metadata) -> Result<String> {
  Ok(serde_json::to_string(metadata)?)
}

pub fn decode_metadata(s: &str) -> Result<Metadata> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `names` row.
pub struct RawNameVariant {
  pub name_id:      String,
  pub user_id:      String,
  pub name_text:    String,
  pub name_type:    String,
  pub is_preferred: bool,
  pub created_at:   String,
}

impl RawNameVariant {
  pub const COLUMNS: &'static str =
    "name_id, user_id, name_text, name_type, is_preferred, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      name_id:      row.get(0)?,
      user_id:      row.get(1)?,
      name_text:    row.get(2)?,
      name_type:    row.get(3)?,
      is_preferred: row.get(4)?,
      created_at:   row.get(5)?,
    })
  }

  pub fn into_variant(self) -> Result<NameVariant> {
    Ok(NameVariant {
      name_id:      decode_uuid(&self.name_id)?,
      user_id:      decode_uuid(&self.user_id)?,
      name_text:    self.name_text,
      name_type:    self.name_type.parse::<NameType>()?,
      is_preferred: self.is_preferred,
      created_at:   decode_dt(&self.created_at)?,
    })
  }

  pub fn into_preferred(self) -> Result<PreferredName> {
    Ok(PreferredName {
      name_id:      decode_uuid(&self.name_id)?,
      name_text:    self.name_text,
      name_type:    self.name_type.parse::<NameType>()?,
      is_preferred: self.is_preferred,
    })
  }
}

/// Raw strings read directly from a `contexts` row.
pub struct RawContext {
  pub context_id:   String,
  pub user_id:      String,
  pub context_name: String,
  pub description:  Option<String>,
  pub created_at:   String,
}

impl RawContext {
  pub fn into_context(self) -> Result<Context> {
    Ok(Context {
      context_id:   decode_uuid(&self.context_id)?,
      user_id:      decode_uuid(&self.user_id)?,
      context_name: self.context_name,
      description:  self.description,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings for a context joined with its assigned name.
pub struct RawAssignment {
  pub name_id:      String,
  pub name_text:    String,
  pub name_type:    String,
  pub context_id:   String,
  pub context_name: String,
}

impl RawAssignment {
  pub fn into_assignment(self) -> Result<ContextAssignment> {
    Ok(ContextAssignment {
      name_id:      decode_uuid(&self.name_id)?,
      name_text:    self.name_text,
      context_id:   decode_uuid(&self.context_id)?,
      context_name: self.context_name,
      name_type:    self.name_type.parse()?,
    })
  }
}

/// Raw strings read directly from a `consents` row.
pub struct RawConsent {
  pub consent_id:        String,
  pub granter_user_id:   String,
  pub requester_user_id: String,
  pub context_id:        String,
  pub status:            String,
  pub granted_at:        String,
  pub expires_at:        Option<String>,
  pub revoked_at:        Option<String>,
}

impl RawConsent {
  pub const COLUMNS: &'static str = "consent_id, granter_user_id, requester_user_id, \
                             context_id, status, granted_at, expires_at, \
                             revoked_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      consent_id:        row.get(0)?,
      granter_user_id:   row.get(1)?,
      requester_user_id: row.get(2)?,
      context_id:        row.get(3)?,
      status:            row.get(4)?,
      granted_at:        row.get(5)?,
      expires_at:        row.get(6)?,
      revoked_at:        row.get(7)?,
    })
  }

  pub fn into_consent(self) -> Result<Consent> {
    Ok(Consent {
      consent_id:        decode_uuid(&self.consent_id)?,
      granter_user_id:   decode_uuid(&self.granter_user_id)?,
      requester_user_id: decode_uuid(&self.requester_user_id)?,
      context_id:        decode_uuid(&self.context_id)?,
      status:            self.status.parse()?,
      granted_at:        decode_dt(&self.granted_at)?,
      expires_at:        decode_opt_dt(self.expires_at)?,
      revoked_at:        decode_opt_dt(self.revoked_at)?,
    })
  }
}

/// Raw strings for a consent joined with its context.
pub struct RawConsentGrant {
  pub consent_id:   String,
  pub context_id:   String,
  pub context_name: String,
  pub granted_at:   String,
  pub expires_at:   Option<String>,
}

impl RawConsentGrant {
  pub fn into_grant(self) -> Result<ConsentGrant> {
    Ok(ConsentGrant {
      consent_id:   decode_uuid(&self.consent_id)?,
      context_id:   decode_uuid(&self.context_id)?,
      context_name: self.context_name,
      granted_at:   decode_dt(&self.granted_at)?,
      expires_at:   decode_opt_dt(self.expires_at)?,
    })
  }
}

/// Raw strings read directly from an `audit_log` row.
pub struct RawAuditRecord {
  pub audit_id:          String,
  pub target_user_id:    String,
  pub requester_user_id: Option<String>,
  pub action:            String,
  pub source:            String,
  pub resolved_name:     String,
  pub name_id:           Option<String>,
  pub metadata_json:     String,
  pub recorded_at:       String,
}

impl RawAuditRecord {
  pub fn into_record(self) -> Result<AuditRecord> {
    Ok(AuditRecord {
      audit_id:    decode_uuid(&self.audit_id)?,
      recorded_at: decode_dt(&self.recorded_at)?,
      event:       AuditEvent {
        target_user_id:    decode_uuid(&self.target_user_id)?,
        requester_user_id: decode_opt_uuid(self.requester_user_id)?,
        action:            self.action.parse()?,
        source:            self.source.parse()?,
        resolved_name:     self.resolved_name,
        name_id:           decode_opt_uuid(self.name_id)?,
        metadata:          decode_metadata(&self.metadata_json)?,
      },
    })
  }
}
