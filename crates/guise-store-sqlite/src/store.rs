//! [`SqliteStore`]: the SQLite implementation of [`IdentityStore`] and
//! [`AuditTrail`].

use std::path::Path;

use chrono::Utc;
use guise_core::{
  audit::{AuditEvent, AuditRecord},
  identity::{
    Consent, ConsentGrant, ConsentStatus, Context, ContextAssignment, NameType,
    NameVariant, NewConsent, PreferredName,
  },
  store::{AuditTrail, IdentityStore},
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    RawAssignment, RawAuditRecord, RawConsent, RawConsentGrant, RawContext,
    RawNameVariant, encode_dt, encode_metadata, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Guise identity data backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Names ─────────────────────────────────────────────────────────────

  /// Register a new name variant for `user_id`. It is not preferred until
  /// [`Self::set_preferred`] is called.
  pub async fn add_name(
    &self,
    user_id: Uuid,
    name_text: impl Into<String>,
    name_type: NameType,
  ) -> Result<NameVariant> {
    let name = NameVariant {
      name_id: Uuid::new_v4(),
      user_id,
      name_text: name_text.into(),
      name_type,
      is_preferred: false,
      created_at: Utc::now(),
    };

    let id_str   = encode_uuid(name.name_id);
    let user_str = encode_uuid(user_id);
    let text     = name.name_text.clone();
    let type_str = name_type.as_str();
    let at_str   = encode_dt(name.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO names (name_id, user_id, name_text, name_type, is_preferred, created_at)
           VALUES (?1, ?2, ?3, ?4, 0, ?5)",
          rusqlite::params![id_str, user_str, text, type_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(name)
  }

  /// Retrieve a name variant by UUID. Returns `None` if not found.
  pub async fn get_name(&self, name_id: Uuid) -> Result<Option<NameVariant>> {
    let id_str = encode_uuid(name_id);

    let raw: Option<RawNameVariant> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM names WHERE name_id = ?1",
          RawNameVariant::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawNameVariant::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawNameVariant::into_variant).transpose()
  }

  /// All name variants registered by `user_id`, oldest first.
  pub async fn list_names(&self, user_id: Uuid) -> Result<Vec<NameVariant>> {
    let user_str = encode_uuid(user_id);

    let raws: Vec<RawNameVariant> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM names WHERE user_id = ?1 ORDER BY created_at",
          RawNameVariant::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![user_str], RawNameVariant::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawNameVariant::into_variant).collect()
  }

  /// Make `name_id` its owner's preferred name, clearing the previous one.
  pub async fn set_preferred(&self, name_id: Uuid) -> Result<NameVariant> {
    let name = self
      .get_name(name_id)
      .await?
      .ok_or(Error::NameNotFound(name_id))?;

    let id_str   = encode_uuid(name_id);
    let user_str = encode_uuid(name.user_id);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "UPDATE names SET is_preferred = 0 WHERE user_id = ?1 AND is_preferred = 1",
          rusqlite::params![user_str],
        )?;
        tx.execute(
          "UPDATE names SET is_preferred = 1 WHERE name_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(NameVariant { is_preferred: true, ..name })
  }

  // ── Contexts ──────────────────────────────────────────────────────────

  /// Create a context called `context_name` for `user_id`.
  ///
  /// Returns [`Error::DuplicateContext`] if the user already has one by that
  /// name.
  pub async fn create_context(
    &self,
    user_id: Uuid,
    context_name: impl Into<String>,
    description: Option<String>,
  ) -> Result<Context> {
    let context = Context {
      context_id: Uuid::new_v4(),
      user_id,
      context_name: context_name.into(),
      description,
      created_at: Utc::now(),
    };

    let id_str   = encode_uuid(context.context_id);
    let user_str = encode_uuid(user_id);
    let name     = context.context_name.clone();
    let desc     = context.description.clone();
    let at_str   = encode_dt(context.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        let taken = conn
          .query_row(
            "SELECT 1 FROM contexts WHERE user_id = ?1 AND context_name = ?2",
            rusqlite::params![user_str, name],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if taken {
          return Ok(false);
        }

        conn.execute(
          "INSERT INTO contexts (context_id, user_id, context_name, description, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, user_str, name, desc, at_str],
        )?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Err(Error::DuplicateContext {
        user_id,
        context_name: context.context_name,
      });
    }
    Ok(context)
  }

  /// Retrieve a context by UUID. Returns `None` if not found.
  pub async fn get_context(&self, context_id: Uuid) -> Result<Option<Context>> {
    let id_str = encode_uuid(context_id);

    let raw: Option<RawContext> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT context_id, user_id, context_name, description, created_at
               FROM contexts WHERE context_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawContext {
                  context_id:   row.get(0)?,
                  user_id:      row.get(1)?,
                  context_name: row.get(2)?,
                  description:  row.get(3)?,
                  created_at:   row.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawContext::into_context).transpose()
  }

  /// Bind `name_id` to `context_id`, replacing any previous binding.
  ///
  /// Both must belong to the same user.
  pub async fn assign_name(
    &self,
    context_id: Uuid,
    name_id: Uuid,
  ) -> Result<ContextAssignment> {
    let context = self
      .get_context(context_id)
      .await?
      .ok_or(Error::ContextNotFound(context_id))?;
    let name = self
      .get_name(name_id)
      .await?
      .ok_or(Error::NameNotFound(name_id))?;

    if name.user_id != context.user_id {
      return Err(Error::OwnerMismatch {
        entity:  "name",
        id:      name_id,
        user_id: context.user_id,
      });
    }

    let context_str = encode_uuid(context_id);
    let name_str    = encode_uuid(name_id);
    let user_str    = encode_uuid(context.user_id);
    let at_str      = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO context_name_assignments (context_id, name_id, user_id, assigned_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![context_str, name_str, user_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(ContextAssignment {
      name_id,
      name_text: name.name_text,
      context_id,
      context_name: context.context_name,
      name_type: name.name_type,
    })
  }

  // ── Consents ──────────────────────────────────────────────────────────

  /// Record that `input.granter_user_id` lets `input.requester_user_id` see
  /// the name bound to `input.context_id`.
  pub async fn grant_consent(&self, input: NewConsent) -> Result<Consent> {
    let context = self
      .get_context(input.context_id)
      .await?
      .ok_or(Error::ContextNotFound(input.context_id))?;

    if context.user_id != input.granter_user_id {
      return Err(Error::OwnerMismatch {
        entity:  "context",
        id:      input.context_id,
        user_id: input.granter_user_id,
      });
    }

    let consent = Consent {
      consent_id:        Uuid::new_v4(),
      granter_user_id:   input.granter_user_id,
      requester_user_id: input.requester_user_id,
      context_id:        input.context_id,
      status:            ConsentStatus::Granted,
      granted_at:        Utc::now(),
      expires_at:        input.expires_at,
      revoked_at:        None,
    };

    let id_str        = encode_uuid(consent.consent_id);
    let granter_str   = encode_uuid(consent.granter_user_id);
    let requester_str = encode_uuid(consent.requester_user_id);
    let context_str   = encode_uuid(consent.context_id);
    let status_str    = consent.status.as_str();
    let granted_str   = encode_dt(consent.granted_at);
    let expires_str   = consent.expires_at.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO consents (
             consent_id, granter_user_id, requester_user_id, context_id,
             status, granted_at, expires_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            id_str,
            granter_str,
            requester_str,
            context_str,
            status_str,
            granted_str,
            expires_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(consent)
  }

  /// Retrieve a consent by UUID, whatever its status.
  pub async fn get_consent(&self, consent_id: Uuid) -> Result<Option<Consent>> {
    let id_str = encode_uuid(consent_id);

    let raw: Option<RawConsent> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM consents WHERE consent_id = ?1",
          RawConsent::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawConsent::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawConsent::into_consent).transpose()
  }

  /// Withdraw a consent. Revoking twice is a no-op.
  pub async fn revoke_consent(&self, consent_id: Uuid) -> Result<Consent> {
    let id_str = encode_uuid(consent_id);
    let at_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE consents SET status = 'revoked', revoked_at = ?2
           WHERE consent_id = ?1 AND status = 'granted'",
          rusqlite::params![id_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    self
      .get_consent(consent_id)
      .await?
      .ok_or(Error::ConsentNotFound(consent_id))
  }
}

// ─── IdentityStore impl ──────────────────────────────────────────────────────

impl IdentityStore for SqliteStore {
  type Error = Error;

  async fn get_active_consent(
    &self,
    target_user_id:    Uuid,
    requester_user_id: Uuid,
  ) -> Result<Option<ConsentGrant>> {
    let target_str    = encode_uuid(target_user_id);
    let requester_str = encode_uuid(requester_user_id);
    let now_str       = encode_dt(Utc::now());

    let raw: Option<RawConsentGrant> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT c.consent_id, c.context_id, x.context_name, c.granted_at, c.expires_at
               FROM consents c
               JOIN contexts x ON x.context_id = c.context_id
               WHERE c.granter_user_id   = ?1
                 AND c.requester_user_id = ?2
                 AND c.status = 'granted'
                 AND (c.expires_at IS NULL OR c.expires_at > ?3)
               ORDER BY c.granted_at DESC
               LIMIT 1",
              rusqlite::params![target_str, requester_str, now_str],
              |row| {
                Ok(RawConsentGrant {
                  consent_id:   row.get(0)?,
                  context_id:   row.get(1)?,
                  context_name: row.get(2)?,
                  granted_at:   row.get(3)?,
                  expires_at:   row.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawConsentGrant::into_grant).transpose()
  }

  async fn get_context_assignment(
    &self,
    user_id:      Uuid,
    context_name: &str,
  ) -> Result<Option<ContextAssignment>> {
    let user_str = encode_uuid(user_id);
    let name     = context_name.to_owned();

    let raw: Option<RawAssignment> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT n.name_id, n.name_text, n.name_type, x.context_id, x.context_name
               FROM contexts x
               JOIN context_name_assignments a ON a.context_id = x.context_id
               JOIN names n                    ON n.name_id    = a.name_id
               WHERE x.user_id = ?1 AND x.context_name = ?2",
              rusqlite::params![user_str, name],
              |row| {
                Ok(RawAssignment {
                  name_id:      row.get(0)?,
                  name_text:    row.get(1)?,
                  name_type:    row.get(2)?,
                  context_id:   row.get(3)?,
                  context_name: row.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAssignment::into_assignment).transpose()
  }

  async fn get_preferred_name(&self, user_id: Uuid) -> Result<Option<PreferredName>> {
    let user_str = encode_uuid(user_id);

    let raw: Option<RawNameVariant> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM names WHERE user_id = ?1 AND is_preferred = 1",
          RawNameVariant::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![user_str], RawNameVariant::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawNameVariant::into_preferred).transpose()
  }

  async fn get_name_text(&self, name_id: Uuid) -> Result<Option<String>> {
    let id_str = encode_uuid(name_id);

    let text = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT name_text FROM names WHERE name_id = ?1",
              rusqlite::params![id_str],
              |row| row.get::<_, String>(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(text)
  }

  async fn insert_audit_event(&self, event: AuditEvent) -> Result<()> {
    let audit_id_str  = encode_uuid(Uuid::new_v4());
    let target_str    = encode_uuid(event.target_user_id);
    let requester_str = event.requester_user_id.map(encode_uuid);
    let action_str    = event.action.as_str();
    let source_str    = event.source.as_str();
    let name_id_str   = event.name_id.map(encode_uuid);
    let metadata_str  = encode_metadata(&event.metadata)?;
    let recorded_str  = encode_dt(Utc::now());
    let resolved_name = event.resolved_name;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO audit_log (
             audit_id, target_user_id, requester_user_id, action, source,
             resolved_name, name_id, metadata_json, recorded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            audit_id_str,
            target_str,
            requester_str,
            action_str,
            source_str,
            resolved_name,
            name_id_str,
            metadata_str,
            recorded_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── AuditTrail impl ─────────────────────────────────────────────────────────

impl AuditTrail for SqliteStore {
  type Error = Error;

  async fn recent_disclosures(
    &self,
    target_user_id: Uuid,
    limit:          usize,
  ) -> Result<Vec<AuditRecord>> {
    let target_str = encode_uuid(target_user_id);
    let limit_val  = limit as i64;

    let raws: Vec<RawAuditRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT audit_id, target_user_id, requester_user_id, action, source,
                  resolved_name, name_id, metadata_json, recorded_at
           FROM audit_log
           WHERE target_user_id = ?1
           ORDER BY recorded_at DESC, rowid DESC
           LIMIT ?2",
        )?;

        let rows = stmt
          .query_map(rusqlite::params![target_str, limit_val], |row| {
            Ok(RawAuditRecord {
              audit_id:          row.get(0)?,
              target_user_id:    row.get(1)?,
              requester_user_id: row.get(2)?,
              action:            row.get(3)?,
              source:            row.get(4)?,
              resolved_name:     row.get(5)?,
              name_id:           row.get(6)?,
              metadata_json:     row.get(7)?,
              recorded_at:       row.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAuditRecord::into_record).collect()
  }
}
