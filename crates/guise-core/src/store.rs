//! The collaborator traits the resolution engine is built on.
//!
//! Backends (e.g. `guise-store-sqlite`) implement these; the engine and the
//! API depend only on the abstraction, never on a concrete backend. A failed
//! lookup is an `Err` value. It is never used to signal "not found".

use std::future::Future;

use uuid::Uuid;

use crate::{
  audit::{AuditEvent, AuditRecord},
  identity::{ConsentGrant, ContextAssignment, PreferredName},
};

/// Read-only identity lookups plus the audit sink.
///
/// All methods return `Send` futures so the trait can be used from spawned
/// tasks in multi-threaded runtimes.
pub trait IdentityStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The active, non-expired consent from `target_user_id` to
  /// `requester_user_id`, if any.
  fn get_active_consent(
    &self,
    target_user_id: Uuid,
    requester_user_id: Uuid,
  ) -> impl Future<Output = Result<Option<ConsentGrant>, Self::Error>> + Send + '_;

  /// The name `user_id` bound to the context called `context_name`, if any.
  fn get_context_assignment<'a>(
    &'a self,
    user_id: Uuid,
    context_name: &'a str,
  ) -> impl Future<Output = Result<Option<ContextAssignment>, Self::Error>>
  + Send
  + 'a;

  /// The user's designated default name, if any.
  fn get_preferred_name(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<PreferredName>, Self::Error>> + Send + '_;

  /// The literal text of a name variant.
  fn get_name_text(
    &self,
    name_id: Uuid,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + '_;

  /// Persist one disclosure event.
  fn insert_audit_event(
    &self,
    event: AuditEvent,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

/// Read access to persisted disclosure events, for compliance review.
pub trait AuditTrail: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The most recent disclosures of `target_user_id`'s name, newest first.
  fn recent_disclosures(
    &self,
    target_user_id: Uuid,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<AuditRecord>, Self::Error>> + Send + '_;
}
