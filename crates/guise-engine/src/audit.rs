//! Detached audit writes.

use std::sync::Arc;

use guise_core::{audit::AuditEvent, store::IdentityStore};
use tokio::task::JoinHandle;

/// Hand `event` to a background task that writes it through `store`.
///
/// Failures are logged and dropped here; nothing flows back to the
/// resolution that produced the event. The handle may be dropped to detach.
pub(crate) fn dispatch<S>(store: Arc<S>, event: AuditEvent) -> JoinHandle<()>
where
  S: IdentityStore + 'static,
{
  tokio::spawn(async move {
    let target_user_id = event.target_user_id;
    let source = event.source;
    match store.insert_audit_event(event).await {
      Ok(()) => tracing::trace!(
        target_user_id = %target_user_id,
        source = %source,
        "recorded name disclosure"
      ),
      Err(e) => tracing::warn!(
        target_user_id = %target_user_id,
        source = %source,
        error = %e,
        "failed to record name disclosure"
      ),
    }
  })
}
