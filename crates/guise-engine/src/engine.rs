//! [`ResolutionEngine`]: the priority chain behind every disclosure.

use std::{
  any::Any, fmt::Display, panic::AssertUnwindSafe, sync::Arc, time::Instant,
};

use futures::FutureExt as _;
use guise_core::{
  ANONYMOUS_NAME,
  audit::AuditEvent,
  resolution::{
    FallbackReason, Metadata, NameResolution, ResolutionSource, ResolveRequest,
  },
  store::IdentityStore,
};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::audit;

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Resolves which name variant to disclose for a request.
///
/// The engine holds nothing but the injected store, so it is stateless
/// across calls and cloning is cheap.
pub struct ResolutionEngine<S> {
  store: Arc<S>,
}

impl<S> Clone for ResolutionEngine<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S> ResolutionEngine<S>
where
  S: IdentityStore + 'static,
{
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Resolve the name to disclose for `request`.
  ///
  /// Never fails: lookup errors advance the priority chain, and anything
  /// that aborts resolution yields an [`ResolutionSource::ErrorFallback`]
  /// result. One `NAME_DISCLOSED` audit event is written in the background;
  /// its outcome never affects the returned value.
  pub async fn resolve_name(&self, request: &ResolveRequest) -> NameResolution {
    let (resolution, _audit) = self.resolve_and_dispatch(request).await;
    resolution
  }

  /// Like [`Self::resolve_name`], but waits for the audit write to finish
  /// before returning. The write's outcome is still only logged.
  pub async fn resolve_name_with_audit(
    &self,
    request: &ResolveRequest,
  ) -> NameResolution {
    let (resolution, audit) = self.resolve_and_dispatch(request).await;
    if let Err(e) = audit.await {
      tracing::warn!(
        target_user_id = %request.target_user_id,
        error = %e,
        "audit task did not complete"
      );
    }
    resolution
  }

  async fn resolve_and_dispatch(
    &self,
    request: &ResolveRequest,
  ) -> (NameResolution, JoinHandle<()>) {
    let started = Instant::now();

    let outcome = AssertUnwindSafe(self.resolve_by_priority(request, started))
      .catch_unwind()
      .await;

    let resolution = match outcome {
      Ok(resolution) => resolution,
      Err(panic) => {
        let message = panic_message(panic.as_ref());
        tracing::error!(
          target_user_id = %request.target_user_id,
          error = %message,
          "name resolution aborted; disclosing anonymous name"
        );
        error_fallback(request, message, elapsed_ms(started))
      }
    };

    let audit = audit::dispatch(
      Arc::clone(&self.store),
      AuditEvent::disclosure(request, &resolution),
    );
    (resolution, audit)
  }

  /// Consent, then context, then the preferred name. First success wins.
  async fn resolve_by_priority(
    &self,
    request: &ResolveRequest,
    started: Instant,
  ) -> NameResolution {
    let target = request.target_user_id;

    if let Some(requester) = request.requester_user_id {
      if let Some(resolution) =
        self.resolve_by_consent(target, requester, started).await
      {
        return resolution;
      }
      tracing::debug!(
        target_user_id = %target,
        requester_user_id = %requester,
        "no usable consent"
      );
    }

    if let Some(context_name) = request.requested_context() {
      if let Some(resolution) =
        self.resolve_by_context(request, context_name, started).await
      {
        return resolution;
      }
      tracing::debug!(
        target_user_id = %target,
        context_name,
        "no assignment for requested context"
      );
    }

    self.resolve_preferred(request, started).await
  }

  // ── Consent-based ─────────────────────────────────────────────────────

  async fn resolve_by_consent(
    &self,
    target: Uuid,
    requester: Uuid,
    started: Instant,
  ) -> Option<NameResolution> {
    let consent = found(
      "active_consent",
      target,
      self.store.get_active_consent(target, requester).await,
    )?;

    let assignment = found(
      "context_assignment",
      target,
      self
        .store
        .get_context_assignment(target, &consent.context_name)
        .await,
    )?;

    let name = found(
      "name_text",
      target,
      self.store.get_name_text(assignment.name_id).await,
    )?;

    tracing::debug!(
      target_user_id = %target,
      consent_id = %consent.consent_id,
      "resolved name through consent"
    );

    let mut metadata = Metadata::new(elapsed_ms(started));
    metadata.context_id = Some(consent.context_id);
    metadata.context_name = Some(consent.context_name);
    metadata.name_id = Some(assignment.name_id);
    metadata.consent_id = Some(consent.consent_id);

    Some(NameResolution {
      name,
      source: ResolutionSource::ConsentBased,
      metadata,
    })
  }

  // ── Context-specific ──────────────────────────────────────────────────

  async fn resolve_by_context(
    &self,
    request: &ResolveRequest,
    context_name: &str,
    started: Instant,
  ) -> Option<NameResolution> {
    let target = request.target_user_id;
    let assignment = found(
      "context_assignment",
      target,
      self.store.get_context_assignment(target, context_name).await,
    )?;

    tracing::debug!(
      target_user_id = %target,
      context_id = %assignment.context_id,
      "resolved name through context assignment"
    );

    let mut metadata = Metadata::new(elapsed_ms(started));
    metadata.context_id = Some(assignment.context_id);
    metadata.context_name = Some(assignment.context_name);
    metadata.name_id = Some(assignment.name_id);
    metadata.requested_context = request.context_name.clone();
    metadata.had_requester = Some(request.has_requester());

    Some(NameResolution {
      name: assignment.name_text,
      source: ResolutionSource::ContextSpecific,
      metadata,
    })
  }

  // ── Preferred fallback ────────────────────────────────────────────────

  async fn resolve_preferred(
    &self,
    request: &ResolveRequest,
    started: Instant,
  ) -> NameResolution {
    let target = request.target_user_id;
    // Decided before the lookup runs; only the suffix depends on it.
    let reason = FallbackReason::from_request_shape(
      request.has_requester(),
      request.requested_context().is_some(),
    );

    let lookup = self.store.get_preferred_name(target).await;

    let mut metadata = Metadata::new(elapsed_ms(started));
    metadata.requested_context = request.context_name.clone();
    metadata.had_requester = Some(request.has_requester());

    let name = match lookup {
      Ok(Some(preferred)) => {
        metadata.name_id = Some(preferred.name_id);
        metadata.fallback_reason = Some(reason.code());
        preferred.name_text
      }
      Ok(None) => {
        metadata.fallback_reason = Some(reason.code());
        ANONYMOUS_NAME.to_owned()
      }
      Err(e) => {
        tracing::warn!(
          target_user_id = %target,
          error = %e,
          "preferred name lookup failed"
        );
        metadata.fallback_reason = Some(reason.with_database_error());
        metadata.error = Some(e.to_string());
        ANONYMOUS_NAME.to_owned()
      }
    };

    tracing::debug!(
      target_user_id = %target,
      fallback_reason = %reason.as_str(),
      "resolved name through preferred fallback"
    );

    NameResolution {
      name,
      source: ResolutionSource::PreferredFallback,
      metadata,
    }
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Collapse a lookup outcome to "found or not". Errors are logged and
/// treated as not found.
fn found<T, E: Display>(
  lookup: &'static str,
  user_id: Uuid,
  outcome: Result<Option<T>, E>,
) -> Option<T> {
  match outcome {
    Ok(record) => record,
    Err(e) => {
      tracing::warn!(
        lookup,
        user_id = %user_id,
        error = %e,
        "lookup failed; treating as not found"
      );
      None
    }
  }
}

/// The result disclosed when resolution could not complete.
pub(crate) fn error_fallback(
  request: &ResolveRequest,
  error: String,
  performance_ms: f64,
) -> NameResolution {
  let mut metadata = Metadata::new(performance_ms);
  metadata.requested_context = request.context_name.clone();
  metadata.had_requester = Some(request.has_requester());
  metadata.error = Some(error);

  NameResolution {
    name: ANONYMOUS_NAME.to_owned(),
    source: ResolutionSource::ErrorFallback,
    metadata,
  }
}

pub(crate) fn elapsed_ms(started: Instant) -> f64 {
  started.elapsed().as_secs_f64() * 1000.0
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    (*message).to_owned()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "name resolution panicked".to_owned()
  }
}
