//! Engine tests against an in-memory fake store.

use std::{
  collections::{HashMap, HashSet},
  sync::Arc,
  time::Duration,
};

use chrono::Utc;
use guise_core::{
  ANONYMOUS_NAME,
  audit::{AuditAction, AuditEvent},
  identity::{ConsentGrant, ContextAssignment, NameType, PreferredName},
  resolution::{FallbackReason, ResolutionSource, ResolveRequest},
  store::IdentityStore,
};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ResolutionEngine;

// ─── Fake store ──────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct FakeError(String);

/// Which collaborator calls return an error.
#[derive(Default)]
struct Failures {
  consent:    bool,
  assignment: bool,
  preferred:  bool,
  name_text:  bool,
  audit:      bool,
}

struct FakeStore {
  consents:    HashMap<(Uuid, Uuid), ConsentGrant>,
  assignments: HashMap<(Uuid, String), ContextAssignment>,
  preferred:   HashMap<Uuid, PreferredName>,
  names:       HashMap<Uuid, String>,
  failures:    Failures,
  /// Every lookup panics, standing in for an unexpected exception.
  panics:      bool,
  /// Targets whose preferred-name lookup panics.
  panic_for:   HashSet<Uuid>,
  /// Per-target delay applied to the preferred-name lookup.
  delays:      HashMap<Uuid, Duration>,
  /// Delay applied to every audit insert.
  audit_delay: Option<Duration>,
  audit_tx:    mpsc::UnboundedSender<AuditEvent>,
}

impl FakeStore {
  fn new() -> (Self, mpsc::UnboundedReceiver<AuditEvent>) {
    let (audit_tx, audit_rx) = mpsc::unbounded_channel();
    let store = Self {
      consents: HashMap::new(),
      assignments: HashMap::new(),
      preferred: HashMap::new(),
      names: HashMap::new(),
      failures: Failures::default(),
      panics: false,
      panic_for: HashSet::new(),
      delays: HashMap::new(),
      audit_delay: None,
      audit_tx,
    };
    (store, audit_rx)
  }

  /// Bind a fresh name called `text` to `context_name` for `user`.
  fn assign(&mut self, user: Uuid, context_name: &str, text: &str) -> ContextAssignment {
    let assignment = ContextAssignment {
      name_id:      Uuid::new_v4(),
      name_text:    text.into(),
      context_id:   Uuid::new_v4(),
      context_name: context_name.into(),
      name_type:    NameType::Nickname,
    };
    self.names.insert(assignment.name_id, text.into());
    self
      .assignments
      .insert((user, context_name.into()), assignment.clone());
    assignment
  }

  fn grant(&mut self, target: Uuid, requester: Uuid, bound: &ContextAssignment) -> ConsentGrant {
    let consent = ConsentGrant {
      consent_id:   Uuid::new_v4(),
      context_id:   bound.context_id,
      context_name: bound.context_name.clone(),
      granted_at:   Utc::now(),
      expires_at:   None,
    };
    self.consents.insert((target, requester), consent.clone());
    consent
  }

  fn prefer(&mut self, user: Uuid, text: &str) -> PreferredName {
    let preferred = PreferredName {
      name_id:      Uuid::new_v4(),
      name_text:    text.into(),
      name_type:    NameType::Preferred,
      is_preferred: true,
    };
    self.names.insert(preferred.name_id, text.into());
    self.preferred.insert(user, preferred.clone());
    preferred
  }

  fn check(&self, failing: bool, what: &str) -> Result<(), FakeError> {
    if self.panics {
      panic!("identity store connection lost");
    }
    if failing {
      return Err(FakeError(format!("{what} query failed")));
    }
    Ok(())
  }
}

impl IdentityStore for FakeStore {
  type Error = FakeError;

  async fn get_active_consent(
    &self,
    target_user_id: Uuid,
    requester_user_id: Uuid,
  ) -> Result<Option<ConsentGrant>, FakeError> {
    self.check(self.failures.consent, "consent")?;
    Ok(self.consents.get(&(target_user_id, requester_user_id)).cloned())
  }

  async fn get_context_assignment(
    &self,
    user_id: Uuid,
    context_name: &str,
  ) -> Result<Option<ContextAssignment>, FakeError> {
    self.check(self.failures.assignment, "assignment")?;
    Ok(self.assignments.get(&(user_id, context_name.to_owned())).cloned())
  }

  async fn get_preferred_name(
    &self,
    user_id: Uuid,
  ) -> Result<Option<PreferredName>, FakeError> {
    if let Some(delay) = self.delays.get(&user_id) {
      tokio::time::sleep(*delay).await;
    }
    if self.panic_for.contains(&user_id) {
      panic!("preferred name row is corrupt");
    }
    self.check(self.failures.preferred, "preferred name")?;
    Ok(self.preferred.get(&user_id).cloned())
  }

  async fn get_name_text(&self, name_id: Uuid) -> Result<Option<String>, FakeError> {
    self.check(self.failures.name_text, "name")?;
    Ok(self.names.get(&name_id).cloned())
  }

  async fn insert_audit_event(&self, event: AuditEvent) -> Result<(), FakeError> {
    if let Some(delay) = self.audit_delay {
      tokio::time::sleep(delay).await;
    }
    self.check(self.failures.audit, "audit insert")?;
    self
      .audit_tx
      .send(event)
      .map_err(|e| FakeError(e.to_string()))
  }
}

fn engine(store: FakeStore) -> ResolutionEngine<FakeStore> {
  ResolutionEngine::new(Arc::new(store))
}

// ─── Priority chain ──────────────────────────────────────────────────────────

#[tokio::test]
async fn consent_wins_over_requested_context() {
  let (mut store, _rx) = FakeStore::new();
  let target = Uuid::new_v4();
  let requester = Uuid::new_v4();
  let work = store.assign(target, "Work", "Jordan Smith");
  store.assign(target, "Social Friends", "JJ");
  let consent = store.grant(target, requester, &work);
  store.prefer(target, "Jordan");

  let request = ResolveRequest::new(target)
    .with_requester(requester)
    .with_context("Social Friends");
  let resolution = engine(store).resolve_name(&request).await;

  assert_eq!(resolution.source, ResolutionSource::ConsentBased);
  assert_eq!(resolution.name, "Jordan Smith");
  assert_eq!(resolution.metadata.consent_id, Some(consent.consent_id));
  assert_eq!(resolution.metadata.context_id, Some(work.context_id));
  assert_eq!(resolution.metadata.context_name.as_deref(), Some("Work"));
  assert_eq!(resolution.metadata.name_id, Some(work.name_id));
  assert!(resolution.metadata.fallback_reason.is_none());
  assert!(resolution.metadata.error.is_none());
}

#[tokio::test]
async fn consent_with_matching_context_request() {
  let (mut store, _rx) = FakeStore::new();
  let target = Uuid::new_v4();
  let requester = Uuid::new_v4();
  let work = store.assign(target, "Work", "J. Smith");
  store.grant(target, requester, &work);

  let request = ResolveRequest::new(target)
    .with_requester(requester)
    .with_context("Work");
  let resolution = engine(store).resolve_name(&request).await;

  assert_eq!(resolution.source, ResolutionSource::ConsentBased);
  assert_eq!(resolution.name, "J. Smith");
}

#[tokio::test]
async fn consent_error_falls_through_to_context() {
  let (mut store, _rx) = FakeStore::new();
  let target = Uuid::new_v4();
  let requester = Uuid::new_v4();
  let social = store.assign(target, "Social Friends", "JJ");
  store.grant(target, requester, &social);
  store.failures.consent = true;

  let request = ResolveRequest::new(target)
    .with_requester(requester)
    .with_context("Social Friends");
  let resolution = engine(store).resolve_name(&request).await;

  assert_eq!(resolution.source, ResolutionSource::ContextSpecific);
  assert_eq!(resolution.name, "JJ");
  assert_eq!(resolution.metadata.had_requester, Some(true));
  assert!(resolution.metadata.error.is_none());
}

#[tokio::test]
async fn consent_without_bound_name_falls_through() {
  let (mut store, _rx) = FakeStore::new();
  let target = Uuid::new_v4();
  let requester = Uuid::new_v4();
  let work = store.assign(target, "Work", "Jordan Smith");
  store.grant(target, requester, &work);
  store.names.remove(&work.name_id);
  store.prefer(target, "Jordan");

  let request = ResolveRequest::new(target).with_requester(requester);
  let resolution = engine(store).resolve_name(&request).await;

  assert_eq!(resolution.source, ResolutionSource::PreferredFallback);
  assert_eq!(resolution.name, "Jordan");
  assert_eq!(
    resolution.metadata.fallback_reason,
    Some(FallbackReason::NoActiveConsent.code())
  );
}

#[tokio::test]
async fn context_assignment_without_requester() {
  let (mut store, _rx) = FakeStore::new();
  let target = Uuid::new_v4();
  let social = store.assign(target, "Social Friends", "JJ");

  let request = ResolveRequest::new(target).with_context("Social Friends");
  let resolution = engine(store).resolve_name(&request).await;

  assert_eq!(resolution.source, ResolutionSource::ContextSpecific);
  assert_eq!(resolution.name, "JJ");
  assert_eq!(resolution.metadata.context_id, Some(social.context_id));
  assert_eq!(resolution.metadata.name_id, Some(social.name_id));
  assert_eq!(
    resolution.metadata.requested_context.as_deref(),
    Some("Social Friends")
  );
  assert_eq!(resolution.metadata.had_requester, Some(false));
  assert!(resolution.metadata.consent_id.is_none());
}

#[tokio::test]
async fn context_name_is_trimmed_but_echoed_verbatim() {
  let (mut store, _rx) = FakeStore::new();
  let target = Uuid::new_v4();
  store.assign(target, "Work", "Jordan Smith");

  let request = ResolveRequest::new(target).with_context("  Work ");
  let resolution = engine(store).resolve_name(&request).await;

  assert_eq!(resolution.source, ResolutionSource::ContextSpecific);
  assert_eq!(
    resolution.metadata.requested_context.as_deref(),
    Some("  Work ")
  );
}

#[tokio::test]
async fn blank_context_counts_as_no_request() {
  let (mut store, _rx) = FakeStore::new();
  let target = Uuid::new_v4();
  store.prefer(target, "Jordan");

  let request = ResolveRequest::new(target).with_context("   ");
  let resolution = engine(store).resolve_name(&request).await;

  assert_eq!(resolution.source, ResolutionSource::PreferredFallback);
  assert_eq!(
    resolution.metadata.fallback_reason,
    Some(FallbackReason::NoSpecificRequest.code())
  );
}

// ─── Preferred fallback ──────────────────────────────────────────────────────

#[tokio::test]
async fn no_request_falls_back_to_preferred_name() {
  let (mut store, _rx) = FakeStore::new();
  let target = Uuid::new_v4();
  let preferred = store.prefer(target, "Jordan");

  let resolution = engine(store)
    .resolve_name(&ResolveRequest::new(target))
    .await;

  assert_eq!(resolution.source, ResolutionSource::PreferredFallback);
  assert_eq!(resolution.name, "Jordan");
  assert_eq!(resolution.metadata.name_id, Some(preferred.name_id));
  assert_eq!(
    resolution.metadata.fallback_reason.map(|c| c.to_string()).as_deref(),
    Some("no_specific_request")
  );
}

#[tokio::test]
async fn missing_context_and_preferred_name_is_anonymous() {
  let (store, _rx) = FakeStore::new();
  let target = Uuid::new_v4();

  let request = ResolveRequest::new(target).with_context("Gaming");
  let resolution = engine(store).resolve_name(&request).await;

  assert_eq!(resolution.source, ResolutionSource::PreferredFallback);
  assert_eq!(resolution.name, ANONYMOUS_NAME);
  assert!(resolution.metadata.name_id.is_none());
  assert_eq!(
    resolution.metadata.fallback_reason.map(|c| c.to_string()).as_deref(),
    Some("context_not_found_or_no_assignment")
  );
  assert!(resolution.metadata.error.is_none());
}

#[tokio::test]
async fn fallback_reason_depends_only_on_request_shape() {
  let shapes = [
    (true, true, "no_consent_and_no_context_assignment"),
    (true, false, "no_active_consent"),
    (false, true, "context_not_found_or_no_assignment"),
    (false, false, "no_specific_request"),
  ];

  for (has_requester, has_context, expected) in shapes {
    for preferred_exists in [true, false] {
      let (mut store, _rx) = FakeStore::new();
      let target = Uuid::new_v4();
      if preferred_exists {
        store.prefer(target, "Jordan");
      }

      let mut request = ResolveRequest::new(target);
      if has_requester {
        request = request.with_requester(Uuid::new_v4());
      }
      if has_context {
        request = request.with_context("Work");
      }

      let resolution = engine(store).resolve_name(&request).await;
      assert_eq!(resolution.source, ResolutionSource::PreferredFallback);
      assert_eq!(
        resolution.metadata.fallback_reason.map(|c| c.to_string()).as_deref(),
        Some(expected),
        "requester={has_requester} context={has_context} preferred={preferred_exists}"
      );
    }
  }
}

#[tokio::test]
async fn preferred_lookup_error_is_reported_not_raised() {
  let (mut store, _rx) = FakeStore::new();
  let target = Uuid::new_v4();
  store.prefer(target, "Jordan");
  store.failures.preferred = true;

  let request = ResolveRequest::new(target).with_requester(Uuid::new_v4());
  let resolution = engine(store).resolve_name(&request).await;

  assert_eq!(resolution.source, ResolutionSource::PreferredFallback);
  assert_eq!(resolution.name, ANONYMOUS_NAME);
  assert_eq!(
    resolution.metadata.fallback_reason.map(|c| c.to_string()).as_deref(),
    Some("no_active_consent_with_database_error")
  );
  assert_eq!(
    resolution.metadata.error.as_deref(),
    Some("preferred name query failed")
  );
}

#[tokio::test]
async fn every_lookup_erroring_still_reaches_fallback() {
  let (mut store, _rx) = FakeStore::new();
  store.failures = Failures {
    consent:    true,
    assignment: true,
    preferred:  true,
    name_text:  true,
    audit:      true,
  };

  let request = ResolveRequest::new(Uuid::new_v4())
    .with_requester(Uuid::new_v4())
    .with_context("Work");
  let resolution = engine(store).resolve_name(&request).await;

  assert_eq!(resolution.source, ResolutionSource::PreferredFallback);
  assert_eq!(resolution.name, ANONYMOUS_NAME);
  assert_eq!(
    resolution.metadata.fallback_reason,
    Some(FallbackReason::NoConsentAndNoContextAssignment.with_database_error())
  );
}

// ─── Error fallback ──────────────────────────────────────────────────────────

#[tokio::test]
async fn panicking_collaborators_yield_error_fallback() {
  let (mut store, _rx) = FakeStore::new();
  store.panics = true;

  let request = ResolveRequest::new(Uuid::new_v4())
    .with_requester(Uuid::new_v4())
    .with_context("Work");
  let resolution = engine(store).resolve_name(&request).await;

  assert_eq!(resolution.source, ResolutionSource::ErrorFallback);
  assert_eq!(resolution.name, ANONYMOUS_NAME);
  assert_eq!(
    resolution.metadata.error.as_deref(),
    Some("identity store connection lost")
  );
  assert_eq!(resolution.metadata.requested_context.as_deref(), Some("Work"));
  assert_eq!(resolution.metadata.had_requester, Some(true));
  assert!(resolution.metadata.fallback_reason.is_none());
  assert!(resolution.metadata.performance_ms >= 0.0);
}

// ─── Audit ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn each_resolution_emits_one_disclosure_event() {
  let (mut store, mut rx) = FakeStore::new();
  let target = Uuid::new_v4();
  let requester = Uuid::new_v4();
  let social = store.assign(target, "Social Friends", "JJ");

  let request = ResolveRequest::new(target)
    .with_requester(requester)
    .with_context("Social Friends");
  let resolution = engine(store).resolve_name_with_audit(&request).await;

  let event = rx.recv().await.expect("audit event");
  assert_eq!(event.action, AuditAction::NameDisclosed);
  assert_eq!(event.target_user_id, target);
  assert_eq!(event.requester_user_id, Some(requester));
  assert_eq!(event.source, ResolutionSource::ContextSpecific);
  assert_eq!(event.resolved_name, "JJ");
  assert_eq!(event.name_id, Some(social.name_id));
  assert_eq!(event.metadata, resolution.metadata);
  assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn detached_audit_write_eventually_lands() {
  let (store, mut rx) = FakeStore::new();
  let target = Uuid::new_v4();

  engine(store)
    .resolve_name(&ResolveRequest::new(target))
    .await;

  let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
    .await
    .expect("audit write within a second")
    .expect("audit event");
  assert_eq!(event.target_user_id, target);
  assert_eq!(event.source, ResolutionSource::PreferredFallback);
}

#[tokio::test]
async fn audit_failure_does_not_change_result() {
  let target = Uuid::new_v4();
  let request = ResolveRequest::new(target).with_context("Work");

  let (mut healthy, _rx_healthy) = FakeStore::new();
  healthy.assign(target, "Work", "Jordan Smith");
  let expected = engine(healthy).resolve_name_with_audit(&request).await;

  let (mut broken, _rx_broken) = FakeStore::new();
  broken.assign(target, "Work", "Jordan Smith");
  broken.failures.audit = true;
  let actual = engine(broken).resolve_name_with_audit(&request).await;

  assert_eq!(actual.name, expected.name);
  assert_eq!(actual.source, expected.source);
  assert!(actual.metadata.error.is_none());
}

#[tokio::test]
async fn panicking_audit_write_is_contained() {
  let (mut store, mut rx) = FakeStore::new();
  store.panics = true;
  // The audit insert panics as well; resolution must still return.
  let resolution = engine(store)
    .resolve_name_with_audit(&ResolveRequest::new(Uuid::new_v4()))
    .await;

  assert_eq!(resolution.source, ResolutionSource::ErrorFallback);
  assert!(rx.try_recv().is_err());
}

// ─── Batch & helpers ─────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_preserves_input_order() {
  let (mut store, _rx) = FakeStore::new();
  let users: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
  for (i, user) in users.iter().enumerate() {
    store.prefer(*user, &format!("user-{i}"));
    // Earlier requests finish last.
    store
      .delays
      .insert(*user, Duration::from_millis(60 - 30 * i as u64));
  }

  let requests = users.iter().copied().map(ResolveRequest::new).collect();
  let resolutions = engine(store).resolve_names_async(requests).await;

  let names: Vec<_> = resolutions.iter().map(|r| r.name.as_str()).collect();
  assert_eq!(names, ["user-0", "user-1", "user-2"]);
}

#[tokio::test]
async fn failing_request_leaves_other_batch_slots_untouched() {
  let (mut store, _rx) = FakeStore::new();
  let users: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
  for (i, user) in users.iter().enumerate() {
    store.prefer(*user, &format!("user-{i}"));
  }
  store.panic_for.insert(users[1]);

  let requests = users.iter().copied().map(ResolveRequest::new).collect();
  let resolutions = engine(store).resolve_names_async(requests).await;

  let outcome: Vec<_> = resolutions
    .iter()
    .map(|r| (r.source, r.name.as_str()))
    .collect();
  assert_eq!(outcome, [
    (ResolutionSource::PreferredFallback, "user-0"),
    (ResolutionSource::ErrorFallback, ANONYMOUS_NAME),
    (ResolutionSource::PreferredFallback, "user-2"),
  ]);
  assert_eq!(
    resolutions[1].metadata.error.as_deref(),
    Some("preferred name row is corrupt")
  );
  assert!(resolutions[0].metadata.error.is_none());
  assert!(resolutions[2].metadata.error.is_none());
}

#[tokio::test]
async fn batch_of_nothing_is_empty() {
  let (store, _rx) = FakeStore::new();
  assert!(engine(store).resolve_names_async(Vec::new()).await.is_empty());
}

#[tokio::test]
async fn simple_resolution_returns_only_the_name() {
  let (mut store, _rx) = FakeStore::new();
  let target = Uuid::new_v4();
  store.assign(target, "Social Friends", "JJ");
  store.prefer(target, "Jordan");
  let engine = engine(store);

  assert_eq!(
    engine.resolve_name_simple(target, Some("Social Friends")).await,
    "JJ"
  );
  assert_eq!(engine.resolve_name_simple(target, None).await, "Jordan");
}

#[tokio::test]
async fn benchmark_summarises_iterations() {
  let (mut store, _rx) = FakeStore::new();
  let target = Uuid::new_v4();
  store.prefer(target, "Jordan");

  let report = engine(store)
    .benchmark(&ResolveRequest::new(target), 5)
    .await;

  assert_eq!(report.iterations, 5);
  assert!(report.min_ms <= report.average_ms);
  assert!(report.average_ms <= report.max_ms);
  assert!(report.total_ms >= report.max_ms);
}

#[tokio::test]
async fn benchmark_with_zero_iterations_is_all_zero() {
  let (store, _rx) = FakeStore::new();
  let report = engine(store)
    .benchmark(&ResolveRequest::new(Uuid::new_v4()), 0)
    .await;

  assert_eq!(report.iterations, 0);
  assert_eq!(report.total_ms, 0.0);
  assert_eq!(report.average_ms, 0.0);
}

#[test]
fn benchmark_records_every_disclosure_before_returning() {
  let (mut store, mut rx) = FakeStore::new();
  let target = Uuid::new_v4();
  store.prefer(target, "Jordan");
  store.audit_delay = Some(Duration::from_millis(5));

  let runtime = tokio::runtime::Builder::new_multi_thread()
    .enable_all()
    .build()
    .unwrap();
  let report = runtime.block_on(
    engine(store).benchmark(&ResolveRequest::new(target), 20),
  );
  // Shutting the runtime down cancels any audit task still pending.
  drop(runtime);

  let mut written = 0;
  while let Ok(event) = rx.try_recv() {
    assert_eq!(event.target_user_id, target);
    written += 1;
  }
  assert_eq!(report.iterations, 20);
  assert_eq!(written, 20);
}
