//! Batch resolution and instrumentation helpers.

use std::time::Instant;

use guise_core::{
  resolution::{NameResolution, ResolveRequest},
  store::IdentityStore,
};
use serde::Serialize;
use uuid::Uuid;

use crate::engine::{ResolutionEngine, elapsed_ms, error_fallback};

/// Timing summary produced by [`ResolutionEngine::benchmark`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkReport {
  pub iterations: u32,
  pub average_ms: f64,
  pub min_ms:     f64,
  pub max_ms:     f64,
  pub total_ms:   f64,
}

impl BenchmarkReport {
  fn from_samples(samples: &[f64]) -> Self {
    if samples.is_empty() {
      return Self {
        iterations: 0,
        average_ms: 0.0,
        min_ms:     0.0,
        max_ms:     0.0,
        total_ms:   0.0,
      };
    }

    let total_ms: f64 = samples.iter().sum();
    let min_ms = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max_ms = samples.iter().copied().fold(0.0, f64::max);

    Self {
      iterations: samples.len() as u32,
      average_ms: total_ms / samples.len() as f64,
      min_ms,
      max_ms,
      total_ms,
    }
  }
}

impl<S> ResolutionEngine<S>
where
  S: IdentityStore + 'static,
{
  /// Resolve every request concurrently.
  ///
  /// Output index `i` always corresponds to input index `i`, whatever order
  /// the resolutions finish in. A request whose task dies yields an error
  /// fallback in its own slot and leaves the others untouched.
  pub async fn resolve_names_async(
    &self,
    requests: Vec<ResolveRequest>,
  ) -> Vec<NameResolution> {
    let tasks: Vec<_> = requests
      .iter()
      .cloned()
      .map(|request| {
        let engine = self.clone();
        tokio::spawn(async move { engine.resolve_name(&request).await })
      })
      .collect();

    futures::future::join_all(tasks)
      .await
      .into_iter()
      .zip(&requests)
      .map(|(joined, request)| {
        joined.unwrap_or_else(|e| {
          tracing::error!(
            target_user_id = %request.target_user_id,
            error = %e,
            "batch resolution task failed"
          );
          error_fallback(request, e.to_string(), 0.0)
        })
      })
      .collect()
  }

  /// Resolve and return only the disclosed name.
  pub async fn resolve_name_simple(
    &self,
    target_user_id: Uuid,
    context_name: Option<&str>,
  ) -> String {
    let mut request = ResolveRequest::new(target_user_id);
    if let Some(context_name) = context_name {
      request = request.with_context(context_name);
    }
    self.resolve_name(&request).await.name
  }

  /// Run `request` `iterations` times back to back and summarise the
  /// per-call wall time. Each call waits for its audit write, so every
  /// disclosure is recorded by the time the report is returned.
  pub async fn benchmark(
    &self,
    request: &ResolveRequest,
    iterations: u32,
  ) -> BenchmarkReport {
    let mut samples = Vec::with_capacity(iterations as usize);
    for _ in 0..iterations {
      let started = Instant::now();
      self.resolve_name_with_audit(request).await;
      samples.push(elapsed_ms(started));
    }
    BenchmarkReport::from_samples(&samples)
  }
}
