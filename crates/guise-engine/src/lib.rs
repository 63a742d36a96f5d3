//! The Guise name-resolution policy engine.
//!
//! Given a target identity, an optional requester, and an optional audience
//! context, [`ResolutionEngine`] decides which stored name variant to
//! disclose. It consults an injected [`IdentityStore`](guise_core::store::IdentityStore)
//! in strict priority order (consent, then context, then the preferred
//! name) and records every disclosure through a detached audit write.

mod audit;
mod batch;
mod engine;

pub use batch::BenchmarkReport;
pub use engine::ResolutionEngine;

#[cfg(test)]
mod tests;
