//! Error types for `guise-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown name type: {0:?}")]
  UnknownNameType(String),

  #[error("unknown resolution source: {0:?}")]
  UnknownSource(String),

  #[error("unknown fallback reason: {0:?}")]
  UnknownFallbackReason(String),

  #[error("unknown audit action: {0:?}")]
  UnknownAuditAction(String),

  #[error("unknown consent status: {0:?}")]
  UnknownConsentStatus(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
