//! Error type for `guise-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] guise_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("name not found: {0}")]
  NameNotFound(uuid::Uuid),

  #[error("context not found: {0}")]
  ContextNotFound(uuid::Uuid),

  #[error("consent not found: {0}")]
  ConsentNotFound(uuid::Uuid),

  #[error("user {user_id} already has a context named {context_name:?}")]
  DuplicateContext {
    user_id:      uuid::Uuid,
    context_name: String,
  },

  /// A name or context was used on behalf of a user who does not own it.
  #[error("{entity} {id} does not belong to user {user_id}")]
  OwnerMismatch {
    entity:  &'static str,
    id:      uuid::Uuid,
    user_id: uuid::Uuid,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
