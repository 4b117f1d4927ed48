//! Error type for `kms-store-sqlite`.

use kms_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("decode error: {0}")]
  Decode(String),

  /// The row being updated was deleted concurrently.
  #[error("row vanished during update: {0}")]
  Vanished(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl StoreError for Error {
  fn is_integrity_violation(&self) -> bool {
    match self {
      Self::Vanished(_) => true,
      Self::Database(tokio_rusqlite::Error::Rusqlite(
        rusqlite::Error::SqliteFailure(e, _),
      )) => e.code == rusqlite::ErrorCode::ConstraintViolation,
      _ => false,
    }
  }
}
