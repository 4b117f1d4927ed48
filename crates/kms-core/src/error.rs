//! Error types for `kms-core`.
//!
//! Every failure an operation can report falls into one [`ErrorKind`]; the
//! presentation layer maps kinds to user-visible messages.

use thiserror::Error;
use uuid::Uuid;

/// Why the requester was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Denial {
  #[error("only Staff may change status")]
  StatusRequiresStaff,

  #[error("only Staff may comment")]
  CommentRequiresStaff,

  #[error("only for own modules")]
  ForeignModule,

  #[error("only admins may manage users and modules")]
  AdminOnly,

  #[error("only students may file reports")]
  StudentOnly,

  #[error("only the report owner may reply")]
  NotReportOwner,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("forbidden: {0}")]
  Forbidden(#[from] Denial),

  #[error("module {0:?} already exists")]
  DuplicateModule(String),

  #[error("a user with email {0:?} already exists")]
  DuplicateEmail(String),

  #[error("at least one admin must remain")]
  LastAdmin,

  #[error("admins cannot remove themselves")]
  SelfDelete,

  #[error("text must not be empty")]
  EmptyText,

  #[error("module title must not be empty")]
  EmptyTitle,

  #[error("custom category must not be empty")]
  EmptyCategory,

  #[error("password must have at least {min} characters")]
  PasswordTooShort { min: usize },

  #[error("user {0} is not a staff member")]
  NotStaff(Uuid),

  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("module not found: {0}")]
  ModuleNotFound(Uuid),

  #[error("report not found: {0}")]
  ReportNotFound(Uuid),

  #[error("comment not found: {0}")]
  CommentNotFound(Uuid),

  /// The store rejected a write on a constraint (unique, foreign key).
  #[error("integrity violation: {0}")]
  Integrity(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("credential error: {0}")]
  Credential(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Role or ownership does not permit the operation.
  Authorization,
  /// A domain rule refused the operation; nothing was written.
  BusinessRule,
  /// The input was malformed or empty.
  Validation,
  NotFound,
  /// A storage constraint fired; the transaction was rolled back and the
  /// request is safe to retry.
  Integrity,
  Unexpected,
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Forbidden(_) => ErrorKind::Authorization,
      Self::DuplicateModule(_)
      | Self::DuplicateEmail(_)
      | Self::LastAdmin
      | Self::SelfDelete => ErrorKind::BusinessRule,
      Self::EmptyText
      | Self::EmptyTitle
      | Self::EmptyCategory
      | Self::PasswordTooShort { .. }
      | Self::NotStaff(_) => ErrorKind::Validation,
      Self::UserNotFound(_)
      | Self::ModuleNotFound(_)
      | Self::ReportNotFound(_)
      | Self::CommentNotFound(_) => ErrorKind::NotFound,
      Self::Integrity(_) => ErrorKind::Integrity,
      Self::Store(_) | Self::Credential(_) => ErrorKind::Unexpected,
    }
  }

  /// Wrap a backend error, routing constraint violations to
  /// [`Error::Integrity`].
  pub fn from_store<E: crate::store::StoreError>(e: E) -> Self {
    if e.is_integrity_violation() {
      Self::Integrity(Box::new(e))
    } else {
      Self::Store(Box::new(e))
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
