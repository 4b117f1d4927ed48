//! Users, roles, and the requesting [`Actor`].
//!
//! A [`User`] is the stored identity. An [`Actor`] is that identity bundled
//! with whatever role-specific data the access policy needs, loaded fresh for
//! every request so assignment changes take effect immediately.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

/// Minimum accepted password length for newly created users.
pub const MIN_PASSWORD_LEN: usize = 7;

// ─── Role ────────────────────────────────────────────────────────────────────

/// The closed set of roles. Fixed at creation; only an admin can reassign it.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  /// Files reports ("Studierende").
  Student,
  /// Supervises modules and triages their reports ("Lehrende").
  Staff,
  Admin,
}

// ─── User ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub user_id:       Uuid,
  pub name:          String,
  /// Unique across all users; compared case-sensitively.
  pub email:         String,
  /// Opaque output of [`CredentialScheme::hash`]; never serialised.
  #[serde(skip)]
  pub password_hash: String,
  pub role:          Role,
  pub created_at:    DateTime<Utc>,
}

impl User {
  /// Check `plaintext` against the stored hash. Wrong input is simply `false`.
  pub fn verify_credential(
    &self,
    plaintext: &str,
    scheme: &impl CredentialScheme,
  ) -> bool {
    scheme.verify(plaintext, &self.password_hash)
  }
}

/// Input to [`crate::tracker::Tracker::create_user`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
  pub name:     String,
  pub email:    String,
  pub password: String,
  pub role:     Role,
}

/// A user row as handed to the store; id and timestamp are store-assigned.
#[derive(Debug, Clone)]
pub struct UserRecord {
  pub name:          String,
  pub email:         String,
  pub password_hash: String,
  pub role:          Role,
}

// ─── Credentials ─────────────────────────────────────────────────────────────

/// Salted, non-reversible password hashing supplied by the embedding layer.
pub trait CredentialScheme: Send + Sync {
  fn hash(&self, plaintext: &str) -> Result<String>;

  /// Must return `false` (never panic) for malformed hashes.
  fn verify(&self, plaintext: &str, hash: &str) -> bool;
}

// ─── Actor ───────────────────────────────────────────────────────────────────

/// The requester of an operation, tagged by role.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Actor {
  Student {
    user: User,
  },
  Staff {
    user:    User,
    /// Modules this staff member is currently assigned to.
    modules: BTreeSet<Uuid>,
  },
  Admin {
    user: User,
  },
}

impl Actor {
  /// Build the variant matching `user.role`. `modules` is ignored unless the
  /// user is staff.
  pub fn new(user: User, modules: BTreeSet<Uuid>) -> Self {
    match user.role {
      Role::Student => Self::Student { user },
      Role::Staff => Self::Staff { user, modules },
      Role::Admin => Self::Admin { user },
    }
  }

  pub fn user(&self) -> &User {
    match self {
      Self::Student { user } | Self::Staff { user, .. } | Self::Admin { user } => {
        user
      }
    }
  }

  pub fn id(&self) -> Uuid { self.user().user_id }

  pub fn role(&self) -> Role {
    match self {
      Self::Student { .. } => Role::Student,
      Self::Staff { .. } => Role::Staff,
      Self::Admin { .. } => Role::Admin,
    }
  }

  pub fn is_admin(&self) -> bool { matches!(self, Self::Admin { .. }) }

  /// `true` only for staff assigned to `module_id`.
  pub fn supervises(&self, module_id: Uuid) -> bool {
    match self {
      Self::Staff { modules, .. } => modules.contains(&module_id),
      _ => false,
    }
  }
}
