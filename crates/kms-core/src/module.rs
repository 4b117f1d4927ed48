//! Course modules and their staff assignment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A course unit. Owns its reports; staff are assigned to it many-to-many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
  pub module_id:  Uuid,
  /// Unique, non-empty; compared case-sensitively.
  pub title:      String,
  pub created_at: DateTime<Utc>,
}
