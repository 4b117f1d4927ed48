//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings with fixed microsecond precision, so they
//! sort lexicographically. UUIDs are hyphenated lowercase strings. Enums use
//! their `Display` form.

use chrono::{DateTime, SecondsFormat, Utc};
use kms_core::{
  comment::{Comment, Visibility},
  module::Module,
  report::{Category, Report, Status},
  user::{Role, User},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

fn decode_enum<T: std::str::FromStr>(what: &str, s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown {what}: {s:?}")))
}

pub fn encode_category(c: &Category) -> String {
  match c {
    Category::Custom(text) => format!("{}{text}", Category::CUSTOM_PREFIX),
    known => known.label().to_owned(),
  }
}

pub fn decode_category(s: &str) -> Result<Category> {
  if let Some(text) = s.strip_prefix(Category::CUSTOM_PREFIX) {
    return Ok(Category::Custom(text.to_owned()));
  }
  Category::KNOWN
    .into_iter()
    .find(|c| c.label() == s)
    .ok_or_else(|| Error::Decode(format!("unknown category: {s:?}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:       String,
  pub name:          String,
  pub email:         String,
  pub password_hash: String,
  pub role:          String,
  pub created_at:    String,
}

impl RawUser {
  pub const COLUMNS: &'static str =
    "user_id, name, email, password_hash, role, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:       row.get(0)?,
      name:          row.get(1)?,
      email:         row.get(2)?,
      password_hash: row.get(3)?,
      role:          row.get(4)?,
      created_at:    row.get(5)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:       decode_uuid(&self.user_id)?,
      name:          self.name,
      email:         self.email,
      password_hash: self.password_hash,
      role:          decode_enum::<Role>("role", &self.role)?,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `modules` row.
pub struct RawModule {
  pub module_id:  String,
  pub title:      String,
  pub created_at: String,
}

impl RawModule {
  pub const COLUMNS: &'static str = "module_id, title, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      module_id:  row.get(0)?,
      title:      row.get(1)?,
      created_at: row.get(2)?,
    })
  }

  pub fn into_module(self) -> Result<Module> {
    Ok(Module {
      module_id:  decode_uuid(&self.module_id)?,
      title:      self.title,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `reports` row.
pub struct RawReport {
  pub report_id:   String,
  pub description: String,
  pub category:    String,
  pub status:      String,
  pub created_at:  String,
  pub owner_id:    String,
  pub module_id:   String,
}

impl RawReport {
  pub const COLUMNS: &'static str =
    "report_id, description, category, status, created_at, owner_id, module_id";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      report_id:   row.get(0)?,
      description: row.get(1)?,
      category:    row.get(2)?,
      status:      row.get(3)?,
      created_at:  row.get(4)?,
      owner_id:    row.get(5)?,
      module_id:   row.get(6)?,
    })
  }

  pub fn into_report(self) -> Result<Report> {
    Ok(Report {
      report_id:   decode_uuid(&self.report_id)?,
      description: self.description,
      category:    decode_category(&self.category)?,
      status:      decode_enum::<Status>("status", &self.status)?,
      created_at:  decode_dt(&self.created_at)?,
      owner_id:    decode_uuid(&self.owner_id)?,
      module_id:   decode_uuid(&self.module_id)?,
    })
  }
}

/// Raw strings read directly from a `comments` row.
pub struct RawComment {
  pub comment_id:      String,
  pub report_id:       String,
  pub text:            String,
  pub created_at:      String,
  pub visibility:      String,
  pub author_name:     String,
  pub author_staff_id: Option<String>,
  pub replies_to:      Option<String>,
}

impl RawComment {
  pub const COLUMNS: &'static str = "comment_id, report_id, text, created_at, \
                             visibility, author_name, author_staff_id, \
                             replies_to";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      comment_id:      row.get(0)?,
      report_id:       row.get(1)?,
      text:            row.get(2)?,
      created_at:      row.get(3)?,
      visibility:      row.get(4)?,
      author_name:     row.get(5)?,
      author_staff_id: row.get(6)?,
      replies_to:      row.get(7)?,
    })
  }

  pub fn into_comment(self) -> Result<Comment> {
    Ok(Comment {
      comment_id:      decode_uuid(&self.comment_id)?,
      report_id:       decode_uuid(&self.report_id)?,
      text:            self.text,
      created_at:      decode_dt(&self.created_at)?,
      visibility:      decode_enum::<Visibility>("visibility", &self.visibility)?,
      author_name:     self.author_name,
      author_staff_id: self.author_staff_id.as_deref().map(decode_uuid).transpose()?,
      replies_to:      self.replies_to.as_deref().map(decode_uuid).transpose()?,
    })
  }
}
