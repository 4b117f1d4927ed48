//! Reports ("Meldungen") and their status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::comment::{Comment, Thread};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Processing state of a report. Only ever advances one step at a time.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Status {
  #[default]
  Open,
  InProgress,
  Closed,
}

impl Status {
  /// States reachable from `self` in one transition. `Closed` is terminal.
  pub const fn successors(self) -> &'static [Status] {
    match self {
      Self::Open => &[Self::InProgress],
      Self::InProgress => &[Self::Closed],
      Self::Closed => &[],
    }
  }

  pub fn can_advance_to(self, next: Status) -> bool {
    self.successors().contains(&next)
  }
}

// ─── Category ────────────────────────────────────────────────────────────────

/// What kind of course material a report is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
  OnlineScript,
  PdfScript,
  Video,
  OnlineTests,
  SampleExam,
  SlideSet,
  /// Anything outside the predefined set.
  Custom(String),
}

impl Category {
  pub const KNOWN: [Category; 6] = [
    Self::OnlineScript,
    Self::PdfScript,
    Self::Video,
    Self::OnlineTests,
    Self::SampleExam,
    Self::SlideSet,
  ];

  /// Short label; for [`Category::Custom`] this is the custom text itself.
  pub fn label(&self) -> &str {
    match self {
      Self::OnlineScript => "online_script",
      Self::PdfScript => "pdf_script",
      Self::Video => "video",
      Self::OnlineTests => "online_tests",
      Self::SampleExam => "sample_exam",
      Self::SlideSet => "slide_set",
      Self::Custom(s) => s,
    }
  }

  /// Marks custom text that would otherwise read as a known label, e.g.
  /// `custom:video`.
  pub const CUSTOM_PREFIX: &'static str = "custom:";

  /// Inverse of [`Category::label`]; unknown labels become
  /// [`Category::Custom`]. A [`Category::CUSTOM_PREFIX`] forces the custom
  /// reading.
  pub fn from_label(label: &str) -> Self {
    if let Some(text) = label.strip_prefix(Self::CUSTOM_PREFIX) {
      return Self::Custom(text.to_owned());
    }
    Self::KNOWN
      .into_iter()
      .find(|c| c.label() == label)
      .unwrap_or_else(|| Self::Custom(label.to_owned()))
  }
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
  pub report_id:   Uuid,
  pub description: String,
  pub category:    Category,
  pub status:      Status,
  pub created_at:  DateTime<Utc>,
  /// The student who filed it. Deleting the student deletes the report.
  pub owner_id:    Uuid,
  /// Deleting the module deletes the report.
  pub module_id:   Uuid,
}

/// Input to [`crate::tracker::Tracker::create_report`].
/// The owner is always the requesting student.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReport {
  pub description: String,
  pub category:    Category,
  pub module_id:   Uuid,
}

/// Conjunctive filter for the report overview.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
  /// Widen students and staff to every report instead of their own scope.
  pub all:       bool,
  pub module_id: Option<Uuid>,
  pub status:    Option<Status>,
  pub category:  Option<Category>,
}

impl ReportFilter {
  pub fn matches(&self, report: &Report) -> bool {
    self.module_id.is_none_or(|m| m == report.module_id)
      && self.status.is_none_or(|s| s == report.status)
      && self.category.as_ref().is_none_or(|c| *c == report.category)
  }
}

/// A report with its display context and the requester-visible comments.
#[derive(Debug, Clone, Serialize)]
pub struct ReportView {
  pub report:       Report,
  pub module_title: String,
  pub owner_name:   String,
  pub threads:      Vec<Thread>,
}

// ─── Status change ───────────────────────────────────────────────────────────

/// Input to [`crate::tracker::Tracker::change_status`].
#[derive(Debug, Clone, Deserialize)]
pub struct StatusRequest {
  pub status:     Status,
  /// Optional comment; blank text counts as no comment.
  #[serde(default)]
  pub comment:    Option<String>,
  #[serde(default)]
  pub visibility: crate::comment::Visibility,
}

/// What a status-change request did. None of these are errors.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StatusChange {
  /// The status advanced, optionally with a comment written in the same
  /// transaction.
  Changed {
    from:    Status,
    to:      Status,
    comment: Option<Comment>,
  },
  /// Requested status equals the current one; only a comment was added.
  Commented { comment: Comment },
  /// Requested status equals the current one and there was nothing to say.
  Unchanged { status: Status },
  /// The transition is not in the table; nothing was written.
  Rejected { from: Status, to: Status },
}
