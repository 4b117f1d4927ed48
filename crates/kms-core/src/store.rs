//! The `TrackerStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g. `kms-store-sqlite`).
//! It performs no access checks; [`crate::tracker::Tracker`] gates every call.
//! Each method is one transaction: it either commits completely or not at
//! all. Rules that depend on other rows (at least one admin, the status
//! transition table) are checked inside that transaction.

use std::future::Future;

use uuid::Uuid;

use crate::{
  comment::{Comment, NewComment},
  module::Module,
  report::{NewReport, Report, Status, StatusChange},
  user::{Actor, Role, User, UserRecord},
};

/// Error classification a backend must provide.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// `true` when a constraint (unique, foreign key) rejected the write, or the
  /// row being written to disappeared under a concurrent delete.
  fn is_integrity_violation(&self) -> bool;
}

/// Which reports [`TrackerStore::list_reports`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportScope {
  All,
  /// Reports filed by this student.
  OwnedBy(Uuid),
  /// Reports on modules this staff member is assigned to.
  SupervisedBy(Uuid),
}

/// Outcome of a user write that must leave at least one admin behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminGuarded<T> {
  Done(T),
  /// No user with that id; nothing was written.
  Missing,
  /// The write would have removed the last admin; nothing was written.
  LastAdmin,
}

impl<T> AdminGuarded<T> {
  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> AdminGuarded<U> {
    match self {
      Self::Done(value) => AdminGuarded::Done(f(value)),
      Self::Missing => AdminGuarded::Missing,
      Self::LastAdmin => AdminGuarded::LastAdmin,
    }
  }
}

/// Abstraction over a tracker storage backend.
///
/// Deletes cascade as follows: module → reports → comments, student →
/// reports, staff → assignments only (their comments keep the author name but
/// lose the staff reference), module → assignments only.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait TrackerStore: Send + Sync {
  type Error: StoreError;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Persist a new user. A duplicate email is an integrity violation.
  fn insert_user(
    &self,
    record: UserRecord,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn find_user_by_email(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// All users ordered by name.
  fn list_users(
    &self,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  fn count_admins(
    &self,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Delete a user and everything that cascades from it.
  ///
  /// Deleting an admin is refused with [`AdminGuarded::LastAdmin`] when no
  /// other admin exists. The count is read in the same transaction as the
  /// delete.
  fn delete_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<AdminGuarded<()>, Self::Error>> + Send + '_;

  /// Replace a user's role, dropping data tied to the old one: module
  /// assignments of former staff, reports of former students. Demoting the
  /// last admin is refused as in [`TrackerStore::delete_user`].
  fn set_role(
    &self,
    id: Uuid,
    role: Role,
  ) -> impl Future<Output = Result<AdminGuarded<User>, Self::Error>> + Send + '_;

  /// Load a user together with their current module assignments.
  fn load_actor(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Actor>, Self::Error>> + Send + '_;

  // ── Modules ───────────────────────────────────────────────────────────

  /// Persist a new module. A duplicate title is an integrity violation.
  fn insert_module(
    &self,
    title: String,
  ) -> impl Future<Output = Result<Module, Self::Error>> + Send + '_;

  fn get_module(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Module>, Self::Error>> + Send + '_;

  /// Exact, case-sensitive title match.
  fn find_module_by_title(
    &self,
    title: String,
  ) -> impl Future<Output = Result<Option<Module>, Self::Error>> + Send + '_;

  /// All modules ordered by title.
  fn list_modules(
    &self,
  ) -> impl Future<Output = Result<Vec<Module>, Self::Error>> + Send + '_;

  /// Modules assigned to `staff_id`, ordered by title.
  fn list_assigned_modules(
    &self,
    staff_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Module>, Self::Error>> + Send + '_;

  /// Staff assigned to `module_id`, ordered by name.
  fn list_module_staff(
    &self,
    module_id: Uuid,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  /// Delete a module, its reports, their comments, and its assignments.
  /// Returns `false` if the module did not exist.
  fn delete_module(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Returns `false` if the assignment already existed.
  fn assign_staff(
    &self,
    module_id: Uuid,
    staff_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Returns `false` if there was no such assignment.
  fn unassign_staff(
    &self,
    module_id: Uuid,
    staff_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Reports ───────────────────────────────────────────────────────────

  /// Persist a new report with status [`Status::Open`]. A missing owner or
  /// module is an integrity violation.
  fn insert_report(
    &self,
    owner_id: Uuid,
    input: NewReport,
  ) -> impl Future<Output = Result<Report, Self::Error>> + Send + '_;

  fn get_report(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Report>, Self::Error>> + Send + '_;

  /// Reports in `scope`, newest first.
  fn list_reports(
    &self,
    scope: ReportScope,
  ) -> impl Future<Output = Result<Vec<Report>, Self::Error>> + Send + '_;

  /// Read the report's current status, plan `requested` against it with
  /// [`crate::policy::plan_status_change`] and write the outcome, all in one
  /// transaction. `comment` is stored for [`StatusChange::Changed`] and
  /// [`StatusChange::Commented`] and dropped otherwise. A missing report is
  /// an integrity violation.
  fn apply_status_change(
    &self,
    report_id: Uuid,
    requested: Status,
    comment: Option<NewComment>,
  ) -> impl Future<Output = Result<StatusChange, Self::Error>> + Send + '_;

  // ── Comments ──────────────────────────────────────────────────────────

  /// Persist a new comment. A missing report or parent is an integrity
  /// violation.
  fn insert_comment(
    &self,
    input: NewComment,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  fn get_comment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Comment>, Self::Error>> + Send + '_;

  /// All comments on a report, oldest first.
  fn list_comments(
    &self,
    report_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Comment>, Self::Error>> + Send + '_;
}
