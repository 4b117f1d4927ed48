//! [`Tracker`] — every user-facing operation, gated by [`crate::policy`].
//!
//! Each method takes the requesting [`Actor`] explicitly. Policy checks run
//! against the freshly loaded actor and report before the store is touched;
//! every write is a single store call, so a failed check or a failed write
//! leaves nothing behind. The last-admin rule and the status transition table
//! are checked again by the store inside the write's transaction.

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  Denial, Error, Result,
  comment::{self, Comment, NewComment, Visibility},
  module::Module,
  policy,
  report::{
    Category, NewReport, Report, ReportFilter, ReportView, StatusChange,
    StatusRequest,
  },
  store::{AdminGuarded, ReportScope, TrackerStore},
  user::{
    Actor, CredentialScheme, MIN_PASSWORD_LEN, NewUser, Role, User, UserRecord,
  },
};

/// The service facade over a [`TrackerStore`] and a [`CredentialScheme`].
pub struct Tracker<S, C> {
  store:       S,
  credentials: C,
}

/// Log a policy rejection at `debug` and pass the result through.
fn checked<T>(actor: &Actor, op: &'static str, result: Result<T>) -> Result<T> {
  if let Err(e) = &result {
    debug!(user_id = %actor.id(), role = %actor.role(), op, error = %e, "request rejected");
  }
  result
}

fn staff_comment(
  report_id: Uuid,
  author: &User,
  text: String,
  visibility: Visibility,
) -> NewComment {
  NewComment {
    report_id,
    text,
    visibility,
    author_name: author.name.clone(),
    author_staff_id: Some(author.user_id),
    replies_to: None,
  }
}

impl<S, C> Tracker<S, C>
where
  S: TrackerStore,
  C: CredentialScheme,
{
  pub fn new(store: S, credentials: C) -> Self { Self { store, credentials } }

  pub fn store(&self) -> &S { &self.store }

  pub fn credentials(&self) -> &C { &self.credentials }

  // ── Lookups ─────────────────────────────────────────────────────────────

  async fn user(&self, id: Uuid) -> Result<User> {
    self
      .store
      .get_user(id)
      .await
      .map_err(Error::from_store)?
      .ok_or(Error::UserNotFound(id))
  }

  async fn module(&self, id: Uuid) -> Result<Module> {
    self
      .store
      .get_module(id)
      .await
      .map_err(Error::from_store)?
      .ok_or(Error::ModuleNotFound(id))
  }

  async fn report(&self, id: Uuid) -> Result<Report> {
    self
      .store
      .get_report(id)
      .await
      .map_err(Error::from_store)?
      .ok_or(Error::ReportNotFound(id))
  }

  async fn comment(&self, id: Uuid) -> Result<Comment> {
    self
      .store
      .get_comment(id)
      .await
      .map_err(Error::from_store)?
      .ok_or(Error::CommentNotFound(id))
  }

  // ── Identity ────────────────────────────────────────────────────────────

  /// Resolve credentials to an [`Actor`]. Unknown email and wrong password
  /// both yield `None`.
  pub async fn authenticate(
    &self,
    email: &str,
    password: &str,
  ) -> Result<Option<Actor>> {
    let user = self
      .store
      .find_user_by_email(email.to_owned())
      .await
      .map_err(Error::from_store)?;

    match user {
      Some(user) if user.verify_credential(password, &self.credentials) => self
        .store
        .load_actor(user.user_id)
        .await
        .map_err(Error::from_store),
      _ => {
        debug!(email, "authentication failed");
        Ok(None)
      }
    }
  }

  /// Load the current state of a user as an [`Actor`].
  pub async fn actor(&self, id: Uuid) -> Result<Actor> {
    self
      .store
      .load_actor(id)
      .await
      .map_err(Error::from_store)?
      .ok_or(Error::UserNotFound(id))
  }

  /// Create an admin from pre-hashed credentials unless one already exists.
  /// Returns whether an admin was created.
  pub async fn bootstrap_admin(
    &self,
    name: &str,
    email: &str,
    password_hash: &str,
  ) -> Result<bool> {
    if self.store.count_admins().await.map_err(Error::from_store)? > 0 {
      return Ok(false);
    }
    if self
      .store
      .find_user_by_email(email.to_owned())
      .await
      .map_err(Error::from_store)?
      .is_some()
    {
      return Err(Error::DuplicateEmail(email.to_owned()));
    }

    let admin = self
      .store
      .insert_user(UserRecord {
        name:          name.to_owned(),
        email:         email.to_owned(),
        password_hash: password_hash.to_owned(),
        role:          Role::Admin,
      })
      .await
      .map_err(Error::from_store)?;

    info!(user_id = %admin.user_id, email, "bootstrap admin created");
    Ok(true)
  }

  pub async fn create_user(&self, actor: &Actor, input: NewUser) -> Result<User> {
    checked(actor, "create_user", policy::require_admin(actor))?;

    let name = policy::non_blank(Some(input.name.as_str())).ok_or(Error::EmptyText)?;
    let email = policy::non_blank(Some(input.email.as_str())).ok_or(Error::EmptyText)?;
    if input.password.chars().count() < MIN_PASSWORD_LEN {
      return Err(Error::PasswordTooShort { min: MIN_PASSWORD_LEN });
    }
    if self
      .store
      .find_user_by_email(email.clone())
      .await
      .map_err(Error::from_store)?
      .is_some()
    {
      return Err(Error::DuplicateEmail(email));
    }

    let password_hash = self.credentials.hash(&input.password)?;
    let user = self
      .store
      .insert_user(UserRecord { name, email, password_hash, role: input.role })
      .await
      .map_err(Error::from_store)?;

    info!(user_id = %user.user_id, role = %user.role, by = %actor.id(), "user created");
    Ok(user)
  }

  pub async fn list_users(&self, actor: &Actor) -> Result<Vec<User>> {
    checked(actor, "list_users", policy::require_admin(actor))?;
    self.store.list_users().await.map_err(Error::from_store)
  }

  /// Delete a user. Their reports (and those reports' comments) go with
  /// them; comments they wrote as staff keep the author name.
  pub async fn delete_user(&self, actor: &Actor, target_id: Uuid) -> Result<()> {
    checked(actor, "delete_user", policy::require_admin(actor))?;

    let target = self.user(target_id).await?;
    let admins = self.store.count_admins().await.map_err(Error::from_store)?;
    checked(
      actor,
      "delete_user",
      policy::check_user_removal(actor, &target, admins),
    )?;

    match self.store.delete_user(target_id).await.map_err(Error::from_store)? {
      AdminGuarded::Done(()) => {}
      AdminGuarded::Missing => return Err(Error::UserNotFound(target_id)),
      AdminGuarded::LastAdmin => {
        return checked(actor, "delete_user", Err(Error::LastAdmin));
      }
    }

    info!(user_id = %target_id, role = %target.role, by = %actor.id(), "user deleted");
    Ok(())
  }

  /// Give `target_id` a new role. Stripping the admin role is subject to the
  /// same rules as deleting an admin.
  pub async fn assign_role(
    &self,
    actor: &Actor,
    target_id: Uuid,
    role: Role,
  ) -> Result<User> {
    checked(actor, "assign_role", policy::require_admin(actor))?;

    let target = self.user(target_id).await?;
    if target.role == role {
      return Ok(target);
    }
    if target.role == Role::Admin {
      let admins = self.store.count_admins().await.map_err(Error::from_store)?;
      checked(
        actor,
        "assign_role",
        policy::check_user_removal(actor, &target, admins),
      )?;
    }

    let updated = match self
      .store
      .set_role(target_id, role)
      .await
      .map_err(Error::from_store)?
    {
      AdminGuarded::Done(user) => user,
      AdminGuarded::Missing => return Err(Error::UserNotFound(target_id)),
      AdminGuarded::LastAdmin => {
        return checked(actor, "assign_role", Err(Error::LastAdmin));
      }
    };

    info!(user_id = %target_id, from = %target.role, to = %role, by = %actor.id(), "role changed");
    Ok(updated)
  }

  // ── Modules ─────────────────────────────────────────────────────────────

  pub async fn create_module(&self, actor: &Actor, title: &str) -> Result<Module> {
    checked(actor, "create_module", policy::require_admin(actor))?;

    let title = policy::non_blank(Some(title)).ok_or(Error::EmptyTitle)?;
    if self
      .store
      .find_module_by_title(title.clone())
      .await
      .map_err(Error::from_store)?
      .is_some()
    {
      return Err(Error::DuplicateModule(title));
    }

    let module = self
      .store
      .insert_module(title)
      .await
      .map_err(Error::from_store)?;

    info!(module_id = %module.module_id, title = %module.title, "module created");
    Ok(module)
  }

  /// Every role may list all modules. With `assigned_only`, staff get just
  /// the modules they supervise; the flag is ignored for other roles.
  pub async fn list_modules(
    &self,
    actor: &Actor,
    assigned_only: bool,
  ) -> Result<Vec<Module>> {
    match actor {
      Actor::Staff { user, .. } if assigned_only => self
        .store
        .list_assigned_modules(user.user_id)
        .await
        .map_err(Error::from_store),
      _ => self.store.list_modules().await.map_err(Error::from_store),
    }
  }

  pub async fn module_staff(&self, actor: &Actor, module_id: Uuid) -> Result<Vec<User>> {
    checked(actor, "module_staff", policy::require_admin(actor))?;
    self.module(module_id).await?;
    self
      .store
      .list_module_staff(module_id)
      .await
      .map_err(Error::from_store)
  }

  /// Delete a module together with its reports. Assigned staff stay.
  pub async fn delete_module(&self, actor: &Actor, module_id: Uuid) -> Result<()> {
    checked(actor, "delete_module", policy::require_admin(actor))?;

    // Reports are deleted with the module even while still open.
    if !self.store.delete_module(module_id).await.map_err(Error::from_store)? {
      return Err(Error::ModuleNotFound(module_id));
    }

    info!(%module_id, by = %actor.id(), "module deleted");
    Ok(())
  }

  /// Returns `false` if `staff_id` was already assigned.
  pub async fn assign_staff(
    &self,
    actor: &Actor,
    module_id: Uuid,
    staff_id: Uuid,
  ) -> Result<bool> {
    checked(actor, "assign_staff", policy::require_admin(actor))?;
    self.module(module_id).await?;
    if self.user(staff_id).await?.role != Role::Staff {
      return Err(Error::NotStaff(staff_id));
    }

    let added = self
      .store
      .assign_staff(module_id, staff_id)
      .await
      .map_err(Error::from_store)?;
    if added {
      info!(%module_id, %staff_id, "staff assigned");
    }
    Ok(added)
  }

  /// Returns `false` if `staff_id` was not assigned.
  pub async fn unassign_staff(
    &self,
    actor: &Actor,
    module_id: Uuid,
    staff_id: Uuid,
  ) -> Result<bool> {
    checked(actor, "unassign_staff", policy::require_admin(actor))?;
    self.module(module_id).await?;
    self.user(staff_id).await?;

    let removed = self
      .store
      .unassign_staff(module_id, staff_id)
      .await
      .map_err(Error::from_store)?;
    if removed {
      info!(%module_id, %staff_id, "staff unassigned");
    }
    Ok(removed)
  }

  // ── Reports ─────────────────────────────────────────────────────────────

  /// File a report on behalf of the requesting student.
  ///
  /// If the module disappears between the existence check and the write, the
  /// store's foreign key fires and the error is [`Error::Integrity`].
  pub async fn create_report(&self, actor: &Actor, input: NewReport) -> Result<Report> {
    let owner = checked(actor, "create_report", policy::require_student(actor))?;

    let description =
      policy::non_blank(Some(input.description.as_str())).ok_or(Error::EmptyText)?;
    let category = match input.category {
      Category::Custom(text) => Category::Custom(
        policy::non_blank(Some(text.as_str())).ok_or(Error::EmptyCategory)?,
      ),
      known => known,
    };
    self.module(input.module_id).await?;

    let report = self
      .store
      .insert_report(owner.user_id, NewReport { description, category, ..input })
      .await
      .map_err(Error::from_store)?;

    info!(report_id = %report.report_id, module_id = %report.module_id, owner_id = %owner.user_id, "report created");
    Ok(report)
  }

  /// The report overview, newest first.
  ///
  /// Students see their own reports and staff the reports of their modules,
  /// unless `filter.all` widens the scope. Admins always see everything.
  pub async fn list_reports(
    &self,
    actor: &Actor,
    filter: &ReportFilter,
  ) -> Result<Vec<Report>> {
    let scope = match actor {
      Actor::Admin { .. } => ReportScope::All,
      _ if filter.all => ReportScope::All,
      Actor::Student { user } => ReportScope::OwnedBy(user.user_id),
      Actor::Staff { user, .. } => ReportScope::SupervisedBy(user.user_id),
    };

    let mut reports = self
      .store
      .list_reports(scope)
      .await
      .map_err(Error::from_store)?;
    reports.retain(|r| filter.matches(r));
    Ok(reports)
  }

  /// The comments on `report_id` that `actor` may read, oldest first.
  pub async fn visible_comments(
    &self,
    actor: &Actor,
    report_id: Uuid,
  ) -> Result<Vec<Comment>> {
    let report = self.report(report_id).await?;
    let comments = self
      .store
      .list_comments(report_id)
      .await
      .map_err(Error::from_store)?;
    Ok(policy::visible_comments(actor, &report, &comments))
  }

  /// A report with its module, owner, and the threads `actor` may read.
  pub async fn report_view(&self, actor: &Actor, report_id: Uuid) -> Result<ReportView> {
    let report = self.report(report_id).await?;
    let module = self.module(report.module_id).await?;
    let owner = self.user(report.owner_id).await?;
    let comments = self
      .store
      .list_comments(report_id)
      .await
      .map_err(Error::from_store)?;
    let visible = policy::visible_comments(actor, &report, &comments);

    Ok(ReportView {
      report,
      module_title: module.title,
      owner_name: owner.name,
      threads: comment::threads(visible),
    })
  }

  // ── Comments ────────────────────────────────────────────────────────────

  /// Staff comment on a report of an assigned module.
  pub async fn add_comment(
    &self,
    actor: &Actor,
    report_id: Uuid,
    text: &str,
    visibility: Visibility,
  ) -> Result<Comment> {
    checked(
      actor,
      "add_comment",
      policy::require_staff(actor, Denial::CommentRequiresStaff),
    )?;
    let report = self.report(report_id).await?;
    let author = checked(
      actor,
      "add_comment",
      policy::require_supervisor(actor, &report, Denial::CommentRequiresStaff),
    )?;
    let text = policy::non_blank(Some(text)).ok_or(Error::EmptyText)?;

    let comment = self
      .store
      .insert_comment(staff_comment(report_id, author, text, visibility))
      .await
      .map_err(Error::from_store)?;

    info!(comment_id = %comment.comment_id, %report_id, %visibility, "comment added");
    Ok(comment)
  }

  /// Advance a report's status, optionally writing a comment in the same
  /// transaction.
  ///
  /// Only the two authorization failures are errors. Requesting the current
  /// status, or a transition outside the table, is reported through
  /// [`StatusChange`]. The request is planned against the status the store
  /// reads inside its transaction, so of two racing requests the second sees
  /// what the first wrote.
  pub async fn change_status(
    &self,
    actor: &Actor,
    report_id: Uuid,
    request: StatusRequest,
  ) -> Result<StatusChange> {
    checked(
      actor,
      "change_status",
      policy::require_staff(actor, Denial::StatusRequiresStaff),
    )?;
    let report = self.report(report_id).await?;
    let author = checked(
      actor,
      "change_status",
      policy::require_supervisor(actor, &report, Denial::StatusRequiresStaff),
    )?;
    let comment = policy::non_blank(request.comment.as_deref())
      .map(|t| staff_comment(report_id, author, t, request.visibility));

    let change = self
      .store
      .apply_status_change(report_id, request.status, comment)
      .await
      .map_err(Error::from_store)?;

    match &change {
      StatusChange::Changed { from, to, comment } => {
        info!(%report_id, %from, %to, with_comment = comment.is_some(), "status changed");
      }
      StatusChange::Commented { comment } => {
        info!(%report_id, comment_id = %comment.comment_id, "comment added without status change");
      }
      StatusChange::Unchanged { .. } => {}
      StatusChange::Rejected { from, to } => {
        debug!(%report_id, %from, %to, "transition not allowed");
      }
    }
    Ok(change)
  }

  /// Reply to a comment as the student who filed its report. Replies are
  /// always private.
  pub async fn reply_to_comment(
    &self,
    actor: &Actor,
    comment_id: Uuid,
    text: &str,
  ) -> Result<Comment> {
    let parent = self.comment(comment_id).await?;
    let report = self.report(parent.report_id).await?;
    let student = checked(
      actor,
      "reply_to_comment",
      policy::require_report_owner(actor, &report),
    )?;
    let text = policy::non_blank(Some(text)).ok_or(Error::EmptyText)?;

    let reply = self
      .store
      .insert_comment(NewComment {
        report_id:       report.report_id,
        text,
        visibility:      Visibility::Private,
        author_name:     student.name.clone(),
        author_staff_id: None,
        replies_to:      Some(parent.comment_id),
      })
      .await
      .map_err(Error::from_store)?;

    info!(comment_id = %reply.comment_id, replies_to = %comment_id, "reply added");
    Ok(reply)
  }
}
