//! [`SqliteStore`] — the SQLite implementation of [`TrackerStore`].

use std::{collections::BTreeSet, path::Path};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tracing::debug;
use uuid::Uuid;

use kms_core::{
  comment::{Comment, NewComment},
  module::Module,
  policy::{StatusPlan, plan_status_change},
  report::{NewReport, Report, Status, StatusChange},
  store::{AdminGuarded, ReportScope, TrackerStore},
  user::{Actor, Role, User, UserRecord},
};

use crate::{
  Error, Result,
  encode::{
    RawComment, RawModule, RawReport, RawUser, decode_uuid, encode_category,
    encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A tracker store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    debug!("schema initialised");
    Ok(())
  }

  #[cfg(test)]
  pub(crate) fn connection(&self) -> &tokio_rusqlite::Connection { &self.conn }

  async fn user_where(
    &self,
    column: &'static str,
    value: String,
  ) -> Result<Option<User>> {
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {} FROM users WHERE {column} = ?1", RawUser::COLUMNS);
        Ok(
          conn
            .query_row(&sql, rusqlite::params![value], RawUser::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn modules_where(
    &self,
    clause: &'static str,
    param: Option<String>,
  ) -> Result<Vec<Module>> {
    let raws: Vec<RawModule> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM modules {clause} ORDER BY title",
          RawModule::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(param.iter()), RawModule::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawModule::into_module).collect()
  }
}

/// Write a fully-built comment inside an open connection or transaction.
fn insert_comment_row(
  conn: &rusqlite::Connection,
  c: &Comment,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO comments (
       comment_id, report_id, text, created_at, visibility,
       author_name, author_staff_id, replies_to
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    rusqlite::params![
      encode_uuid(c.comment_id),
      encode_uuid(c.report_id),
      c.text,
      encode_dt(c.created_at),
      c.visibility.to_string(),
      c.author_name,
      c.author_staff_id.map(encode_uuid),
      c.replies_to.map(encode_uuid),
    ],
  )?;
  Ok(())
}

/// Read `user_id`'s role. When `leaving` is set and the user is an admin,
/// refuse unless another admin exists. Run inside an immediate transaction so
/// the count holds until the write commits.
fn guard_admin_exit(
  conn: &rusqlite::Connection,
  user_id: &str,
  leaving: bool,
) -> rusqlite::Result<AdminGuarded<String>> {
  let role: Option<String> = conn
    .query_row(
      "SELECT role FROM users WHERE user_id = ?1",
      rusqlite::params![user_id],
      |row| row.get(0),
    )
    .optional()?;
  let Some(role) = role else {
    return Ok(AdminGuarded::Missing);
  };

  if leaving && role == Role::Admin.to_string() {
    let admins: i64 = conn.query_row(
      "SELECT COUNT(*) FROM users WHERE role = 'admin'",
      [],
      |row| row.get(0),
    )?;
    if admins <= 1 {
      return Ok(AdminGuarded::LastAdmin);
    }
  }
  Ok(AdminGuarded::Done(role))
}

fn build_comment(input: NewComment) -> Comment {
  Comment {
    comment_id:      Uuid::new_v4(),
    report_id:       input.report_id,
    text:            input.text,
    created_at:      Utc::now(),
    visibility:      input.visibility,
    author_name:     input.author_name,
    author_staff_id: input.author_staff_id,
    replies_to:      input.replies_to,
  }
}

// ─── TrackerStore impl ───────────────────────────────────────────────────────

impl TrackerStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn insert_user(&self, record: UserRecord) -> Result<User> {
    let user = User {
      user_id:       Uuid::new_v4(),
      name:          record.name,
      email:         record.email,
      password_hash: record.password_hash,
      role:          record.role,
      created_at:    Utc::now(),
    };

    let id_str   = encode_uuid(user.user_id);
    let name     = user.name.clone();
    let email    = user.email.clone();
    let hash     = user.password_hash.clone();
    let role_str = user.role.to_string();
    let at_str   = encode_dt(user.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, name, email, password_hash, role, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, name, email, hash, role_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    self.user_where("user_id", encode_uuid(id)).await
  }

  async fn find_user_by_email(&self, email: String) -> Result<Option<User>> {
    self.user_where("email", email).await
  }

  async fn list_users(&self) -> Result<Vec<User>> {
    let raws: Vec<RawUser> = self
      .conn
      .call(|conn| {
        let sql = format!(
          "SELECT {} FROM users ORDER BY name, email",
          RawUser::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn count_admins(&self) -> Result<usize> {
    let count: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM users WHERE role = 'admin'",
          [],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(usize::try_from(count).unwrap_or_default())
  }

  async fn delete_user(&self, id: Uuid) -> Result<AdminGuarded<()>> {
    let id_str = encode_uuid(id);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let guard = guard_admin_exit(&tx, &id_str, true)?;
        if let AdminGuarded::Done(_) = guard {
          tx.execute(
            "DELETE FROM users WHERE user_id = ?1",
            rusqlite::params![id_str],
          )?;
          tx.commit()?;
        }
        Ok(guard.map(|_| ()))
      })
      .await?;

    Ok(outcome)
  }

  async fn set_role(&self, id: Uuid, role: Role) -> Result<AdminGuarded<User>> {
    let id_str   = encode_uuid(id);
    let new_role = role.to_string();
    let leaving  = role != Role::Admin;

    let outcome: AdminGuarded<RawUser> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let old_role = match guard_admin_exit(&tx, &id_str, leaving)? {
          AdminGuarded::Done(role) => role,
          AdminGuarded::Missing => return Ok(AdminGuarded::Missing),
          AdminGuarded::LastAdmin => return Ok(AdminGuarded::LastAdmin),
        };

        if old_role != new_role {
          match old_role.as_str() {
            "staff" => {
              tx.execute(
                "DELETE FROM module_staff WHERE staff_id = ?1",
                rusqlite::params![id_str],
              )?;
            }
            "student" => {
              tx.execute(
                "DELETE FROM reports WHERE owner_id = ?1",
                rusqlite::params![id_str],
              )?;
            }
            _ => {}
          }
          tx.execute(
            "UPDATE users SET role = ?2 WHERE user_id = ?1",
            rusqlite::params![id_str, new_role],
          )?;
        }

        let sql = format!("SELECT {} FROM users WHERE user_id = ?1", RawUser::COLUMNS);
        let raw = tx.query_row(&sql, rusqlite::params![id_str], RawUser::from_row)?;
        tx.commit()?;
        Ok(AdminGuarded::Done(raw))
      })
      .await?;

    match outcome {
      AdminGuarded::Done(raw) => Ok(AdminGuarded::Done(raw.into_user()?)),
      AdminGuarded::Missing => Ok(AdminGuarded::Missing),
      AdminGuarded::LastAdmin => Ok(AdminGuarded::LastAdmin),
    }
  }

  async fn load_actor(&self, id: Uuid) -> Result<Option<Actor>> {
    let Some(user) = self.get_user(id).await? else {
      return Ok(None);
    };

    let modules = if user.role == Role::Staff {
      let id_str = encode_uuid(id);
      let ids: Vec<String> = self
        .conn
        .call(move |conn| {
          let mut stmt =
            conn.prepare("SELECT module_id FROM module_staff WHERE staff_id = ?1")?;
          let rows = stmt
            .query_map(rusqlite::params![id_str], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
          Ok(rows)
        })
        .await?;
      ids
        .iter()
        .map(|s| decode_uuid(s))
        .collect::<Result<BTreeSet<_>>>()?
    } else {
      BTreeSet::new()
    };

    Ok(Some(Actor::new(user, modules)))
  }

  // ── Modules ───────────────────────────────────────────────────────────────

  async fn insert_module(&self, title: String) -> Result<Module> {
    let module = Module {
      module_id:  Uuid::new_v4(),
      title,
      created_at: Utc::now(),
    };

    let id_str = encode_uuid(module.module_id);
    let title  = module.title.clone();
    let at_str = encode_dt(module.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO modules (module_id, title, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, title, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(module)
  }

  async fn get_module(&self, id: Uuid) -> Result<Option<Module>> {
    Ok(
      self
        .modules_where("WHERE module_id = ?1", Some(encode_uuid(id)))
        .await?
        .pop(),
    )
  }

  async fn find_module_by_title(&self, title: String) -> Result<Option<Module>> {
    Ok(self.modules_where("WHERE title = ?1", Some(title)).await?.pop())
  }

  async fn list_modules(&self) -> Result<Vec<Module>> {
    self.modules_where("", None).await
  }

  async fn list_assigned_modules(&self, staff_id: Uuid) -> Result<Vec<Module>> {
    self
      .modules_where(
        "WHERE module_id IN (SELECT module_id FROM module_staff WHERE staff_id = ?1)",
        Some(encode_uuid(staff_id)),
      )
      .await
  }

  async fn list_module_staff(&self, module_id: Uuid) -> Result<Vec<User>> {
    let id_str = encode_uuid(module_id);

    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM users
           WHERE user_id IN (SELECT staff_id FROM module_staff WHERE module_id = ?1)
           ORDER BY name, email",
          RawUser::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn delete_module(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM modules WHERE module_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn assign_staff(&self, module_id: Uuid, staff_id: Uuid) -> Result<bool> {
    let module_str = encode_uuid(module_id);
    let staff_str  = encode_uuid(staff_id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO module_staff (module_id, staff_id) VALUES (?1, ?2)",
          rusqlite::params![module_str, staff_str],
        )?)
      })
      .await?;

    Ok(changed == 1)
  }

  async fn unassign_staff(&self, module_id: Uuid, staff_id: Uuid) -> Result<bool> {
    let module_str = encode_uuid(module_id);
    let staff_str  = encode_uuid(staff_id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM module_staff WHERE module_id = ?1 AND staff_id = ?2",
          rusqlite::params![module_str, staff_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  // ── Reports ───────────────────────────────────────────────────────────────

  async fn insert_report(&self, owner_id: Uuid, input: NewReport) -> Result<Report> {
    let report = Report {
      report_id:   Uuid::new_v4(),
      description: input.description,
      category:    input.category,
      status:      Status::Open,
      created_at:  Utc::now(),
      owner_id,
      module_id:   input.module_id,
    };

    let id_str       = encode_uuid(report.report_id);
    let description  = report.description.clone();
    let category_str = encode_category(&report.category);
    let status_str   = report.status.to_string();
    let at_str       = encode_dt(report.created_at);
    let owner_str    = encode_uuid(owner_id);
    let module_str   = encode_uuid(report.module_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO reports (
             report_id, description, category, status, created_at, owner_id, module_id
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            id_str,
            description,
            category_str,
            status_str,
            at_str,
            owner_str,
            module_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(report)
  }

  async fn get_report(&self, id: Uuid) -> Result<Option<Report>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawReport> = self
      .conn
      .call(move |conn| {
        let sql =
          format!("SELECT {} FROM reports WHERE report_id = ?1", RawReport::COLUMNS);
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawReport::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawReport::into_report).transpose()
  }

  async fn list_reports(&self, scope: ReportScope) -> Result<Vec<Report>> {
    let (clause, param) = match scope {
      ReportScope::All => ("", None),
      ReportScope::OwnedBy(id) => ("WHERE owner_id = ?1", Some(encode_uuid(id))),
      ReportScope::SupervisedBy(id) => (
        "WHERE module_id IN (SELECT module_id FROM module_staff WHERE staff_id = ?1)",
        Some(encode_uuid(id)),
      ),
    };

    let raws: Vec<RawReport> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM reports {clause} ORDER BY created_at DESC, rowid DESC",
          RawReport::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(param.iter()), RawReport::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawReport::into_report).collect()
  }

  async fn apply_status_change(
    &self,
    report_id: Uuid,
    requested: Status,
    comment: Option<NewComment>,
  ) -> Result<StatusChange> {
    let id_str  = encode_uuid(report_id);
    let comment = comment.map(build_comment);

    // `None` when the report is gone.
    let outcome: Option<StatusChange> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let stored: Option<String> = tx
          .query_row(
            "SELECT status FROM reports WHERE report_id = ?1",
            rusqlite::params![id_str],
            |row| row.get(0),
          )
          .optional()?;
        let Some(stored) = stored else {
          return Ok(None);
        };
        let current: Status = stored.parse().map_err(|_| {
          tokio_rusqlite::Error::Other(format!("unknown status: {stored:?}").into())
        })?;

        let change = match plan_status_change(current, requested) {
          StatusPlan::Advance { from, to } => {
            tx.execute(
              "UPDATE reports SET status = ?2 WHERE report_id = ?1",
              rusqlite::params![id_str, to.to_string()],
            )?;
            if let Some(c) = &comment {
              insert_comment_row(&tx, c)?;
            }
            StatusChange::Changed { from, to, comment }
          }
          StatusPlan::Stay(status) => match comment {
            Some(c) => {
              insert_comment_row(&tx, &c)?;
              StatusChange::Commented { comment: c }
            }
            None => StatusChange::Unchanged { status },
          },
          StatusPlan::Reject { from, to } => StatusChange::Rejected { from, to },
        };

        tx.commit()?;
        Ok(Some(change))
      })
      .await?;

    outcome.ok_or(Error::Vanished(report_id))
  }

  // ── Comments ──────────────────────────────────────────────────────────────

  async fn insert_comment(&self, input: NewComment) -> Result<Comment> {
    let comment = build_comment(input);
    let row = comment.clone();

    self
      .conn
      .call(move |conn| {
        insert_comment_row(conn, &row)?;
        Ok(())
      })
      .await?;

    Ok(comment)
  }

  async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawComment> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM comments WHERE comment_id = ?1",
          RawComment::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawComment::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawComment::into_comment).transpose()
  }

  async fn list_comments(&self, report_id: Uuid) -> Result<Vec<Comment>> {
    let id_str = encode_uuid(report_id);

    let raws: Vec<RawComment> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM comments WHERE report_id = ?1 ORDER BY created_at, rowid",
          RawComment::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawComment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawComment::into_comment).collect()
  }
}
