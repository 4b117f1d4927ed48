//! Integration tests for `SqliteStore` against an in-memory database, driven
//! through the `Tracker` service the way the API uses it.

use kms_core::{
  Denial, Error as CoreError, ErrorKind, Tracker,
  comment::{NewComment, Visibility},
  module::Module,
  report::{Category, NewReport, Report, ReportFilter, Status, StatusChange, StatusRequest},
  store::{AdminGuarded, StoreError, TrackerStore},
  user::{Actor, CredentialScheme, NewUser, Role, UserRecord},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

struct Plain;

impl CredentialScheme for Plain {
  fn hash(&self, plaintext: &str) -> kms_core::Result<String> {
    Ok(format!("plain:{plaintext}"))
  }

  fn verify(&self, plaintext: &str, hash: &str) -> bool {
    hash.strip_prefix("plain:") == Some(plaintext)
  }
}

type Service = Tracker<SqliteStore, Plain>;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_user(name: &str, email: &str, role: Role) -> NewUser {
  NewUser {
    name:     name.into(),
    email:    email.into(),
    password: "123456789".into(),
    role,
  }
}

/// One admin, two staff (only `staff` assigned to `module`), two students,
/// and a second module nobody supervises.
struct World {
  t:        Service,
  admin:    Actor,
  staff:    Actor,
  outsider: Actor,
  student:  Actor,
  other:    Actor,
  module:   Module,
  spare:    Module,
}

impl World {
  async fn new() -> Self {
    let t = Tracker::new(store().await, Plain);
    assert!(
      t.bootstrap_admin("Admin", "admin@example.org", "plain:adminpass")
        .await
        .unwrap()
    );
    let admin = t
      .authenticate("admin@example.org", "adminpass")
      .await
      .unwrap()
      .expect("bootstrap admin can log in");

    let staff = t
      .create_user(&admin, new_user("Tutor 1", "l1@example.org", Role::Staff))
      .await
      .unwrap();
    let outsider = t
      .create_user(&admin, new_user("Tutor 2", "l2@example.org", Role::Staff))
      .await
      .unwrap();
    let student = t
      .create_user(&admin, new_user("Student 1", "s1@example.org", Role::Student))
      .await
      .unwrap();
    let other = t
      .create_user(&admin, new_user("Student 2", "s2@example.org", Role::Student))
      .await
      .unwrap();

    let module = t.create_module(&admin, "Testmodul").await.unwrap();
    let spare = t.create_module(&admin, "Anderes Modul").await.unwrap();
    assert!(
      t.assign_staff(&admin, module.module_id, staff.user_id)
        .await
        .unwrap()
    );

    Self {
      staff: t.actor(staff.user_id).await.unwrap(),
      outsider: t.actor(outsider.user_id).await.unwrap(),
      student: t.actor(student.user_id).await.unwrap(),
      other: t.actor(other.user_id).await.unwrap(),
      t,
      admin,
      module,
      spare,
    }
  }

  async fn report_by(&self, student: &Actor, module: &Module, text: &str) -> Report {
    self
      .t
      .create_report(student, NewReport {
        description: text.into(),
        category:    Category::PdfScript,
        module_id:   module.module_id,
      })
      .await
      .unwrap()
  }

  async fn report(&self) -> Report {
    self.report_by(&self.student, &self.module, "Tippfehler auf Seite 3").await
  }

  async fn refresh(&self, actor: &Actor) -> Actor {
    self.t.actor(actor.id()).await.unwrap()
  }
}

fn status(status: Status, comment: Option<&str>) -> StatusRequest {
  StatusRequest {
    status,
    comment: comment.map(str::to_owned),
    visibility: Visibility::Private,
  }
}

// ─── Identity ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn bootstrap_admin_only_runs_on_an_empty_store() {
  let w = World::new().await;
  let created = w
    .t
    .bootstrap_admin("Second", "second@example.org", "plain:whatever")
    .await
    .unwrap();
  assert!(!created);
  assert!(w.t.store().find_user_by_email("second@example.org".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn authenticate_rejects_wrong_password_and_unknown_email() {
  let w = World::new().await;
  assert!(w.t.authenticate("s1@example.org", "wrong").await.unwrap().is_none());
  assert!(w.t.authenticate("nobody@example.org", "123456789").await.unwrap().is_none());

  let actor = w.t.authenticate("l1@example.org", "123456789").await.unwrap().unwrap();
  assert!(actor.supervises(w.module.module_id));
}

#[tokio::test]
async fn create_user_rules() {
  let w = World::new().await;

  let err = w
    .t
    .create_user(&w.staff, new_user("X", "x@example.org", Role::Student))
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Forbidden(Denial::AdminOnly)));

  let mut short = new_user("X", "x@example.org", Role::Student);
  short.password = "123456".into();
  let err = w.t.create_user(&w.admin, short).await.unwrap_err();
  assert!(matches!(err, CoreError::PasswordTooShort { min: 7 }));

  let err = w
    .t
    .create_user(&w.admin, new_user("Copy", "s1@example.org", Role::Student))
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::DuplicateEmail(ref e) if e == "s1@example.org"));
  assert_eq!(err.kind(), ErrorKind::BusinessRule);

  let names: Vec<_> = w
    .t
    .list_users(&w.admin)
    .await
    .unwrap()
    .into_iter()
    .map(|u| u.name)
    .collect();
  assert_eq!(names, ["Admin", "Student 1", "Student 2", "Tutor 1", "Tutor 2"]);
}

#[tokio::test]
async fn duplicate_email_at_the_store_is_an_integrity_violation() {
  let s = store().await;
  let record = UserRecord {
    name:          "A".into(),
    email:         "a@example.org".into(),
    password_hash: "plain:x".into(),
    role:          Role::Student,
  };
  s.insert_user(record.clone()).await.unwrap();

  let err = s.insert_user(record).await.unwrap_err();
  assert!(err.is_integrity_violation());
  assert_eq!(CoreError::from_store(err).kind(), ErrorKind::Integrity);
}

// ─── Admin safety ────────────────────────────────────────────────────────────

#[tokio::test]
async fn last_admin_cannot_be_removed() {
  let w = World::new().await;

  let err = w.t.delete_user(&w.admin, w.admin.id()).await.unwrap_err();
  assert!(matches!(err, CoreError::LastAdmin));

  let err = w
    .t
    .assign_role(&w.admin, w.admin.id(), Role::Staff)
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::LastAdmin));

  let second = w
    .t
    .create_user(&w.admin, new_user("Admin 2", "a2@example.org", Role::Admin))
    .await
    .unwrap();

  let err = w.t.delete_user(&w.admin, w.admin.id()).await.unwrap_err();
  assert!(matches!(err, CoreError::SelfDelete));

  w.t.delete_user(&w.admin, second.user_id).await.unwrap();
  assert_eq!(w.t.store().count_admins().await.unwrap(), 1);
}

#[tokio::test]
async fn admins_deleting_each_other_leave_one_behind() {
  let w = World::new().await;
  let second = w
    .t
    .create_user(&w.admin, new_user("Admin 2", "a2@example.org", Role::Admin))
    .await
    .unwrap();
  let second = w.t.actor(second.user_id).await.unwrap();

  let (a, b) = tokio::join!(
    w.t.delete_user(&w.admin, second.id()),
    w.t.delete_user(&second, w.admin.id()),
  );

  let refused = [&a, &b]
    .into_iter()
    .filter(|r| matches!(r, Err(CoreError::LastAdmin)))
    .count();
  assert_eq!(refused, 1, "{a:?} / {b:?}");
  assert!(a.is_ok() || b.is_ok());
  assert_eq!(w.t.store().count_admins().await.unwrap(), 1);
}

#[tokio::test]
async fn admins_demoting_each_other_leave_one_behind() {
  let w = World::new().await;
  let second = w
    .t
    .create_user(&w.admin, new_user("Admin 2", "a2@example.org", Role::Admin))
    .await
    .unwrap();
  let second = w.t.actor(second.user_id).await.unwrap();

  let (a, b) = tokio::join!(
    w.t.assign_role(&w.admin, second.id(), Role::Staff),
    w.t.assign_role(&second, w.admin.id(), Role::Staff),
  );

  assert!(a.is_ok() != b.is_ok(), "{a:?} / {b:?}");
  assert!(matches!(a.err().or(b.err()), Some(CoreError::LastAdmin)));
  assert_eq!(w.t.store().count_admins().await.unwrap(), 1);
}

#[tokio::test]
async fn store_refuses_to_remove_the_last_admin() {
  let w = World::new().await;
  let s = w.t.store();

  assert_eq!(s.delete_user(w.admin.id()).await.unwrap(), AdminGuarded::LastAdmin);
  assert!(matches!(
    s.set_role(w.admin.id(), Role::Student).await.unwrap(),
    AdminGuarded::LastAdmin
  ));
  assert!(matches!(
    s.set_role(w.admin.id(), Role::Admin).await.unwrap(),
    AdminGuarded::Done(_)
  ));
  assert_eq!(s.delete_user(Uuid::new_v4()).await.unwrap(), AdminGuarded::Missing);
  assert_eq!(s.delete_user(w.student.id()).await.unwrap(), AdminGuarded::Done(()));
  assert_eq!(s.count_admins().await.unwrap(), 1);
}

#[tokio::test]
async fn non_admins_cannot_delete_users() {
  let w = World::new().await;
  let err = w.t.delete_user(&w.staff, w.student.id()).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Authorization);

  let err = w.t.delete_user(&w.admin, Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, CoreError::UserNotFound(_)));
}

// ─── Modules ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn module_titles_are_unique_and_non_empty() {
  let w = World::new().await;

  let err = w.t.create_module(&w.admin, "Testmodul").await.unwrap_err();
  assert!(matches!(err, CoreError::DuplicateModule(ref t) if t == "Testmodul"));

  let err = w.t.create_module(&w.admin, "   ").await.unwrap_err();
  assert!(matches!(err, CoreError::EmptyTitle));

  // Titles compare case-sensitively.
  w.t.create_module(&w.admin, "testmodul").await.unwrap();

  let err = w.t.create_module(&w.student, "Neu").await.unwrap_err();
  assert!(matches!(err, CoreError::Forbidden(Denial::AdminOnly)));
}

#[tokio::test]
async fn staff_assignment() {
  let w = World::new().await;

  let err = w
    .t
    .assign_staff(&w.admin, w.spare.module_id, w.student.id())
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::NotStaff(id) if id == w.student.id()));

  assert!(!w.t.assign_staff(&w.admin, w.module.module_id, w.staff.id()).await.unwrap());

  let staff: Vec<_> = w
    .t
    .module_staff(&w.admin, w.module.module_id)
    .await
    .unwrap()
    .into_iter()
    .map(|u| u.user_id)
    .collect();
  assert_eq!(staff, [w.staff.id()]);

  let assigned = w.t.list_modules(&w.staff, true).await.unwrap();
  assert_eq!(assigned, [w.module.clone()]);
  assert_eq!(w.t.list_modules(&w.staff, false).await.unwrap().len(), 2);
  assert_eq!(w.t.list_modules(&w.student, true).await.unwrap().len(), 2);

  assert!(w.t.unassign_staff(&w.admin, w.module.module_id, w.staff.id()).await.unwrap());
  assert!(!w.t.unassign_staff(&w.admin, w.module.module_id, w.staff.id()).await.unwrap());
  assert!(!w.refresh(&w.staff).await.supervises(w.module.module_id));
}

#[tokio::test]
async fn deleting_a_module_removes_its_reports_but_keeps_staff() {
  let w = World::new().await;
  let report = w.report().await;
  w.t
    .add_comment(&w.staff, report.report_id, "Danke", Visibility::Public)
    .await
    .unwrap();

  w.t.delete_module(&w.admin, w.module.module_id).await.unwrap();

  assert!(w.t.store().get_report(report.report_id).await.unwrap().is_none());
  assert!(w.t.store().list_comments(report.report_id).await.unwrap().is_empty());
  let staff = w.refresh(&w.staff).await;
  assert_eq!(staff.role(), Role::Staff);
  assert!(!staff.supervises(w.module.module_id));

  let err = w.t.delete_module(&w.admin, w.module.module_id).await.unwrap_err();
  assert!(matches!(err, CoreError::ModuleNotFound(_)));
}

// ─── Reports ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn only_students_file_reports() {
  let w = World::new().await;
  let input = NewReport {
    description: "Video ruckelt".into(),
    category:    Category::Video,
    module_id:   w.module.module_id,
  };

  let err = w.t.create_report(&w.staff, input.clone()).await.unwrap_err();
  assert!(matches!(err, CoreError::Forbidden(Denial::StudentOnly)));

  let err = w
    .t
    .create_report(&w.student, NewReport { description: "  ".into(), ..input.clone() })
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::EmptyText));

  let err = w
    .t
    .create_report(&w.student, NewReport { module_id: Uuid::new_v4(), ..input.clone() })
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::ModuleNotFound(_)));

  let report = w.t.create_report(&w.student, input).await.unwrap();
  assert_eq!(report.status, Status::Open);
  assert_eq!(report.owner_id, w.student.id());
}

#[tokio::test]
async fn custom_categories_survive_storage() {
  let w = World::new().await;
  let report = w
    .t
    .create_report(&w.student, NewReport {
      description: "Audio fehlt".into(),
      category:    Category::Custom("Podcast".into()),
      module_id:   w.module.module_id,
    })
    .await
    .unwrap();

  let stored = w.t.store().get_report(report.report_id).await.unwrap().unwrap();
  assert_eq!(stored.category, Category::Custom("Podcast".into()));

  let trimmed = w
    .t
    .create_report(&w.student, NewReport {
      description: "Audio fehlt".into(),
      category:    Category::Custom("  Hörbuch ".into()),
      module_id:   w.module.module_id,
    })
    .await
    .unwrap();
  assert_eq!(trimmed.category, Category::Custom("Hörbuch".into()));

  let err = w
    .t
    .create_report(&w.student, NewReport {
      description: "Audio fehlt".into(),
      category:    Category::Custom("   ".into()),
      module_id:   w.module.module_id,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::EmptyCategory));
  assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn report_overview_scopes_and_filters() {
  let w = World::new().await;
  let first = w.report().await;
  let second = w.report_by(&w.other, &w.spare, "Folie 12 fehlt").await;
  let third = w.report_by(&w.student, &w.spare, "Link kaputt").await;

  let ids = |reports: Vec<Report>| reports.into_iter().map(|r| r.report_id).collect::<Vec<_>>();

  let own = w.t.list_reports(&w.student, &ReportFilter::default()).await.unwrap();
  assert_eq!(ids(own), [third.report_id, first.report_id]);

  let supervised = w.t.list_reports(&w.staff, &ReportFilter::default()).await.unwrap();
  assert_eq!(ids(supervised), [first.report_id]);

  let all = ReportFilter { all: true, ..Default::default() };
  let everything = w.t.list_reports(&w.student, &all).await.unwrap();
  assert_eq!(ids(everything), [third.report_id, second.report_id, first.report_id]);

  let by_module = ReportFilter { module_id: Some(w.spare.module_id), ..Default::default() };
  let admin_view = w.t.list_reports(&w.admin, &by_module).await.unwrap();
  assert_eq!(ids(admin_view), [third.report_id, second.report_id]);
}

// ─── Status changes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn status_change_requires_assigned_staff() {
  let w = World::new().await;
  let report = w.report().await;

  let err = w
    .t
    .change_status(&w.student, report.report_id, status(Status::InProgress, None))
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Forbidden(Denial::StatusRequiresStaff)));
  assert_eq!(err.to_string(), "forbidden: only Staff may change status");

  let err = w
    .t
    .change_status(&w.outsider, report.report_id, status(Status::InProgress, None))
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Forbidden(Denial::ForeignModule)));

  let err = w
    .t
    .change_status(&w.admin, report.report_id, status(Status::InProgress, None))
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Forbidden(Denial::StatusRequiresStaff)));

  let stored = w.t.store().get_report(report.report_id).await.unwrap().unwrap();
  assert_eq!(stored.status, Status::Open);
}

#[tokio::test]
async fn role_is_checked_before_the_report_lookup() {
  let w = World::new().await;
  let missing = Uuid::new_v4();

  let err = w
    .t
    .change_status(&w.student, missing, status(Status::InProgress, None))
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Forbidden(Denial::StatusRequiresStaff)));

  let err = w
    .t
    .add_comment(&w.admin, missing, "Hallo", Visibility::Public)
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Forbidden(Denial::CommentRequiresStaff)));

  let err = w
    .t
    .change_status(&w.staff, missing, status(Status::InProgress, None))
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::ReportNotFound(_)));
}

#[tokio::test]
async fn racing_status_requests_see_each_others_writes() {
  let w = World::new().await;
  let id = w.report().await.report_id;
  w.t.change_status(&w.staff, id, status(Status::InProgress, None))
    .await
    .unwrap();

  let (first, second) = tokio::join!(
    w.t.change_status(&w.staff, id, status(Status::Closed, None)),
    w.t.change_status(&w.staff, id, status(Status::Closed, Some("zu"))),
  );
  let outcomes = [first.unwrap(), second.unwrap()];

  let changed = outcomes
    .iter()
    .filter(|o| matches!(o, StatusChange::Changed { from: Status::InProgress, to: Status::Closed, .. }))
    .count();
  assert_eq!(changed, 1, "{outcomes:?}");
  assert!(outcomes.iter().any(|o| matches!(
    o,
    StatusChange::Commented { .. } | StatusChange::Unchanged { status: Status::Closed }
  )));

  let stored = w.t.store().get_report(id).await.unwrap().unwrap();
  assert_eq!(stored.status, Status::Closed);
  assert_eq!(w.t.store().list_comments(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn store_plans_against_the_stored_status() {
  let w = World::new().await;
  let report = w.report().await;
  let s = w.t.store();
  let note = || NewComment {
    report_id:       report.report_id,
    text:            "Wird geprüft".into(),
    visibility:      Visibility::Private,
    author_name:     "Tutor 1".into(),
    author_staff_id: Some(w.staff.id()),
    replies_to:      None,
  };

  let started = s
    .apply_status_change(report.report_id, Status::InProgress, None)
    .await
    .unwrap();
  assert!(matches!(started, StatusChange::Changed { from: Status::Open, .. }));
  s.apply_status_change(report.report_id, Status::Closed, None)
    .await
    .unwrap();

  // A request planned against the old `open` status cannot reopen it.
  let stale = s
    .apply_status_change(report.report_id, Status::InProgress, Some(note()))
    .await
    .unwrap();
  assert!(matches!(
    stale,
    StatusChange::Rejected { from: Status::Closed, to: Status::InProgress }
  ));
  assert!(s.list_comments(report.report_id).await.unwrap().is_empty());

  let stored = s.get_report(report.report_id).await.unwrap().unwrap();
  assert_eq!(stored.status, Status::Closed);
}

#[tokio::test]
async fn status_walks_the_transition_table() {
  let w = World::new().await;
  let report = w.report().await;
  let id = report.report_id;

  let skipped = w
    .t
    .change_status(&w.staff, id, status(Status::Closed, Some("erledigt")))
    .await
    .unwrap();
  assert!(matches!(
    skipped,
    StatusChange::Rejected { from: Status::Open, to: Status::Closed }
  ));
  assert!(w.t.store().list_comments(id).await.unwrap().is_empty());

  let started = w
    .t
    .change_status(&w.staff, id, status(Status::InProgress, Some("Wird geprüft")))
    .await
    .unwrap();
  match started {
    StatusChange::Changed { from, to, comment: Some(c) } => {
      assert_eq!((from, to), (Status::Open, Status::InProgress));
      assert_eq!(c.text, "Wird geprüft");
      assert_eq!(c.author_name, "Tutor 1");
      assert_eq!(c.author_staff_id, Some(w.staff.id()));
    }
    other => panic!("unexpected outcome: {other:?}"),
  }

  let same = w
    .t
    .change_status(&w.staff, id, status(Status::InProgress, None))
    .await
    .unwrap();
  assert!(matches!(same, StatusChange::Unchanged { status: Status::InProgress }));

  let noted = w
    .t
    .change_status(&w.staff, id, status(Status::InProgress, Some("Noch offen")))
    .await
    .unwrap();
  assert!(matches!(noted, StatusChange::Commented { .. }));

  let back = w
    .t
    .change_status(&w.staff, id, status(Status::Open, None))
    .await
    .unwrap();
  assert!(matches!(back, StatusChange::Rejected { .. }));

  let closed = w
    .t
    .change_status(&w.staff, id, status(Status::Closed, Some("   ")))
    .await
    .unwrap();
  assert!(matches!(closed, StatusChange::Changed { comment: None, .. }));

  for next in [Status::Open, Status::InProgress] {
    let outcome = w.t.change_status(&w.staff, id, status(next, None)).await.unwrap();
    assert!(matches!(outcome, StatusChange::Rejected { from: Status::Closed, .. }));
  }

  let stored = w.t.store().get_report(id).await.unwrap().unwrap();
  assert_eq!(stored.status, Status::Closed);
  assert_eq!(w.t.store().list_comments(id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn status_update_on_a_vanished_report_is_an_integrity_violation() {
  let s = store().await;
  let err = s
    .apply_status_change(Uuid::new_v4(), Status::InProgress, None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Vanished(_)));
  assert!(err.is_integrity_violation());
}

#[tokio::test]
async fn comment_on_a_missing_report_is_an_integrity_violation() {
  let s = store().await;
  let err = s
    .insert_comment(NewComment {
      report_id:       Uuid::new_v4(),
      text:            "Hallo".into(),
      visibility:      Visibility::Public,
      author_name:     "Tutor 1".into(),
      author_staff_id: None,
      replies_to:      None,
    })
    .await
    .unwrap_err();
  assert!(err.is_integrity_violation());
}

// ─── Comments and visibility ─────────────────────────────────────────────────

#[tokio::test]
async fn comment_visibility() {
  let w = World::new().await;
  let report = w.report().await;
  let id = report.report_id;

  let private = w
    .t
    .add_comment(&w.staff, id, "Intern", Visibility::Private)
    .await
    .unwrap();
  let public = w
    .t
    .add_comment(&w.staff, id, "Für alle", Visibility::Public)
    .await
    .unwrap();

  let ids = |comments: Vec<kms_core::comment::Comment>| {
    comments.into_iter().map(|c| c.comment_id).collect::<Vec<_>>()
  };

  let owner = w.t.visible_comments(&w.student, id).await.unwrap();
  assert_eq!(ids(owner), [private.comment_id, public.comment_id]);

  let stranger = w.t.visible_comments(&w.other, id).await.unwrap();
  assert_eq!(ids(stranger), [public.comment_id]);

  let outsider = w.t.visible_comments(&w.outsider, id).await.unwrap();
  assert_eq!(ids(outsider), [public.comment_id]);

  let admin = w.t.visible_comments(&w.admin, id).await.unwrap();
  assert_eq!(admin.len(), 2);

  // Authors keep sight of their own comments after being unassigned.
  w.t.unassign_staff(&w.admin, w.module.module_id, w.staff.id()).await.unwrap();
  let former = w.refresh(&w.staff).await;
  assert_eq!(w.t.visible_comments(&former, id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn only_assigned_staff_comment() {
  let w = World::new().await;
  let report = w.report().await;

  let err = w
    .t
    .add_comment(&w.student, report.report_id, "Hallo", Visibility::Public)
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Forbidden(Denial::CommentRequiresStaff)));

  let err = w
    .t
    .add_comment(&w.outsider, report.report_id, "Hallo", Visibility::Public)
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Forbidden(Denial::ForeignModule)));

  let err = w
    .t
    .add_comment(&w.staff, report.report_id, "\n", Visibility::Public)
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::EmptyText));
}

#[tokio::test]
async fn replies_are_private_and_threaded() {
  let w = World::new().await;
  let report = w.report().await;
  let parent = w
    .t
    .add_comment(&w.staff, report.report_id, "Welche Seite?", Visibility::Public)
    .await
    .unwrap();

  let err = w
    .t
    .reply_to_comment(&w.other, parent.comment_id, "Seite 3")
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Forbidden(Denial::NotReportOwner)));

  let err = w
    .t
    .reply_to_comment(&w.student, parent.comment_id, "  ")
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::EmptyText));

  let reply = w
    .t
    .reply_to_comment(&w.student, parent.comment_id, "  Seite 3 ")
    .await
    .unwrap();
  assert_eq!(reply.text, "Seite 3");
  assert_eq!(reply.visibility, Visibility::Private);
  assert_eq!(reply.replies_to, Some(parent.comment_id));
  assert_eq!(reply.author_staff_id, None);
  assert_eq!(reply.author_name, "Student 1");

  let view = w.t.report_view(&w.staff, report.report_id).await.unwrap();
  assert_eq!(view.module_title, "Testmodul");
  assert_eq!(view.owner_name, "Student 1");
  assert_eq!(view.threads.len(), 1);
  assert_eq!(view.threads[0].comment.comment_id, parent.comment_id);
  assert_eq!(view.threads[0].replies.len(), 1);

  // The private reply stays hidden from other students.
  let view = w.t.report_view(&w.other, report.report_id).await.unwrap();
  assert_eq!(view.threads.len(), 1);
  assert!(view.threads[0].replies.is_empty());

  let err = w.t.reply_to_comment(&w.student, Uuid::new_v4(), "x").await.unwrap_err();
  assert!(matches!(err, CoreError::CommentNotFound(_)));
}

#[tokio::test]
async fn comment_visibility_is_immutable_in_storage() {
  let w = World::new().await;
  let report = w.report().await;
  let comment = w
    .t
    .add_comment(&w.staff, report.report_id, "Intern", Visibility::Private)
    .await
    .unwrap();

  let id = comment.comment_id.to_string();
  let result = w
    .t
    .store()
    .connection()
    .call(move |conn| {
      conn.execute(
        "UPDATE comments SET visibility = 'public' WHERE comment_id = ?1",
        rusqlite::params![id],
      )?;
      Ok(())
    })
    .await;
  let err = Error::from(result.unwrap_err());
  assert!(err.is_integrity_violation());

  let stored = w.t.store().get_comment(comment.comment_id).await.unwrap().unwrap();
  assert_eq!(stored.visibility, Visibility::Private);
}

// ─── Cascades ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn deleting_a_student_removes_their_reports() {
  let w = World::new().await;
  let report = w.report().await;
  let kept = w.report_by(&w.other, &w.module, "Anderer Fehler").await;

  w.t.delete_user(&w.admin, w.student.id()).await.unwrap();

  assert!(w.t.store().get_report(report.report_id).await.unwrap().is_none());
  assert!(w.t.store().get_report(kept.report_id).await.unwrap().is_some());
}

#[tokio::test]
async fn deleting_staff_keeps_their_comments() {
  let w = World::new().await;
  let report = w.report().await;
  let comment = w
    .t
    .add_comment(&w.staff, report.report_id, "Behoben", Visibility::Public)
    .await
    .unwrap();

  w.t.delete_user(&w.admin, w.staff.id()).await.unwrap();

  let stored = w.t.store().get_comment(comment.comment_id).await.unwrap().unwrap();
  assert_eq!(stored.author_name, "Tutor 1");
  assert_eq!(stored.author_staff_id, None);
  assert!(w.t.module_staff(&w.admin, w.module.module_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn role_changes_drop_role_specific_data() {
  let w = World::new().await;
  let report = w.report().await;

  let demoted = w
    .t
    .assign_role(&w.admin, w.staff.id(), Role::Student)
    .await
    .unwrap();
  assert_eq!(demoted.role, Role::Student);
  assert!(w.t.module_staff(&w.admin, w.module.module_id).await.unwrap().is_empty());

  w.t.assign_role(&w.admin, w.student.id(), Role::Staff).await.unwrap();
  assert!(w.t.store().get_report(report.report_id).await.unwrap().is_none());

  let unchanged = w.t.assign_role(&w.admin, w.other.id(), Role::Student).await.unwrap();
  assert_eq!(unchanged.role, Role::Student);
}
