//! Access policy: who may do what to which report, module, or comment.
//!
//! Everything here is a pure function of its arguments. Nothing is cached;
//! callers pass a freshly loaded [`Actor`] so assignment and ownership changes
//! are honoured on the next call.

use crate::{
  Denial, Error, Result,
  comment::{Comment, Visibility},
  report::{Report, Status},
  user::{Actor, Role, User},
};

// ─── Comment visibility ──────────────────────────────────────────────────────

/// Whether `actor` may read `comment` on `report`.
///
/// - Student: public comments, plus private ones on reports they own.
/// - Staff: their own comments, every comment on reports of an assigned
///   module, and public comments anywhere.
/// - Admin: everything.
pub fn can_see(actor: &Actor, report: &Report, comment: &Comment) -> bool {
  let public = comment.visibility == Visibility::Public;
  match actor {
    Actor::Student { user } => public || report.owner_id == user.user_id,
    Actor::Staff { user, modules } => {
      comment.author_staff_id == Some(user.user_id)
        || modules.contains(&report.module_id)
        || public
    }
    Actor::Admin { .. } => true,
  }
}

/// The subsequence of `comments` that `actor` may read, in input order.
pub fn visible_comments(
  actor: &Actor,
  report: &Report,
  comments: &[Comment],
) -> Vec<Comment> {
  comments
    .iter()
    .filter(|c| can_see(actor, report, c))
    .cloned()
    .collect()
}

// ─── Role gates ──────────────────────────────────────────────────────────────

pub fn require_admin(actor: &Actor) -> Result<()> {
  if actor.is_admin() {
    Ok(())
  } else {
    Err(Denial::AdminOnly.into())
  }
}

pub fn require_student(actor: &Actor) -> Result<&User> {
  match actor {
    Actor::Student { user } => Ok(user),
    _ => Err(Denial::StudentOnly.into()),
  }
}

/// Any staff member. `not_staff` is the denial reported to everyone else.
pub fn require_staff(actor: &Actor, not_staff: Denial) -> Result<()> {
  match actor {
    Actor::Staff { .. } => Ok(()),
    _ => Err(not_staff.into()),
  }
}

/// Staff assigned to the report's module. `not_staff` is the denial reported
/// to non-staff callers.
pub fn require_supervisor<'a>(
  actor: &'a Actor,
  report: &Report,
  not_staff: Denial,
) -> Result<&'a User> {
  match actor {
    Actor::Staff { user, modules } if modules.contains(&report.module_id) => {
      Ok(user)
    }
    Actor::Staff { .. } => Err(Denial::ForeignModule.into()),
    _ => Err(not_staff.into()),
  }
}

/// The student who filed `report`.
pub fn require_report_owner<'a>(
  actor: &'a Actor,
  report: &Report,
) -> Result<&'a User> {
  match actor {
    Actor::Student { user } if user.user_id == report.owner_id => Ok(user),
    _ => Err(Denial::NotReportOwner.into()),
  }
}

// ─── Status transitions ──────────────────────────────────────────────────────

/// What a status request amounts to, before any comment is considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPlan {
  Advance { from: Status, to: Status },
  Stay(Status),
  Reject { from: Status, to: Status },
}

pub fn plan_status_change(current: Status, requested: Status) -> StatusPlan {
  if current.can_advance_to(requested) {
    StatusPlan::Advance { from: current, to: requested }
  } else if current == requested {
    StatusPlan::Stay(current)
  } else {
    StatusPlan::Reject { from: current, to: requested }
  }
}

// ─── User removal ────────────────────────────────────────────────────────────

/// Whether `actor` may delete `target` (or strip its admin role), given the
/// current number of admins.
pub fn check_user_removal(
  actor: &Actor,
  target: &User,
  admin_count: usize,
) -> Result<()> {
  require_admin(actor)?;
  if target.role == Role::Admin {
    if admin_count <= 1 {
      return Err(Error::LastAdmin);
    }
    if target.user_id == actor.id() {
      return Err(Error::SelfDelete);
    }
  }
  Ok(())
}

/// Trim `text`; `None` if nothing is left.
pub fn non_blank(text: Option<&str>) -> Option<String> {
  text.map(str::trim).filter(|t| !t.is_empty()).map(str::to_owned)
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use chrono::Utc;
  use uuid::Uuid;

  use super::*;
  use crate::report::Category;

  fn user(role: Role, name: &str) -> User {
    User {
      user_id: Uuid::new_v4(),
      name: name.into(),
      email: format!("{}@example.org", name.replace(' ', "").to_lowercase()),
      password_hash: String::new(),
      role,
      created_at: Utc::now(),
    }
  }

  fn student(name: &str) -> Actor {
    Actor::new(user(Role::Student, name), BTreeSet::new())
  }

  fn staff(name: &str, modules: &[Uuid]) -> Actor {
    Actor::new(user(Role::Staff, name), modules.iter().copied().collect())
  }

  fn admin(name: &str) -> Actor {
    Actor::new(user(Role::Admin, name), BTreeSet::new())
  }

  fn report(owner: &Actor, module_id: Uuid) -> Report {
    Report {
      report_id: Uuid::new_v4(),
      description: "Fehler in Aufgabe 3".into(),
      category: Category::OnlineScript,
      status: Status::Open,
      created_at: Utc::now(),
      owner_id: owner.id(),
      module_id,
    }
  }

  fn comment(
    report: &Report,
    visibility: Visibility,
    author: Option<&Actor>,
  ) -> Comment {
    Comment {
      comment_id: Uuid::new_v4(),
      report_id: report.report_id,
      text: "check again".into(),
      created_at: Utc::now(),
      visibility,
      author_name: author.map_or("Student".into(), |a| a.user().name.clone()),
      author_staff_id: author.map(Actor::id),
      replies_to: None,
    }
  }

  // ── Visibility ──────────────────────────────────────────────────────────

  #[test]
  fn non_owner_student_never_sees_private_comments() {
    let m = Uuid::new_v4();
    let owner = student("Student 1");
    let other = student("Student 2");
    let tutor = staff("Tutor 1", &[m]);
    let r = report(&owner, m);
    let comments = vec![
      comment(&r, Visibility::Private, Some(&tutor)),
      comment(&r, Visibility::Public, Some(&tutor)),
      comment(&r, Visibility::Private, None),
    ];

    let seen = visible_comments(&other, &r, &comments);
    assert_eq!(seen, vec![comments[1].clone()]);
    assert!(seen.iter().all(|c| c.visibility == Visibility::Public));
  }

  #[test]
  fn owner_sees_everything_on_their_report() {
    let m = Uuid::new_v4();
    let owner = student("Student 1");
    let tutor = staff("Tutor 1", &[m]);
    let r = report(&owner, m);
    let comments = vec![
      comment(&r, Visibility::Private, Some(&tutor)),
      comment(&r, Visibility::Public, Some(&tutor)),
    ];
    assert_eq!(visible_comments(&owner, &r, &comments), comments);
  }

  #[test]
  fn public_comments_are_visible_to_every_role() {
    let m = Uuid::new_v4();
    let owner = student("Student 1");
    let tutor = staff("Tutor 1", &[m]);
    let r = report(&owner, m);
    let c = comment(&r, Visibility::Public, Some(&tutor));

    let everyone = [
      owner.clone(),
      student("Student 2"),
      tutor.clone(),
      staff("Tutor 2", &[]),
      admin("Admin"),
    ];
    for actor in &everyone {
      assert!(can_see(actor, &r, &c), "{:?} should see it", actor.role());
    }
  }

  #[test]
  fn staff_sees_all_comments_on_assigned_modules() {
    let m = Uuid::new_v4();
    let owner = student("Student 1");
    let tutor = staff("Tutor 1", &[m]);
    let colleague = staff("Tutor 2", &[m]);
    let r = report(&owner, m);
    let private = comment(&r, Visibility::Private, Some(&tutor));
    let reply = comment(&r, Visibility::Private, None);

    assert!(can_see(&colleague, &r, &private));
    assert!(can_see(&colleague, &r, &reply));
  }

  #[test]
  fn unassigned_staff_sees_only_public_and_own_comments() {
    let m = Uuid::new_v4();
    let owner = student("Student 1");
    // The author was unassigned after writing the comment.
    let author = staff("Tutor 1", &[]);
    let outsider = staff("Tutor 2", &[]);
    let r = report(&owner, m);
    let private = comment(&r, Visibility::Private, Some(&author));

    assert!(can_see(&author, &r, &private));
    assert!(!can_see(&outsider, &r, &private));
  }

  #[test]
  fn admin_sees_everything() {
    let m = Uuid::new_v4();
    let owner = student("Student 1");
    let r = report(&owner, m);
    let comments = vec![
      comment(&r, Visibility::Private, None),
      comment(&r, Visibility::Private, Some(&staff("Tutor 1", &[m]))),
    ];
    assert_eq!(visible_comments(&admin("Admin"), &r, &comments), comments);
  }

  #[test]
  fn visible_comments_preserves_order() {
    let m = Uuid::new_v4();
    let owner = student("Student 1");
    let r = report(&owner, m);
    let comments: Vec<_> = (0..5)
      .map(|i| {
        let v = if i % 2 == 0 { Visibility::Public } else { Visibility::Private };
        comment(&r, v, None)
      })
      .collect();
    let seen = visible_comments(&student("Student 2"), &r, &comments);
    assert_eq!(seen, vec![
      comments[0].clone(),
      comments[2].clone(),
      comments[4].clone()
    ]);
  }

  // ── Gates ───────────────────────────────────────────────────────────────

  #[test]
  fn supervisor_gate_distinguishes_role_and_module() {
    let m = Uuid::new_v4();
    let owner = student("Student 1");
    let r = report(&owner, m);

    assert!(require_supervisor(&staff("Tutor 1", &[m]), &r, Denial::StatusRequiresStaff).is_ok());
    assert!(matches!(
      require_supervisor(&staff("Tutor 2", &[]), &r, Denial::StatusRequiresStaff),
      Err(Error::Forbidden(Denial::ForeignModule))
    ));
    assert!(matches!(
      require_supervisor(&admin("Admin"), &r, Denial::StatusRequiresStaff),
      Err(Error::Forbidden(Denial::StatusRequiresStaff))
    ));
    assert!(matches!(
      require_supervisor(&owner, &r, Denial::CommentRequiresStaff),
      Err(Error::Forbidden(Denial::CommentRequiresStaff))
    ));
  }

  #[test]
  fn staff_gate_ignores_assignment() {
    assert!(require_staff(&staff("Tutor 2", &[]), Denial::StatusRequiresStaff).is_ok());
    assert!(matches!(
      require_staff(&student("Student 1"), Denial::CommentRequiresStaff),
      Err(Error::Forbidden(Denial::CommentRequiresStaff))
    ));
    assert!(matches!(
      require_staff(&admin("Admin"), Denial::StatusRequiresStaff),
      Err(Error::Forbidden(Denial::StatusRequiresStaff))
    ));
  }

  #[test]
  fn only_the_owner_may_reply() {
    let m = Uuid::new_v4();
    let owner = student("Student 1");
    let r = report(&owner, m);

    assert!(require_report_owner(&owner, &r).is_ok());
    for actor in [student("Student 2"), staff("Tutor 1", &[m]), admin("Admin")] {
      assert!(matches!(
        require_report_owner(&actor, &r),
        Err(Error::Forbidden(Denial::NotReportOwner))
      ));
    }
  }

  // ── Status plan ─────────────────────────────────────────────────────────

  #[test]
  fn closed_is_terminal() {
    for to in [Status::Open, Status::InProgress] {
      assert_eq!(
        plan_status_change(Status::Closed, to),
        StatusPlan::Reject { from: Status::Closed, to }
      );
    }
    assert_eq!(
      plan_status_change(Status::Closed, Status::Closed),
      StatusPlan::Stay(Status::Closed)
    );
  }

  #[test]
  fn no_skipping_and_no_regression() {
    assert_eq!(
      plan_status_change(Status::Open, Status::InProgress),
      StatusPlan::Advance { from: Status::Open, to: Status::InProgress }
    );
    assert_eq!(
      plan_status_change(Status::Open, Status::Closed),
      StatusPlan::Reject { from: Status::Open, to: Status::Closed }
    );
    assert_eq!(
      plan_status_change(Status::InProgress, Status::Open),
      StatusPlan::Reject { from: Status::InProgress, to: Status::Open }
    );
  }

  // ── User removal ────────────────────────────────────────────────────────

  #[test]
  fn last_admin_cannot_be_removed() {
    let a = admin("Admin");
    let target = a.user().clone();
    assert!(matches!(check_user_removal(&a, &target, 1), Err(Error::LastAdmin)));
  }

  #[test]
  fn admin_cannot_remove_themselves() {
    let a = admin("Admin");
    let target = a.user().clone();
    assert!(matches!(check_user_removal(&a, &target, 2), Err(Error::SelfDelete)));
  }

  #[test]
  fn second_admin_and_non_admins_can_be_removed() {
    let a = admin("Admin");
    let b = admin("Admin 2");
    assert!(check_user_removal(&a, b.user(), 2).is_ok());
    assert!(check_user_removal(&a, student("Student 1").user(), 1).is_ok());
  }

  #[test]
  fn non_admins_cannot_remove_anyone() {
    let s = student("Student 1");
    let target = student("Student 2");
    assert!(matches!(
      check_user_removal(&s, target.user(), 1),
      Err(Error::Forbidden(Denial::AdminOnly))
    ));
  }

  #[test]
  fn blank_text_is_no_text() {
    assert_eq!(non_blank(None), None);
    assert_eq!(non_blank(Some("   \n")), None);
    assert_eq!(non_blank(Some("  ok ")), Some("ok".into()));
  }
}
