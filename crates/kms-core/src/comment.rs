//! Comments on reports and their reply threads.
//!
//! Comments reference their parent through `replies_to`. The application only
//! ever creates one level of replies, but the relation allows chains, so
//! [`threads`] walks each chain up to its root and flattens everything below
//! it.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who may read a comment. Fixed when the comment is written.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Visibility {
  Public,
  #[default]
  Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
  pub comment_id:      Uuid,
  pub report_id:       Uuid,
  pub text:            String,
  pub created_at:      DateTime<Utc>,
  pub visibility:      Visibility,
  /// Display name captured at write time; survives deletion of the author.
  pub author_name:     String,
  /// Set for staff comments; `None` for student replies and once the staff
  /// member has been deleted.
  pub author_staff_id: Option<Uuid>,
  pub replies_to:      Option<Uuid>,
}

/// A comment row as handed to the store; id and timestamp are store-assigned.
#[derive(Debug, Clone)]
pub struct NewComment {
  pub report_id:       Uuid,
  pub text:            String,
  pub visibility:      Visibility,
  pub author_name:     String,
  pub author_staff_id: Option<Uuid>,
  pub replies_to:      Option<Uuid>,
}

/// A top-level comment and every reply beneath it, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct Thread {
  pub comment: Comment,
  pub replies: Vec<Comment>,
}

/// Group `comments` into two-level threads.
///
/// A comment whose parent is absent from `comments` (e.g. filtered out by the
/// visibility policy) becomes a top-level entry. Comments caught in a parent
/// cycle are also treated as top-level. Each input comment appears exactly
/// once in the output.
pub fn threads(comments: Vec<Comment>) -> Vec<Thread> {
  let parents: HashMap<Uuid, Option<Uuid>> = comments
    .iter()
    .map(|c| (c.comment_id, c.replies_to))
    .collect();

  let root_of = |id: Uuid| -> Uuid {
    let mut current = id;
    let mut seen = HashSet::from([id]);
    while let Some(Some(parent)) = parents.get(&current) {
      if !parents.contains_key(parent) {
        break;
      }
      if !seen.insert(*parent) {
        return id;
      }
      current = *parent;
    }
    current
  };

  let roots: Vec<Uuid> = comments.iter().map(|c| root_of(c.comment_id)).collect();

  let mut out: Vec<Thread> = Vec::new();
  let mut index: HashMap<Uuid, usize> = HashMap::new();
  let mut pending = Vec::new();

  for (comment, root) in comments.into_iter().zip(roots) {
    if comment.comment_id == root {
      index.insert(root, out.len());
      out.push(Thread { comment, replies: Vec::new() });
    } else {
      pending.push((comment, root));
    }
  }

  for (comment, root) in pending {
    match index.get(&root) {
      Some(&i) => out[i].replies.push(comment),
      None => out.push(Thread { comment, replies: Vec::new() }),
    }
  }

  out
}
