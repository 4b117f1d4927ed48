//! Handlers for comment endpoints.
//!
//! | Method | Path                     | Notes |
//! |--------|--------------------------|-------|
//! | `GET`  | `/reports/{id}/comments` | Flat, oldest first, filtered by visibility |
//! | `POST` | `/reports/{id}/comments` | Staff of the module; returns 201 |
//! | `POST` | `/comments/{id}/replies` | Report owner; replies are private |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use kms_core::{
  comment::{Comment, Visibility},
  store::TrackerStore,
  user::CredentialScheme,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{Shared, auth::Authenticated, error::ApiError};

/// `GET /reports/{id}/comments`
pub async fn list<S, C>(
  State(tracker): State<Shared<S, C>>,
  Authenticated(actor): Authenticated,
  Path(report_id): Path<Uuid>,
) -> Result<Json<Vec<Comment>>, ApiError>
where
  S: TrackerStore + 'static,
  C: CredentialScheme + 'static,
{
  Ok(Json(tracker.visible_comments(&actor, report_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct NewCommentBody {
  pub text:       String,
  /// Defaults to private.
  #[serde(default)]
  pub visibility: Visibility,
}

/// `POST /reports/{id}/comments`
pub async fn create<S, C>(
  State(tracker): State<Shared<S, C>>,
  Authenticated(actor): Authenticated,
  Path(report_id): Path<Uuid>,
  Json(body): Json<NewCommentBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackerStore + 'static,
  C: CredentialScheme + 'static,
{
  let comment = tracker
    .add_comment(&actor, report_id, &body.text, body.visibility)
    .await?;
  Ok((StatusCode::CREATED, Json(comment)))
}

#[derive(Debug, Deserialize)]
pub struct ReplyBody {
  pub text: String,
}

/// `POST /comments/{id}/replies`
pub async fn reply<S, C>(
  State(tracker): State<Shared<S, C>>,
  Authenticated(actor): Authenticated,
  Path(comment_id): Path<Uuid>,
  Json(body): Json<ReplyBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackerStore + 'static,
  C: CredentialScheme + 'static,
{
  let reply = tracker.reply_to_comment(&actor, comment_id, &body.text).await?;
  Ok((StatusCode::CREATED, Json(reply)))
}
