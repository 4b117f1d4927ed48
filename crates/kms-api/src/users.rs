//! Handlers for `/me` and `/users` endpoints.
//!
//! | Method   | Path               | Notes |
//! |----------|--------------------|-------|
//! | `GET`    | `/me`              | The authenticated actor |
//! | `GET`    | `/users`           | Admin only; ordered by name |
//! | `POST`   | `/users`           | Body: [`NewUser`]; returns 201 + user |
//! | `DELETE` | `/users/{id}`      | Admin only; returns 204 |
//! | `PUT`    | `/users/{id}/role` | Body: `{"role":"staff"}` |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use kms_core::{
  store::TrackerStore,
  user::{Actor, CredentialScheme, NewUser, Role, User},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{Shared, auth::Authenticated, error::ApiError};

/// `GET /me`
pub async fn me<S, C>(
  State(_): State<Shared<S, C>>,
  Authenticated(actor): Authenticated,
) -> Json<Actor>
where
  S: TrackerStore + 'static,
  C: CredentialScheme + 'static,
{
  Json(actor)
}

/// `GET /users`
pub async fn list<S, C>(
  State(tracker): State<Shared<S, C>>,
  Authenticated(actor): Authenticated,
) -> Result<Json<Vec<User>>, ApiError>
where
  S: TrackerStore + 'static,
  C: CredentialScheme + 'static,
{
  Ok(Json(tracker.list_users(&actor).await?))
}

/// `POST /users` — the password is hashed before it reaches the store.
pub async fn create<S, C>(
  State(tracker): State<Shared<S, C>>,
  Authenticated(actor): Authenticated,
  Json(body): Json<NewUser>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackerStore + 'static,
  C: CredentialScheme + 'static,
{
  let user = tracker.create_user(&actor, body).await?;
  Ok((StatusCode::CREATED, Json(user)))
}

/// `DELETE /users/{id}`
pub async fn remove<S, C>(
  State(tracker): State<Shared<S, C>>,
  Authenticated(actor): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: TrackerStore + 'static,
  C: CredentialScheme + 'static,
{
  tracker.delete_user(&actor, id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct RoleBody {
  pub role: Role,
}

/// `PUT /users/{id}/role`
pub async fn set_role<S, C>(
  State(tracker): State<Shared<S, C>>,
  Authenticated(actor): Authenticated,
  Path(id): Path<Uuid>,
  Json(body): Json<RoleBody>,
) -> Result<Json<User>, ApiError>
where
  S: TrackerStore + 'static,
  C: CredentialScheme + 'static,
{
  Ok(Json(tracker.assign_role(&actor, id, body.role).await?))
}
