//! Handlers for `/modules` endpoints.
//!
//! | Method   | Path                               | Notes |
//! |----------|------------------------------------|-------|
//! | `GET`    | `/modules`                         | `?own=true` limits staff to assigned modules |
//! | `POST`   | `/modules`                         | Body: `{"title":"..."}`; returns 201 |
//! | `DELETE` | `/modules/{id}`                    | Deletes the module's reports too |
//! | `GET`    | `/modules/{id}/staff`              | Admin only |
//! | `PUT`    | `/modules/{id}/staff/{staff_id}`   | Returns `{"changed": bool}` |
//! | `DELETE` | `/modules/{id}/staff/{staff_id}`   | Returns `{"changed": bool}` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use kms_core::{
  module::Module,
  store::TrackerStore,
  user::{CredentialScheme, User},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Shared, auth::Authenticated, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub own: bool,
}

/// `GET /modules[?own=true]`
pub async fn list<S, C>(
  State(tracker): State<Shared<S, C>>,
  Authenticated(actor): Authenticated,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Module>>, ApiError>
where
  S: TrackerStore + 'static,
  C: CredentialScheme + 'static,
{
  Ok(Json(tracker.list_modules(&actor, params.own).await?))
}

#[derive(Debug, Deserialize)]
pub struct NewModuleBody {
  pub title: String,
}

/// `POST /modules`
pub async fn create<S, C>(
  State(tracker): State<Shared<S, C>>,
  Authenticated(actor): Authenticated,
  Json(body): Json<NewModuleBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackerStore + 'static,
  C: CredentialScheme + 'static,
{
  let module = tracker.create_module(&actor, &body.title).await?;
  Ok((StatusCode::CREATED, Json(module)))
}

/// `DELETE /modules/{id}`
pub async fn remove<S, C>(
  State(tracker): State<Shared<S, C>>,
  Authenticated(actor): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: TrackerStore + 'static,
  C: CredentialScheme + 'static,
{
  tracker.delete_module(&actor, id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /modules/{id}/staff`
pub async fn staff<S, C>(
  State(tracker): State<Shared<S, C>>,
  Authenticated(actor): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<User>>, ApiError>
where
  S: TrackerStore + 'static,
  C: CredentialScheme + 'static,
{
  Ok(Json(tracker.module_staff(&actor, id).await?))
}

#[derive(Debug, Serialize)]
pub struct Changed {
  pub changed: bool,
}

/// `PUT /modules/{id}/staff/{staff_id}`
pub async fn assign<S, C>(
  State(tracker): State<Shared<S, C>>,
  Authenticated(actor): Authenticated,
  Path((id, staff_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Changed>, ApiError>
where
  S: TrackerStore + 'static,
  C: CredentialScheme + 'static,
{
  let changed = tracker.assign_staff(&actor, id, staff_id).await?;
  Ok(Json(Changed { changed }))
}

/// `DELETE /modules/{id}/staff/{staff_id}`
pub async fn unassign<S, C>(
  State(tracker): State<Shared<S, C>>,
  Authenticated(actor): Authenticated,
  Path((id, staff_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Changed>, ApiError>
where
  S: TrackerStore + 'static,
  C: CredentialScheme + 'static,
{
  let changed = tracker.unassign_staff(&actor, id, staff_id).await?;
  Ok(Json(Changed { changed }))
}
