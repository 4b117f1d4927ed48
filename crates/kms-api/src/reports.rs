//! Handlers for `/reports` endpoints.
//!
//! | Method | Path                  | Notes |
//! |--------|-----------------------|-------|
//! | `GET`  | `/reports`            | Optional `all`, `module_id`, `status`, `category` |
//! | `POST` | `/reports`            | Body: [`NewReport`]; students only; returns 201 |
//! | `GET`  | `/reports/{id}`       | Report with the threads visible to the caller |
//! | `POST` | `/reports/{id}/status`| Body: [`StatusRequest`]; returns the outcome |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use kms_core::{
  report::{
    Category, NewReport, Report, ReportFilter, ReportView, Status, StatusChange,
    StatusRequest,
  },
  store::TrackerStore,
  user::CredentialScheme,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{Shared, auth::Authenticated, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  /// Widen students and staff to every report.
  #[serde(default)]
  pub all:       bool,
  pub module_id: Option<Uuid>,
  pub status:    Option<Status>,
  /// A predefined category label (e.g. `pdf_script`) or custom text.
  /// `custom:<text>` selects custom text that matches a label.
  pub category:  Option<String>,
}

impl TryFrom<ListParams> for ReportFilter {
  type Error = ApiError;

  fn try_from(p: ListParams) -> Result<Self, Self::Error> {
    let category = match p.category.as_deref().map(Category::from_label) {
      Some(Category::Custom(text)) if text.trim().is_empty() => {
        return Err(ApiError::BadRequest("category must not be empty".into()));
      }
      Some(Category::Custom(text)) => Some(Category::Custom(text.trim().to_owned())),
      other => other,
    };
    Ok(ReportFilter {
      all: p.all,
      module_id: p.module_id,
      status: p.status,
      category,
    })
  }
}

/// `GET /reports[?all=true][&module_id=...][&status=...][&category=...]`
///
/// Newest first.
pub async fn list<S, C>(
  State(tracker): State<Shared<S, C>>,
  Authenticated(actor): Authenticated,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Report>>, ApiError>
where
  S: TrackerStore + 'static,
  C: CredentialScheme + 'static,
{
  let filter = ReportFilter::try_from(params)?;
  Ok(Json(tracker.list_reports(&actor, &filter).await?))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /reports`
pub async fn create<S, C>(
  State(tracker): State<Shared<S, C>>,
  Authenticated(actor): Authenticated,
  Json(body): Json<NewReport>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackerStore + 'static,
  C: CredentialScheme + 'static,
{
  let report = tracker.create_report(&actor, body).await?;
  Ok((StatusCode::CREATED, Json(report)))
}

// ─── Detail ──────────────────────────────────────────────────────────────────

/// `GET /reports/{id}`
pub async fn get_one<S, C>(
  State(tracker): State<Shared<S, C>>,
  Authenticated(actor): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<ReportView>, ApiError>
where
  S: TrackerStore + 'static,
  C: CredentialScheme + 'static,
{
  Ok(Json(tracker.report_view(&actor, id).await?))
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// `POST /reports/{id}/status`
///
/// A refused transition is still `200 OK`; the body's `outcome` says what
/// happened.
pub async fn change_status<S, C>(
  State(tracker): State<Shared<S, C>>,
  Authenticated(actor): Authenticated,
  Path(id): Path<Uuid>,
  Json(body): Json<StatusRequest>,
) -> Result<Json<StatusChange>, ApiError>
where
  S: TrackerStore + 'static,
  C: CredentialScheme + 'static,
{
  Ok(Json(tracker.change_status(&actor, id, body).await?))
}
