//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error body has the shape `{"error": "<message>", "kind": "<kind>"}`.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use kms_core::ErrorKind;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Missing, malformed, or wrong credentials.
  #[error("authentication required")]
  Unauthorized,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Core(#[from] kms_core::Error),
}

const RETRY_MESSAGE: &str =
  "the request conflicted with a concurrent change; please try again";

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, kind, message) = match &self {
      ApiError::Unauthorized => {
        (StatusCode::UNAUTHORIZED, "unauthenticated", self.to_string())
      }
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, "bad_request", m.clone()),
      ApiError::Core(e) => match e.kind() {
        ErrorKind::Authorization => {
          let message = match e {
            kms_core::Error::Forbidden(denial) => denial.to_string(),
            other => other.to_string(),
          };
          (StatusCode::FORBIDDEN, "authorization", message)
        }
        ErrorKind::BusinessRule => (StatusCode::CONFLICT, "business_rule", e.to_string()),
        ErrorKind::Validation => {
          (StatusCode::UNPROCESSABLE_ENTITY, "validation", e.to_string())
        }
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not_found", e.to_string()),
        ErrorKind::Integrity => {
          warn!(error = %e, "write rolled back on integrity violation");
          (StatusCode::CONFLICT, "integrity", RETRY_MESSAGE.to_owned())
        }
        ErrorKind::Unexpected => {
          error!(error = %e, "unexpected failure");
          (StatusCode::INTERNAL_SERVER_ERROR, "unexpected", e.to_string())
        }
      },
    };

    let mut res =
      (status, Json(json!({ "error": message, "kind": kind }))).into_response();
    if matches!(self, ApiError::Unauthorized) {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"kms\""),
      );
    }
    res
  }
}
