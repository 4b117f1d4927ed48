//! HTTP Basic authentication and the argon2 [`CredentialScheme`].
//!
//! The Basic user name is the account email. Credentials are checked and the
//! [`Actor`] is reloaded from the store on every request, so role and
//! assignment changes take effect immediately.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use kms_core::{store::TrackerStore, user::{Actor, CredentialScheme}};
use rand_core::OsRng;

use crate::{Shared, error::ApiError};

// ─── Credentials ─────────────────────────────────────────────────────────────

/// Argon2id with default parameters, stored as a PHC string
/// (`$argon2id$v=19$…`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Credentials;

impl CredentialScheme for Argon2Credentials {
  fn hash(&self, plaintext: &str) -> kms_core::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
      .hash_password(plaintext.as_bytes(), &salt)
      .map(|hash| hash.to_string())
      .map_err(|e| kms_core::Error::Credential(e.to_string()))
  }

  fn verify(&self, plaintext: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
      Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
    })
  }
}

// ─── Extractor ───────────────────────────────────────────────────────────────

/// The authenticated requester. Present in a handler means the request
/// carried valid credentials.
pub struct Authenticated(pub Actor);

/// Split a `Basic` authorization header into `(email, password)`.
pub fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), ApiError> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds = String::from_utf8(decoded).map_err(|_| ApiError::Unauthorized)?;

  let (email, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;
  Ok((email.to_owned(), password.to_owned()))
}

impl<S, C> FromRequestParts<Shared<S, C>> for Authenticated
where
  S: TrackerStore + 'static,
  C: CredentialScheme + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    tracker: &Shared<S, C>,
  ) -> Result<Self, Self::Rejection> {
    let (email, password) = basic_credentials(&parts.headers)?;
    tracker
      .authenticate(&email, &password)
      .await?
      .map(Authenticated)
      .ok_or(ApiError::Unauthorized)
  }
}
