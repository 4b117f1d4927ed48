//! JSON REST API for the KMS report tracker.
//!
//! Exposes an axum [`Router`] backed by a [`Tracker`] over any
//! [`TrackerStore`]. Every route requires HTTP Basic credentials
//! (`email:password`); TLS and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", kms_api::api_router(tracker.clone()))
//! ```

pub mod auth;
pub mod comments;
pub mod error;
pub mod modules;
pub mod reports;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post, put},
};
use kms_core::{Tracker, store::TrackerStore, user::CredentialScheme};

pub use auth::{Argon2Credentials, Authenticated};
pub use error::ApiError;

/// Router state: the service shared by all handlers.
pub type Shared<S, C> = Arc<Tracker<S, C>>;

/// Build the API router for `tracker`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, C>(tracker: Shared<S, C>) -> Router<()>
where
  S: TrackerStore + 'static,
  C: CredentialScheme + 'static,
{
  Router::new()
    // Users
    .route("/me", get(users::me::<S, C>))
    .route("/users", get(users::list::<S, C>).post(users::create::<S, C>))
    .route("/users/{id}", delete(users::remove::<S, C>))
    .route("/users/{id}/role", put(users::set_role::<S, C>))
    // Modules
    .route("/modules", get(modules::list::<S, C>).post(modules::create::<S, C>))
    .route("/modules/{id}", delete(modules::remove::<S, C>))
    .route("/modules/{id}/staff", get(modules::staff::<S, C>))
    .route(
      "/modules/{id}/staff/{staff_id}",
      put(modules::assign::<S, C>).delete(modules::unassign::<S, C>),
    )
    // Reports
    .route("/reports", get(reports::list::<S, C>).post(reports::create::<S, C>))
    .route("/reports/{id}", get(reports::get_one::<S, C>))
    .route("/reports/{id}/status", post(reports::change_status::<S, C>))
    // Comments
    .route(
      "/reports/{id}/comments",
      get(comments::list::<S, C>).post(comments::create::<S, C>),
    )
    .route("/comments/{id}/replies", post(comments::reply::<S, C>))
    .with_state(tracker)
}
