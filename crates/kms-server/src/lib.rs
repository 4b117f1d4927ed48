//! Server assembly for the KMS report tracker: configuration, admin
//! bootstrap, and the top-level router.

use std::path::{Path, PathBuf};

use axum::Router;
use kms_api::{Shared, api_router};
use kms_core::{Tracker, store::TrackerStore, user::CredentialScheme};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` layered
/// under `KMS_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  /// Admin created on startup if the store has none.
  #[serde(default)]
  pub bootstrap:  Option<BootstrapAdmin>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BootstrapAdmin {
  pub name:          String,
  pub email:         String,
  /// PHC string as printed by `server --hash-password`.
  pub password_hash: String,
}

/// Load configuration from `path` (optional) and the environment.
///
/// Nested keys use a double underscore, e.g. `KMS_BOOTSTRAP__EMAIL`.
pub fn load_config(path: &Path) -> Result<ServerConfig, config::ConfigError> {
  build_config(config::File::from(path).required(false))
}

fn build_config<T>(file: T) -> Result<ServerConfig, config::ConfigError>
where
  T: config::Source + Send + Sync + 'static,
{
  config::Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080)?
    .set_default("store_path", "~/.local/share/kms/kms.sqlite")?
    .add_source(file)
    .add_source(
      config::Environment::with_prefix("KMS")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()?
    .try_deserialize()
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Startup ─────────────────────────────────────────────────────────────────

/// Create the configured admin if the store has none yet.
pub async fn bootstrap<S, C>(
  tracker: &Tracker<S, C>,
  admin: Option<&BootstrapAdmin>,
) -> kms_core::Result<()>
where
  S: TrackerStore,
  C: CredentialScheme,
{
  match admin {
    Some(a) => {
      if tracker
        .bootstrap_admin(&a.name, &a.email, &a.password_hash)
        .await?
      {
        info!(email = %a.email, "created bootstrap admin");
      }
    }
    None => {
      let admins = tracker
        .store()
        .count_admins()
        .await
        .map_err(kms_core::Error::from_store)?;
      if admins == 0 {
        warn!("no admin exists and no [bootstrap] section is configured");
      }
    }
  }
  Ok(())
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// The full application: the JSON API under `/api`, with request tracing.
pub fn app<S, C>(tracker: Shared<S, C>) -> Router
where
  S: TrackerStore + 'static,
  C: CredentialScheme + 'static,
{
  Router::new()
    .nest("/api", api_router(tracker))
    .layer(TraceLayer::new_for_http())
}
