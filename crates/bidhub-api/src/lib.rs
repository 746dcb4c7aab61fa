pub mod auth;
pub mod clock;
pub mod email;
pub mod error;
pub mod extract;
pub mod images;
pub mod listing_rules;
pub mod listings;
pub mod middleware;
pub mod password;
pub mod password_reset;
pub mod routes;
pub mod state;
pub mod users;
pub mod validation;

pub use error::ApiError;
pub use state::{AppState, AppStateInner};

use anyhow::anyhow;
use tracing::error;

/// Run blocking work (SQLite, Argon2) off the async runtime.
pub(crate) async fn blocking<F, T, E>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Dependency(anyhow!("blocking task failed: {}", e))
        })?
        .map_err(Into::into)
}
