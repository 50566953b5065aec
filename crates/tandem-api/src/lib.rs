pub mod couples;
pub mod error;
pub mod matches;
pub mod service;

use std::sync::Arc;

use tracing::error;

use tandem_db::Database;
use tandem_types::GameError;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
}

// Handlers stay thin: run the blocking service call off the async runtime,
// then project the result through the public-view boundary.

pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, GameError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError(GameError::Storage(format!("worker failure: {e}")))
        })?
        .map_err(ApiError)
}
