use std::sync::Arc;

use axum::http::StatusCode;

use stockroom_infra::ServiceResult;

use crate::app::errors;
use crate::app::services::{AppServices, Backend};

/// Run a service call on the blocking pool.
///
/// Services are synchronous and the Postgres backend blocks on the runtime,
/// so handlers never call them from an async worker directly.
pub async fn blocking<S, T, F>(
    services: &Arc<AppServices<S>>,
    op: F,
) -> Result<T, axum::response::Response>
where
    S: Backend,
    T: Send + 'static,
    F: FnOnce(&AppServices<S>) -> ServiceResult<T> + Send + 'static,
{
    let services = Arc::clone(services);
    match tokio::task::spawn_blocking(move || op(&services)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(errors::service_error_to_response(err)),
        Err(join_err) => {
            tracing::error!(error = %join_err, "service task failed");
            Err(errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "service task failed",
            ))
        }
    }
}
