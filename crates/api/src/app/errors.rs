use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockroom_infra::ServiceError;

/// Map a service failure to its status code and JSON body.
///
/// Server-side failures are logged before they are surfaced.
pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    let message = err.to_string();
    if err.is_server_side() {
        tracing::error!(error = %message, "request failed");
    }

    match err {
        ServiceError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        ServiceError::InvalidIdentifier(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        ServiceError::NotFound(what) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
        }
        ServiceError::AlreadyConfirmed(what) => json_error(
            StatusCode::CONFLICT,
            "already_confirmed",
            format!("{what} is already confirmed"),
        ),
        ServiceError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        ServiceError::Sequence(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "sequence_error", msg)
        }
        ServiceError::PartialConfirmation {
            header_id, pending, ..
        } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({
                "error": "partial_confirmation",
                "message": message,
                "header_id": header_id.to_string(),
                "pending_details": pending.iter().map(ToString::to_string).collect::<Vec<_>>(),
            })),
        )
            .into_response(),
        ServiceError::Storage(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::{DetailId, OrderId};

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (ServiceError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::InvalidIdentifier("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ServiceError::AlreadyConfirmed("x".into()), StatusCode::CONFLICT),
            (ServiceError::Conflict("x".into()), StatusCode::CONFLICT),
            (ServiceError::Sequence("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ServiceError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                ServiceError::PartialConfirmation {
                    header_id: OrderId::new(),
                    pending: vec![DetailId::new()],
                    reason: "x".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(service_error_to_response(err).status(), status);
        }
    }
}
