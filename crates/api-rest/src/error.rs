//! Mapping of core failures onto HTTP responses.

use api_shared::dto::ErrorRes;
use api_shared::TokenError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use carebook_core::CoreError;

/// Error returned by every handler.
///
/// Server-side faults are logged in full and answered with a generic message.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Core(CoreError),
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        Self::Core(e)
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        Self::Unauthorized(e.to_string())
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::Core(e) => match e {
                CoreError::Validation(_) | CoreError::InvalidValue(_) => {
                    (StatusCode::BAD_REQUEST, "validation")
                }
                CoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
                CoreError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
                CoreError::InvalidState(_) => (StatusCode::CONFLICT, "invalid_state"),
                CoreError::ProviderUnavailable(_) => {
                    (StatusCode::CONFLICT, "provider_unavailable")
                }
                CoreError::IneligibleRefund { .. } => (StatusCode::CONFLICT, "ineligible_refund"),
                CoreError::SlotConflict { .. } => (StatusCode::CONFLICT, "slot_conflict"),
                CoreError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
                e if e.is_retryable() => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        let error = if status.is_server_error() {
            tracing::error!("request failed: {:?}", self);
            "Internal error".to_string()
        } else {
            match &self {
                Self::Unauthorized(msg) => msg.clone(),
                Self::Core(e) => e.to_string(),
            }
        };
        let body = Json(ErrorRes {
            error,
            details: Some(code.to_string()),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_client_statuses() {
        let cases = [
            (CoreError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (
                CoreError::NotFound {
                    entity: "appointment",
                    id: 1,
                },
                StatusCode::NOT_FOUND,
            ),
            (CoreError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (CoreError::SlotConflict { existing_id: 3 }, StatusCode::CONFLICT),
            (CoreError::LockPoisoned, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).into_response().status(), status);
        }
    }
}
