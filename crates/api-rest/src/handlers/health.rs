use api_shared::{HealthRes, HealthService};
use axum::response::Json;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint, open to unauthenticated callers.
#[axum::debug_handler]
pub async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}
