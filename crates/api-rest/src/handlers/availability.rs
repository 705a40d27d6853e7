use api_shared::dto::{AvailabilityRes, PageQuery, SetAvailabilityReq, UpdateAvailabilityReq};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;

use super::{collect, page};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/availability",
    request_body = SetAvailabilityReq,
    responses(
        (status = 201, description = "Window published", body = AvailabilityRes),
        (status = 400, description = "Invalid day or time range"),
        (status = 409, description = "Overlaps an existing window")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn set_availability(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(req): Json<SetAvailabilityReq>,
) -> Result<(StatusCode, Json<AvailabilityRes>), ApiError> {
    let window = state.services.availability.set(&actor, req.into())?;
    Ok((StatusCode::CREATED, Json(window.into())))
}

#[utoipa::path(
    get,
    path = "/api/availability",
    params(PageQuery),
    responses((status = 200, description = "All windows", body = [AvailabilityRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list_availability(
    State(state): State<AppState>,
    AuthUser(_actor): AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<AvailabilityRes>>, ApiError> {
    let page = page(&state, query.page, query.page_size)?;
    Ok(Json(collect(state.services.availability.list(page)?)))
}

#[utoipa::path(
    get,
    path = "/api/doctors/{id}/availability",
    params(("id" = i64, Path, description = "Doctor id")),
    responses(
        (status = 200, description = "Doctor's windows by day then start", body = [AvailabilityRes])
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn doctor_availability(
    State(state): State<AppState>,
    AuthUser(_actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<AvailabilityRes>>, ApiError> {
    Ok(Json(collect(state.services.availability.for_doctor(id)?)))
}

#[utoipa::path(
    put,
    path = "/api/availability/{id}",
    params(("id" = i64, Path, description = "Availability id")),
    request_body = UpdateAvailabilityReq,
    responses(
        (status = 200, description = "Window updated", body = AvailabilityRes),
        (status = 409, description = "Overlaps an existing window")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn update_availability(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateAvailabilityReq>,
) -> Result<Json<AvailabilityRes>, ApiError> {
    let window = state
        .services
        .availability
        .update(&actor, id, req.into())?;
    Ok(Json(window.into()))
}

#[utoipa::path(
    delete,
    path = "/api/availability/{id}",
    params(("id" = i64, Path, description = "Availability id")),
    responses((status = 204, description = "Window removed")),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn delete_availability(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.services.availability.delete(&actor, id)?;
    Ok(StatusCode::NO_CONTENT)
}
